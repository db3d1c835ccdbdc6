#![deny(warnings)]

pub mod aggregate;
pub mod config;
pub mod export;
pub mod extract;
pub mod pipeline;
pub mod scoring;
pub mod subtitle;
pub mod trend;
pub mod util;
pub mod window;
