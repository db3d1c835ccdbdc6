#![deny(warnings)]

use anyhow::Context;
use clap::{Parser, ValueEnum};
use emotion_trend_core::config::{
    resolve_api_key, resolve_string_with_default, AnalysisConfig, ApiKey, CombinedConfig,
    ExtractConfig, ExtractTarget, RemoteConfig, StdEnv, WindowConfig, DEFAULT_CONCURRENCY,
    DEFAULT_ENDPOINT, DEFAULT_GROUP_SIZE, DEFAULT_MAX_LENGTH, DEFAULT_REQUEST_TIMEOUT,
    DEFAULT_STEP, DEFAULT_TOP_K, ENV_EMOTION_API_KEY, ENV_EMOTION_ENDPOINT,
};
use emotion_trend_core::pipeline::{EmotionPipeline, PipelineOutput};
use emotion_trend_core::scoring::{KeywordScoreProvider, RemoteScoreProvider, ScoreProvider};
use emotion_trend_core::subtitle::{parse_srt, Segment};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ProviderKind {
    /// Offline keyword lexicon
    Keyword,
    /// Hosted text-classification endpoint
    Remote,
}

#[derive(Parser, Debug)]
#[command(name = "emotion-trend")]
#[command(about = "Emotion trend and peak detection over subtitle files")]
struct Args {
    /// Subtitle file to analyse (SRT)
    #[arg(long)]
    srt: PathBuf,

    /// Directory receiving emotion_highest.json and emotion_trend.json
    #[arg(long)]
    work_dir: PathBuf,

    #[arg(long, default_value_t = DEFAULT_GROUP_SIZE)]
    group_size: usize,

    #[arg(long, default_value_t = DEFAULT_STEP)]
    step: usize,

    /// Omit trailing windows shorter than --group-size
    #[arg(long)]
    drop_partial: bool,

    /// Character budget for the combined-mode passage
    #[arg(long, default_value_t = DEFAULT_MAX_LENGTH)]
    max_length: usize,

    #[arg(long, default_value_t = DEFAULT_TOP_K)]
    top_k: usize,

    /// Rank by this label only; defaults to one ranking per dominant label
    #[arg(long)]
    label: Option<String>,

    /// Skip picks sharing more than this fraction of members with a better pick
    #[arg(long)]
    max_overlap: Option<f64>,

    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    #[arg(long, value_enum, default_value_t = ProviderKind::Keyword)]
    provider: ProviderKind,

    #[arg(long)]
    endpoint: Option<String>,

    #[arg(long)]
    api_key: Option<String>,

    /// Per-request deadline for the remote provider, in seconds
    #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT.as_secs())]
    timeout_secs: u64,

    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level)?;

    let cfg = build_config(&args)?;
    tracing::info!(
        group_size = cfg.window.group_size,
        step = cfg.window.step,
        top_k = cfg.extract.top_k,
        provider = ?args.provider,
        "config loaded"
    );

    let segments = load_segments(&args.srt).await?;
    tokio::fs::create_dir_all(&args.work_dir)
        .await
        .with_context(|| format!("failed to create {}", args.work_dir.display()))?;

    let output = match args.provider {
        ProviderKind::Keyword => run(KeywordScoreProvider::new(), cfg, &segments, &args.work_dir).await?,
        ProviderKind::Remote => {
            let env = StdEnv;
            let endpoint = resolve_string_with_default(
                args.endpoint.clone(),
                ENV_EMOTION_ENDPOINT,
                &env,
                DEFAULT_ENDPOINT,
            );
            let api_key = resolve_api_key(args.api_key.clone(), ENV_EMOTION_API_KEY, &env)?;
            let remote = remote_config(&endpoint, api_key, &args)?;
            let provider =
                RemoteScoreProvider::new(remote).context("failed to build remote provider")?;
            run(provider, cfg, &segments, &args.work_dir).await?
        }
    };

    for group in output.highest.combined.iter().filter(|g| g.rank == 1) {
        tracing::info!(
            label = %group.label,
            score = group.score,
            time_secs = group.time.as_secs_f64(),
            "strongest combined group"
        );
    }

    Ok(())
}

async fn run<P: ScoreProvider>(
    provider: P,
    cfg: AnalysisConfig,
    segments: &[Segment],
    work_dir: &Path,
) -> anyhow::Result<PipelineOutput> {
    let pipeline = EmotionPipeline::new(provider, cfg);
    let output = pipeline
        .run_and_save(segments, work_dir)
        .await
        .context("emotion analysis failed")?;
    Ok(output)
}

async fn load_segments(path: &Path) -> anyhow::Result<Vec<Segment>> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let segments =
        parse_srt(&text).with_context(|| format!("failed to parse {}", path.display()))?;
    tracing::info!(count = segments.len(), path = %path.display(), "loaded subtitles");
    Ok(segments)
}

fn init_tracing(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(
            level
                .parse()
                .with_context(|| format!("invalid --log-level: {level}"))?,
        )
        .from_env_lossy();

    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

fn build_config(args: &Args) -> anyhow::Result<AnalysisConfig> {
    let window = WindowConfig::new(args.group_size, args.step, args.drop_partial)?;
    let combined = CombinedConfig::new(args.max_length, args.concurrency)?;
    let target = match &args.label {
        Some(label) => ExtractTarget::label(label.to_lowercase())?,
        None => ExtractTarget::Dominant,
    };
    let extract = ExtractConfig::new(args.top_k, target, args.max_overlap)?;

    Ok(AnalysisConfig {
        window,
        combined,
        extract,
    })
}

fn remote_config(
    endpoint: &str,
    api_key: Option<ApiKey>,
    args: &Args,
) -> anyhow::Result<RemoteConfig> {
    let remote = RemoteConfig::new(endpoint, api_key)?
        .with_timeout(Duration::from_secs(args.timeout_secs))?;
    Ok(remote)
}
