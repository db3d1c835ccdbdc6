use crate::aggregate::{group_and_average, group_by_individual_scores, AggregationMode, GroupSample};
use crate::config::{AnalysisConfig, ConfigError};
use crate::export::{write_highest, write_trend, ExportError, HighestGroups};
use crate::extract::extract_highest;
use crate::scoring::{score_segments, ScoreProvider, ScoringError};
use crate::subtitle::Segment;
use crate::trend::Trend;
use std::path::Path;

const LOG_TARGET: &str = "pipeline";

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("invalid analysis config")]
    Config(#[from] ConfigError),
    #[error("{mode} aggregation failed")]
    Scoring {
        mode: &'static str,
        #[source]
        source: ScoringError,
    },
    #[error(transparent)]
    Export(#[from] ExportError),
}

/// Everything one run produces. Sample sequences are complete, not just the
/// extracted extremes, so renderers can draw the whole trend.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PipelineOutput {
    pub individual: Vec<GroupSample>,
    pub combined: Vec<GroupSample>,
    pub highest: HighestGroups,
}

impl PipelineOutput {
    pub fn samples(&self, mode: AggregationMode) -> &[GroupSample] {
        match mode {
            AggregationMode::Individual => &self.individual,
            AggregationMode::Combined => &self.combined,
        }
    }

    /// Trend for the combined mode, which sees cross-cue context.
    pub fn trend(&self) -> Trend {
        Trend::from_samples(&self.combined)
    }
}

/// Segments in, samples and top groups out. Stages run one after another;
/// only provider calls inside a stage overlap.
pub struct EmotionPipeline<P> {
    pub provider: P,
    pub config: AnalysisConfig,
}

impl<P> EmotionPipeline<P>
where
    P: ScoreProvider,
{
    pub fn new(provider: P, config: AnalysisConfig) -> Self {
        Self { provider, config }
    }

    pub async fn run(&self, segments: &[Segment]) -> Result<PipelineOutput, PipelineError> {
        let cfg = &self.config;
        cfg.validate()?;
        tracing::info!(
            target: LOG_TARGET,
            segments = segments.len(),
            group_size = cfg.window.group_size,
            step = cfg.window.step,
            "starting emotion analysis"
        );

        let individual_failed = |source: ScoringError| PipelineError::Scoring {
            mode: AggregationMode::Individual.as_str(),
            source,
        };
        let scored = score_segments(segments, &self.provider, cfg.combined.concurrency)
            .await
            .map_err(individual_failed)?;
        let individual = group_by_individual_scores(&scored, &cfg.window).map_err(individual_failed)?;

        let combined = group_and_average(segments, &cfg.window, &cfg.combined, &self.provider)
            .await
            .map_err(|source| PipelineError::Scoring {
                mode: AggregationMode::Combined.as_str(),
                source,
            })?;

        let highest = HighestGroups {
            individual: extract_highest(&individual, &cfg.extract),
            combined: extract_highest(&combined, &cfg.extract),
        };

        tracing::info!(
            target: LOG_TARGET,
            individual_samples = individual.len(),
            combined_samples = combined.len(),
            individual_picks = highest.individual.len(),
            combined_picks = highest.combined.len(),
            "emotion analysis finished"
        );

        Ok(PipelineOutput {
            individual,
            combined,
            highest,
        })
    }

    /// Run, then write `emotion_highest.json` and `emotion_trend.json` to `work_dir`.
    pub async fn run_and_save(
        &self,
        segments: &[Segment],
        work_dir: &Path,
    ) -> Result<PipelineOutput, PipelineError> {
        let output = self.run(segments).await?;
        write_highest(work_dir, &output.highest)?;
        write_trend(work_dir, &output.trend())?;
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CombinedConfig, ExtractConfig, ExtractTarget, WindowConfig};
    use crate::scoring::testing::{segment, ScriptedProvider};
    use crate::scoring::KeywordScoreProvider;
    use tempfile::tempdir;

    fn config(group_size: usize, step: usize, extract: ExtractConfig) -> AnalysisConfig {
        AnalysisConfig {
            window: WindowConfig::new(group_size, step, false).expect("valid window"),
            combined: CombinedConfig::default(),
            extract,
        }
    }

    fn joy_segments(n: usize) -> Vec<Segment> {
        (0..n)
            .map(|i| segment(i, i as u64 * 1000, &format!("joy:{}", (i % 5) as f64 / 10.0)))
            .collect()
    }

    #[tokio::test]
    async fn empty_input_yields_empty_everything() {
        let pipeline = EmotionPipeline::new(ScriptedProvider::default(), AnalysisConfig::default());
        let output = pipeline.run(&[]).await.expect("empty ok");
        assert!(output.individual.is_empty());
        assert!(output.combined.is_empty());
        assert!(output.trend().is_empty());
        assert_eq!(pipeline.provider.calls(), 0);
        assert_eq!(
            serde_json::to_value(&output.highest).expect("serialize"),
            serde_json::json!({ "individual": [], "combined": [] })
        );
    }

    #[tokio::test]
    async fn ten_segments_end_to_end() {
        let pipeline = EmotionPipeline::new(
            ScriptedProvider::default(),
            config(4, 2, ExtractConfig::default()),
        );
        let output = pipeline.run(&joy_segments(10)).await.expect("run");

        let starts: Vec<usize> = output
            .individual
            .iter()
            .map(|s| s.window.start_index)
            .collect();
        assert_eq!(starts, vec![0, 2, 4, 6, 8]);
        assert_eq!(output.combined.len(), 5);
        assert_eq!(output.combined[4].window.len(), 2);
        // 10 per-segment calls plus 5 window calls.
        assert_eq!(pipeline.provider.calls(), 15);
        for mode in [AggregationMode::Individual, AggregationMode::Combined] {
            let samples = output.samples(mode);
            assert!(samples.windows(2).all(|p| p[0].time <= p[1].time));
        }
    }

    #[tokio::test]
    async fn repeated_runs_are_byte_identical() {
        let extract = ExtractConfig::new(3, ExtractTarget::Dominant, Some(0.0)).expect("valid");
        let segments = joy_segments(12);
        let first = EmotionPipeline::new(ScriptedProvider::default(), config(3, 1, extract.clone()))
            .run(&segments)
            .await
            .expect("first run");
        let second = EmotionPipeline::new(ScriptedProvider::default(), config(3, 1, extract))
            .run(&segments)
            .await
            .expect("second run");

        let a = serde_json::to_string(&first.highest).expect("serialize");
        let b = serde_json::to_string(&second.highest).expect("serialize");
        assert_eq!(a, b);
        assert!(!first.highest.combined.is_empty());
    }

    #[tokio::test]
    async fn extraction_is_identical_for_both_modes_on_equal_samples() {
        // Single-segment windows give both modes the same text, time and scores.
        let extract = ExtractConfig::new(2, ExtractTarget::label("joy").expect("label"), None)
            .expect("valid");
        let pipeline = EmotionPipeline::new(ScriptedProvider::default(), config(1, 1, extract));
        let output = pipeline.run(&joy_segments(7)).await.expect("run");

        assert_eq!(output.individual, output.combined);
        assert_eq!(output.highest.individual, output.highest.combined);
        let picked: Vec<usize> = output
            .highest
            .individual
            .iter()
            .map(|g| g.sample_index)
            .collect();
        assert_eq!(picked, vec![4, 3]);
    }

    #[tokio::test]
    async fn scoring_failure_aborts_with_mode_and_window() {
        let mut segments = joy_segments(4);
        segments[2].text = "fail".to_owned();
        let pipeline = EmotionPipeline::new(
            ScriptedProvider::default(),
            config(2, 2, ExtractConfig::default()),
        );
        let err = pipeline.run(&segments).await.unwrap_err();
        match err {
            PipelineError::Scoring {
                mode,
                source: ScoringError::Segment { index, .. },
            } => {
                assert_eq!(mode, "individual");
                assert_eq!(index, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn hand_built_invalid_config_fails_before_any_call() {
        let mut cfg = AnalysisConfig::default();
        cfg.extract.max_overlap = Some(f64::NAN);
        let pipeline = EmotionPipeline::new(ScriptedProvider::default(), cfg);
        let err = pipeline.run(&joy_segments(4)).await.unwrap_err();
        assert!(matches!(err, PipelineError::Config(ConfigError::InvalidOverlap(_))));

        let mut cfg = AnalysisConfig::default();
        cfg.window.step = 0;
        let pipeline = EmotionPipeline::new(ScriptedProvider::default(), cfg);
        let err = pipeline.run(&joy_segments(4)).await.unwrap_err();
        assert!(matches!(err, PipelineError::Config(ConfigError::ZeroStep)));
        assert_eq!(pipeline.provider.calls(), 0);
    }

    #[tokio::test]
    async fn keyword_provider_finds_the_happy_stretch() {
        let texts = [
            "The meeting starts now.",
            "Please open the report.",
            "I am so happy, this is wonderful!",
            "Wow, great news, I love it!",
            "Back to the agenda.",
            "That was a terrible, sad loss.",
        ];
        let segments: Vec<Segment> = texts
            .iter()
            .enumerate()
            .map(|(i, t)| segment(i, i as u64 * 2000, t))
            .collect();
        let extract = ExtractConfig::new(1, ExtractTarget::label("joy").expect("label"), None)
            .expect("valid");
        let pipeline = EmotionPipeline::new(KeywordScoreProvider::new(), config(2, 1, extract));
        let output = pipeline.run(&segments).await.expect("run");

        let top = &output.highest.individual[0];
        assert_eq!((top.start_index, top.end_index), (2, 4));
        // Re-scored as one passage, the window ending on the happy line wins.
        let top = &output.highest.combined[0];
        assert_eq!(top.label, "joy");
        assert_eq!((top.start_index, top.end_index), (1, 3));
        assert_eq!(top.score, 1.0);
    }

    #[tokio::test]
    async fn run_and_save_writes_both_artifacts() {
        let dir = tempdir().expect("temp dir");

        let pipeline = EmotionPipeline::new(KeywordScoreProvider::new(), AnalysisConfig::default());
        let segments = vec![segment(0, 0, "so happy"), segment(1, 1000, "so sad")];
        pipeline.run_and_save(&segments, dir.path()).await.expect("run and save");

        assert!(dir.path().join(crate::export::HIGHEST_FILE_NAME).exists());
        let trend: Trend = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join(crate::export::TREND_FILE_NAME)).expect("read"),
        )
        .expect("parse");
        assert_eq!(trend.len(), 1);
    }
}
