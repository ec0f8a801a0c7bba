//! The batch runner.
//!
//! Videos are handled strictly one at a time, because the inference back-ends
//! hold the accelerator exclusively. Each video moves through
//!
//! ```text
//! Discovered -> Decided -> Skipped
//!                       -> [Transcribing ->] Translating -> Done
//!                       -> Failed (from any active state)
//! ```
//!
//! and a failure only ever ends that video, never the batch.

use std::fmt;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

use crate::artifact::{locate, ArtifactPaths};
use crate::config::PipelineConfig;
use crate::decision::{decide, ProcessingDecision};
use crate::discovery::{discover, VideoAsset};
use crate::error::{Result, SubsweepError};
use crate::report::{BatchReport, FailedStep, Outcome, VideoReport};
use crate::subtitle::{read_srt, write_srt_atomic, Cue};
use crate::transcribe::Transcriber;
use crate::translate::Translator;

/// Per-video processing state, logged on every transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoState {
    Discovered,
    Decided(ProcessingDecision),
    Skipped,
    Transcribing,
    Translating,
    Done,
    Failed(FailedStep),
}

impl fmt::Display for VideoState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VideoState::Discovered => f.write_str("discovered"),
            VideoState::Decided(decision) => write!(f, "decided ({})", decision),
            VideoState::Skipped => f.write_str("skipped"),
            VideoState::Transcribing => f.write_str("transcribing"),
            VideoState::Translating => f.write_str("translating"),
            VideoState::Done => f.write_str("done"),
            VideoState::Failed(step) => write!(f, "failed at {}", step),
        }
    }
}

/// A planned decision for one video, computed without touching any model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedVideo {
    pub video: VideoAsset,
    pub paths: ArtifactPaths,
    pub decision: ProcessingDecision,
}

type StepResult<T> = std::result::Result<T, (FailedStep, SubsweepError)>;

/// Runs transcription and translation over a directory tree, reusing any
/// finished artifacts already on disk
pub struct Pipeline {
    transcriber: Box<dyn Transcriber>,
    translator: Box<dyn Translator>,
    source_language: String,
    video_extensions: Vec<String>,
}

impl Pipeline {
    pub fn new(
        transcriber: Box<dyn Transcriber>,
        translator: Box<dyn Translator>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            transcriber,
            translator,
            source_language: config.source_language.clone(),
            video_extensions: config.video_extensions.clone(),
        }
    }

    /// Verify that both models can be used before any video is touched
    pub async fn check_collaborators(&self) -> Result<()> {
        self.transcriber.check_availability().await?;
        self.translator.check_availability().await?;
        Ok(())
    }

    /// Process every video under `root`. Only a missing or unreadable root is an
    /// error; per-video failures are recorded in the report.
    pub async fn run(&self, root: &Path, target_language: &str) -> Result<BatchReport> {
        let videos = discover(root, &self.video_extensions)?;
        let root = videos.root().to_path_buf();
        info!(
            "Processing {} ({} -> {})",
            root.display(),
            self.source_language,
            target_language
        );

        let mut report = BatchReport::new(&root, &self.source_language, target_language);
        for video in videos {
            let video_report = self.process_video(&video, &root, target_language).await;
            report.record(video_report);
        }

        if report.videos.is_empty() {
            info!("No video files found under {}", root.display());
        }

        report.finish();
        Ok(report)
    }

    async fn process_video(&self, video: &VideoAsset, root: &Path, target_language: &str) -> VideoReport {
        let started = Instant::now();
        let name = pathdiff::diff_paths(&video.path, root)
            .unwrap_or_else(|| video.path.clone())
            .display()
            .to_string();
        transition(&name, VideoState::Discovered);

        let paths = ArtifactPaths::for_video(&video.path, &self.source_language, target_language);
        let located = locate(&paths);
        let decision = decide(located.source, located.target);
        transition(&name, VideoState::Decided(decision));

        let outcome = if decision == ProcessingDecision::SkipEntirely {
            transition(&name, VideoState::Skipped);
            Outcome::Skipped
        } else {
            match self.execute(&name, video, &paths, decision, target_language).await {
                Ok(()) => {
                    transition(&name, VideoState::Done);
                    Outcome::Succeeded
                }
                Err((step, e)) => {
                    warn!("{}: {} failed: {}", name, step, e);
                    transition(&name, VideoState::Failed(step));
                    Outcome::Failed {
                        step,
                        reason: e.to_string(),
                    }
                }
            }
        };

        VideoReport::new(&video.path, root, decision, outcome, started.elapsed())
    }

    async fn execute(
        &self,
        name: &str,
        video: &VideoAsset,
        paths: &ArtifactPaths,
        decision: ProcessingDecision,
        target_language: &str,
    ) -> StepResult<()> {
        let source_cues = if decision.needs_transcription() {
            transition(name, VideoState::Transcribing);
            let cues = self
                .transcriber
                .transcribe(&video.path)
                .await
                .map_err(|e| (FailedStep::Transcribe, e))?;
            write_srt_atomic(&paths.source, &cues).map_err(|e| (FailedStep::PersistSource, e))?;
            cues
        } else {
            info!("{}: reusing {}", name, paths.source.display());
            self.read_source(paths).await?
        };

        transition(name, VideoState::Translating);
        let translated = self
            .translator
            .translate(&source_cues, target_language)
            .await
            .and_then(|translated| check_alignment(&source_cues, translated))
            .map_err(|e| (FailedStep::Translate, e))?;

        write_srt_atomic(&paths.target, &translated).map_err(|e| (FailedStep::PersistTarget, e))
    }

    async fn read_source(&self, paths: &ArtifactPaths) -> StepResult<Vec<Cue>> {
        let cues = read_srt(&paths.source)
            .await
            .map_err(|e| (FailedStep::ReadSource, e))?;

        if cues.is_empty() {
            return Err((
                FailedStep::ReadSource,
                SubsweepError::Subtitle(format!("{} has no cues", paths.source.display())),
            ));
        }
        Ok(cues)
    }
}

/// Decide every video under `root` without running anything
pub fn plan(
    root: &Path,
    video_extensions: &[String],
    source_language: &str,
    target_language: &str,
) -> Result<Vec<PlannedVideo>> {
    Ok(discover(root, video_extensions)?
        .map(|video| {
            let paths = ArtifactPaths::for_video(&video.path, source_language, target_language);
            let decision = ProcessingDecision::from(locate(&paths));
            PlannedVideo {
                video,
                paths,
                decision,
            }
        })
        .collect())
}

/// A translation must keep every cue and its timing
fn check_alignment(source: &[Cue], translated: Vec<Cue>) -> Result<Vec<Cue>> {
    if source.len() != translated.len() {
        return Err(SubsweepError::Translation(format!(
            "Translated {} cues but the source has {}",
            translated.len(),
            source.len()
        )));
    }

    if let Some(index) = source
        .iter()
        .zip(&translated)
        .position(|(s, t)| s.start_ms != t.start_ms || s.end_ms != t.end_ms)
    {
        return Err(SubsweepError::Translation(format!(
            "Timing of cue {} changed during translation",
            index + 1
        )));
    }

    Ok(translated)
}

fn transition(name: &str, state: VideoState) {
    info!("{}: {}", name, state);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::ArtifactState;
    use crate::report::ExitPolicy;
    use crate::transcribe::MockTranscriber;
    use crate::translate::MockTranslator;
    use assert_fs::prelude::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const SOURCE_SRT: &str = "1\n00:00:01,000 --> 00:00:02,000\nHello\n\n2\n00:00:03,000 --> 00:00:04,500\nGoodbye\n";

    /// Transcribes every video into two cues; fails on file names in `broken`
    struct StubTranscriber {
        calls: Arc<AtomicUsize>,
        broken: Vec<&'static str>,
    }

    #[async_trait]
    impl Transcriber for StubTranscriber {
        async fn transcribe(&self, video_path: &Path) -> Result<Vec<Cue>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let name = video_path.file_name().unwrap().to_string_lossy().to_string();
            if self.broken.contains(&name.as_str()) {
                return Err(SubsweepError::Transcription(format!("{}: invalid data found", name)));
            }
            Ok(vec![
                Cue::new(1_000, 2_000, format!("Hello from {}", name)),
                Cue::new(3_000, 4_500, "Goodbye"),
            ])
        }

        async fn check_availability(&self) -> Result<()> {
            Ok(())
        }
    }

    /// Prefixes every cue with the target language
    struct StubTranslator {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Translator for StubTranslator {
        async fn translate(&self, cues: &[Cue], target_language: &str) -> Result<Vec<Cue>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(cues
                .iter()
                .map(|cue| cue.with_text(format!("[{}] {}", target_language, cue.text)))
                .collect())
        }

        async fn check_availability(&self) -> Result<()> {
            Ok(())
        }
    }

    struct Harness {
        pipeline: Pipeline,
        transcribe_calls: Arc<AtomicUsize>,
        translate_calls: Arc<AtomicUsize>,
    }

    fn harness(broken: Vec<&'static str>) -> Harness {
        let transcribe_calls = Arc::new(AtomicUsize::new(0));
        let translate_calls = Arc::new(AtomicUsize::new(0));
        let pipeline = Pipeline::new(
            Box::new(StubTranscriber {
                calls: transcribe_calls.clone(),
                broken,
            }),
            Box::new(StubTranslator {
                calls: translate_calls.clone(),
            }),
            &PipelineConfig::default(),
        );
        Harness {
            pipeline,
            transcribe_calls,
            translate_calls,
        }
    }

    fn mocked(transcriber: MockTranscriber, translator: MockTranslator) -> Pipeline {
        Pipeline::new(Box::new(transcriber), Box::new(translator), &PipelineConfig::default())
    }

    fn snapshot(dir: &Path) -> Vec<(String, Vec<u8>)> {
        let mut files: Vec<_> = walkdir::WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                (
                    e.path().strip_prefix(dir).unwrap().to_string_lossy().to_string(),
                    std::fs::read(e.path()).unwrap(),
                )
            })
            .collect();
        files.sort();
        files
    }

    #[tokio::test]
    async fn test_fresh_video_is_transcribed_and_translated() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("show.mkv").touch().unwrap();
        let h = harness(vec![]);

        let report = h.pipeline.run(temp.path(), "nl").await.unwrap();

        assert_eq!(report.videos.len(), 1);
        assert_eq!(report.videos[0].decision, ProcessingDecision::TranscribeAndTranslate);
        assert_eq!(report.videos[0].outcome, Outcome::Succeeded);

        let source = crate::subtitle::parse_srt(&std::fs::read_to_string(temp.path().join("show.en.srt")).unwrap()).unwrap();
        let target = crate::subtitle::parse_srt(&std::fs::read_to_string(temp.path().join("show.nl.srt")).unwrap()).unwrap();
        assert_eq!(source.len(), 2);
        assert_eq!(target.len(), source.len());
        assert_eq!(target[0].text, "[nl] Hello from show.mkv");
        assert_eq!(target[1].start_ms, source[1].start_ms);
        assert!(ArtifactState::inspect(&temp.path().join("show.nl.srt")).is_usable());
    }

    #[tokio::test]
    async fn test_second_run_skips_everything_and_changes_nothing() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("a.mkv").touch().unwrap();
        temp.child("season/b.mp4").touch().unwrap();
        let h = harness(vec![]);

        let first = h.pipeline.run(temp.path(), "nl").await.unwrap();
        assert_eq!(first.succeeded(), 2);
        let after_first = snapshot(temp.path());

        let second = h.pipeline.run(temp.path(), "nl").await.unwrap();
        assert_eq!(second.skipped(), 2);
        assert!(second.videos.iter().all(|v| v.decision == ProcessingDecision::SkipEntirely));
        assert_eq!(snapshot(temp.path()), after_first);
        assert_eq!(h.transcribe_calls.load(Ordering::SeqCst), 2);
        assert_eq!(h.translate_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_existing_target_makes_no_collaborator_calls() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("show.mkv").touch().unwrap();
        temp.child("show.nl.srt").write_str(SOURCE_SRT).unwrap();
        let before = snapshot(temp.path());

        let mut transcriber = MockTranscriber::new();
        transcriber.expect_transcribe().times(0);
        let mut translator = MockTranslator::new();
        translator.expect_translate().times(0);

        let report = mocked(transcriber, translator).run(temp.path(), "nl").await.unwrap();

        assert_eq!(report.videos[0].decision, ProcessingDecision::SkipEntirely);
        assert_eq!(report.videos[0].outcome, Outcome::Skipped);
        assert_eq!(snapshot(temp.path()), before);
    }

    #[tokio::test]
    async fn test_empty_target_with_source_is_translate_only() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("show.mkv").touch().unwrap();
        temp.child("show.en.srt").write_str(SOURCE_SRT).unwrap();
        temp.child("show.nl.srt").touch().unwrap();

        let mut transcriber = MockTranscriber::new();
        transcriber.expect_transcribe().times(0);
        let mut translator = MockTranslator::new();
        translator
            .expect_translate()
            .withf(|cues, lang| cues.len() == 2 && lang == "nl")
            .times(1)
            .returning(|cues, _| Ok(cues.iter().map(|c| c.with_text("vertaald")).collect()));

        let report = mocked(transcriber, translator).run(temp.path(), "nl").await.unwrap();

        assert_eq!(report.videos[0].decision, ProcessingDecision::TranslateOnly);
        assert_eq!(report.videos[0].outcome, Outcome::Succeeded);
        let target = std::fs::read_to_string(temp.path().join("show.nl.srt")).unwrap();
        assert!(target.contains("00:00:03,000 --> 00:00:04,500\nvertaald"));
        assert_eq!(std::fs::read_to_string(temp.path().join("show.en.srt")).unwrap(), SOURCE_SRT);
    }

    #[tokio::test]
    async fn test_one_broken_video_does_not_stop_the_batch() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("a.mkv").touch().unwrap();
        temp.child("b.mkv").touch().unwrap();
        temp.child("c.mkv").touch().unwrap();
        let h = harness(vec!["b.mkv"]);

        let report = h.pipeline.run(temp.path(), "nl").await.unwrap();

        assert_eq!(report.videos.len(), 3);
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 1);
        let failure = report.failures().next().unwrap();
        assert_eq!(failure.relative_path, Path::new("b.mkv"));
        match &failure.outcome {
            Outcome::Failed { step, reason } => {
                assert_eq!(*step, FailedStep::Transcribe);
                assert!(reason.contains("invalid data"));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(!temp.path().join("b.en.srt").exists());
        assert!(!temp.path().join("b.nl.srt").exists());
        assert!(temp.path().join("c.nl.srt").exists());
        assert_eq!(h.translate_calls.load(Ordering::SeqCst), 2);
        assert!(report.should_fail(ExitPolicy::AnyFailure));
        assert!(!report.should_fail(ExitPolicy::AllFailed));
    }

    #[tokio::test]
    async fn test_failed_translation_resumes_from_source_next_run() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("show.mkv").touch().unwrap();

        let mut transcriber = MockTranscriber::new();
        transcriber
            .expect_transcribe()
            .times(1)
            .returning(|_| Ok(vec![Cue::new(0, 1_000, "Hi")]));
        let mut translator = MockTranslator::new();
        translator
            .expect_translate()
            .times(1)
            .returning(|_, _| Err(SubsweepError::Translation("model crashed".to_string())));

        let report = mocked(transcriber, translator).run(temp.path(), "nl").await.unwrap();
        assert!(matches!(
            report.videos[0].outcome,
            Outcome::Failed { step: FailedStep::Translate, .. }
        ));
        assert!(temp.path().join("show.en.srt").exists());
        assert!(!temp.path().join("show.nl.srt").exists());

        let next = plan(temp.path(), &["mkv".to_string()], "en", "nl").unwrap();
        assert_eq!(next[0].decision, ProcessingDecision::TranslateOnly);
    }

    #[tokio::test]
    async fn test_translation_that_drops_cues_is_rejected() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("show.mkv").touch().unwrap();
        temp.child("show.en.srt").write_str(SOURCE_SRT).unwrap();

        let mut transcriber = MockTranscriber::new();
        transcriber.expect_transcribe().times(0);
        let mut translator = MockTranslator::new();
        translator
            .expect_translate()
            .returning(|cues, _| Ok(vec![cues[0].with_text("Hallo en tot ziens")]));

        let report = mocked(transcriber, translator).run(temp.path(), "nl").await.unwrap();

        assert!(matches!(
            report.videos[0].outcome,
            Outcome::Failed { step: FailedStep::Translate, .. }
        ));
        assert!(!temp.path().join("show.nl.srt").exists());
    }

    #[tokio::test]
    async fn test_interrupted_write_leftover_is_not_mistaken_for_output() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("show.mkv").touch().unwrap();
        temp.child("show.en.srt").write_str(SOURCE_SRT).unwrap();

        // A writer killed before its rename leaves only a hidden temp file behind
        let leftover = tempfile::Builder::new()
            .prefix(".show.nl.srt.")
            .suffix(".tmp")
            .tempfile_in(temp.path())
            .unwrap();
        std::fs::write(leftover.path(), "1\n00:00:01,000 --> 00:00:0").unwrap();
        let (_file, leftover_path) = leftover.keep().unwrap();

        let planned = plan(temp.path(), &["mkv".to_string()], "en", "nl").unwrap();
        assert_eq!(planned.len(), 1);
        assert_eq!(planned[0].decision, ProcessingDecision::TranslateOnly);

        let h = harness(vec![]);
        let report = h.pipeline.run(temp.path(), "nl").await.unwrap();
        assert_eq!(report.succeeded(), 1);
        let target = crate::subtitle::parse_srt(&std::fs::read_to_string(temp.path().join("show.nl.srt")).unwrap()).unwrap();
        assert_eq!(target.len(), 2);
        assert!(leftover_path.exists());
    }

    #[tokio::test]
    async fn test_unparseable_source_fails_at_read() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("show.mkv").touch().unwrap();
        temp.child("show.en.srt").write_str("garbage without timing").unwrap();
        let h = harness(vec![]);

        let report = h.pipeline.run(temp.path(), "nl").await.unwrap();

        assert!(matches!(
            report.videos[0].outcome,
            Outcome::Failed { step: FailedStep::ReadSource, .. }
        ));
        assert_eq!(h.translate_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_write_only_fails_that_video() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("a.mkv").touch().unwrap();
        temp.child("b.mkv").touch().unwrap();
        temp.child("c.mkv").touch().unwrap();
        // A directory squatting on the artifact path makes the final rename fail
        temp.child("a.en.srt").create_dir_all().unwrap();
        temp.child("b.nl.srt").create_dir_all().unwrap();
        let h = harness(vec![]);

        let report = h.pipeline.run(temp.path(), "nl").await.unwrap();

        assert_eq!(report.videos.len(), 3);
        assert!(matches!(
            report.videos[0].outcome,
            Outcome::Failed { step: FailedStep::PersistSource, .. }
        ));
        assert!(matches!(
            report.videos[1].outcome,
            Outcome::Failed { step: FailedStep::PersistTarget, .. }
        ));
        assert_eq!(report.videos[2].outcome, Outcome::Succeeded);

        assert!(!temp.path().join("a.en.srt").is_file());
        assert!(!temp.path().join("a.nl.srt").exists());
        assert!(temp.path().join("b.en.srt").is_file());
        assert!(!temp.path().join("b.nl.srt").is_file());
        assert!(ArtifactState::inspect(&temp.path().join("c.nl.srt")).is_usable());

        let leftovers: Vec<_> = std::fs::read_dir(temp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
        assert_eq!(h.translate_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_source_with_oversized_timestamp_fails_at_read() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("a.mkv").touch().unwrap();
        temp.child("a.en.srt")
            .write_str("1\n9999999999999999999:00:00,000 --> 9999999999999999999:00:01,000\nHi\n")
            .unwrap();
        temp.child("b.mkv").touch().unwrap();
        let h = harness(vec![]);

        let report = h.pipeline.run(temp.path(), "nl").await.unwrap();

        assert!(matches!(
            report.videos[0].outcome,
            Outcome::Failed { step: FailedStep::ReadSource, .. }
        ));
        assert_eq!(report.videos[1].outcome, Outcome::Succeeded);
    }

    #[tokio::test]
    async fn test_every_video_failing_still_completes() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("a.mkv").touch().unwrap();
        temp.child("b.mp4").touch().unwrap();
        let h = harness(vec!["a.mkv", "b.mp4"]);

        let report = h.pipeline.run(temp.path(), "nl").await.unwrap();

        assert_eq!(report.failed(), 2);
        assert!(report.finished_at.is_some());
        assert!(report.should_fail(ExitPolicy::AllFailed));
    }

    #[tokio::test]
    async fn test_missing_root_aborts_run() {
        let temp = assert_fs::TempDir::new().unwrap();
        let h = harness(vec![]);

        let err = h.pipeline.run(&temp.path().join("missing"), "nl").await.unwrap_err();
        assert!(matches!(err, SubsweepError::Discovery(_)));
        assert_eq!(h.transcribe_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unavailable_model_fails_collaborator_check() {
        let mut transcriber = MockTranscriber::new();
        let mut translator = MockTranslator::new();
        transcriber.expect_check_availability().returning(|| Ok(()));
        translator
            .expect_check_availability()
            .returning(|| Err(SubsweepError::Unavailable("model missing".to_string())));

        let err = mocked(transcriber, translator).check_collaborators().await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_check_alignment() {
        let source = vec![Cue::new(0, 1_000, "a"), Cue::new(1_000, 2_000, "b")];
        assert!(check_alignment(&source, vec![Cue::new(0, 1_000, "x"), Cue::new(1_000, 2_000, "y")]).is_ok());
        assert!(check_alignment(&source, vec![Cue::new(0, 1_000, "x")]).is_err());
        assert!(check_alignment(&source, vec![Cue::new(0, 1_000, "x"), Cue::new(1_100, 2_000, "y")]).is_err());
    }

    #[test]
    fn test_state_labels() {
        assert_eq!(
            VideoState::Decided(ProcessingDecision::TranslateOnly).to_string(),
            "decided (translate-only)"
        );
        assert_eq!(VideoState::Failed(FailedStep::PersistTarget).to_string(), "failed at persist-target");
    }
}
