//! Subsweep - idempotent batch subtitling
//!
//! Entry point: parses arguments, loads configuration, sets up logging and
//! dispatches to the batch pipeline or one of the single-step commands.

use anyhow::Result;
use clap::Parser;
use std::path::Path;
use std::process::ExitCode;
use tracing::{info, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use subsweep::cli::{Args, Commands};
use subsweep::config::Config;
use subsweep::error::SubsweepError;
use subsweep::pipeline::{plan, Pipeline};
use subsweep::subtitle::{read_srt, write_srt_atomic, SUBTITLE_EXTENSION};
use subsweep::transcribe::TranscriberFactory;
use subsweep::translate::TranslatorFactory;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref())?;

    // Keep the guard alive so buffered file logs are flushed on exit
    let _guard = setup_logging(args.verbose, &config.logging.log_dir)?;
    info!("Starting subsweep");

    match args.command {
        Commands::Run { root, target_lang, exit_policy, report: report_path } => {
            config.apply_overrides(root, target_lang, exit_policy);
            config.validate()?;
            let pipeline_config = &config.pipeline;

            let transcriber = TranscriberFactory::create_transcriber(
                config.transcriber.clone(),
                &pipeline_config.source_language,
            )
            .await;
            let translator = TranslatorFactory::create_translator(
                config.translate.clone(),
                &pipeline_config.source_language,
            )?;
            let pipeline = Pipeline::new(transcriber, translator, pipeline_config);

            info!("Checking transcription and translation models...");
            pipeline.check_collaborators().await?;

            let report = pipeline
                .run(&pipeline_config.root_path, &pipeline_config.target_language)
                .await?;
            report.log_summary();

            if let Some(path) = report_path {
                report.save_to_file(&path)?;
                info!("Report written to {}", path.display());
            }

            if report.should_fail(pipeline_config.exit_policy) {
                info!("Exiting with failure status ({:?})", pipeline_config.exit_policy);
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Plan { root, target_lang } => {
            config.apply_overrides(root, target_lang, None);
            config.validate()?;
            let pipeline_config = &config.pipeline;

            let planned = plan(
                &pipeline_config.root_path,
                &pipeline_config.video_extensions,
                &pipeline_config.source_language,
                &pipeline_config.target_language,
            )?;

            let root = std::fs::canonicalize(&pipeline_config.root_path)
                .unwrap_or_else(|_| pipeline_config.root_path.clone());

            println!("\n{:<26} {}", "Decision", "Video");
            println!("{}", "-".repeat(80));
            for entry in &planned {
                let shown = pathdiff::diff_paths(&entry.video.path, &root)
                    .unwrap_or_else(|| entry.video.path.clone());
                println!("{:<26} {}", entry.decision.to_string(), shown.display());
            }
            println!("\n{} videos", planned.len());
        }
        Commands::Transcribe { input, output } => {
            config.validate()?;
            if !input.is_file() {
                return Err(SubsweepError::FileNotFound(input.display().to_string()).into());
            }

            let transcriber = TranscriberFactory::create_transcriber(
                config.transcriber.clone(),
                &config.pipeline.source_language,
            )
            .await;
            transcriber.check_availability().await?;

            let cues = transcriber.transcribe(&input).await?;
            write_srt_atomic(&output, &cues)?;
        }
        Commands::Translate { input, output, target_lang } => {
            config.apply_overrides(None, target_lang, None);
            config.validate()?;
            ensure_subtitle_file(&input)?;

            let translator = TranslatorFactory::create_translator(
                config.translate.clone(),
                &config.pipeline.source_language,
            )?;
            translator.check_availability().await?;

            let cues = read_srt(&input).await?;
            let translated = translator
                .translate(&cues, &config.pipeline.target_language)
                .await?;
            write_srt_atomic(&output, &translated)?;
        }
        Commands::InitConfig { output } => {
            Config::default().save_to_file(&output)?;
            println!("Default configuration written to {}", output.display());
        }
    }

    info!("subsweep completed");
    Ok(ExitCode::SUCCESS)
}

/// Setup logging to both console and a daily rotated file
fn setup_logging(verbose: bool, log_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = rolling::daily(log_dir, "subsweep.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer().with_target(false);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Logging initialized - console: {}, file: {}",
        log_level,
        log_dir.join("subsweep.log").display()
    );

    Ok(guard)
}

fn ensure_subtitle_file(path: &Path) -> Result<(), SubsweepError> {
    if !path.is_file() {
        return Err(SubsweepError::FileNotFound(path.display().to_string()));
    }

    let is_srt = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case(SUBTITLE_EXTENSION))
        .unwrap_or(false);
    if !is_srt {
        return Err(SubsweepError::UnsupportedFormat(format!(
            "{} is not an .{} file",
            path.display(),
            SUBTITLE_EXTENSION
        )));
    }

    Ok(())
}
