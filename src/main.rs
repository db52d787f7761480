//! germanizer - dub YouTube videos into German
//!
//! Entry point: parses the command line, sets up logging and dispatches to
//! the individual pipeline stages or the full dubbing run.

use anyhow::Result;
use clap::Parser;
use std::path::Path;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use tracing_appender::{non_blocking, rolling};

use germanizer::cli::{Args, Commands};
use germanizer::compose::{ClipEntry, Compositor, CompositorOptions, Timeline};
use germanizer::config::Config;
use germanizer::media::MediaProcessorFactory;
use germanizer::subtitle::write_srt;
use germanizer::transcribe::Transcript;
use germanizer::voice::VoiceProfileRegistry;
use germanizer::workflow::{CancellationFlag, Workflow};

const DEFAULT_CONFIG_FILE: &str = "germanizer.toml";

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // init-config must not depend on an existing configuration
    if let Commands::InitConfig { output, force } = &args.command {
        return init_config(output, *force);
    }

    let mut config = load_config(args.config.as_deref())?;
    setup_logging(args.verbose, &config.paths.log_dir)?;

    match args.command {
        Commands::Dub { url, keep_intermediates } => {
            if keep_intermediates {
                config.paths.keep_intermediates = true;
            }
            let mut workflow = Workflow::new(config).await?;
            install_interrupt_handler(workflow.cancellation_flag());

            let manifest = workflow.dub(&url).await?;
            println!("Dubbed video: {}", manifest.output_video.display());
            println!("Subtitles:    {}", manifest.subtitles.display());
            if !manifest.overlaps.is_empty() {
                println!("Overlapping speech mixed in {} places", manifest.overlaps.len());
            }
        }
        Commands::Download { url } => {
            let workflow = Workflow::new(config).await?;
            let source = workflow.download(&url).await?;
            println!("Video: {}", source.video_path.display());
            println!("Audio: {}", source.audio_path.display());
            println!("Duration: {} ms", source.duration_ms);
        }
        Commands::Transcribe { input, output } => {
            let workflow = Workflow::new(config).await?;
            let transcript = workflow.transcribe(&input).await?;
            transcript.save(&output).await?;
            info!("Transcript with {} segments written to {}", transcript.segments.len(), output.display());
        }
        Commands::Translate { input, output, srt } => {
            let workflow = Workflow::new(config).await?;
            let mut transcript = Transcript::load(&input).await?;
            workflow.translate(&mut transcript.segments).await?;
            transcript.save(&output).await?;
            if let Some(srt_path) = srt {
                write_srt(&transcript.segments, &srt_path).await?;
            }
            info!("Translated transcript written to {}", output.display());
        }
        Commands::Synthesize { input, output_dir } => {
            let mut workflow = Workflow::new(config).await?;
            install_interrupt_handler(workflow.cancellation_flag());

            let transcript = Transcript::load(&input).await?;
            let list_path = workflow.synthesize_clip_list(&transcript.segments, &output_dir).await?;
            println!("Clip list: {}", list_path.display());
        }
        Commands::Compose { clips, duration_ms, output } => {
            let compositor = Compositor::new(CompositorOptions::from(&config.compose));
            let timeline = Timeline::new(ClipEntry::load_all(&clips)?);
            let composition = compositor.compose_timeline(duration_ms, timeline)?;

            let media = MediaProcessorFactory::create_processor(config.media.clone());
            media.export_track(&composition.track, &output).await?;
            println!(
                "Track: {} ({} ms, {} overlaps)",
                output.display(),
                composition.track.duration_ms(),
                composition.overlaps.len()
            );
        }
        Commands::Mux { video, audio, output } => {
            let media = MediaProcessorFactory::create_processor(config.media.clone());
            media.check_availability().await?;
            media.replace_audio(&video, &audio, &output).await?;
            println!("Muxed video: {}", output.display());
        }
        Commands::Voices { speakers, seed } => {
            let mut registry = VoiceProfileRegistry::new(seed.unwrap_or(config.tts.voice_seed));
            for speaker in &speakers {
                registry.profile_for(speaker);
            }

            println!("{:<10} {:<8} {:<10}", "Speaker", "Speed", "Pitch");
            println!("{}", "-".repeat(30));
            for (speaker, profile) in registry.iter() {
                println!("{:<10} {:<8.3} {:<+10.2}", speaker, profile.speed, profile.pitch_semitones);
            }
        }
        Commands::InitConfig { output, force } => init_config(&output, force)?,
    }

    Ok(())
}

/// `--config` if given, else `./germanizer.toml` if present, else defaults
fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(config_path) => Ok(Config::from_file(config_path)?),
        None => {
            if Path::new(DEFAULT_CONFIG_FILE).exists() {
                Ok(Config::from_file(DEFAULT_CONFIG_FILE)?)
            } else {
                Ok(Config::default())
            }
        }
    }
}

fn init_config(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!("{} already exists, use --force to overwrite", output.display());
    }
    Config::default().save_to_file(output)?;
    println!("Default configuration written to {}", output.display());
    Ok(())
}

/// Ctrl-C requests cancellation; the run stops before the next stage or segment
fn install_interrupt_handler(flag: CancellationFlag) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current step");
            flag.cancel();
        }
    });
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool, log_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(log_dir, "germanizer.log");
    let (non_blocking_file, _guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(_guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_target(false)
        .with_file(true)
        .with_line_number(true);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Logging initialized - console: {}, file: {}",
          log_level, log_dir.join("germanizer.log").display());

    Ok(())
}
