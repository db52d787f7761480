use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Dub a YouTube video end to end
    Dub {
        /// YouTube video URL
        url: String,

        /// Keep downloaded and intermediate files
        #[arg(long)]
        keep_intermediates: bool,
    },

    /// Download a video and extract its audio
    Download {
        /// YouTube video URL
        url: String,
    },

    /// Transcribe audio into speaker-labelled segments
    Transcribe {
        /// Input audio file
        #[arg(short, long)]
        input: PathBuf,

        /// Output transcript file (JSON)
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Translate the segments of a transcript
    Translate {
        /// Input transcript file (JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Output transcript file (JSON)
        #[arg(short, long)]
        output: PathBuf,

        /// Also write an SRT subtitle file
        #[arg(long)]
        srt: Option<PathBuf>,
    },

    /// Synthesize one clip per transcript segment
    Synthesize {
        /// Input transcript file (JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Directory for the clips and the clip list
        #[arg(short, long)]
        output_dir: PathBuf,
    },

    /// Compose clips from a clip list into one track
    Compose {
        /// Clip list (JSON array of {path, start_offset_ms, end_offset_ms, speaker_id})
        #[arg(short, long)]
        clips: PathBuf,

        /// Length of the silent base track in milliseconds
        #[arg(short, long, default_value = "0")]
        duration_ms: u64,

        /// Output audio file (.wav, or any extension ffmpeg can encode)
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Replace the audio of a video, copying the video stream
    Mux {
        /// Input video file
        #[arg(short, long)]
        video: PathBuf,

        /// Replacement audio file
        #[arg(short, long)]
        audio: PathBuf,

        /// Output video file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Show the voice profile assigned to each speaker
    Voices {
        /// Speakers to show beyond the built-in A to E
        speakers: Vec<String>,

        /// Seed for speakers outside the built-in set
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Write the default configuration to a file
    InitConfig {
        /// Output path
        #[arg(short, long, default_value = "germanizer.toml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
