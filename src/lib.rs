//! germanizer - dub YouTube videos into German
//!
//! Downloads a video, transcribes it with speaker labels, translates each
//! segment, synthesizes a voice per speaker, composes the clips onto a
//! timeline and muxes the dubbed track back into the video.

pub mod cli;
pub mod compose;
pub mod config;
pub mod download;
pub mod error;
pub mod media;
pub mod retry;
pub mod subtitle;
pub mod transcribe;
pub mod translate;
pub mod tts;
pub mod voice;
pub mod workflow;
