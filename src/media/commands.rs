use std::path::Path;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Result, DubError};
use crate::voice::VoiceProfile;

/// Abstract media processing command representation
#[derive(Debug, Clone)]
pub struct MediaCommand {
    pub binary_path: String,
    pub args: Vec<String>,
    pub description: String,
}

impl MediaCommand {
    /// Create a new media processing command
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, description: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            description: description.into(),
        }
    }

    /// Add an argument
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    /// Add input file
    pub fn input<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg("-i").arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Add output file
    pub fn output<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Force overwrite output
    pub fn overwrite(self) -> Self {
        self.arg("-y")
    }

    /// Set video codec
    pub fn video_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:v").arg(codec)
    }

    /// Set audio codec
    pub fn audio_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:a").arg(codec)
    }

    /// Set audio bitrate
    pub fn audio_bitrate<S: Into<String>>(self, bitrate: S) -> Self {
        self.arg("-b:a").arg(bitrate)
    }

    /// Copy video stream
    pub fn copy_video(self) -> Self {
        self.video_codec("copy")
    }

    /// Select a stream from an input, e.g. `0:v:0`
    pub fn map<S: Into<String>>(self, selector: S) -> Self {
        self.arg("-map").arg(selector)
    }

    /// Disable video
    pub fn no_video(self) -> Self {
        self.arg("-vn")
    }

    /// Set audio sample rate
    pub fn audio_sample_rate(self, rate: u32) -> Self {
        self.arg("-ar").arg(rate.to_string())
    }

    /// Set audio channels
    pub fn audio_channels(self, channels: u32) -> Self {
        self.arg("-ac").arg(channels.to_string())
    }

    /// Add audio filter
    pub fn audio_filter<S: Into<String>>(self, filter: S) -> Self {
        self.arg("-af").arg(filter)
    }

    /// Execute the command, returning stdout on success
    pub async fn execute(&self) -> Result<String> {
        debug!("Executing media processing command: {} {:?}", self.binary_path, self.args);
        debug!("Description: {}", self.description);

        let output = Command::new(&self.binary_path)
            .args(&self.args)
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => DubError::FileNotFound(self.binary_path.clone()),
                _ => DubError::Media(format!("Failed to execute {}: {}", self.binary_path, e)),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DubError::Media(format!(
                "{} failed ({}): {}",
                self.description,
                output.status,
                stderr
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Builder for common media processing operations
pub struct MediaCommandBuilder {
    binary_path: String,
}

impl MediaCommandBuilder {
    /// Create a new command builder
    pub fn new<S: Into<String>>(binary_path: S) -> Self {
        Self {
            binary_path: binary_path.into(),
        }
    }

    /// Build the mux command: video stream copied from the first input,
    /// audio stream taken from the second input and re-encoded
    pub fn replace_audio<P: AsRef<Path>>(
        &self,
        video_path: P,
        audio_path: P,
        output_path: P,
        audio_codec: &str,
        audio_bitrate: &str,
        additional_options: &[String],
    ) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Audio replacement")
            .overwrite()
            .input(&video_path)
            .input(&audio_path)
            .copy_video()
            .audio_codec(audio_codec)
            .audio_bitrate(audio_bitrate)
            .map("0:v:0")
            .map("1:a:0")
            .args(additional_options.iter().cloned())
            .output(output_path)
    }

    /// Build audio encoding command for exporting a composite track
    pub fn encode_audio<P: AsRef<Path>>(
        &self,
        input_path: P,
        output_path: P,
        codec: &str,
        bitrate: &str,
    ) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Audio encoding")
            .overwrite()
            .input(input_path)
            .no_video()
            .audio_codec(codec)
            .audio_bitrate(bitrate)
            .output(output_path)
    }

    /// Build audio extraction command
    pub fn extract_audio<P: AsRef<Path>>(
        &self,
        video_path: P,
        audio_path: P,
    ) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Audio extraction")
            .input(video_path)
            .no_video()
            .audio_codec("pcm_s16le")
            .audio_sample_rate(44100)
            .audio_channels(1)
            .overwrite()
            .output(audio_path)
    }

    /// Build the speed/pitch adjustment for a synthesized clip.
    ///
    /// Pitch is shifted by resampling (`asetrate`), which also changes tempo,
    /// so `atempo` compensates before applying the requested speed.
    pub fn apply_voice_profile<P: AsRef<Path>>(
        &self,
        input_path: P,
        output_path: P,
        profile: &VoiceProfile,
        sample_rate: u32,
    ) -> MediaCommand {
        let pitch_ratio = 2f64.powf(profile.pitch_semitones as f64 / 12.0);
        let shifted_rate = (sample_rate as f64 * pitch_ratio).round() as u32;
        let tempo = profile.speed as f64 / pitch_ratio;

        MediaCommand::new(&self.binary_path, "Voice profile")
            .overwrite()
            .input(input_path)
            .audio_filter(format!(
                "asetrate={},aresample={},{}",
                shifted_rate,
                sample_rate,
                atempo_chain(tempo)
            ))
            .audio_codec("pcm_s16le")
            .output(output_path)
    }

    /// Build a command printing the SHA-256 of the first video stream
    pub fn video_stream_hash<P: AsRef<Path>>(&self, video_path: P) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Video stream hash")
            .input(video_path)
            .map("0:v:0")
            .arg("-c").arg("copy")
            .arg("-f").arg("hash")
            .arg("-hash").arg("sha256")
            .arg("-")
    }

    /// Build version check command
    pub fn version_check(&self) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Version check")
            .arg("-version")
    }
}

/// Build a probe command printing the container duration in seconds
pub fn probe_duration(probe_binary: &str, media_path: &Path) -> MediaCommand {
    MediaCommand::new(probe_binary, "Duration probe")
        .arg("-v").arg("error")
        .arg("-show_entries").arg("format=duration")
        .arg("-of").arg("default=noprint_wrappers=1:nokey=1")
        .output(media_path)
}

/// `atempo` accepts 0.5..=2.0 per instance, so larger changes are chained
fn atempo_chain(mut tempo: f64) -> String {
    let mut filters = Vec::new();
    while tempo > 2.0 {
        filters.push("atempo=2.0".to_string());
        tempo /= 2.0;
    }
    while tempo < 0.5 {
        filters.push("atempo=0.5".to_string());
        tempo /= 0.5;
    }
    filters.push(format!("atempo={:.6}", tempo));
    filters.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_audio_maps_video_from_first_input() {
        let cmd = MediaCommandBuilder::new("ffmpeg").replace_audio(
            Path::new("in.mp4"),
            Path::new("dub.m4a"),
            Path::new("out.mp4"),
            "aac",
            "192k",
            &[],
        );
        assert_eq!(
            cmd.args,
            vec![
                "-y", "-i", "in.mp4", "-i", "dub.m4a", "-c:v", "copy", "-c:a", "aac",
                "-b:a", "192k", "-map", "0:v:0", "-map", "1:a:0", "out.mp4",
            ]
        );
    }

    #[test]
    fn test_extra_mux_options_precede_output() {
        let options = vec!["-shortest".to_string()];
        let cmd = MediaCommandBuilder::new("ffmpeg").replace_audio(
            Path::new("in.mp4"),
            Path::new("dub.wav"),
            Path::new("out.mp4"),
            "aac",
            "128k",
            &options,
        );
        let len = cmd.args.len();
        assert_eq!(cmd.args[len - 2], "-shortest");
        assert_eq!(cmd.args[len - 1], "out.mp4");
    }

    #[test]
    fn test_neutral_voice_profile_filter() {
        let profile = VoiceProfile { speed: 1.0, pitch_semitones: 0.0 };
        let cmd = MediaCommandBuilder::new("ffmpeg").apply_voice_profile(
            Path::new("raw.wav"),
            Path::new("clip.wav"),
            &profile,
            22050,
        );
        assert!(cmd.args.contains(&"asetrate=22050,aresample=22050,atempo=1.000000".to_string()));
    }

    #[test]
    fn test_atempo_chain_splits_extreme_values() {
        assert_eq!(atempo_chain(1.25), "atempo=1.250000");
        assert_eq!(atempo_chain(3.0), "atempo=2.0,atempo=1.500000");
        assert_eq!(atempo_chain(0.4), "atempo=0.5,atempo=0.800000");
    }

    #[tokio::test]
    async fn test_failed_command_reports_stderr() {
        let cmd = MediaCommand::new("sh", "Failing tool")
            .arg("-c")
            .arg("echo 'Invalid data found when processing input' >&2; exit 1");
        let err = cmd.execute().await.unwrap_err();
        assert!(err.to_string().contains("Invalid data found when processing input"));
    }
}
