//! Audio artifact output: formats and the ffmpeg-backed writer.

pub mod writer;

pub use writer::{ArtifactRequest, ArtifactWriter, FfmpegWriter, TrackTags};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Selectable output encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Mp3,
    Wav,
    Ogg,
}

impl AudioFormat {
    /// File extension, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
            Self::Ogg => "ogg",
        }
    }

    /// ffmpeg codec arguments producing this format from an MP3 stream.
    pub fn codec_args(self) -> &'static [&'static str] {
        match self {
            Self::Mp3 => &["-c:a", "copy", "-f", "mp3"],
            Self::Wav => &["-c:a", "pcm_s16le", "-f", "wav"],
            Self::Ogg => &["-c:a", "libvorbis", "-q:a", "5", "-f", "ogg"],
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::ValueEnum;

    #[test]
    fn test_extensions() {
        assert_eq!(AudioFormat::Mp3.extension(), "mp3");
        assert_eq!(AudioFormat::Wav.extension(), "wav");
        assert_eq!(AudioFormat::Ogg.extension(), "ogg");
        assert_eq!(AudioFormat::default(), AudioFormat::Mp3);
    }

    #[test]
    fn test_parse_from_cli_and_toml() {
        assert_eq!(AudioFormat::from_str("ogg", true).unwrap(), AudioFormat::Ogg);
        assert_eq!(AudioFormat::from_str("WAV", true).unwrap(), AudioFormat::Wav);

        #[derive(Deserialize)]
        struct Wrapper {
            format: AudioFormat,
        }
        let parsed: Wrapper = toml::from_str("format = \"wav\"").unwrap();
        assert_eq!(parsed.format, AudioFormat::Wav);
    }

    #[test]
    fn test_mp3_is_stream_copy() {
        assert!(AudioFormat::Mp3.codec_args().contains(&"copy"));
        assert!(AudioFormat::Ogg.codec_args().contains(&"libvorbis"));
    }
}
