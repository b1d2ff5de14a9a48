//! pdf-speech configuration management.

use crate::audio::AudioFormat;
use crate::document::DocumentIdentity;
use crate::text::BuiltinHeading;
use crate::text::segmenter::{DEFAULT_LOOKBACK_CHARS, DEFAULT_MAX_CHARS};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_LANGUAGE: &str = "en";
const DEFAULT_JOBS: usize = 2;
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdfSpeechConfig {
    /// Directory scanned by --all and used to resolve bare file names
    #[serde(default = "default_input_dir")]
    pub input_dir: PathBuf,

    /// Directory receiving audio artifacts and the progress ledger
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default)]
    pub format: AudioFormat,

    /// Language used when detection is inconclusive
    #[serde(default = "default_language")]
    pub default_language: String,

    /// Character budget of a size-bounded segment
    #[serde(default = "default_max_segment_chars")]
    pub max_segment_chars: usize,

    /// How far back from the budget to look for a paragraph or sentence end
    #[serde(default = "default_lookback_chars")]
    pub lookback_chars: usize,

    /// Extra heading regexes, tried before the built-in matchers
    #[serde(default)]
    pub heading_patterns: Vec<String>,

    /// Built-in heading matchers, in priority order
    #[serde(default = "BuiltinHeading::defaults")]
    pub builtin_headings: Vec<BuiltinHeading>,

    #[serde(default)]
    pub identity: DocumentIdentity,

    /// Documents processed in parallel
    #[serde(default = "default_jobs")]
    pub jobs: usize,

    /// Attempts per synthesis request before the segment fails
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Google TTS host suffix (com, co.uk, com.au, ...)
    #[serde(default = "default_tld")]
    pub tld: String,

    #[serde(default)]
    pub slow: bool,

    /// ffmpeg executable; looked up on PATH when unset
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_input_dir() -> PathBuf {
    PathBuf::from("input_files")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output_files")
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

fn default_max_segment_chars() -> usize {
    DEFAULT_MAX_CHARS
}

fn default_lookback_chars() -> usize {
    DEFAULT_LOOKBACK_CHARS
}

fn default_jobs() -> usize {
    DEFAULT_JOBS
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_tld() -> String {
    "com".to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl Default for PdfSpeechConfig {
    fn default() -> Self {
        Self {
            input_dir: default_input_dir(),
            output_dir: default_output_dir(),
            format: AudioFormat::default(),
            default_language: default_language(),
            max_segment_chars: default_max_segment_chars(),
            lookback_chars: default_lookback_chars(),
            heading_patterns: Vec::new(),
            builtin_headings: BuiltinHeading::defaults(),
            identity: DocumentIdentity::default(),
            jobs: default_jobs(),
            max_retries: default_max_retries(),
            tld: default_tld(),
            slow: false,
            ffmpeg_path: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl PdfSpeechConfig {
    /// Get the config file path: <config dir>/cli-programs/pdf-speech.toml
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cli-programs")
            .join("pdf-speech.toml")
    }

    /// Load config from the default location, returning defaults if the file
    /// doesn't exist.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Save config to the default location.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = PdfSpeechConfig::default();
        assert_eq!(config.input_dir, PathBuf::from("input_files"));
        assert_eq!(config.output_dir, PathBuf::from("output_files"));
        assert_eq!(config.format, AudioFormat::Mp3);
        assert_eq!(config.default_language, "en");
        assert_eq!(config.max_segment_chars, 5000);
        assert_eq!(config.identity, DocumentIdentity::ContentHash);
        assert!(config.ffmpeg_path.is_none());
    }

    #[test]
    fn test_config_path() {
        let path = PdfSpeechConfig::config_path();
        assert!(path.ends_with("cli-programs/pdf-speech.toml"));
    }

    #[test]
    fn test_parse_config() {
        let toml_str = r#"
input_dir = "/data/pdfs"
format = "ogg"
default_language = "de"
max_segment_chars = 3000
heading_patterns = ['^Kapitel\s+\d+']
builtin_headings = ["chapter", "all-caps"]
identity = "path"
slow = true
"#;
        let config: PdfSpeechConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.input_dir, PathBuf::from("/data/pdfs"));
        assert_eq!(config.format, AudioFormat::Ogg);
        assert_eq!(config.default_language, "de");
        assert_eq!(config.max_segment_chars, 3000);
        assert_eq!(config.heading_patterns, vec![r"^Kapitel\s+\d+"]);
        assert_eq!(
            config.builtin_headings,
            vec![BuiltinHeading::Chapter, BuiltinHeading::AllCaps]
        );
        assert_eq!(config.identity, DocumentIdentity::Path);
        assert!(config.slow);
        // Untouched fields keep their defaults
        assert_eq!(config.output_dir, PathBuf::from("output_files"));
        assert_eq!(config.jobs, 2);
    }

    #[test]
    fn test_parse_empty_config() {
        let config: PdfSpeechConfig = toml::from_str("").unwrap();
        assert_eq!(config.format, AudioFormat::Mp3);
        assert_eq!(config.builtin_headings, BuiltinHeading::defaults());
        assert_eq!(config.tld, "com");
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("pdf-speech.toml");

        let mut config = PdfSpeechConfig::default();
        config.format = AudioFormat::Wav;
        config.ffmpeg_path = Some(PathBuf::from("/usr/local/bin/ffmpeg"));
        config.save_to(&path).unwrap();

        let loaded = PdfSpeechConfig::load_from(&path).unwrap();
        assert_eq!(loaded.format, AudioFormat::Wav);
        assert_eq!(loaded.ffmpeg_path, config.ffmpeg_path);
    }

    #[test]
    fn test_load_missing_is_default() {
        let dir = TempDir::new().unwrap();
        let config = PdfSpeechConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.jobs, 2);
    }

    #[test]
    fn test_invalid_config_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "format = \"flac\"").unwrap();
        assert!(PdfSpeechConfig::load_from(&path).is_err());
    }
}
