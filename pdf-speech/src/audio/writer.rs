//! Write synthesized audio to its final artifact using FFmpeg.

use super::AudioFormat;
use crate::error::{PipelineError, Result};
use anyhow::Context;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Tags embedded in each artifact.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackTags {
    /// Segment label, or the document title for single-segment documents
    pub title: String,
    /// Document author
    pub artist: String,
    /// Document title
    pub album: String,
    /// 1-based track number
    pub track: usize,
    pub total_tracks: usize,
}

/// One artifact to write.
#[derive(Debug, Clone)]
pub struct ArtifactRequest {
    /// MP3 stream from the synthesizer
    pub audio: Vec<u8>,
    /// Final path of the artifact
    pub destination: PathBuf,
    pub format: AudioFormat,
    pub tags: TrackTags,
}

/// Turns synthesized audio into a file on disk.
#[async_trait]
pub trait ArtifactWriter: Send + Sync {
    /// Write the artifact and return its path once it is complete and
    /// non-empty. Nothing is left at the destination on failure.
    async fn write(&self, request: ArtifactRequest) -> Result<PathBuf>;
}

/// Converts with an `ffmpeg` executable.
#[derive(Debug, Clone)]
pub struct FfmpegWriter {
    ffmpeg: PathBuf,
}

impl FfmpegWriter {
    pub fn new(ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
        }
    }

    /// Use the configured executable, or find `ffmpeg` on PATH.
    pub fn locate(configured: Option<&Path>) -> anyhow::Result<Self> {
        let ffmpeg = match configured {
            Some(path) => path.to_path_buf(),
            None => which::which("ffmpeg")
                .context("ffmpeg not found on PATH; install it or set ffmpeg_path in the config")?,
        };
        log::debug!("Using ffmpeg at {}", ffmpeg.display());
        Ok(Self::new(ffmpeg))
    }

    pub fn executable(&self) -> &Path {
        &self.ffmpeg
    }

    async fn convert(&self, request: &ArtifactRequest, part: &Path) -> std::result::Result<(), String> {
        let dir = parent_dir(&request.destination);
        let input = tempfile::Builder::new()
            .prefix(".pdf-speech-")
            .suffix(".mp3")
            .tempfile_in(&dir)
            .map_err(|e| format!("cannot create temp input: {}", e))?;
        tokio::fs::write(input.path(), &request.audio)
            .await
            .map_err(|e| format!("cannot write temp input: {}", e))?;

        let mut cmd = Command::new(&self.ffmpeg);
        cmd.args(["-y", "-hide_banner", "-loglevel", "error", "-i"])
            .arg(input.path())
            .args(["-map_metadata", "-1"])
            .args(tag_args(&request.tags))
            .args(request.format.codec_args())
            .arg(part);
        log::debug!("Running {:?}", cmd.as_std());

        let output = cmd
            .output()
            .await
            .map_err(|e| format!("failed to run {}: {}", self.ffmpeg.display(), e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!("ffmpeg failed: {}", stderr.trim()));
        }

        let size = tokio::fs::metadata(part)
            .await
            .map(|m| m.len())
            .map_err(|e| format!("ffmpeg produced no output: {}", e))?;
        if size == 0 {
            return Err("ffmpeg produced an empty file".to_string());
        }

        Ok(())
    }
}

#[async_trait]
impl ArtifactWriter for FfmpegWriter {
    async fn write(&self, request: ArtifactRequest) -> Result<PathBuf> {
        let fail = |reason: String| PipelineError::ArtifactWrite {
            path: request.destination.clone(),
            reason,
        };

        if request.audio.is_empty() {
            return Err(fail("synthesizer returned no audio".to_string()));
        }

        let part = part_file(&request.destination).map_err(|e| fail(e.to_string()))?;
        self.convert(&request, part.path()).await.map_err(fail)?;

        part.persist(&request.destination)
            .map_err(|e| fail(e.error.to_string()))?;

        Ok(request.destination.clone())
    }
}

/// Unique in-progress file next to the destination, `.name.XXXXXX.part`.
/// It is removed when dropped unless persisted, so concurrent writers never
/// share one.
pub fn part_file(destination: &Path) -> std::io::Result<tempfile::NamedTempFile> {
    let name = destination
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    tempfile::Builder::new()
        .prefix(&format!(".{}.", name))
        .suffix(".part")
        .tempfile_in(parent_dir(destination))
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// `-metadata key=value` pairs; empty values are left out.
fn tag_args(tags: &TrackTags) -> Vec<String> {
    let mut args = Vec::new();
    let mut push = |key: &str, value: &str| {
        let value = clean_tag(value);
        if !value.is_empty() {
            args.push("-metadata".to_string());
            args.push(format!("{}={}", key, value));
        }
    };

    push("title", &tags.title);
    push("artist", &tags.artist);
    push("album", &tags.album);
    if tags.track > 0 {
        let track = if tags.total_tracks > 0 {
            format!("{}/{}", tags.track, tags.total_tracks)
        } else {
            tags.track.to_string()
        };
        push("track", &track);
    }

    args
}

/// Tags are single-line.
fn clean_tag(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
