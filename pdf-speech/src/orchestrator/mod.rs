//! Batch orchestration: drive each target document through segmentation,
//! language detection, synthesis and artifact writing, recording every
//! finished unit in the progress ledger.
//!
//! Failures are isolated: an unreadable document does not stop the batch and
//! a failed segment does not stop its document. Units already in the ledger
//! are skipped, so rerunning a batch only does the remaining work.

mod summary;

pub use summary::{BatchSummary, DocumentReport, Failure, UnitOutcome};

use crate::audio::{ArtifactRequest, ArtifactWriter, AudioFormat, TrackTags};
use crate::document::{Document, DocumentIdentity, TextExtractor};
use crate::error::{PipelineError, Result};
use crate::lang::LanguageDetector;
use crate::ledger::{ProgressLedger, ProgressRecord};
use crate::text::{prepare_for_speech, Segment, Segmenter};
use crate::tts::{RetryConfig, Synthesizer, VoiceOptions};
use futures_util::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use sha2::{Digest, Sha256};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Settings for one batch run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub output_dir: PathBuf,
    pub format: AudioFormat,
    /// Skip language detection and speak everything in this language
    pub forced_language: Option<String>,
    /// Used when detection is inconclusive
    pub default_language: String,
    pub by_structure: bool,
    /// Overrides the title read from the document
    pub title: Option<String>,
    /// Overrides the author read from the document
    pub author: Option<String>,
    /// When false, each document's ledger records are dropped before it runs
    pub resume: bool,
    pub identity: DocumentIdentity,
    /// Documents processed concurrently
    pub jobs: usize,
    pub voice: VoiceOptions,
    pub retry: RetryConfig,
    pub show_progress: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output_files"),
            format: AudioFormat::default(),
            forced_language: None,
            default_language: "en".to_string(),
            by_structure: false,
            title: None,
            author: None,
            resume: true,
            identity: DocumentIdentity::default(),
            jobs: 1,
            voice: VoiceOptions::default(),
            retry: RetryConfig::default(),
            show_progress: false,
        }
    }
}

/// Runs batches of documents against a set of collaborators.
pub struct BatchOrchestrator {
    extractor: Box<dyn TextExtractor>,
    segmenter: Segmenter,
    detector: Box<dyn LanguageDetector>,
    synthesizer: Box<dyn Synthesizer>,
    writer: Box<dyn ArtifactWriter>,
    options: RunOptions,
}

/// State shared by every document of one run.
struct RunContext {
    ledger: Arc<Mutex<ProgressLedger>>,
    progress: ProgressBar,
}

impl RunContext {
    /// Run a ledger update on the blocking pool; appends and rewrites sync
    /// the file before returning.
    async fn update_ledger<T, F>(&self, update: F) -> Result<T>
    where
        F: FnOnce(&mut ProgressLedger) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let ledger = Arc::clone(&self.ledger);
        tokio::task::spawn_blocking(move || update(&mut *ledger.blocking_lock()))
            .await
            .map_err(|e| PipelineError::LedgerWrite(io::Error::other(e)))?
    }
}

impl BatchOrchestrator {
    pub fn new(
        extractor: Box<dyn TextExtractor>,
        segmenter: Segmenter,
        detector: Box<dyn LanguageDetector>,
        synthesizer: Box<dyn Synthesizer>,
        writer: Box<dyn ArtifactWriter>,
        options: RunOptions,
    ) -> Self {
        Self {
            extractor,
            segmenter,
            detector,
            synthesizer,
            writer,
            options,
        }
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Process every target and report what happened to each.
    ///
    /// The ledger is loaded from the output directory at the start and every
    /// completed unit is flushed to it before the next one starts.
    pub async fn run(&self, targets: &[PathBuf]) -> BatchSummary {
        if let Err(e) = tokio::fs::create_dir_all(&self.options.output_dir).await {
            log::warn!(
                "Could not create output directory {}: {}",
                self.options.output_dir.display(),
                e
            );
        }

        let ledger = ProgressLedger::load(ProgressLedger::path_in(&self.options.output_dir));
        log::debug!(
            "Ledger {} holds {} completed unit(s)",
            ledger.path().display(),
            ledger.len()
        );

        let ctx = RunContext {
            ledger: Arc::new(Mutex::new(ledger)),
            progress: self.progress_bar(),
        };

        let documents: Vec<DocumentReport> = stream::iter(targets)
            .map(|path| self.process_document(path, &ctx))
            .buffered(self.options.jobs.max(1))
            .collect()
            .await;

        ctx.progress.finish_and_clear();

        BatchSummary { documents }
    }

    fn progress_bar(&self) -> ProgressBar {
        if !self.options.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} segments ({eta}) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb
    }

    async fn process_document(&self, path: &Path, ctx: &RunContext) -> DocumentReport {
        let mut report = DocumentReport::new(path);

        let document = match self.load_document(path, ctx).await {
            Ok(document) => document,
            Err(err) => {
                log::warn!("{}", err);
                report.fail_document(&err);
                return report;
            }
        };
        report.document_id = Some(document.id.clone());

        let title = self.options.title.clone().unwrap_or_else(|| document.title());
        let author = self.options.author.clone().unwrap_or_else(|| document.author());
        report.title = Some(title.clone());

        let segments = self
            .segmenter
            .segment(&document.id, &document.text, self.options.by_structure);
        if segments.is_empty() {
            let err = PipelineError::EmptyDocument {
                path: path.to_path_buf(),
            };
            log::warn!("{}, skipping", err);
            report.fail_document(&err);
            return report;
        }

        log::info!(
            "{}: \"{}\" by {}, {} segment(s)",
            path.display(),
            title,
            author,
            segments.len()
        );
        ctx.progress.inc_length(segments.len() as u64);

        let total = segments.len();
        for segment in segments {
            let ordinal = segment.ordinal;
            let label = segment.label.clone();
            ctx.progress.set_message(format!("{} [{}]", document.stem(), label));

            let outcome = self
                .process_unit(&document, segment, total, &title, &author, ctx)
                .await;
            if let UnitOutcome::Failed(failure) = &outcome {
                log::warn!(
                    "{}: segment {} ({}) failed: {}",
                    path.display(),
                    ordinal + 1,
                    label,
                    failure.message
                );
            }
            report.record(ordinal, &label, outcome);
            ctx.progress.inc(1);
        }

        log::info!(
            "{}: {} completed, {} skipped, {} failed",
            path.display(),
            report.completed,
            report.skipped,
            report.failed()
        );
        report
    }

    /// Identify and extract a document; a rerun from scratch also clears its
    /// ledger records here.
    async fn load_document(&self, path: &Path, ctx: &RunContext) -> Result<Document> {
        let identity = self.options.identity;
        let owned = path.to_path_buf();
        let id = tokio::task::spawn_blocking(move || identity.identify(&owned))
            .await
            .map_err(|e| PipelineError::unreadable(path, e))??;

        if !self.options.resume {
            let doc_id = id.clone();
            let removed = ctx
                .update_ledger(move |ledger| ledger.forget_document(&doc_id))
                .await?;
            if removed > 0 {
                log::info!(
                    "{}: starting over, forgot {} completed segment(s)",
                    path.display(),
                    removed
                );
            }
        }

        let extracted = self.extractor.extract(path).await?;
        Ok(Document::new(id, path, extracted))
    }

    /// One unit: PENDING, then skipped if already complete, otherwise
    /// synthesized and ending COMPLETE or FAILED.
    async fn process_unit(
        &self,
        document: &Document,
        segment: Segment,
        total: usize,
        title: &str,
        author: &str,
        ctx: &RunContext,
    ) -> UnitOutcome {
        if ctx
            .ledger
            .lock()
            .await
            .is_complete(&document.id, segment.ordinal)
        {
            log::debug!(
                "{}: segment {} already complete",
                document.path.display(),
                segment.ordinal + 1
            );
            return UnitOutcome::Skipped;
        }

        match self.synthesize_unit(document, segment, total, title, author, ctx).await {
            Ok(artifact) => UnitOutcome::Completed(artifact),
            Err(err) => UnitOutcome::Failed(Failure::from(&err)),
        }
    }

    async fn synthesize_unit(
        &self,
        document: &Document,
        segment: Segment,
        total: usize,
        title: &str,
        author: &str,
        ctx: &RunContext,
    ) -> Result<PathBuf> {
        let speech = prepare_for_speech(&segment.text);
        if speech.trim().is_empty() {
            return Err(PipelineError::Synthesis("nothing to speak".to_string()));
        }

        let language = self.language_for(document, &segment, &speech);
        let segment = segment.with_language(language.as_str());

        let audio = self
            .synthesizer
            .synthesize_with_retry(&speech, &language, &self.options.voice, &self.options.retry)
            .await?;

        let destination = self.options.output_dir.join(artifact_file_name(
            &document.stem(),
            &document.id,
            segment.ordinal,
            total,
            self.options.format,
        ));
        let tags = TrackTags {
            title: if total == 1 {
                title.to_string()
            } else {
                segment.label.clone()
            },
            artist: author.to_string(),
            album: title.to_string(),
            track: segment.ordinal + 1,
            total_tracks: total,
        };

        let artifact = self
            .writer
            .write(ArtifactRequest {
                audio,
                destination,
                format: self.options.format,
                tags,
            })
            .await?;

        let record = ProgressRecord::new(
            document.id.clone(),
            segment.ordinal,
            segment.label.clone(),
            artifact.clone(),
        );
        ctx.update_ledger(move |ledger| ledger.append(record)).await?;

        log::info!(
            "{}: segment {}/{} ({}, {}) -> {}",
            document.path.display(),
            segment.ordinal + 1,
            total,
            segment.label,
            language,
            artifact.display()
        );
        Ok(artifact)
    }

    /// Forced language, else detected, else the configured default.
    fn language_for(&self, document: &Document, segment: &Segment, speech: &str) -> String {
        match self.detector.resolve(
            speech,
            Some(&document.text),
            self.options.forced_language.as_deref(),
        ) {
            Ok(language) => language,
            Err(err) => {
                log::warn!(
                    "{}: segment {} ({}): {}; using default language '{}'",
                    document.path.display(),
                    segment.ordinal + 1,
                    segment.label,
                    err,
                    self.options.default_language
                );
                self.options.default_language.clone()
            }
        }
    }
}

/// `<stem>_<tag>.<ext>` for a single-segment document, otherwise
/// `<stem>_<tag>_segment_<n>.<ext>` with `n` counting from 1.
///
/// The tag is derived from the document id, so documents sharing a file
/// name never write to the same artifact.
pub fn artifact_file_name(
    stem: &str,
    document_id: &str,
    ordinal: usize,
    total: usize,
    format: AudioFormat,
) -> String {
    let tag = document_tag(document_id);
    if total <= 1 {
        format!("{}_{}.{}", stem, tag, format.extension())
    } else {
        format!("{}_{}_segment_{}.{}", stem, tag, ordinal + 1, format.extension())
    }
}

/// First 8 hex characters of the SHA-256 of a document id.
fn document_tag(document_id: &str) -> String {
    let digest = Sha256::digest(document_id.as_bytes());
    digest[..4].iter().map(|b| format!("{:02x}", b)).collect()
}
