//! pdf2speech - Convert PDF documents to spoken audio, resuming interrupted batches

mod audio;
mod config;
mod document;
mod error;
mod lang;
mod ledger;
mod orchestrator;
mod pdf;
mod selection;
mod text;
mod tts;

use anyhow::{Context, Result};
use audio::{AudioFormat, FfmpegWriter};
use clap::{Parser, Subcommand};
use config::PdfSpeechConfig;
use document::DocumentIdentity;
use lang::WhatlangDetector;
use orchestrator::{BatchOrchestrator, RunOptions};
use pdf::PdfTextExtractor;
use selection::Selection;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use text::{HeadingSet, Segmenter};
use tts::{GoogleTts, RetryConfig, VoiceOptions};

#[derive(Parser, Debug)]
#[command(name = "pdf2speech")]
#[command(about = "Convert PDF documents to spoken audio", long_about = None)]
#[command(version)]
struct Args {
    /// PDF files to convert; bare names are looked up in the input directory
    pdf_files: Vec<PathBuf>,

    /// Convert every PDF in the input directory
    #[arg(short, long, conflicts_with_all = ["interactive", "pdf_files"])]
    all: bool,

    /// Choose documents from a numbered list of the input directory
    #[arg(short, long, conflicts_with = "pdf_files")]
    interactive: bool,

    /// Output audio format
    #[arg(short, long, value_enum)]
    format: Option<AudioFormat>,

    /// Title tag for the output (default: PDF metadata, then file name)
    #[arg(long)]
    title: Option<String>,

    /// Author tag for the output (default: PDF metadata)
    #[arg(long)]
    author: Option<String>,

    /// Speak in this language instead of detecting it (e.g. en, fr, de)
    #[arg(short, long)]
    language: Option<String>,

    /// Write one audio file per chapter or section heading
    #[arg(long)]
    segment_by_chapter: bool,

    /// Start documents over, ignoring segments completed by earlier runs
    #[arg(long)]
    no_resume: bool,

    /// Directory holding the PDFs (default from config: input_files)
    #[arg(long)]
    input_dir: Option<PathBuf>,

    /// Directory receiving audio files and progress (default from config: output_files)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Maximum characters per segment when splitting by size
    #[arg(long)]
    max_chars: Option<usize>,

    /// Documents to process in parallel
    #[arg(short, long)]
    jobs: Option<usize>,

    /// How documents are identified across runs
    #[arg(long, value_enum)]
    identity: Option<DocumentIdentity>,

    /// Enable debug output
    #[arg(short, long, default_value_t = false)]
    debug: bool,

    /// Subcommands
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Set the language used when detection fails
    SetLanguage {
        /// Language code (e.g. en, de, zh-CN)
        code: String,
    },
    /// Set the default output format
    SetFormat {
        #[arg(value_enum)]
        format: AudioFormat,
    },
    /// Set the default input directory
    SetInputDir { path: PathBuf },
    /// Set the default output directory
    SetOutputDir { path: PathBuf },
    /// Set the default maximum characters per segment
    SetMaxChars { value: usize },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.debug);

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(debug: bool) {
    let level = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .format_target(false)
        .init();
}

async fn run(args: Args) -> Result<ExitCode> {
    if let Some(Commands::Config { action }) = &args.command {
        handle_config_command(action)?;
        return Ok(ExitCode::SUCCESS);
    }

    let config = PdfSpeechConfig::load().context("Failed to load configuration")?;

    let input_dir = args.input_dir.clone().unwrap_or_else(|| config.input_dir.clone());
    let output_dir = args.output_dir.clone().unwrap_or_else(|| config.output_dir.clone());
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let selection = if args.all {
        Selection::All
    } else if args.interactive {
        Selection::Interactive
    } else {
        Selection::Explicit(args.pdf_files.clone())
    };

    let targets = match selection::resolve_targets(&selection, &input_dir) {
        Ok(targets) => targets,
        Err(e) => {
            eprintln!("{}", e);
            if selection == Selection::Explicit(Vec::new()) {
                eprintln!("Pass PDF file names, --all or --interactive. Run 'pdf2speech --help' for usage.");
            }
            return Ok(ExitCode::FAILURE);
        }
    };

    let orchestrator = build_orchestrator(&args, &config, output_dir)?;

    if args.debug {
        eprintln!("Input: {}", input_dir.display());
        eprintln!("Output: {}", orchestrator.options().output_dir.display());
        eprintln!("Targets: {}", targets.len());
        eprintln!("Options: {:?}", orchestrator.options());
    }

    let summary = orchestrator.run(&targets).await;
    println!("{}", summary);

    Ok(if summary.succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Wire the real collaborators together; CLI flags win over the config file.
fn build_orchestrator(
    args: &Args,
    config: &PdfSpeechConfig,
    output_dir: PathBuf,
) -> Result<BatchOrchestrator> {
    let headings = HeadingSet::from_config(&config.heading_patterns, &config.builtin_headings)
        .context("Invalid heading pattern in configuration")?;
    let max_chars = args.max_chars.unwrap_or(config.max_segment_chars);
    let segmenter = Segmenter::new(headings, max_chars, config.lookback_chars);

    let synthesizer = GoogleTts::new(Duration::from_secs(config.request_timeout_secs))
        .context("Failed to set up speech synthesis")?;
    let writer = FfmpegWriter::locate(config.ffmpeg_path.as_deref())?;

    let options = RunOptions {
        output_dir,
        format: args.format.unwrap_or(config.format),
        forced_language: args
            .language
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string),
        default_language: config.default_language.clone(),
        by_structure: args.segment_by_chapter,
        title: args.title.clone(),
        author: args.author.clone(),
        resume: !args.no_resume,
        identity: args.identity.unwrap_or(config.identity),
        jobs: args.jobs.unwrap_or(config.jobs).max(1),
        voice: VoiceOptions::new()
            .with_tld(config.tld.clone())
            .with_slow(config.slow),
        retry: RetryConfig::default().with_max_attempts(config.max_retries),
        show_progress: !args.debug,
    };

    Ok(BatchOrchestrator::new(
        Box::new(PdfTextExtractor::new()),
        segmenter,
        Box::new(WhatlangDetector::new()),
        Box::new(synthesizer),
        Box::new(writer),
        options,
    ))
}

fn handle_config_command(action: &ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = PdfSpeechConfig::load()?;
            println!("Configuration file: {}", PdfSpeechConfig::config_path().display());
            println!();
            print!(
                "{}",
                toml::to_string_pretty(&config).context("Failed to serialize configuration")?
            );
            if config.ffmpeg_path.is_none() {
                println!("# ffmpeg_path = (found on PATH)");
            }
        }
        ConfigAction::SetLanguage { code } => {
            let mut config = PdfSpeechConfig::load()?;
            config.default_language = code.trim().to_string();
            config.save()?;
            println!("Default language set to: {}", config.default_language);
        }
        ConfigAction::SetFormat { format } => {
            let mut config = PdfSpeechConfig::load()?;
            config.format = *format;
            config.save()?;
            println!("Default format set to: {}", config.format);
        }
        ConfigAction::SetInputDir { path } => {
            let mut config = PdfSpeechConfig::load()?;
            config.input_dir = path.clone();
            config.save()?;
            println!("Input directory set to: {}", path.display());
        }
        ConfigAction::SetOutputDir { path } => {
            let mut config = PdfSpeechConfig::load()?;
            config.output_dir = path.clone();
            config.save()?;
            println!("Output directory set to: {}", path.display());
        }
        ConfigAction::SetMaxChars { value } => {
            let mut config = PdfSpeechConfig::load()?;
            config.max_segment_chars = (*value).max(1);
            config.save()?;
            println!("Default maximum segment size set to: {} characters", config.max_segment_chars);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_explicit_files() {
        let args = Args::try_parse_from([
            "pdf2speech",
            "a.pdf",
            "b.pdf",
            "-f",
            "ogg",
            "--segment-by-chapter",
            "--language",
            "fr",
        ])
        .unwrap();
        assert_eq!(args.pdf_files, vec![PathBuf::from("a.pdf"), PathBuf::from("b.pdf")]);
        assert_eq!(args.format, Some(AudioFormat::Ogg));
        assert!(args.segment_by_chapter);
        assert_eq!(args.language.as_deref(), Some("fr"));
        assert!(!args.no_resume);
    }

    #[test]
    fn test_all_conflicts_with_files() {
        assert!(Args::try_parse_from(["pdf2speech", "--all", "a.pdf"]).is_err());
        assert!(Args::try_parse_from(["pdf2speech", "--all", "--interactive"]).is_err());
        let args = Args::try_parse_from(["pdf2speech", "--all", "--no-resume"]).unwrap();
        assert!(args.all);
        assert!(args.no_resume);
    }

    #[test]
    fn test_config_subcommand() {
        let args = Args::try_parse_from(["pdf2speech", "config", "set-format", "wav"]).unwrap();
        match args.command {
            Some(Commands::Config {
                action: ConfigAction::SetFormat { format },
            }) => assert_eq!(format, AudioFormat::Wav),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_flags_override_config() {
        let args = Args::try_parse_from([
            "pdf2speech",
            "--all",
            "--max-chars",
            "1200",
            "--jobs",
            "0",
            "--identity",
            "path",
        ])
        .unwrap();
        let config = PdfSpeechConfig::default();
        let orchestrator = match build_orchestrator(&args, &config, PathBuf::from("out")) {
            Ok(o) => o,
            // No ffmpeg on this machine
            Err(_) => return,
        };
        let options = orchestrator.options();
        assert_eq!(options.jobs, 1);
        assert_eq!(options.identity, DocumentIdentity::Path);
        assert_eq!(options.format, config.format);
        assert!(options.resume);
    }
}
