//! Language detection for segments.

use crate::error::{PipelineError, Result};

/// Characters of a segment inspected for detection.
pub const DETECTION_SAMPLE_CHARS: usize = 500;

/// Fewer letters than this is too little to go on.
const MIN_LETTERS: usize = 20;

/// Detects the spoken language of a piece of text.
pub trait LanguageDetector: Send + Sync {
    /// Best-guess language code for `text`.
    ///
    /// `hint` is a sample of the whole document, used when `text` alone is
    /// not conclusive. Fails with `LanguageUndetermined` rather than guessing.
    fn detect(&self, text: &str, hint: Option<&str>) -> Result<String>;

    /// Like [`detect`](Self::detect), but an override wins unconditionally.
    fn resolve(&self, text: &str, hint: Option<&str>, override_code: Option<&str>) -> Result<String> {
        match override_code {
            Some(code) => Ok(code.to_string()),
            None => self.detect(text, hint),
        }
    }
}

/// Trigram-based detector backed by `whatlang`.
#[derive(Debug, Clone, Default)]
pub struct WhatlangDetector;

impl WhatlangDetector {
    pub fn new() -> Self {
        Self
    }

    fn detect_one(&self, text: &str) -> Result<String> {
        let sample: String = text.chars().take(DETECTION_SAMPLE_CHARS).collect();

        let letters = sample.chars().filter(|c| c.is_alphabetic()).count();
        if letters < MIN_LETTERS {
            return Err(PipelineError::LanguageUndetermined(format!(
                "only {} letters of text",
                letters
            )));
        }

        let info = whatlang::detect(&sample).ok_or_else(|| {
            PipelineError::LanguageUndetermined("no language matched".to_string())
        })?;

        if !info.is_reliable() {
            return Err(PipelineError::LanguageUndetermined(format!(
                "low confidence ({:.2}) for {}",
                info.confidence(),
                info.lang().eng_name()
            )));
        }

        speech_code(info.lang().code())
            .map(str::to_string)
            .ok_or_else(|| {
                PipelineError::LanguageUndetermined(format!(
                    "{} has no speech voice",
                    info.lang().eng_name()
                ))
            })
    }
}

impl LanguageDetector for WhatlangDetector {
    fn detect(&self, text: &str, hint: Option<&str>) -> Result<String> {
        match self.detect_one(text) {
            Ok(code) => Ok(code),
            Err(err) => match hint {
                Some(hint) => {
                    log::debug!("segment language unclear ({}), using document sample", err);
                    self.detect_one(hint)
                }
                None => Err(err),
            },
        }
    }
}

/// Map an ISO 639-3 code to the code the speech service expects.
fn speech_code(iso639_3: &str) -> Option<&'static str> {
    let code = match iso639_3 {
        "afr" => "af",
        "ara" => "ar",
        "ben" => "bn",
        "bul" => "bg",
        "cat" => "ca",
        "ces" => "cs",
        "cmn" => "zh-CN",
        "dan" => "da",
        "deu" => "de",
        "ell" => "el",
        "eng" => "en",
        "epo" => "eo",
        "est" => "et",
        "fin" => "fi",
        "fra" => "fr",
        "guj" => "gu",
        "heb" => "iw",
        "hin" => "hi",
        "hrv" => "hr",
        "hun" => "hu",
        "ind" => "id",
        "ita" => "it",
        "jav" => "jw",
        "jpn" => "ja",
        "kan" => "kn",
        "khm" => "km",
        "kor" => "ko",
        "lat" => "la",
        "lav" => "lv",
        "lit" => "lt",
        "mal" => "ml",
        "mar" => "mr",
        "nep" => "ne",
        "nld" => "nl",
        "nob" => "no",
        "pol" => "pl",
        "por" => "pt",
        "ron" => "ro",
        "rus" => "ru",
        "sin" => "si",
        "slk" => "sk",
        "spa" => "es",
        "srp" => "sr",
        "swe" => "sv",
        "tam" => "ta",
        "tel" => "te",
        "tgl" => "tl",
        "tha" => "th",
        "tur" => "tr",
        "ukr" => "uk",
        "urd" => "ur",
        "vie" => "vi",
        _ => return None,
    };
    Some(code)
}
