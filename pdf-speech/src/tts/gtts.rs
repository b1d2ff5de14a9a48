//! Google Translate text-to-speech over HTTP.

use super::{Synthesizer, VoiceOptions};
use crate::error::{PipelineError, Result};
use crate::text::chunker::split_for_requests;
use async_trait::async_trait;
use std::time::Duration;

/// The endpoint rejects longer requests.
pub const MAX_REQUEST_CHARS: usize = 100;

const USER_AGENT: &str = concat!("pdf-speech/", env!("CARGO_PKG_VERSION"));

/// Speaks through the `translate_tts` endpoint and returns MP3 frames.
#[derive(Debug, Clone)]
pub struct GoogleTts {
    client: reqwest::Client,
}

impl GoogleTts {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| PipelineError::Synthesis(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    async fn request_piece(
        &self,
        piece: &str,
        index: usize,
        total: usize,
        language: &str,
        voice: &VoiceOptions,
    ) -> Result<Vec<u8>> {
        let url = endpoint(&voice.tld);
        let response = self
            .client
            .get(&url)
            .query(&query_params(piece, index, total, language, voice.slow))
            .send()
            .await
            .map_err(|e| PipelineError::Synthesis(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::Synthesis(format!(
                "HTTP {} from {} (language '{}')",
                status.as_u16(),
                url,
                language
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| PipelineError::Synthesis(format!("reading response failed: {}", e)))?;
        if bytes.is_empty() {
            return Err(PipelineError::Synthesis("empty audio response".to_string()));
        }

        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl Synthesizer for GoogleTts {
    async fn synthesize(&self, text: &str, language: &str, voice: &VoiceOptions) -> Result<Vec<u8>> {
        let pieces = split_for_requests(text, MAX_REQUEST_CHARS);
        if pieces.is_empty() {
            return Err(PipelineError::Synthesis("nothing to speak".to_string()));
        }

        log::debug!("Synthesizing {} request(s) in '{}'", pieces.len(), language);

        // MP3 frames concatenate into a playable stream
        let mut audio = Vec::new();
        for (index, piece) in pieces.iter().enumerate() {
            let chunk = self
                .request_piece(piece, index, pieces.len(), language, voice)
                .await?;
            audio.extend_from_slice(&chunk);
        }

        Ok(audio)
    }
}

fn endpoint(tld: &str) -> String {
    format!("https://translate.google.{}/translate_tts", tld)
}

fn query_params(
    piece: &str,
    index: usize,
    total: usize,
    language: &str,
    slow: bool,
) -> Vec<(&'static str, String)> {
    vec![
        ("ie", "UTF-8".to_string()),
        ("client", "tw-ob".to_string()),
        ("tl", language.to_string()),
        ("q", piece.to_string()),
        ("ttsspeed", if slow { "0.3" } else { "1" }.to_string()),
        ("total", total.to_string()),
        ("idx", index.to_string()),
        ("textlen", piece.chars().count().to_string()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_uses_tld() {
        assert_eq!(
            endpoint("co.uk"),
            "https://translate.google.co.uk/translate_tts"
        );
    }

    #[test]
    fn test_query_params() {
        let params = query_params("Bonjour à tous", 1, 3, "fr", true);
        let get = |key: &str| {
            params
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("tl"), Some("fr"));
        assert_eq!(get("q"), Some("Bonjour à tous"));
        assert_eq!(get("ttsspeed"), Some("0.3"));
        assert_eq!(get("idx"), Some("1"));
        assert_eq!(get("total"), Some("3"));
        assert_eq!(get("textlen"), Some("14"));
    }

    #[tokio::test]
    async fn test_blank_text_is_synthesis_error() {
        let tts = GoogleTts::new(Duration::from_secs(1)).unwrap();
        let err = tts
            .synthesize("   \n\n", "en", &VoiceOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Synthesis failed: nothing to speak");
    }
}
