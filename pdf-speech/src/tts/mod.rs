//! Speech synthesis trait and types.

pub mod gtts;

pub use gtts::GoogleTts;

use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use std::time::Duration;

/// Voice settings passed with every request.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceOptions {
    /// Google host suffix, selects the regional accent (com, co.uk, ...)
    pub tld: String,
    /// Slower speaking rate
    pub slow: bool,
}

impl Default for VoiceOptions {
    fn default() -> Self {
        Self {
            tld: "com".to_string(),
            slow: false,
        }
    }
}

impl VoiceOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tld(mut self, tld: impl Into<String>) -> Self {
        let tld = tld.into();
        let tld = tld.trim().trim_start_matches('.');
        if !tld.is_empty() {
            self.tld = tld.to_string();
        }
        self
    }

    pub fn with_slow(mut self, slow: bool) -> Self {
        self.slow = slow;
        self
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_factor: 2.0,
        }
    }
}

impl RetryConfig {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Retries without waiting.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_factor: 1.0,
        }
    }

    fn next_delay(&self, delay: Duration) -> Duration {
        Duration::from_secs_f32(
            (delay.as_secs_f32() * self.backoff_factor).min(self.max_delay.as_secs_f32()),
        )
    }
}

/// A speech engine: text in, MP3 bytes out.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesize `text` in `language`. Fails with `Synthesis`.
    async fn synthesize(&self, text: &str, language: &str, voice: &VoiceOptions) -> Result<Vec<u8>>;

    /// Synthesize with exponential backoff between attempts.
    async fn synthesize_with_retry(
        &self,
        text: &str,
        language: &str,
        voice: &VoiceOptions,
        retry: &RetryConfig,
    ) -> Result<Vec<u8>> {
        let max_attempts = retry.max_attempts.max(1);
        let mut attempt = 0;
        let mut delay = retry.initial_delay;

        loop {
            attempt += 1;

            match self.synthesize(text, language, voice).await {
                Ok(audio) => return Ok(audio),
                Err(e) => {
                    if attempt >= max_attempts {
                        return Err(PipelineError::Synthesis(format!(
                            "gave up after {} attempt(s): {}",
                            attempt,
                            detail(&e)
                        )));
                    }

                    log::warn!(
                        "Synthesis failed (attempt {}/{}): {}; retrying in {:?}",
                        attempt,
                        max_attempts,
                        e,
                        delay
                    );

                    tokio::time::sleep(delay).await;
                    delay = retry.next_delay(delay);
                }
            }
        }
    }
}

/// Inner message of a synthesis error, without the variant prefix.
fn detail(err: &PipelineError) -> String {
    match err {
        PipelineError::Synthesis(msg) => msg.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails a fixed number of times, then succeeds.
    struct Flaky {
        failures: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Synthesizer for Flaky {
        async fn synthesize(&self, text: &str, _: &str, _: &VoiceOptions) -> Result<Vec<u8>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(PipelineError::Synthesis("503 from server".into()))
            } else {
                Ok(text.as_bytes().to_vec())
            }
        }
    }

    #[test]
    fn test_voice_options_builder() {
        let voice = VoiceOptions::new().with_tld(".co.uk").with_slow(true);
        assert_eq!(voice.tld, "co.uk");
        assert!(voice.slow);

        let voice = VoiceOptions::new().with_tld("  ");
        assert_eq!(voice.tld, "com");
    }

    #[test]
    fn test_backoff_is_capped() {
        let retry = RetryConfig::default();
        let d = retry.next_delay(Duration::from_secs(1));
        assert_eq!(d, Duration::from_secs(2));
        let d = retry.next_delay(Duration::from_secs(20));
        assert_eq!(d, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_retry_recovers() {
        let tts = Flaky {
            failures: 2,
            calls: AtomicUsize::new(0),
        };
        let audio = tts
            .synthesize_with_retry("hi", "en", &VoiceOptions::default(), &RetryConfig::immediate(3))
            .await
            .unwrap();
        assert_eq!(audio, b"hi");
        assert_eq!(tts.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up() {
        let tts = Flaky {
            failures: 10,
            calls: AtomicUsize::new(0),
        };
        let err = tts
            .synthesize_with_retry("hi", "en", &VoiceOptions::default(), &RetryConfig::immediate(2))
            .await
            .unwrap_err();
        assert_eq!(tts.calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            err.to_string(),
            "Synthesis failed: gave up after 2 attempt(s): 503 from server"
        );
    }
}
