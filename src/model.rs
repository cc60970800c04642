//! The model engine boundary — the one external collaborator this crate
//! depends on but does not implement.
//!
//! Grounded on the `AIProviderAdapter` trait shape (provider-agnostic
//! `generate_text(request) -> response`) but trimmed to the minimal
//! capability the broker actually needs: a prompt string and decoding
//! options in, a completion and finish reason out. Model loading, thread
//! and GPU tuning, and environment plumbing all live on the other side of
//! this trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Decoding knobs for one inference call. Field names and the primary
/// decoding profile's values come from the analysis-prompt contract.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecodingOptions {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub min_p: f32,
    pub repeat_penalty: f32,
    pub echo: bool,
    pub max_tokens: u32,
}

impl DecodingOptions {
    /// The primary decoding profile used for the analysis prompt and the
    /// re-query prompt alike.
    pub fn primary(max_tokens: u32) -> Self {
        Self {
            temperature: 0.3,
            top_p: 0.8,
            top_k: 20,
            min_p: 0.1,
            repeat_penalty: 1.05,
            echo: false,
            max_tokens,
        }
    }

    /// Doubles `max_tokens`, used for the one automatic retry on a
    /// `length` finish reason.
    pub fn doubled(self) -> Self {
        Self {
            max_tokens: self.max_tokens * 2,
            ..self
        }
    }
}

/// Why generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    Error,
}

/// One completion from the model engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub text: String,
    pub finish_reason: FinishReason,
}

/// The minimal capability the broker needs from an inference engine:
/// given a prompt and decoding options, return a completion.
///
/// Implementations own model loading, thread/affinity tuning, GPU layer
/// counts, and environment variable plumbing — none of that is this
/// trait's concern.
#[async_trait]
pub trait ModelEngine: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        options: DecodingOptions,
    ) -> Result<Completion, ModelError>;

    /// The engine's context window, used to size `max_tokens` for a
    /// given prompt (`max(500, min(4000, context_window - prompt_tokens - 100))`).
    fn context_window(&self) -> u32;

    /// A cheap, engine-specific estimate of how many tokens `text` costs.
    /// Implementations that don't tokenize exactly may approximate (e.g.
    /// `text.len() / 3`); the broker only uses this to size `max_tokens`,
    /// never to truncate.
    fn estimate_tokens(&self, text: &str) -> u32;
}

/// A synchronous model engine. Implementations that wrap a blocking
/// inference call (no internal `.await` points of their own) implement
/// this instead of [`ModelEngine`] directly; the blanket impl below
/// bridges each call through [`tokio::task::spawn_blocking`] so a slow
/// blocking call suspends the worker's tokio task rather than stalling
/// the runtime's worker thread, without forcing the engine itself to be
/// `async`-native. `Clone` is required because the blocking closure needs
/// an owned handle to the engine; implementations typically hold their
/// state behind an `Arc` internally so the clone stays cheap.
pub trait SyncModelEngine: Clone + Send + Sync + 'static {
    fn complete_blocking(
        &self,
        prompt: &str,
        options: DecodingOptions,
    ) -> Result<Completion, ModelError>;

    fn context_window(&self) -> u32;

    fn estimate_tokens(&self, text: &str) -> u32;
}

#[async_trait]
impl<T: SyncModelEngine> ModelEngine for T {
    async fn complete(
        &self,
        prompt: &str,
        options: DecodingOptions,
    ) -> Result<Completion, ModelError> {
        let engine = self.clone();
        let prompt = prompt.to_string();
        tokio::task::spawn_blocking(move || engine.complete_blocking(&prompt, options))
            .await
            .unwrap_or_else(|_| Err(ModelError::InferenceFailed("blocking task panicked".into())))
    }

    fn context_window(&self) -> u32 {
        SyncModelEngine::context_window(self)
    }

    fn estimate_tokens(&self, text: &str) -> u32 {
        SyncModelEngine::estimate_tokens(self, text)
    }
}

/// Computes `max_tokens` for a prompt per the decoding-profile contract.
pub fn compute_max_tokens(engine: &dyn ModelEngine, prompt: &str) -> u32 {
    let estimated_prompt_tokens = engine.estimate_tokens(prompt);
    let budget = engine
        .context_window()
        .saturating_sub(estimated_prompt_tokens)
        .saturating_sub(100);
    budget.clamp(500, 4000)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedEngine {
        context_window: u32,
    }

    #[async_trait]
    impl ModelEngine for FixedEngine {
        async fn complete(
            &self,
            _prompt: &str,
            _options: DecodingOptions,
        ) -> Result<Completion, ModelError> {
            Ok(Completion {
                text: String::new(),
                finish_reason: FinishReason::Stop,
            })
        }

        fn context_window(&self) -> u32 {
            self.context_window
        }

        fn estimate_tokens(&self, text: &str) -> u32 {
            (text.len() / 3) as u32
        }
    }

    #[test]
    fn max_tokens_respects_floor_and_ceiling() {
        let engine = FixedEngine { context_window: 600 };
        // Huge prompt relative to a tiny context window clamps to the floor.
        let huge_prompt = "x".repeat(3000);
        assert_eq!(compute_max_tokens(&engine, &huge_prompt), 500);

        let engine = FixedEngine { context_window: 100_000 };
        assert_eq!(compute_max_tokens(&engine, "short prompt"), 4000);
    }

    #[test]
    fn doubled_decoding_options_double_max_tokens_only() {
        let opts = DecodingOptions::primary(600);
        let doubled = opts.doubled();
        assert_eq!(doubled.max_tokens, 1200);
        assert_eq!(doubled.temperature, opts.temperature);
    }

    #[derive(Clone)]
    struct BlockingEchoEngine {
        calls: std::sync::Arc<std::sync::atomic::AtomicUsize>,
    }

    impl SyncModelEngine for BlockingEchoEngine {
        fn complete_blocking(
            &self,
            prompt: &str,
            _options: DecodingOptions,
        ) -> Result<Completion, ModelError> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(Completion {
                text: format!("echo: {prompt}"),
                finish_reason: FinishReason::Stop,
            })
        }

        fn context_window(&self) -> u32 {
            4096
        }

        fn estimate_tokens(&self, text: &str) -> u32 {
            (text.len() / 3) as u32
        }
    }

    #[tokio::test]
    async fn a_sync_model_engine_is_bridged_through_spawn_blocking() {
        let engine = BlockingEchoEngine {
            calls: std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0)),
        };

        let completion = ModelEngine::complete(&engine, "hello", DecodingOptions::primary(500))
            .await
            .unwrap();

        assert_eq!(completion.text, "echo: hello");
        assert_eq!(engine.calls.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(ModelEngine::context_window(&engine), 4096);
    }
}
