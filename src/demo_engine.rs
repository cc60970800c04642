//! A minimal stand-in [`ModelEngine`] for running the broker binary
//! without a real inference backend wired in. Real deployments swap
//! this out for an engine backed by an actual model server — model
//! loading and GPU/thread tuning are explicitly out of this crate's
//! scope.

use async_trait::async_trait;
use gemma_ipc_broker::{Completion, DecodingOptions, FinishReason, ModelEngine, ModelError};

#[derive(Default)]
pub struct EchoEngine;

#[async_trait]
impl ModelEngine for EchoEngine {
    async fn complete(
        &self,
        _prompt: &str,
        _options: DecodingOptions,
    ) -> Result<Completion, ModelError> {
        Ok(Completion {
            text: "```json\n{\"summary\":\"요약 없음\",\"keyword\":\"\",\"paragraphs\":[]}\n```"
                .to_string(),
            finish_reason: FinishReason::Stop,
        })
    }

    fn context_window(&self) -> u32 {
        8192
    }

    fn estimate_tokens(&self, text: &str) -> u32 {
        (text.len() / 3) as u32
    }
}
