//! Worker pool (C6): the per-request pipeline — optional STT
//! preprocessing, prompt building, model inference with the length-gate
//! retry, JSON extraction/repair, post-processing, and the conditional
//! re-query loop.
//!
//! Every fallible step here is caught and translated into a response;
//! nothing escapes the worker loop, per the error-handling propagation
//! contract.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::model::{compute_max_tokens, DecodingOptions, FinishReason, ModelEngine};
use crate::postprocess::{self, LENGTH_GATE_PREFIX};
use crate::preprocess;
use crate::prompt;
use crate::protocol::{RequestPayload, ResponseBody, ResponseEnvelope};
use crate::queue::{QueueReceiver, QueueSender, StagedRequest, StagedResponse};
use crate::repair;

/// A request's max_tokens stays eligible for the length-reason retry
/// only below this ceiling, per the worker contract's step 4.
const RETRY_MAX_TOKENS_CEILING: u32 = 1200;

/// Runs one worker task until the request queue closes.
pub async fn run(
    engine: Arc<dyn ModelEngine>,
    receiver: QueueReceiver<StagedRequest>,
    sender: QueueSender<StagedResponse>,
) {
    while let Some(request) = receiver.recv().await {
        let slot_index = request.slot_index;
        let envelope = process_request(engine.as_ref(), &request.payload).await;

        let payload = match serde_json::to_vec(&envelope) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(slot = slot_index, error = %e, "failed to serialize response envelope");
                continue;
            }
        };

        let staged = StagedResponse {
            slot_index,
            request_id: request.request_id.clone(),
            payload,
        };

        if sender.send(staged).await.is_err() {
            warn!("response queue closed; worker stopping");
            break;
        }
    }
}

/// The pipeline itself, independent of queues — a pure-ish async
/// function so it can be exercised directly in tests against a mock
/// engine.
pub async fn process_request(engine: &dyn ModelEngine, raw_payload: &str) -> ResponseEnvelope {
    let request: RequestPayload = match serde_json::from_str(raw_payload) {
        Ok(r) => r,
        Err(e) => {
            return ResponseEnvelope::new(
                String::new(),
                String::new(),
                ResponseBody::failure(format!("invalid request payload: {e}")),
            );
        }
    };

    let conversation = match (&request.text, &request.stt_result_list) {
        (Some(text), _) => text.clone(),
        (None, Some(segments)) => preprocess::preprocess_stt_result(segments),
        (None, None) => {
            return ResponseEnvelope::new(
                request.transactionid,
                request.sequenceno,
                ResponseBody::failure("request carries neither text nor sttResultList"),
            );
        }
    };

    let analysis_prompt = prompt::build_analysis_prompt(&conversation);
    let max_tokens = compute_max_tokens(engine, &analysis_prompt);
    let mut options = DecodingOptions::primary(max_tokens);

    let completion = match engine.complete(&analysis_prompt, options).await {
        Ok(c) => c,
        Err(e) => {
            return ResponseEnvelope::new(
                request.transactionid,
                request.sequenceno,
                ResponseBody::failure(e.to_string()),
            );
        }
    };

    let completion = if completion.finish_reason == FinishReason::Length
        && options.max_tokens < RETRY_MAX_TOKENS_CEILING
    {
        options = options.doubled();
        debug!(max_tokens = options.max_tokens, "retrying after length finish reason");
        match engine.complete(&analysis_prompt, options).await {
            Ok(c) => c,
            Err(e) => {
                return ResponseEnvelope::new(
                    request.transactionid,
                    request.sequenceno,
                    ResponseBody::failure(e.to_string()),
                );
            }
        }
    } else {
        completion
    };

    let artifact = repair::extract_artifact(&completion.text);
    let mut processed = postprocess::process_artifact(artifact);

    if processed.summary.starts_with(LENGTH_GATE_PREFIX) {
        let stripped = processed
            .summary
            .strip_prefix(LENGTH_GATE_PREFIX)
            .unwrap_or(&processed.summary);
        let requery_prompt = prompt::build_requery_prompt(stripped);
        let requery_options =
            DecodingOptions::primary(compute_max_tokens(engine, &requery_prompt));
        match engine.complete(&requery_prompt, requery_options).await {
            Ok(requery_completion) => {
                processed.summary = postprocess::apply_noun_form_only(&requery_completion.text);
            }
            Err(e) => {
                // The re-query model call itself failed; keep the gated
                // summary rather than turn a soft degradation into a
                // hard failure response.
                warn!(error = %e, "re-query call failed; keeping gated summary");
            }
        }
    }

    ResponseEnvelope::new(
        request.transactionid,
        request.sequenceno,
        ResponseBody::success(processed),
    )
}
