//! Writer pool (C7): consumes the response queue and writes each
//! computed response back into its originating slot.
//!
//! The writer has no policy of its own — whatever the worker produced is
//! what the client gets; on a transport failure it only marks the slot
//! ERROR, it never substitutes its own response.

use std::sync::Arc;

use tracing::{error, warn};

use crate::queue::QueueReceiver;
use crate::shm::scheduler::{deliver_response, mark_slot_error};
use crate::shm::Region;

/// Runs one writer task until the response queue closes.
pub async fn run(region: Arc<Region>, receiver: QueueReceiver<crate::queue::StagedResponse>) {
    while let Some(response) = receiver.recv().await {
        let result = deliver_response(
            &region,
            response.slot_index,
            &response.request_id,
            &response.payload,
        );

        if let Err(e) = result {
            warn!(
                slot = response.slot_index,
                error = %e,
                "failed to deliver response; marking slot ERROR"
            );
            if let Err(e) = mark_slot_error(&region, response.slot_index) {
                error!(slot = response.slot_index, error = %e, "failed to mark slot ERROR");
            }
        }
    }
}
