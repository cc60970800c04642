//! Detector loop (C5): the single task that claims REQUEST slots and
//! hands them to the request queue.
//!
//! Grounded on the main polling loop shape `main.rs` uses for its own
//! long-running subsystems (a `loop { ... tokio::select! { ... } }` with
//! a shutdown watch channel), generalized here to the claim/poll/sleep
//! cycle the detector contract describes.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::shm::{codec::SlotStatus, region::now_ms, Region};
use crate::shm::scheduler::claim_request;
use crate::queue::QueueSender;

/// Runs the detector loop until `shutdown` reports `true`. Shuts down
/// without forcibly touching any in-flight `PROCESSING` slot.
pub async fn run(
    region: Arc<Region>,
    sender: QueueSender<crate::queue::StagedRequest>,
    poll_interval: Duration,
    soft_timeout: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            break;
        }

        match claim_request(&region) {
            Ok(Some(claimed)) => {
                debug!(slot = claimed.slot_index, request_id = %claimed.request_id, "claimed request");
                if sender.send(claimed).await.is_err() {
                    warn!("request queue closed; detector stopping");
                    break;
                }
                continue;
            }
            Ok(None) => {
                log_stale_processing_slots(&region, soft_timeout);
            }
            Err(e) => {
                warn!(error = %e, "detector failed to scan for requests");
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(poll_interval) => {}
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

/// Logs an inactivity heartbeat for any `PROCESSING` slot whose age
/// exceeds `soft_timeout`. Never aborts the slot — the soft timeout is
/// observability only, per the concurrency model's cancellation policy.
fn log_stale_processing_slots(region: &Region, soft_timeout: Duration) {
    let Ok(_) = region.with_slots(|bytes, stride| {
        let now = now_ms();
        for i in 0..region.slot_count() {
            let slot = &bytes[i * stride..(i + 1) * stride];
            if SlotStatus::from_u32(crate::shm::codec::read_status(slot)) == Some(SlotStatus::Processing)
            {
                let age_ms = now.saturating_sub(crate::shm::codec::read_timestamp(slot));
                if age_ms > soft_timeout.as_millis() as u64 {
                    warn!(slot = i, age_ms, "slot has exceeded its soft timeout while still processing");
                }
            }
        }
    }) else {
        return;
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BrokerConfig;
    use crate::queue::staging_queue;
    use crate::shm::{codec, scheduler::submit_request};

    fn test_config(name: &str) -> BrokerConfig {
        let mut cfg = BrokerConfig::default();
        cfg.shm_name = name.to_string();
        cfg.slot_count = 2;
        cfg.slot_size = 256;
        cfg
    }

    #[tokio::test]
    async fn detector_forwards_a_claimed_request_to_the_queue() {
        let cfg = test_config("test_detector_forward");
        let region = Arc::new(Region::create(&cfg).unwrap());
        submit_request(&region, "r1", b"{\"text\":\"hi\"}").unwrap();

        let (tx, rx) = staging_queue(4);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            run(
                region,
                tx,
                Duration::from_millis(10),
                Duration::from_secs(300),
                shutdown_rx,
            )
            .await;
        });

        let claimed = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("detector should forward within timeout")
            .expect("queue should yield the claimed request");
        assert_eq!(claimed.request_id, "r1");

        shutdown_tx.send(true).unwrap();
        let _ = tokio::time::timeout(Duration::from_secs(1), handle).await;
    }

    #[test]
    fn stale_processing_slot_does_not_panic_the_scan() {
        let cfg = test_config("test_detector_stale_scan");
        let region = Region::create(&cfg).unwrap();
        region
            .with_slot(0, |slot| codec::write_status(slot, SlotStatus::Processing))
            .unwrap();
        log_stale_processing_slots(&region, Duration::from_millis(0));
    }
}
