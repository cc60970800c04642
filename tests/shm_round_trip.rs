//! Property-style coverage of the testable invariants the slot substrate
//! promises independent of the broker pipeline on top of it: round-trip
//! fidelity, rejection of oversized payloads without a state change, and
//! the state machine holding under concurrent submitters — including the
//! case where more producers race than there are slots.

use std::sync::Arc;
use std::time::Duration;

use gemma_ipc_broker::shm::codec::SlotStatus;
use gemma_ipc_broker::shm::{claim_request, consume_response, deliver_response, submit_request};
use gemma_ipc_broker::{BrokerConfig, Region, ShmError};

fn test_config(name: &str, slot_count: usize) -> BrokerConfig {
    let mut cfg = BrokerConfig::default();
    cfg.shm_name = name.to_string();
    cfg.slot_count = slot_count;
    cfg.slot_size = 512;
    cfg
}

#[test]
fn a_request_round_trips_through_every_state_back_to_empty() {
    let cfg = test_config("test_invariant_round_trip", 2);
    let region = Region::create(&cfg).unwrap();

    let idx = submit_request(&region, "req-1", br#"{"text":"hello"}"#)
        .unwrap()
        .expect("a slot is free");
    assert_eq!(region.scan_statuses().unwrap()[idx], SlotStatus::Request as u32);

    let claimed = claim_request(&region).unwrap().expect("request is waiting");
    assert_eq!(claimed.payload, r#"{"text":"hello"}"#);
    assert_eq!(region.scan_statuses().unwrap()[idx], SlotStatus::Processing as u32);

    deliver_response(&region, idx, "req-1", br#"{"result":"0"}"#).unwrap();
    assert_eq!(region.scan_statuses().unwrap()[idx], SlotStatus::Response as u32);

    let (request_id, payload) = consume_response(&region, idx).unwrap().expect("response ready");
    assert_eq!(request_id, "req-1");
    assert_eq!(payload, r#"{"result":"0"}"#);
    assert_eq!(region.scan_statuses().unwrap()[idx], SlotStatus::Empty as u32);
}

#[test]
fn consuming_an_already_empty_slot_is_a_harmless_none() {
    let cfg = test_config("test_invariant_idempotent_consume", 1);
    let region = Region::create(&cfg).unwrap();
    assert!(consume_response(&region, 0).unwrap().is_none());
    assert!(consume_response(&region, 0).unwrap().is_none());
}

#[test]
fn oversized_payload_is_rejected_and_the_slot_stays_empty() {
    let cfg = test_config("test_invariant_too_large", 1);
    let region = Region::create(&cfg).unwrap();

    let oversized = vec![b'x'; cfg.slot_size + 1];
    let err = submit_request(&region, "req-huge", &oversized).unwrap_err();
    assert!(matches!(err, ShmError::TooLarge { .. }));
    assert_eq!(region.scan_statuses().unwrap()[0], SlotStatus::Empty as u32);
}

#[tokio::test]
async fn concurrent_submitters_bounded_by_slot_count_all_succeed_distinctly() {
    let cfg = test_config("test_invariant_concurrent_bounded", 4);
    let region = Arc::new(Region::create(&cfg).unwrap());

    let mut handles = Vec::new();
    for i in 0..4 {
        let region = region.clone();
        handles.push(tokio::spawn(async move {
            let request_id = format!("req-{i}");
            loop {
                if let Some(idx) = submit_request(&region, &request_id, b"{}").unwrap() {
                    return idx;
                }
                tokio::task::yield_now().await;
            }
        }));
    }

    let mut slots = Vec::new();
    for handle in handles {
        slots.push(handle.await.unwrap());
    }
    slots.sort();
    assert_eq!(slots, vec![0, 1, 2, 3], "every submitter landed on a distinct slot");
}

#[tokio::test]
async fn racing_more_submitters_than_slots_leaves_exactly_slot_count_successes() {
    let cfg = test_config("test_invariant_concurrent_overflow", 3);
    let region = Arc::new(Region::create(&cfg).unwrap());

    let mut handles = Vec::new();
    for i in 0..10 {
        let region = region.clone();
        handles.push(tokio::spawn(async move {
            let request_id = format!("req-{i}");
            // Producers that lose the race back off briefly rather than
            // spin forever; this test cares about the final distribution
            // across a short fixed window, not eventual completion.
            for _ in 0..20 {
                match submit_request(&region, &request_id, b"{}") {
                    Ok(Some(idx)) => return Some(idx),
                    Ok(None) => tokio::time::sleep(Duration::from_millis(2)).await,
                    Err(_) => return None,
                }
            }
            None
        }));
    }

    let mut successes = 0;
    for handle in handles {
        if handle.await.unwrap().is_some() {
            successes += 1;
        }
    }

    // All 3 slots fill up deterministically; the other 7 producers keep
    // losing the race since nothing ever drains a slot in this test.
    assert_eq!(successes, cfg.slot_count);
    let statuses = region.scan_statuses().unwrap();
    assert_eq!(
        statuses.iter().filter(|s| **s == SlotStatus::Request as u32).count(),
        cfg.slot_count
    );
}
