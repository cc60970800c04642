//! Slot lifecycle operations (C3): the composite find+read/write+status-
//! transition operations built on top of [`Region`], one per edge of the
//! `EMPTY -> REQUEST -> PROCESSING -> RESPONSE -> EMPTY` state machine
//! (`ERROR` reachable from `PROCESSING`, cleared only by admin reset).
//!
//! Grounded on `write_request`/`read_request`/`write_response`/
//! `read_response`/`mark_slot_error`, each of which composes a linear
//! slot scan with a single status transition under the region lock.

use crate::error::ShmError;
use crate::shm::codec::{self, SlotStatus};
use crate::shm::region::{now_ms, Region};

/// A request claimed off the region: its slot index (needed later to
/// write the matching response) and decoded JSON payload.
#[derive(Debug, Clone)]
pub struct ClaimedRequest {
    pub slot_index: usize,
    pub request_id: String,
    pub payload: String,
}

/// Writes a new request into the first `EMPTY` slot, transitioning it to
/// `REQUEST`. Returns `Ok(None)` if every slot is occupied (the external
/// caller should back off and retry), mirroring `find_empty_slot`
/// returning `-1` rather than raising.
pub fn submit_request(
    region: &Region,
    request_id: &str,
    payload: &[u8],
) -> Result<Option<usize>, ShmError> {
    region.with_slots(|bytes, stride| {
        for i in 0..region.slot_count() {
            let slot = &mut bytes[i * stride..(i + 1) * stride];
            if SlotStatus::from_u32(codec::read_status(slot)) == Some(SlotStatus::Empty) {
                codec::write_slot_data(slot, request_id, payload, now_ms())?;
                codec::write_status(slot, SlotStatus::Request);
                return Ok(Some(i));
            }
        }
        Ok(None)
    })?
}

/// Finds the first `REQUEST` slot, reads it, and transitions it to
/// `PROCESSING` so no other worker claims the same slot. Returns
/// `Ok(None)` if no request is waiting. A slot whose payload fails to
/// decode is flipped to `ERROR` in place and the scan continues to the
/// next index, rather than aborting the whole scan — one corrupted slot
/// must not block detection of every request behind it.
pub fn claim_request(region: &Region) -> Result<Option<ClaimedRequest>, ShmError> {
    region.with_slots(|bytes, stride| {
        for i in 0..region.slot_count() {
            let slot = &mut bytes[i * stride..(i + 1) * stride];
            if SlotStatus::from_u32(codec::read_status(slot)) == Some(SlotStatus::Request) {
                match codec::read_slot_payload(slot) {
                    Ok(payload) => {
                        let request_id = codec::read_request_id(slot);
                        codec::write_status(slot, SlotStatus::Processing);
                        return Ok(Some(ClaimedRequest {
                            slot_index: i,
                            request_id,
                            payload,
                        }));
                    }
                    Err(_) => {
                        codec::write_status(slot, SlotStatus::Error);
                        continue;
                    }
                }
            }
        }
        Ok(None)
    })?
}

/// Writes a response into `slot_index` (must currently be `PROCESSING`)
/// and transitions it to `RESPONSE`.
pub fn deliver_response(
    region: &Region,
    slot_index: usize,
    request_id: &str,
    payload: &[u8],
) -> Result<(), ShmError> {
    region.with_slot(slot_index, |slot| {
        let status = SlotStatus::from_u32(codec::read_status(slot));
        if status != Some(SlotStatus::Processing) {
            return Err(ShmError::WrongState(slot_index));
        }
        codec::write_slot_data(slot, request_id, payload, now_ms())?;
        codec::write_status(slot, SlotStatus::Response);
        Ok(())
    })?
}

/// Reads `slot_index` if it currently holds a `RESPONSE`, and transitions
/// it back to `EMPTY` so it can be reused. A client polls its own
/// `slot_index` (the one `submit_request` handed it) rather than
/// scanning, so two clients never race over each other's replies.
/// Returns `Ok(None)` if the slot isn't a response yet; idempotent under
/// the region lock, since a second call after the first sees `EMPTY`.
pub fn consume_response(
    region: &Region,
    slot_index: usize,
) -> Result<Option<(String, String)>, ShmError> {
    region.with_slot(slot_index, |slot| {
        if SlotStatus::from_u32(codec::read_status(slot)) != Some(SlotStatus::Response) {
            return Ok(None);
        }
        let request_id = codec::read_request_id(slot);
        let payload = codec::read_slot_payload(slot)?;
        codec::write_status(slot, SlotStatus::Empty);
        codec::write_data_length(slot, 0);
        Ok(Some((request_id, payload)))
    })?
}

/// Flips a slot to `ERROR`, localizing a transport failure (mutex
/// timeout aside, which by definition never reached the slot) to that
/// one slot rather than propagating it further. Cleared only by
/// [`crate::shm::region::Region::force_reset_all_slots`].
pub fn mark_slot_error(region: &Region, slot_index: usize) -> Result<(), ShmError> {
    region.with_slot(slot_index, |slot| {
        codec::write_status(slot, SlotStatus::Error);
    })
}
