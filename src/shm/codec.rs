//! Slot header layout and byte-level encode/decode (C1).
//!
//! The layout mirrors `IPCSlot`'s offset getters exactly: a 48-byte
//! header (status u32, timestamp_ms u64, request_id 32-byte padded
//! ASCII, data_length u32) followed by the payload area. All integers
//! are little-endian on the wire regardless of host endianness, since
//! the region may be read by a process on a different architecture.

use crate::error::ShmError;

pub const STATUS_OFFSET: usize = 0;
pub const TIMESTAMP_OFFSET: usize = 4;
pub const REQUEST_ID_OFFSET: usize = 12;
pub const REQUEST_ID_SIZE: usize = 32;
pub const DATA_LENGTH_OFFSET: usize = 44;
pub const HEADER_SIZE: usize = 48;

/// Slot lifecycle states. Numeric values match the wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum SlotStatus {
    Empty = 0,
    Request = 1,
    Processing = 2,
    Response = 3,
    Error = 4,
}

impl SlotStatus {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(SlotStatus::Empty),
            1 => Some(SlotStatus::Request),
            2 => Some(SlotStatus::Processing),
            3 => Some(SlotStatus::Response),
            4 => Some(SlotStatus::Error),
            _ => None,
        }
    }
}

/// Writes `status` at `STATUS_OFFSET` within `slot`.
pub fn write_status(slot: &mut [u8], status: SlotStatus) {
    slot[STATUS_OFFSET..STATUS_OFFSET + 4].copy_from_slice(&(status as u32).to_le_bytes());
}

/// Reads the raw status value at `STATUS_OFFSET`.
pub fn read_status(slot: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&slot[STATUS_OFFSET..STATUS_OFFSET + 4]);
    u32::from_le_bytes(buf)
}

/// Encodes `request_id` (ASCII, truncated/padded to 32 bytes) and the
/// JSON `payload` into `slot`, along with the current timestamp and
/// data length. Returns [`ShmError::TooLarge`] if the payload does not
/// fit in the slot's payload area.
pub fn write_slot_data(
    slot: &mut [u8],
    request_id: &str,
    payload: &[u8],
    timestamp_ms: u64,
) -> Result<(), ShmError> {
    let capacity = slot.len().saturating_sub(HEADER_SIZE);
    if payload.len() > capacity {
        return Err(ShmError::TooLarge {
            len: payload.len(),
            capacity,
        });
    }

    slot[TIMESTAMP_OFFSET..TIMESTAMP_OFFSET + 8].copy_from_slice(&timestamp_ms.to_le_bytes());

    let mut id_field = [0u8; REQUEST_ID_SIZE];
    let truncated = truncate_at_char_boundary(request_id, REQUEST_ID_SIZE);
    let id_bytes = truncated.as_bytes();
    id_field[..id_bytes.len()].copy_from_slice(id_bytes);
    slot[REQUEST_ID_OFFSET..REQUEST_ID_OFFSET + REQUEST_ID_SIZE].copy_from_slice(&id_field);

    slot[DATA_LENGTH_OFFSET..DATA_LENGTH_OFFSET + 4]
        .copy_from_slice(&(payload.len() as u32).to_le_bytes());

    slot[HEADER_SIZE..HEADER_SIZE + payload.len()].copy_from_slice(payload);

    Ok(())
}

/// Truncates `s` to at most `max_bytes` bytes without splitting a
/// multi-byte UTF-8 sequence, walking back to the nearest char boundary.
fn truncate_at_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Reads the request id, padded with trailing NUL bytes in the region,
/// trimmed back to its original text.
pub fn read_request_id(slot: &[u8]) -> String {
    let raw = &slot[REQUEST_ID_OFFSET..REQUEST_ID_OFFSET + REQUEST_ID_SIZE];
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

/// Reads the declared payload length.
pub fn read_data_length(slot: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&slot[DATA_LENGTH_OFFSET..DATA_LENGTH_OFFSET + 4]);
    u32::from_le_bytes(buf)
}

/// Writes `data_length` without touching the payload bytes past it. Used
/// when a slot frees back to `EMPTY` at steady state, which zeroes only
/// the header's length field rather than re-zeroing the whole payload
/// area (that full wipe only happens at administrative reset).
pub fn write_data_length(slot: &mut [u8], data_length: u32) {
    slot[DATA_LENGTH_OFFSET..DATA_LENGTH_OFFSET + 4].copy_from_slice(&data_length.to_le_bytes());
}

pub fn read_timestamp(slot: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&slot[TIMESTAMP_OFFSET..TIMESTAMP_OFFSET + 8]);
    u64::from_le_bytes(buf)
}

/// Reads and UTF-8-decodes the payload area, trusting `data_length` at
/// steady state (the region is zeroed only on administrative reset, not
/// before every read). Returns [`ShmError::InvalidUtf8`] if the declared
/// span is not valid UTF-8.
pub fn read_slot_payload(slot: &[u8]) -> Result<String, ShmError> {
    let data_length = read_data_length(slot) as usize;
    let capacity = slot.len().saturating_sub(HEADER_SIZE);
    if data_length == 0 || data_length > capacity {
        return Err(ShmError::InvalidUtf8);
    }
    let bytes = &slot[HEADER_SIZE..HEADER_SIZE + data_length];
    std::str::from_utf8(bytes)
        .map(|s| s.to_string())
        .map_err(|_| ShmError::InvalidUtf8)
}

/// Zeroes every byte of a slot's header and payload area. Used only at
/// administrative reset, never on the steady-state read/write path.
pub fn zero_slot(slot: &mut [u8]) {
    slot.fill(0);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_slot(size: usize) -> Vec<u8> {
        vec![0u8; size]
    }

    #[test]
    fn round_trips_request_id_and_payload() {
        let mut slot = make_slot(HEADER_SIZE + 64);
        write_status(&mut slot, SlotStatus::Request);
        write_slot_data(&mut slot, "req-123", br#"{"a":1}"#, 1_700_000_000_000).unwrap();

        assert_eq!(read_status(&slot), SlotStatus::Request as u32);
        assert_eq!(read_request_id(&slot), "req-123");
        assert_eq!(read_slot_payload(&slot).unwrap(), r#"{"a":1}"#);
        assert_eq!(read_timestamp(&slot), 1_700_000_000_000);
    }

    #[test]
    fn write_data_length_leaves_payload_bytes_untouched() {
        let mut slot = make_slot(HEADER_SIZE + 8);
        write_slot_data(&mut slot, "id", b"{\"a\":1}", 0).unwrap();
        write_data_length(&mut slot, 0);
        assert_eq!(read_data_length(&slot), 0);
        assert_eq!(&slot[HEADER_SIZE..HEADER_SIZE + 7], b"{\"a\":1}");
    }

    #[test]
    fn rejects_oversized_payload() {
        let mut slot = make_slot(HEADER_SIZE + 4);
        let err = write_slot_data(&mut slot, "id", b"way too big for this slot", 0).unwrap_err();
        assert_eq!(
            err,
            ShmError::TooLarge {
                len: 26,
                capacity: 4
            }
        );
    }

    #[test]
    fn request_id_longer_than_32_bytes_is_truncated_not_panicking() {
        let mut slot = make_slot(HEADER_SIZE + 16);
        let long_id = "a".repeat(64);
        write_slot_data(&mut slot, &long_id, b"{}", 0).unwrap();
        assert_eq!(read_request_id(&slot).len(), REQUEST_ID_SIZE);
    }

    #[test]
    fn multi_byte_request_id_truncation_never_splits_a_char() {
        let mut slot = make_slot(HEADER_SIZE + 16);
        // Each "가" is 3 bytes; 11 of them is 33 bytes, one past the
        // 32-byte field, so a naive byte truncation would cut the last
        // character in half.
        let long_id = "가".repeat(11);
        write_slot_data(&mut slot, &long_id, b"{}", 0).unwrap();
        let recovered = read_request_id(&slot);
        assert!(recovered.chars().all(|c| c == '가'));
        assert_eq!(recovered.len() % 3, 0);
    }

    #[test]
    fn zero_slot_clears_status_and_length() {
        let mut slot = make_slot(HEADER_SIZE + 8);
        write_status(&mut slot, SlotStatus::Response);
        write_slot_data(&mut slot, "x", b"{}", 5).unwrap();
        zero_slot(&mut slot);
        assert_eq!(read_status(&slot), SlotStatus::Empty as u32);
        assert_eq!(read_data_length(&slot), 0);
    }
}
