//! The shared-memory region itself (C2): a single named OS mapping
//! divided into fixed-size slots, guarded end to end by one process-wide
//! mutex.
//!
//! Grounded on `_connect_shm`/`_connect_shm_client`/`_cleanup_existing_shm`:
//! the owning side creates the mapping and retries past a stale mapping
//! left by a crashed prior instance, the attaching side opens an
//! existing mapping and fails fast if none exists. The single
//! process-wide lock resolved in the open design question is
//! `parking_lot::Mutex`, never held across an `.await` point — every
//! region operation here is synchronous byte manipulation.

use parking_lot::Mutex;
use shared_memory::{Shmem, ShmemConf, ShmemError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::config::BrokerConfig;
use crate::error::ShmError;
use crate::shm::codec::{self, SlotStatus, HEADER_SIZE};

/// Owns the mapped region and serializes every access to it.
pub struct Region {
    shmem: Mutex<Shmem>,
    slot_count: usize,
    slot_stride: usize,
    mutex_timeout: Duration,
}

// SAFETY: `Shmem` is a raw mapping; we only ever touch it through
// `Region`'s methods, each of which holds `self.shmem`'s mutex for the
// full duration of the access.
unsafe impl Send for Region {}
unsafe impl Sync for Region {}

impl Region {
    /// Creates a brand-new region, owning it for the lifetime of the
    /// process (the broker is the only writer-side owner; on drop the OS
    /// mapping is unlinked). Retries past a stale mapping left by a
    /// crashed prior instance, same as `_connect_shm`'s up-to-3-attempt
    /// recreate loop.
    pub fn create(config: &BrokerConfig) -> Result<Self, ShmError> {
        let size = config.region_size();
        let mut last_err = None;
        for _attempt in 0..3 {
            match ShmemConf::new().size(size).os_id(&config.shm_name).create() {
                Ok(shmem) => {
                    let region = Self {
                        shmem: Mutex::new(shmem),
                        slot_count: config.slot_count,
                        slot_stride: config.slot_stride(),
                        mutex_timeout: config.mutex_timeout,
                    };
                    region.initialize_slots();
                    return Ok(region);
                }
                Err(ShmemError::MappingIdExists) => {
                    // A prior instance's mapping is still registered with the
                    // OS. `open()` attaches as a non-owning handle, whose
                    // drop never unlinks — mirrors `_cleanup_existing_shm`'s
                    // explicit `close()` *and* `unlink()`: claiming ownership
                    // before dropping is what actually releases the name.
                    if let Ok(mut stale) = ShmemConf::new().os_id(&config.shm_name).open() {
                        stale.set_owner(true);
                        drop(stale);
                    }
                    last_err = Some(ShmemError::MappingIdExists);
                }
                Err(other) => return Err(ShmError::Backend(other.to_string())),
            }
        }
        Err(ShmError::Backend(
            last_err
                .map(|e| e.to_string())
                .unwrap_or_else(|| "exhausted retries creating shared region".to_string()),
        ))
    }

    /// Attaches to an existing region created by another process.
    /// Fails with [`ShmError::RegionNotFound`] if no such mapping exists.
    pub fn open(config: &BrokerConfig) -> Result<Self, ShmError> {
        let shmem = ShmemConf::new()
            .os_id(&config.shm_name)
            .open()
            .map_err(|_| ShmError::RegionNotFound(config.shm_name.clone()))?;
        Ok(Self {
            shmem: Mutex::new(shmem),
            slot_count: config.slot_count,
            slot_stride: config.slot_stride(),
            mutex_timeout: config.mutex_timeout,
        })
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// Zeroes every byte of every slot. Administrative only — never
    /// called on the steady-state read/write path.
    pub fn initialize_slots(&self) {
        let mut shmem = self.shmem.lock();
        let bytes = unsafe { shmem.as_slice_mut() };
        bytes.fill(0);
    }

    fn slot_bounds(&self, index: usize) -> Result<(usize, usize), ShmError> {
        if index >= self.slot_count {
            return Err(ShmError::SlotOutOfRange(index));
        }
        let start = index * self.slot_stride;
        Ok((start, start + self.slot_stride))
    }

    /// Runs `f` with mutable access to every slot's bytes, holding the
    /// region mutex for the duration. `f` receives the slot stride so it
    /// can index into the flat buffer itself; this keeps the locking
    /// here generic over whatever scan `f` needs to perform (find-empty,
    /// find-request, find-response all share this entry point, mirroring
    /// `find_empty_slot`/`find_request_slot`/`find_response_slot` all
    /// wrapping the same `lock.acquire(timeout=...)` pattern).
    pub fn with_slots<T>(&self, f: impl FnOnce(&mut [u8], usize) -> T) -> Result<T, ShmError> {
        let mut shmem = self
            .shmem
            .try_lock_for(self.mutex_timeout)
            .ok_or(ShmError::MutexTimeout)?;
        let bytes = unsafe { shmem.as_slice_mut() };
        Ok(f(bytes, self.slot_stride))
    }

    /// Runs `f` against exactly one slot's bytes.
    pub fn with_slot<T>(
        &self,
        index: usize,
        f: impl FnOnce(&mut [u8]) -> T,
    ) -> Result<T, ShmError> {
        let (start, end) = self.slot_bounds(index)?;
        self.with_slots(|bytes, _stride| f(&mut bytes[start..end]))
    }

    /// Reads the status of every slot without mutating anything.
    pub fn scan_statuses(&self) -> Result<Vec<u32>, ShmError> {
        self.with_slots(|bytes, stride| {
            (0..self.slot_count)
                .map(|i| codec::read_status(&bytes[i * stride..i * stride + HEADER_SIZE]))
                .collect()
        })
    }

    /// Resets every slot except those mid-flight (`PROCESSING`) back to
    /// `EMPTY`, clearing any `ERROR` slots. This is the only place the
    /// steady-state contract's "zero only at admin reset" clause applies.
    pub fn force_reset_all_slots(&self) -> Result<(), ShmError> {
        self.with_slots(|bytes, stride| {
            for i in 0..self.slot_count {
                let slot = &mut bytes[i * stride..(i + 1) * stride];
                let status = SlotStatus::from_u32(codec::read_status(slot));
                if status != Some(SlotStatus::Processing) {
                    codec::zero_slot(slot);
                }
            }
        })
    }
}

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
