//! Broker configuration, loaded from environment variables with the same
//! `env::var(..).ok().and_then(|s| s.parse().ok()).unwrap_or(default)`
//! idiom `main.rs` uses for `get_call_server_port`. There is no CLI
//! argument parsing here — every tunable is an env var with a sane
//! default, since the broker is meant to run as a long-lived sidecar
//! rather than be invoked with flags.

use std::time::Duration;

/// Name of the shared-memory region created/attached at startup.
pub const DEFAULT_SHM_NAME: &str = "gemma_ipc_shm";

#[derive(Debug, Clone, PartialEq)]
pub struct BrokerConfig {
    /// OS name of the shared-memory region.
    pub shm_name: String,
    /// Number of fixed-size slots in the region.
    pub slot_count: usize,
    /// Byte size of each slot's payload area (excludes the 48-byte header).
    pub slot_size: usize,
    /// How often the detector loop scans for REQUEST slots.
    pub poll_interval: Duration,
    /// Number of concurrent inference workers.
    pub worker_count: usize,
    /// Number of concurrent response writers.
    pub writer_count: usize,
    /// Max time to wait to acquire the region mutex before giving up.
    pub mutex_timeout: Duration,
    /// Depth of the bounded request/response staging queues (C4).
    pub queue_capacity: usize,
    /// Soft ceiling on total time spent processing one request, including
    /// the length-reason retry and the re-query loop, before the worker
    /// gives up and emits a failure response.
    pub soft_timeout: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            shm_name: DEFAULT_SHM_NAME.to_string(),
            slot_count: 5,
            slot_size: 8192,
            poll_interval: Duration::from_millis(500),
            worker_count: 1,
            writer_count: 1,
            mutex_timeout: Duration::from_millis(1500),
            queue_capacity: 16,
            soft_timeout: Duration::from_secs(300),
        }
    }
}

impl BrokerConfig {
    /// Builds configuration from environment variables, falling back to
    /// [`Default`] for anything unset or unparsable.
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            shm_name: std::env::var("GEMMA_IPC_SHM_NAME").unwrap_or(default.shm_name),
            slot_count: env_parsed("GEMMA_IPC_SLOT_COUNT").unwrap_or(default.slot_count),
            slot_size: env_parsed("GEMMA_IPC_SLOT_SIZE").unwrap_or(default.slot_size),
            poll_interval: env_parsed_millis("GEMMA_IPC_POLL_INTERVAL_MS")
                .unwrap_or(default.poll_interval),
            worker_count: env_parsed("GEMMA_IPC_WORKER_COUNT").unwrap_or(default.worker_count),
            writer_count: env_parsed("GEMMA_IPC_WRITER_COUNT").unwrap_or(default.writer_count),
            mutex_timeout: env_parsed_millis("GEMMA_IPC_MUTEX_TIMEOUT_MS")
                .unwrap_or(default.mutex_timeout),
            queue_capacity: env_parsed("GEMMA_IPC_QUEUE_CAPACITY")
                .unwrap_or(default.queue_capacity),
            soft_timeout: env_parsed_millis("GEMMA_IPC_SOFT_TIMEOUT_MS")
                .unwrap_or(default.soft_timeout),
        }
    }

    /// Total header + payload size of a single slot.
    pub fn slot_stride(&self) -> usize {
        crate::shm::codec::HEADER_SIZE + self.slot_size
    }

    /// Total byte length of the region (all slots back to back).
    pub fn region_size(&self) -> usize {
        self.slot_stride() * self.slot_count
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

fn env_parsed_millis(key: &str) -> Option<Duration> {
    env_parsed::<u64>(key).map(Duration::from_millis)
}
