//! Shared-memory IPC broker mediating client requests into a single LLM
//! summarization engine.
//!
//! Design principles:
//! - A single shared-memory region, one process-wide mutex, explicit
//!   state transitions (no lock-free paths).
//! - Bounded staging queues decouple detection, inference, and writing.
//! - Every fallible step is a typed `Result`; workers never propagate an
//!   error out of their run loop.

pub mod broker;
pub mod config;
pub mod error;
pub mod model;
pub mod postprocess;
pub mod preprocess;
pub mod prompt;
pub mod protocol;
pub mod queue;
pub mod repair;
pub mod shm;

pub use broker::{spawn, Broker};
pub use config::BrokerConfig;
pub use error::{BrokerError, ModelError, ShmError};
pub use model::{Completion, DecodingOptions, FinishReason, ModelEngine};
pub use shm::Region;
