//! The broker pipeline: detector (C5), worker pool (C6), and writer
//! pool (C7), wired together over the bounded staging queues (C4).

pub mod detector;
pub mod worker;
pub mod writer;

use std::sync::Arc;

use tokio::sync::watch;

use crate::config::BrokerConfig;
use crate::model::ModelEngine;
use crate::queue::staging_queue;
use crate::shm::Region;

/// Handles to every task spawned by [`spawn`], plus the shutdown signal
/// that stops them.
pub struct Broker {
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<tokio::task::JoinHandle<()>>,
}

impl Broker {
    /// Signals shutdown and waits for every spawned task to finish its
    /// current item and exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for task in self.tasks {
            let _ = task.await;
        }
    }
}

/// Spawns the detector, the configured number of workers, and the
/// configured number of writers, all sharing one region and one
/// request/response queue pair.
pub fn spawn(region: Arc<Region>, engine: Arc<dyn ModelEngine>, config: &BrokerConfig) -> Broker {
    let (request_tx, request_rx) = staging_queue(config.queue_capacity);
    let (response_tx, response_rx) = staging_queue(config.queue_capacity);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut tasks = Vec::new();

    {
        let region = region.clone();
        let request_tx = request_tx.clone();
        let poll_interval = config.poll_interval;
        let soft_timeout = config.soft_timeout;
        let shutdown_rx = shutdown_rx.clone();
        tasks.push(tokio::spawn(async move {
            detector::run(region, request_tx, poll_interval, soft_timeout, shutdown_rx).await;
        }));
    }

    for _ in 0..config.worker_count.max(1) {
        let engine = engine.clone();
        let request_rx = request_rx.clone();
        let response_tx = response_tx.clone();
        tasks.push(tokio::spawn(async move {
            worker::run(engine, request_rx, response_tx).await;
        }));
    }

    for _ in 0..config.writer_count.max(1) {
        let region = region.clone();
        let response_rx = response_rx.clone();
        tasks.push(tokio::spawn(async move {
            writer::run(region, response_rx).await;
        }));
    }

    Broker { shutdown_tx, tasks }
}
