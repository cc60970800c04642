//! Bounded staging queues between the detector and the worker pool, and
//! between the worker pool and the writer pool (C4).
//!
//! `ConcurrentProcessor` in `concurrent/message_processor.rs` wraps an
//! *unbounded* channel behind an `Arc<tokio::sync::Mutex<Receiver>>`
//! shared by N worker tasks — that pattern is kept here, but the channel
//! itself is bounded: the detector and worker pool must see backpressure
//! when workers fall behind rather than let staged work grow without
//! limit. A `BinaryHeap`-backed priority queue (`concurrent/priority_queue.rs`)
//! is overkill here since every request is processed in arrival order.

use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

use crate::shm::ClaimedRequest;

/// A request pulled off the region, staged for a worker to pick up.
pub type StagedRequest = ClaimedRequest;

/// A computed response, staged for a writer to push back into the
/// region.
#[derive(Debug, Clone)]
pub struct StagedResponse {
    pub slot_index: usize,
    pub request_id: String,
    pub payload: Vec<u8>,
}

/// The sending half of a staging queue, cheaply cloneable so every
/// detector/worker task can hold one.
#[derive(Clone)]
pub struct QueueSender<T>(mpsc::Sender<T>);

impl<T> QueueSender<T> {
    /// Stages an item, waiting for room if the queue is full. This is
    /// the backpressure point: a slow worker pool stalls the detector
    /// loop here rather than the region filling up with unclaimed
    /// `REQUEST` slots.
    pub async fn send(&self, item: T) -> Result<(), mpsc::error::SendError<T>> {
        self.0.send(item).await
    }
}

/// The receiving half, shared by a pool of worker tasks the same way
/// `ConcurrentProcessor` shares its receiver: wrapped in a tokio mutex,
/// locked only for the instant it takes to pull the next item.
pub struct QueueReceiver<T>(Arc<Mutex<mpsc::Receiver<T>>>);

impl<T> Clone for QueueReceiver<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> QueueReceiver<T> {
    pub async fn recv(&self) -> Option<T> {
        let mut rx = self.0.lock().await;
        rx.recv().await
    }
}

/// Builds a bounded staging queue, returning a cloneable sender and a
/// cloneable, poolable receiver.
pub fn staging_queue<T>(capacity: usize) -> (QueueSender<T>, QueueReceiver<T>) {
    let (tx, rx) = mpsc::channel(capacity);
    (QueueSender(tx), QueueReceiver(Arc::new(Mutex::new(rx))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn items_arrive_in_fifo_order() {
        let (tx, rx) = staging_queue::<u32>(8);
        for i in 0..5 {
            tx.send(i).await.unwrap();
        }
        for i in 0..5 {
            assert_eq!(rx.recv().await, Some(i));
        }
    }

    #[tokio::test]
    async fn multiple_receivers_share_the_same_backlog() {
        let (tx, rx) = staging_queue::<u32>(8);
        let rx2 = rx.clone();
        tx.send(1).await.unwrap();
        tx.send(2).await.unwrap();

        let a = rx.recv().await.unwrap();
        let b = rx2.recv().await.unwrap();
        let mut got = vec![a, b];
        got.sort();
        assert_eq!(got, vec![1, 2]);
    }

    #[tokio::test]
    async fn send_blocks_until_room_when_queue_is_full() {
        let (tx, rx) = staging_queue::<u32>(1);
        tx.send(1).await.unwrap();

        let tx2 = tx.clone();
        let sent_second = tokio::spawn(async move { tx2.send(2).await });

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!sent_second.is_finished());

        assert_eq!(rx.recv().await, Some(1));
        sent_second.await.unwrap().unwrap();
        assert_eq!(rx.recv().await, Some(2));
    }
}
