//! Hand-off queue between the viewfinder callback and the encoding worker.
//!
//! One mutex guards both the pending items and the running flag, and one
//! condition variable wakes the consumer. The consumer re-checks both on every
//! wake-up, so a spurious wake or a stop with an empty queue is handled the
//! same way.

use std::{
    collections::VecDeque,
    sync::{Condvar, Mutex, MutexGuard},
};

/// Log "queue full" at most every N drops.
const DROP_LOG_INTERVAL: u64 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueuePolicy {
    /// Never refuse a frame. A producer faster than the encoder grows the
    /// queue without limit.
    #[default]
    Unbounded,
    /// Refuse new frames once `capacity` frames are pending.
    DropNewest { capacity: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    /// The queue was full under [`QueuePolicy::DropNewest`].
    Dropped,
    /// The queue is not running.
    Rejected,
}

struct QueueState<T> {
    items: VecDeque<T>,
    running: bool,
    dropped: u64,
}

pub struct FrameQueue<T> {
    state: Mutex<QueueState<T>>,
    wake: Condvar,
    policy: QueuePolicy,
}

impl<T> FrameQueue<T> {
    /// Creates a stopped queue; pushes are rejected until [`FrameQueue::open`].
    pub fn new(policy: QueuePolicy) -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                running: false,
                dropped: 0,
            }),
            wake: Condvar::new(),
            policy,
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn policy(&self) -> QueuePolicy {
        self.policy
    }

    pub fn open(&self) {
        let mut state = self.lock();
        state.running = true;
        state.dropped = 0;
    }

    /// Clears the running flag and wakes every waiter. Items already queued
    /// stay poppable.
    pub fn close(&self) {
        let mut state = self.lock();
        state.running = false;
        drop(state);
        self.wake.notify_all();
    }

    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    /// Appends to the tail and signals one waiter. Never blocks on the
    /// consumer.
    pub fn push(&self, item: T) -> PushOutcome {
        let mut state = self.lock();
        if !state.running {
            return PushOutcome::Rejected;
        }
        if self.full(&state) {
            self.note_drop(&mut state);
            return PushOutcome::Dropped;
        }
        state.items.push_back(item);
        drop(state);
        self.wake.notify_one();
        PushOutcome::Queued
    }

    /// True when the capacity policy would refuse the next push.
    pub fn is_full(&self) -> bool {
        let state = self.lock();
        self.full(&state)
    }

    /// Counts a frame the producer refused before pushing it.
    pub fn record_drop(&self) {
        let mut state = self.lock();
        self.note_drop(&mut state);
    }

    fn full(&self, state: &QueueState<T>) -> bool {
        match self.policy {
            QueuePolicy::Unbounded => false,
            QueuePolicy::DropNewest { capacity } => state.items.len() >= capacity,
        }
    }

    fn note_drop(&self, state: &mut QueueState<T>) {
        state.dropped += 1;
        if state.dropped % DROP_LOG_INTERVAL == 1 {
            log::debug!(
                "frame queue full, dropped {} frames (policy {:?})",
                state.dropped,
                self.policy
            );
        }
    }

    /// Removes the head item, blocking while the queue is empty and running.
    /// Returns `None` once the queue is stopped and drained.
    pub fn pop_blocking(&self) -> Option<T> {
        let mut state = self.lock();
        loop {
            if let Some(item) = state.items.pop_front() {
                return Some(item);
            }
            if !state.running {
                return None;
            }
            state = self.wake.wait(state).unwrap_or_else(|e| e.into_inner());
        }
    }

    pub fn try_pop(&self) -> Option<T> {
        self.lock().items.pop_front()
    }

    /// Drops every pending item and returns how many there were.
    pub fn clear(&self) -> usize {
        let mut state = self.lock();
        let len = state.items.len();
        state.items.clear();
        len
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    /// Frames refused since the last [`FrameQueue::open`].
    pub fn dropped(&self) -> u64 {
        self.lock().dropped
    }
}

#[cfg(test)]
#[path = "queue_test.rs"]
mod queue_test;
