// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Bounded event reservoirs with FIFO eviction.
//!
//! Events buffer here between harvests. When a reservoir is full the oldest
//! event is evicted so memory stays bounded under load; evictions are counted
//! and reported as a supportability metric at harvest time.

use std::collections::VecDeque;

use tracing::warn;

pub struct EventReservoir<T> {
    queue: VecDeque<T>,
    capacity: usize,
    dropped: u64,
}

impl<T> EventReservoir<T> {
    #[must_use]
    pub fn new(capacity: usize) -> EventReservoir<T> {
        EventReservoir {
            queue: VecDeque::with_capacity(capacity.min(1_024)),
            capacity,
            dropped: 0,
        }
    }

    /// Adds an event, evicting the oldest one when full.
    pub fn add(&mut self, event: T) {
        if self.queue.len() >= self.capacity {
            self.queue.pop_front();
            self.dropped += 1;
            warn!(
                capacity = self.capacity,
                "event reservoir full, dropping oldest event"
            );
        }
        self.queue.push_back(event);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Drains buffered events and the drop count since the last drain.
    pub fn drain(&mut self) -> (Vec<T>, u64) {
        let dropped = std::mem::take(&mut self.dropped);
        (self.queue.drain(..).collect(), dropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_eviction_at_capacity() {
        let mut reservoir = EventReservoir::new(3);
        for i in 0..5 {
            reservoir.add(i);
        }
        assert_eq!(reservoir.len(), 3);
        let (events, dropped) = reservoir.drain();
        assert_eq!(events, vec![2, 3, 4]);
        assert_eq!(dropped, 2);
    }

    #[test]
    fn test_drain_resets_drop_count() {
        let mut reservoir = EventReservoir::new(1);
        reservoir.add(1);
        reservoir.add(2);
        let (_, dropped) = reservoir.drain();
        assert_eq!(dropped, 1);
        reservoir.add(3);
        let (events, dropped) = reservoir.drain();
        assert_eq!(events, vec![3]);
        assert_eq!(dropped, 0);
    }
}
