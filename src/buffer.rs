use ringbuffer::{AllocRingBuffer, RingBuffer};

use crate::types::StreamEvent;

/// Bounded record of received events, for replay and inspection by
/// consumers. Oldest entries are dropped on overflow; reads come back
/// newest-first.
pub struct MessageBuffer {
    cap: usize,
    events: AllocRingBuffer<StreamEvent>,
}

impl MessageBuffer {
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            cap,
            events: AllocRingBuffer::new(cap),
        }
    }

    /// Append one event; the oldest entry is overwritten once full.
    pub fn push(&mut self, event: StreamEvent) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Snapshot of the buffered events, newest first.
    pub fn recent(&self) -> Vec<StreamEvent> {
        let mut out: Vec<StreamEvent> = self.events.iter().cloned().collect();
        out.reverse();
        out
    }
}
