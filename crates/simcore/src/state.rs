use std::collections::{BinaryHeap, HashSet};

use crate::component::Id;
use crate::event::{Event, EventData, EventId};

/// Tolerance for comparing simulation times.
pub const EPSILON: f64 = 1e-12;

pub struct SimulationState {
    now: f64,
    queue: BinaryHeap<Event>,
    cancelled: HashSet<EventId>,
    next_event_id: EventId,
    names: Vec<String>,
}

impl SimulationState {
    pub fn new() -> Self {
        Self {
            now: 0.,
            queue: BinaryHeap::new(),
            cancelled: HashSet::new(),
            next_event_id: 0,
            names: Vec::new(),
        }
    }

    pub fn time(&self) -> f64 {
        self.now
    }

    pub fn register_name(&mut self, name: &str) -> Id {
        self.names.push(name.to_string());
        (self.names.len() - 1) as Id
    }

    pub fn lookup_name(&self, id: Id) -> String {
        match self.names.get(id as usize) {
            Some(name) => name.clone(),
            None => panic!("no component with id {}", id),
        }
    }

    pub fn add_event<T: EventData>(&mut self, data: T, src: Id, dst: Id, delay: f64) -> EventId {
        assert!(
            delay >= -EPSILON,
            "can't emit an event into the past (delay {})",
            delay
        );
        let id = self.next_event_id;
        self.next_event_id += 1;
        self.queue.push(Event {
            id,
            time: self.now + delay.max(0.),
            src,
            dst,
            data: Box::new(data),
        });
        id
    }

    /// Drops cancelled events from the head of the queue.
    fn skip_cancelled(&mut self) {
        while let Some(head) = self.queue.peek().map(|e| e.id) {
            if !self.cancelled.remove(&head) {
                break;
            }
            self.queue.pop();
        }
    }

    pub fn next_event(&mut self) -> Option<Event> {
        self.skip_cancelled();
        let event = self.queue.pop()?;
        self.now = event.time;
        Some(event)
    }

    pub fn peek_event(&mut self) -> Option<&Event> {
        self.skip_cancelled();
        self.queue.peek()
    }

    pub fn cancel_event(&mut self, id: EventId) {
        self.cancelled.insert(id);
    }

    pub fn event_count(&self) -> u64 {
        self.next_event_id
    }
}
