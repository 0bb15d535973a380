//! Simulation events.

use std::cmp::Ordering;

use downcast_rs::{impl_downcast, Downcast};
use serde::ser::Serialize;

use crate::component::Id;

/// Identifier of simulation event.
pub type EventId = u64;

/// Payload of simulation event.
///
/// Implemented automatically for every serializable type, so any `#[derive(Serialize)]` struct can be emitted.
pub trait EventData: Downcast + erased_serde::Serialize {}

impl_downcast!(EventData);

erased_serde::serialize_trait_object!(EventData);

impl<T: Serialize + 'static> EventData for T {}

/// Event delivered from one component to another at some simulation time.
pub struct Event {
    /// Unique event identifier, assigned in the order of event creation.
    pub id: EventId,
    /// Time of event delivery.
    pub time: f64,
    /// Identifier of event source component.
    pub src: Id,
    /// Identifier of event destination component.
    pub dst: Id,
    /// Event payload.
    pub data: Box<dyn EventData>,
}

impl Eq for Event {}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

// Inverted to turn BinaryHeap into min-heap by (time, id).
impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        other.time.total_cmp(&self.time).then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
