//! Component-side handle to the simulation.

use std::cell::RefCell;
use std::rc::Rc;

use crate::component::Id;
use crate::event::{EventData, EventId};
use crate::state::SimulationState;

/// Handle owned by a component: reads the clock and schedules events on behalf of the component.
///
/// Every event emitted through the context has the component as its source.
pub struct SimulationContext {
    id: Id,
    name: String,
    state: Rc<RefCell<SimulationState>>,
}

impl SimulationContext {
    pub(crate) fn new(id: Id, name: &str, state: Rc<RefCell<SimulationState>>) -> Self {
        Self {
            id,
            name: name.to_string(),
            state,
        }
    }

    pub fn id(&self) -> Id {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current simulation time.
    pub fn time(&self) -> f64 {
        self.state.borrow().time()
    }

    fn schedule<T: EventData>(&mut self, data: T, dst: Id, delay: f64) -> EventId {
        self.state.borrow_mut().add_event(data, self.id, dst, delay)
    }

    /// Schedules `data` for delivery to `dst` after `delay` time units.
    pub fn emit<T>(&mut self, data: T, dst: Id, delay: f64) -> EventId
    where
        T: EventData,
    {
        self.schedule(data, dst, delay)
    }

    /// Schedules `data` for delivery to `dst` at the current time.
    pub fn emit_now<T>(&mut self, data: T, dst: Id) -> EventId
    where
        T: EventData,
    {
        self.schedule(data, dst, 0.)
    }

    /// Schedules `data` for delivery to the component itself after `delay` time units.
    pub fn emit_self<T>(&mut self, data: T, delay: f64) -> EventId
    where
        T: EventData,
    {
        let id = self.id;
        self.schedule(data, id, delay)
    }

    /// Schedules `data` for delivery to the component itself at the current time.
    pub fn emit_self_now<T>(&mut self, data: T) -> EventId
    where
        T: EventData,
    {
        let id = self.id;
        self.schedule(data, id, 0.)
    }

    /// Drops a pending event. No-op for events that were already delivered.
    pub fn cancel_event(&mut self, event_id: EventId) {
        self.state.borrow_mut().cancel_event(event_id);
    }

    /// Name of the component with the given id.
    pub fn lookup_name(&self, id: Id) -> String {
        self.state.borrow().lookup_name(id)
    }
}
