//! Simulation setup and stepping.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use colored::Color;
use log::Level::Trace;
use log::{debug, log_enabled, trace};
use serde_json::json;

use crate::component::Id;
use crate::context::SimulationContext;
use crate::event::Event;
use crate::handler::EventHandler;
use crate::log::{event_to_json, get_colored, log_undelivered_event};
use crate::state::SimulationState;

/// Owns the event queue and the registered components, delivers events one at a time.
pub struct Simulation {
    state: Rc<RefCell<SimulationState>>,
    ids: HashMap<String, Id>,
    handlers: Vec<Option<Rc<RefCell<dyn EventHandler>>>>,
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new()
    }
}

impl Simulation {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(SimulationState::new())),
            ids: HashMap::new(),
            handlers: Vec::new(),
        }
    }

    fn component_id(&mut self, name: &str) -> Id {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }
        let id = self.state.borrow_mut().register_name(name);
        self.ids.insert(name.to_string(), id);
        self.handlers.push(None);
        id
    }

    fn log_setup(&self, what: &str, name: &str, id: Id) {
        debug!(
            target: "simulation",
            "[{:.3} {} simulation] {}: {}",
            self.time(),
            get_colored("DEBUG", Color::Blue),
            what,
            json!({"name": name, "id": id})
        );
    }

    /// Id of the component registered under `name`.
    ///
    /// ```rust
    /// use simcore::Simulation;
    ///
    /// let mut sim = Simulation::new();
    /// let ctx = sim.create_context("cloud");
    /// assert_eq!(sim.lookup_id("cloud"), Some(ctx.id()));
    /// assert_eq!(sim.lookup_id("wms"), None);
    /// ```
    pub fn lookup_id(&self, name: &str) -> Option<Id> {
        self.ids.get(name).copied()
    }

    /// Name of the component with the given id. Panics on unknown ids.
    pub fn lookup_name(&self, id: Id) -> String {
        self.state.borrow().lookup_name(id)
    }

    /// Registers a component (or reuses an existing one with the same name) and returns its context.
    ///
    /// ```rust
    /// use simcore::Simulation;
    ///
    /// let mut sim = Simulation::new();
    /// let first = sim.create_context("cloud");
    /// let second = sim.create_context("wms");
    /// assert_eq!((first.id(), second.id()), (0, 1));
    /// assert_eq!(sim.create_context("cloud").id(), first.id());
    /// ```
    pub fn create_context<S>(&mut self, name: S) -> SimulationContext
    where
        S: AsRef<str>,
    {
        let name = name.as_ref();
        let id = self.component_id(name);
        self.log_setup("Created context", name, id);
        SimulationContext::new(id, name, self.state.clone())
    }

    /// Makes `handler` receive the events addressed to the component `name`, returns the component id.
    pub fn add_handler<S>(&mut self, name: S, handler: Rc<RefCell<dyn EventHandler>>) -> Id
    where
        S: AsRef<str>,
    {
        let name = name.as_ref();
        let id = self.component_id(name);
        self.handlers[id as usize] = Some(handler);
        self.log_setup("Added handler", name, id);
        id
    }

    pub fn time(&self) -> f64 {
        self.state.borrow().time()
    }

    fn deliver(&self, event: Event) {
        let handler = match self.handlers.get(event.dst as usize) {
            Some(Some(handler)) => handler.clone(),
            _ => return log_undelivered_event(event),
        };
        if log_enabled!(Trace) {
            let dst = self.lookup_name(event.dst);
            trace!(
                target: &dst,
                "[{:.3} {} {}] {}",
                event.time,
                get_colored("EVENT", Color::BrightBlack),
                dst,
                event_to_json(&event, json!(self.lookup_name(event.src)))
            );
        }
        handler.borrow_mut().on(event);
    }

    /// Advances the clock to the next pending event and delivers it.
    ///
    /// Events addressed to components without a handler are logged and dropped.
    /// Returns `false` when the queue is empty.
    pub fn step(&mut self) -> bool {
        let next = self.state.borrow_mut().next_event();
        match next {
            Some(event) => {
                self.deliver(event);
                true
            }
            None => false,
        }
    }

    /// Makes at most `step_count` steps, returns `false` if the queue ran empty.
    pub fn steps(&mut self, step_count: u64) -> bool {
        (0..step_count).all(|_| self.step())
    }

    pub fn step_until_no_events(&mut self) {
        while self.step() {}
    }

    /// Delivers every event due within `duration` from now.
    ///
    /// Returns `false` if the queue ran empty, `true` if events remain past the horizon.
    pub fn step_for_duration(&mut self, duration: f64) -> bool {
        let horizon = self.time() + duration;
        loop {
            let next_time = self.state.borrow_mut().peek_event().map(|e| e.time);
            match next_time {
                Some(time) if time <= horizon => {
                    self.step();
                }
                Some(_) => return true,
                None => return false,
            }
        }
    }

    /// Number of events created so far, cancelled ones included.
    pub fn event_count(&self) -> u64 {
        self.state.borrow().event_count()
    }
}
