use std::cell::RefCell;
use std::rc::Rc;

use serde::Serialize;

use simcore::{cast, Event, EventHandler, Id, Simulation, SimulationContext};

#[derive(Clone, Serialize)]
struct Ping {
    hops_left: u32,
}

#[derive(Clone, Serialize)]
struct Tick {
    label: u32,
}

struct Recorder {
    ctx: SimulationContext,
    peer: Option<Id>,
    received: Vec<(f64, u32)>,
}

impl Recorder {
    fn new(ctx: SimulationContext) -> Self {
        Self {
            ctx,
            peer: None,
            received: Vec::new(),
        }
    }
}

impl EventHandler for Recorder {
    fn on(&mut self, event: Event) {
        cast!(match event.data {
            Ping { hops_left } => {
                self.received.push((self.ctx.time(), hops_left));
                if hops_left > 0 {
                    if let Some(peer) = self.peer {
                        self.ctx.emit(Ping { hops_left: hops_left - 1 }, peer, 0.5);
                    }
                }
            }
            Tick { label } => {
                self.received.push((self.ctx.time(), label));
            }
        })
    }
}

fn recorder(sim: &mut Simulation, name: &str) -> (Rc<RefCell<Recorder>>, Id) {
    let rec = Rc::new(RefCell::new(Recorder::new(sim.create_context(name))));
    let id = sim.add_handler(name, rec.clone());
    (rec, id)
}

#[test]
fn test_events_are_delivered_in_time_order() {
    let mut sim = Simulation::new();
    let (rec, id) = recorder(&mut sim, "rec");
    let mut client = sim.create_context("client");
    client.emit(Tick { label: 3 }, id, 3.0);
    client.emit(Tick { label: 1 }, id, 1.0);
    client.emit(Tick { label: 2 }, id, 2.0);
    sim.step_until_no_events();
    let labels: Vec<u32> = rec.borrow().received.iter().map(|(_, l)| *l).collect();
    assert_eq!(labels, vec![1, 2, 3]);
    assert_eq!(sim.time(), 3.0);
}

#[test]
fn test_simultaneous_events_keep_emission_order() {
    let mut sim = Simulation::new();
    let (rec, id) = recorder(&mut sim, "rec");
    let mut client = sim.create_context("client");
    for label in 0..5 {
        client.emit(Tick { label }, id, 1.0);
    }
    sim.step_until_no_events();
    let labels: Vec<u32> = rec.borrow().received.iter().map(|(_, l)| *l).collect();
    assert_eq!(labels, vec![0, 1, 2, 3, 4]);
}

#[test]
fn test_ping_pong_between_components() {
    let mut sim = Simulation::new();
    let (a, a_id) = recorder(&mut sim, "a");
    let (b, b_id) = recorder(&mut sim, "b");
    a.borrow_mut().peer = Some(b_id);
    b.borrow_mut().peer = Some(a_id);
    let mut client = sim.create_context("client");
    client.emit_now(Ping { hops_left: 3 }, a_id);
    sim.step_until_no_events();
    assert_eq!(a.borrow().received, vec![(0.0, 3), (1.0, 1)]);
    assert_eq!(b.borrow().received, vec![(0.5, 2), (1.5, 0)]);
    assert_eq!(sim.event_count(), 4);
}

#[test]
fn test_cancelled_event_is_not_delivered() {
    let mut sim = Simulation::new();
    let (rec, id) = recorder(&mut sim, "rec");
    let mut client = sim.create_context("client");
    client.emit(Tick { label: 1 }, id, 1.0);
    let cancelled = client.emit(Tick { label: 2 }, id, 2.0);
    client.emit(Tick { label: 3 }, id, 3.0);
    client.cancel_event(cancelled);
    sim.step_until_no_events();
    let labels: Vec<u32> = rec.borrow().received.iter().map(|(_, l)| *l).collect();
    assert_eq!(labels, vec![1, 3]);
}

#[test]
fn test_step_for_duration() {
    let mut sim = Simulation::new();
    let (rec, id) = recorder(&mut sim, "rec");
    let mut client = sim.create_context("client");
    client.emit(Tick { label: 1 }, id, 1.0);
    client.emit(Tick { label: 2 }, id, 2.0);
    client.emit(Tick { label: 3 }, id, 3.5);
    assert!(sim.step_for_duration(1.5));
    assert_eq!(sim.time(), 1.0);
    assert!(sim.step_for_duration(0.1));
    assert_eq!(rec.borrow().received.len(), 1);
    assert!(!sim.step_for_duration(3.0));
    assert_eq!(sim.time(), 3.5);
    assert_eq!(rec.borrow().received.len(), 3);
}

#[test]
fn test_event_without_handler_is_discarded() {
    let mut sim = Simulation::new();
    let mut client = sim.create_context("client");
    let silent = sim.create_context("silent");
    client.emit(Tick { label: 1 }, silent.id(), 1.0);
    assert!(sim.step());
    assert!(!sim.step());
    assert_eq!(sim.time(), 1.0);
}

#[test]
fn test_component_names_and_ids() {
    let mut sim = Simulation::new();
    let first = sim.create_context("first");
    let second = sim.create_context("second");
    let again = sim.create_context("first");
    assert_eq!(first.id(), 0);
    assert_eq!(second.id(), 1);
    assert_eq!(again.id(), first.id());
    assert_eq!(sim.lookup_id("second"), Some(1));
    assert_eq!(sim.lookup_name(1), "second");
    assert_eq!(first.lookup_name(second.id()), "second");
}

#[test]
#[should_panic]
fn test_negative_delay_panics() {
    let mut sim = Simulation::new();
    let mut ctx = sim.create_context("comp");
    ctx.emit_self(Tick { label: 0 }, -1.0);
}
