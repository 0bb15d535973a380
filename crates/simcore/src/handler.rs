//! Event consumers.

use crate::event::Event;

/// Implemented by components that receive events.
pub trait EventHandler {
    fn on(&mut self, event: Event);
}

/// Dispatches an event by payload type.
///
/// Each arm names a payload struct and destructures it, arms are tried in order.
/// A payload of any other type is reported through [`log_unhandled_event`](crate::log::log_unhandled_event).
///
/// ```rust
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use serde::Serialize;
/// use simcore::{cast, Event, EventHandler, Simulation};
///
/// #[derive(Serialize)]
/// struct TaskDone {
///     flops: f64,
/// }
///
/// #[derive(Serialize)]
/// struct Reset {}
///
/// #[derive(Default)]
/// struct Counter {
///     total_flops: f64,
/// }
///
/// impl EventHandler for Counter {
///     fn on(&mut self, event: Event) {
///         cast!(match event.data {
///             TaskDone { flops } => {
///                 self.total_flops += flops;
///             }
///             Reset {} => {
///                 self.total_flops = 0.;
///             }
///         })
///     }
/// }
///
/// let mut sim = Simulation::new();
/// let counter = Rc::new(RefCell::new(Counter::default()));
/// let counter_id = sim.add_handler("counter", counter.clone());
/// let mut worker = sim.create_context("worker");
/// worker.emit(TaskDone { flops: 2e9 }, counter_id, 1.);
/// worker.emit(TaskDone { flops: 3e9 }, counter_id, 2.);
/// sim.step_until_no_events();
/// assert_eq!(counter.borrow().total_flops, 5e9);
/// assert_eq!(sim.time(), 2.);
/// ```
#[macro_export]
macro_rules! cast {
    ( match $event:ident.data { $( $type:ident { $($tt:tt)* } => { $($expr:tt)* } )+ } ) => {
        $(
            if $event.data.is::<$type>() {
                if let Ok(__value) = $event.data.downcast::<$type>() {
                    let $type { $($tt)* } = *__value;
                    $($expr)*
                }
            } else
        )*
        {
            $crate::log::log_unhandled_event($event);
        }
    }
}
