//! Component logging.
//!
//! Messages go through the [`log`] crate with the component name as the target, so `RUST_LOG=cloud=debug`
//! enables debug output of a single component. Every line starts with `[time LEVEL component]`.

use atty::Stream;
use colored::{Color, ColoredString, Colorize};
use log::error;
use serde_json::json;
use serde_type_name::type_name;

use crate::event::Event;

/// Colors `s` when stderr is a terminal, leaves it plain otherwise.
pub fn get_colored(s: &str, color: Color) -> ColoredString {
    match atty::is(Stream::Stderr) {
        true => s.color(color),
        false => s.normal(),
    }
}

#[doc(hidden)]
#[macro_export]
macro_rules! __log_with_level {
    ($level:ident, $label:expr, $color:ident, $ctx:expr, $msg:expr) => (
        log::$level!(
            target: $ctx.name(),
            "[{:.3} {} {}] {}",
            $ctx.time(), $crate::log::get_colored($label, $crate::colored::Color::$color), $ctx.name(), $msg
        )
    );
    ($level:ident, $label:expr, $color:ident, $ctx:expr, $format:expr, $($arg:tt)+) => (
        log::$level!(
            target: $ctx.name(),
            concat!("[{:.3} {} {}] ", $format),
            $ctx.time(), $crate::log::get_colored($label, $crate::colored::Color::$color), $ctx.name(), $($arg)+
        )
    );
}

/// Logs at `INFO` on behalf of the component owning `ctx`.
///
/// The first argument is anything with `name()` and `time()`, usually a [`SimulationContext`](crate::SimulationContext).
/// The rest follows `format!` syntax.
///
/// ```rust
/// use simcore::{log_info, Simulation};
///
/// let _ = env_logger::builder().is_test(true).try_init();
/// let mut sim = Simulation::new();
/// let ctx = sim.create_context("host_manager");
/// log_info!(ctx, "host {} turned on", "h0");
/// ```
#[macro_export]
macro_rules! log_info {
    ($ctx:expr, $($arg:tt)+) => ($crate::__log_with_level!(info, "INFO ", Green, $ctx, $($arg)+));
}

/// Logs at `DEBUG`, see [`log_info!`](crate::log_info!).
#[macro_export]
macro_rules! log_debug {
    ($ctx:expr, $($arg:tt)+) => ($crate::__log_with_level!(debug, "DEBUG", Blue, $ctx, $($arg)+));
}

/// Logs at `TRACE`, see [`log_info!`](crate::log_info!).
#[macro_export]
macro_rules! log_trace {
    ($ctx:expr, $($arg:tt)+) => ($crate::__log_with_level!(trace, "TRACE", Cyan, $ctx, $($arg)+));
}

/// Logs at `WARN`, see [`log_info!`](crate::log_info!).
#[macro_export]
macro_rules! log_warn {
    ($ctx:expr, $($arg:tt)+) => ($crate::__log_with_level!(warn, "WARN ", Yellow, $ctx, $($arg)+));
}

/// Logs at `ERROR`, see [`log_info!`](crate::log_info!).
#[macro_export]
macro_rules! log_error {
    ($ctx:expr, $($arg:tt)+) => ($crate::__log_with_level!(error, "ERROR", Red, $ctx, $($arg)+));
}

pub(crate) fn event_to_json(event: &Event, src: serde_json::Value) -> serde_json::Value {
    json!({
        "type": type_name(&event.data).unwrap_or("unknown"),
        "data": event.data,
        "src": src,
        "dst": event.dst,
    })
}

fn log_dropped_event(reason: &str, event: &Event) {
    error!(
        target: "simulation",
        "[{:.3} {} simulation] {} event: {}",
        event.time,
        get_colored("ERROR", Color::Red),
        reason,
        event_to_json(event, json!(event.src))
    );
}

/// Reports an event that no arm of [`cast!`](crate::cast!) matched.
pub fn log_unhandled_event(event: Event) {
    log_dropped_event("Unhandled", &event);
}

pub(crate) fn log_undelivered_event(event: Event) {
    log_dropped_event("Undelivered", &event);
}
