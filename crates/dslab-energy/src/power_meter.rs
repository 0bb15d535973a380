//! Periodic power meter.

use std::cell::RefCell;
use std::fmt::{Display, Formatter};
use std::rc::Rc;
use std::str::FromStr;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use simcore::{log_debug, log_info, Event, EventHandler, EventId, SimulationContext};

use crate::cloud::{CloudService, PhysicalHost};
use crate::error::ConfigError;
use crate::events::power::{MeasurementTimeout, StopMeter};
use crate::output::{EnergyMeasurement, SimulationOutput};
use crate::workflow::{Task, Workflow};

/// How the power draw of running tasks is attributed to a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerAccountingModel {
    /// Every running task adds a flat per-core share of the dynamic power.
    Traditional,
    /// Utilization-based, the first tasks are charged in full and the rest with a decaying factor.
    Pairwise,
    /// Utilization-based, the decaying factor is reset periodically.
    Unpaired,
}

impl PowerAccountingModel {
    pub fn tag(&self) -> &'static str {
        match self {
            PowerAccountingModel::Traditional => "traditional",
            PowerAccountingModel::Pairwise => "pairwise",
            PowerAccountingModel::Unpaired => "unpaired",
        }
    }
}

impl Display for PowerAccountingModel {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

impl FromStr for PowerAccountingModel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "traditional" => Ok(PowerAccountingModel::Traditional),
            "pairwise" => Ok(PowerAccountingModel::Pairwise),
            "unpaired" => Ok(PowerAccountingModel::Unpaired),
            _ => Err(ConfigError::UnknownPowerModel(s.to_string())),
        }
    }
}

/// Tuned coefficients of the utilization-based power accounting.
///
/// These are empirical fits, not physical constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerCoefficients {
    /// Dynamic power is split evenly between sockets.
    pub sockets: f64,
    /// Share of socket dynamic power charged to a single task.
    pub cores_per_socket: f64,
    /// Pairwise model: number of tasks charged without decay.
    pub pairwise_full_tasks: usize,
    pub pairwise_decay: f64,
    /// Unpaired model: the decay factor is reset for every n-th task.
    pub unpaired_reset_every: usize,
    pub unpaired_decay: f64,
    pub pairwise_io_overhead: f64,
    pub unpaired_io_overhead: f64,
    pub iowait_factor: f64,
}

impl Default for PowerCoefficients {
    fn default() -> Self {
        Self {
            sockets: 2.,
            cores_per_socket: 6.,
            pairwise_full_tasks: 2,
            pairwise_decay: 0.88,
            unpaired_reset_every: 6,
            unpaired_decay: 0.9,
            pairwise_io_overhead: 0.486,
            unpaired_io_overhead: 0.213,
            iowait_factor: 1.31,
        }
    }
}

/// Computes the power draw of a host running the given tasks.
///
/// Tasks must be passed in a stable order (by id), utilization-based models depend on it.
/// Without tasks the result is the host's idle power.
pub fn compute_host_power(
    host: &PhysicalHost,
    tasks: &[&Task],
    model: PowerAccountingModel,
    coefficients: &PowerCoefficients,
) -> f64 {
    let dynamic_range = host.max_power - host.min_power;
    let mut power = host.min_power;
    let mut factor = 1.;
    for (index, task) in tasks.iter().enumerate() {
        if model == PowerAccountingModel::Traditional {
            power += dynamic_range / host.cores as f64;
            continue;
        }
        let socket_power = dynamic_range * (task.avg_cpu / 100.) / coefficients.sockets;
        let share = socket_power / coefficients.cores_per_socket;
        let (mut consumption, io_overhead) = match model {
            PowerAccountingModel::Pairwise => {
                if index < coefficients.pairwise_full_tasks {
                    (share, coefficients.pairwise_io_overhead)
                } else {
                    let c = factor * share;
                    factor *= coefficients.pairwise_decay;
                    (c, coefficients.pairwise_io_overhead)
                }
            }
            _ => {
                if index % coefficients.unpaired_reset_every.max(1) == 0 {
                    factor = 1.;
                    (share, coefficients.unpaired_io_overhead)
                } else {
                    let c = factor * share;
                    factor *= coefficients.unpaired_decay;
                    (c, coefficients.unpaired_io_overhead)
                }
            }
        };
        consumption += consumption * io_overhead;
        consumption *= coefficients.iowait_factor;
        power += consumption;
    }
    power
}

enum MeterSignal {
    TimeoutElapsed,
    StopRequested,
    Unexpected,
}

impl MeterSignal {
    fn classify(event: &Event) -> Self {
        if event.data.is::<MeasurementTimeout>() {
            MeterSignal::TimeoutElapsed
        } else if event.data.is::<StopMeter>() {
            MeterSignal::StopRequested
        } else {
            MeterSignal::Unexpected
        }
    }
}

/// Samples the power draw of the metered hosts once per measurement period.
///
/// Only hosts with running tasks are sampled. The meter runs until it receives [`StopMeter`].
pub struct PowerMeter {
    hosts: Vec<String>,
    model: PowerAccountingModel,
    coefficients: PowerCoefficients,
    measurement_period: f64,
    next_measurement_time: f64,
    timeout_event: Option<EventId>,
    stopped: bool,
    cloud: Rc<RefCell<CloudService>>,
    workflow: Rc<RefCell<Workflow>>,
    output: Rc<RefCell<SimulationOutput>>,
    ctx: SimulationContext,
}

impl PowerMeter {
    pub fn new(
        hosts: Vec<String>,
        model: PowerAccountingModel,
        coefficients: PowerCoefficients,
        measurement_period: f64,
        cloud: Rc<RefCell<CloudService>>,
        workflow: Rc<RefCell<Workflow>>,
        output: Rc<RefCell<SimulationOutput>>,
        ctx: SimulationContext,
    ) -> Result<Self, ConfigError> {
        if hosts.is_empty() {
            return Err(ConfigError::NoMeteredHosts);
        }
        if measurement_period < 1. {
            return Err(ConfigError::InvalidMeasurementPeriod(measurement_period));
        }
        if let Some(unknown) = hosts.iter().find(|h| cloud.borrow().host(h).is_none()) {
            return Err(ConfigError::UnknownHost(unknown.clone()));
        }
        Ok(Self {
            hosts,
            model,
            coefficients,
            measurement_period,
            next_measurement_time: 0.,
            timeout_event: None,
            stopped: false,
            cloud,
            workflow,
            output,
            ctx,
        })
    }

    pub fn model(&self) -> PowerAccountingModel {
        self.model
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Schedules the first measurement at the current time.
    pub fn start(&mut self) {
        log_info!(self.ctx, "started {} power meter for {} hosts", self.model, self.hosts.len());
        self.timeout_event = Some(self.ctx.emit_self_now(MeasurementTimeout {}));
    }

    fn on_timeout(&mut self) {
        self.timeout_event = None;
        if self.stopped {
            return;
        }
        let now = self.ctx.time();
        if now >= self.next_measurement_time {
            self.measure(now);
            self.next_measurement_time = now + self.measurement_period;
        }
        self.timeout_event = Some(self.ctx.emit_self(MeasurementTimeout {}, self.measurement_period));
    }

    fn measure(&mut self, now: f64) {
        let workflow = self.workflow.borrow();
        let cloud = self.cloud.borrow();
        let running_per_host = workflow
            .tasks()
            .iter()
            .filter(|t| t.is_running())
            .filter_map(|t| t.execution_host.as_deref().map(|h| (h, t)))
            .into_group_map();
        for host_name in &self.hosts {
            let tasks = match running_per_host.get(host_name.as_str()) {
                Some(tasks) => tasks,
                None => continue,
            };
            let host = match cloud.host(host_name) {
                Some(host) => host,
                None => continue,
            };
            let power = compute_host_power(host, tasks, self.model, &self.coefficients);
            log_debug!(
                self.ctx,
                "{} power of {} with {} tasks: {:.3} W",
                self.model,
                host_name,
                tasks.len(),
                power
            );
            self.output.borrow_mut().add_measurement(EnergyMeasurement {
                host: host_name.clone(),
                model: self.model.tag().to_string(),
                power,
                time: now,
                period: self.measurement_period,
            });
        }
    }

    fn stop(&mut self) {
        if let Some(event_id) = self.timeout_event.take() {
            self.ctx.cancel_event(event_id);
        }
        if !self.stopped {
            self.stopped = true;
            log_info!(self.ctx, "stopped {} power meter", self.model);
        }
    }
}

impl EventHandler for PowerMeter {
    fn on(&mut self, event: Event) {
        match MeterSignal::classify(&event) {
            MeterSignal::TimeoutElapsed => self.on_timeout(),
            MeterSignal::StopRequested => self.stop(),
            MeterSignal::Unexpected => panic!(
                "power meter {} got unexpected event {} from component {}",
                self.ctx.name(),
                event.id,
                self.ctx.lookup_name(event.src)
            ),
        }
    }
}
