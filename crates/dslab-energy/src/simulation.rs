//! Simulation facade wiring the cloud, the scheduler, the power meters and the workflow manager.

use std::cell::{Ref, RefCell};
use std::rc::Rc;

use sugars::{rc, refcell};

use simcore::{log_info, Simulation, SimulationContext};

use crate::cloud::CloudService;
use crate::config::sim_config::SimulationConfig;
use crate::error::ConfigError;
use crate::job_scheduler::EnergyAwareJobScheduler;
use crate::output::SimulationOutput;
use crate::power_meter::PowerMeter;
use crate::resolver::scheduling_algorithm_resolver;
use crate::wms::WorkflowManager;
use crate::workflow::Workflow;

pub struct EnergyAwareSimulation {
    cloud: Rc<RefCell<CloudService>>,
    workflow: Rc<RefCell<Workflow>>,
    output: Rc<RefCell<SimulationOutput>>,
    meters: Vec<Rc<RefCell<PowerMeter>>>,
    wms: Rc<RefCell<WorkflowManager>>,
    sim: Simulation,
    ctx: SimulationContext,
    sim_config: Rc<SimulationConfig>,
}

impl EnergyAwareSimulation {
    /// Builds the simulation and starts the power meters and the workflow at the current time.
    pub fn new(mut sim: Simulation, sim_config: SimulationConfig, workflow: Workflow) -> Result<Self, ConfigError> {
        let workflow = rc!(refcell!(workflow));
        let output = rc!(refcell!(SimulationOutput::new()));

        // cloud with hosts
        let cloud = rc!(refcell!(CloudService::new(workflow.clone(), sim.create_context("cloud"))));
        sim.add_handler("cloud", cloud.clone());
        for host in sim_config.physical_hosts()? {
            cloud.borrow_mut().add_host(host);
        }

        // scheduler
        let algorithm = scheduling_algorithm_resolver(
            &sim_config.scheduling_algorithm,
            sim_config.vm_spec()?,
            sim_config.balance,
            sim.create_context("scheduling_algorithm"),
        )?;
        let scheduler = EnergyAwareJobScheduler::new(
            algorithm,
            &sim_config.default_storage,
            sim.create_context("job_scheduler"),
        );

        // one meter per power model, all hosts metered
        let hosts = cloud.borrow().execution_hosts();
        let mut meters = Vec::new();
        let mut meter_ids = Vec::new();
        for model in &sim_config.power_models {
            let name = format!("power_meter_{}", model.tag());
            let meter = rc!(refcell!(PowerMeter::new(
                hosts.clone(),
                *model,
                sim_config.power_coefficients,
                sim_config.measurement_period,
                cloud.clone(),
                workflow.clone(),
                output.clone(),
                sim.create_context(&name),
            )?));
            meter_ids.push(sim.add_handler(&name, meter.clone()));
            meters.push(meter);
        }

        let wms = rc!(refcell!(WorkflowManager::new(
            scheduler,
            cloud.clone(),
            workflow.clone(),
            meter_ids,
            sim.create_context("wms"),
        )));
        sim.add_handler("wms", wms.clone());

        let ctx = sim.create_context("simulation");
        log_info!(
            ctx,
            "{} hosts, algorithm {}, {} power meters",
            hosts.len(),
            sim_config.scheduling_algorithm,
            meters.len()
        );
        for meter in &meters {
            meter.borrow_mut().start();
        }
        wms.borrow_mut().start();

        Ok(Self {
            cloud,
            workflow,
            output,
            meters,
            wms,
            sim,
            ctx,
            sim_config: rc!(sim_config),
        })
    }

    /// Performs a single step through the simulation, returns `false` if there are no pending events.
    pub fn step(&mut self) -> bool {
        self.sim.step()
    }

    pub fn steps(&mut self, step_count: u64) -> bool {
        self.sim.steps(step_count)
    }

    pub fn step_until_no_events(&mut self) {
        self.sim.step_until_no_events();
    }

    pub fn step_for_duration(&mut self, duration: f64) -> bool {
        self.sim.step_for_duration(duration)
    }

    pub fn current_time(&self) -> f64 {
        self.ctx.time()
    }

    pub fn cloud(&self) -> Rc<RefCell<CloudService>> {
        self.cloud.clone()
    }

    pub fn workflow(&self) -> Rc<RefCell<Workflow>> {
        self.workflow.clone()
    }

    pub fn output(&self) -> Ref<SimulationOutput> {
        self.output.borrow()
    }

    pub fn power_meters(&self) -> &[Rc<RefCell<PowerMeter>>] {
        &self.meters
    }

    pub fn is_finished(&self) -> bool {
        self.wms.borrow().is_finished()
    }

    pub fn makespan(&self) -> Option<f64> {
        self.workflow.borrow().makespan()
    }

    pub fn sim_config(&self) -> &SimulationConfig {
        &self.sim_config
    }
}
