use std::cell::RefCell;
use std::rc::Rc;

use sugars::{rc, refcell};

use simcore::{Id, Simulation};

use dslab_energy::cloud::{CloudService, PhysicalHost, StandardJob};
use dslab_energy::error::ConfigError;
use dslab_energy::events::job::JobCompleted;
use dslab_energy::events::power::StopMeter;
use dslab_energy::output::{EnergyMeasurement, SimulationOutput};
use dslab_energy::power_meter::{compute_host_power, PowerAccountingModel, PowerCoefficients, PowerMeter};
use dslab_energy::workflow::{Task, Workflow};

fn assert_float_eq(x: f64, y: f64, eps: f64) {
    assert!((x - y).abs() < eps, "{} != {}", x, y);
}

fn host(min_power: f64, max_power: f64, cores: u32) -> PhysicalHost {
    PhysicalHost::new("h0", cores, 16_000_000_000, 1e9, min_power, max_power)
}

fn tasks_with_cpu(cpu: &[f64]) -> Workflow {
    let mut workflow = Workflow::new();
    for (i, &c) in cpu.iter().enumerate() {
        workflow.add_task(&format!("task{}", i), 1e9, c);
    }
    workflow
}

fn power(host: &PhysicalHost, workflow: &Workflow, model: PowerAccountingModel) -> f64 {
    let tasks: Vec<&Task> = workflow.tasks().iter().collect();
    compute_host_power(host, &tasks, model, &PowerCoefficients::default())
}

#[test]
fn test_traditional_power() {
    let host = host(100., 200., 4);
    let workflow = tasks_with_cpu(&[30.]);
    let power = power(&host, &workflow, PowerAccountingModel::Traditional);
    assert_float_eq(power, 125., 1e-9);

    // energy added by the task over a 60 s measurement period
    let measurement = EnergyMeasurement {
        host: "h0".to_string(),
        model: "traditional".to_string(),
        power,
        time: 60.,
        period: 60.,
    };
    assert_float_eq(measurement.energy_wh() - 100. * 60. / 3600., 0.41667, 1e-5);
}

#[test]
fn test_traditional_power_ignores_utilization() {
    let host = host(100., 200., 4);
    let low = power(&host, &tasks_with_cpu(&[10., 10.]), PowerAccountingModel::Traditional);
    let high = power(&host, &tasks_with_cpu(&[100., 100.]), PowerAccountingModel::Traditional);
    assert_float_eq(low, 150., 1e-9);
    assert_float_eq(high, 150., 1e-9);
}

#[test]
fn test_pairwise_power() {
    let host = host(100., 220., 12);
    // per-task share is 120 / 2 / 6 = 10 W at full utilization
    let three = power(&host, &tasks_with_cpu(&[100.; 3]), PowerAccountingModel::Pairwise);
    assert_float_eq(three, 158.3998, 1e-6);
    let four = power(&host, &tasks_with_cpu(&[100.; 4]), PowerAccountingModel::Pairwise);
    assert_float_eq(four, 175.530408, 1e-6);
}

#[test]
fn test_unpaired_power() {
    let host = host(100., 220., 12);
    let power = power(&host, &tasks_with_cpu(&[100.; 7]), PowerAccountingModel::Unpaired);
    assert_float_eq(power, 196.85296753, 1e-6);
}

#[test]
fn test_utilization_scales_power() {
    let host = host(100., 220., 12);
    let half = power(&host, &tasks_with_cpu(&[50.]), PowerAccountingModel::Unpaired);
    let full = power(&host, &tasks_with_cpu(&[100.]), PowerAccountingModel::Unpaired);
    assert_float_eq(full - 100., 2. * (half - 100.), 1e-9);
}

#[test]
fn test_idle_host_power() {
    let host = host(100., 200., 4);
    for model in [
        PowerAccountingModel::Traditional,
        PowerAccountingModel::Pairwise,
        PowerAccountingModel::Unpaired,
    ] {
        assert_float_eq(compute_host_power(&host, &[], model, &PowerCoefficients::default()), 100., 1e-12);
    }
}

#[test]
fn test_model_names() {
    assert_eq!("Pairwise".parse::<PowerAccountingModel>().unwrap(), PowerAccountingModel::Pairwise);
    assert_eq!("unpaired".parse::<PowerAccountingModel>().unwrap(), PowerAccountingModel::Unpaired);
    assert_eq!(PowerAccountingModel::Traditional.to_string(), "traditional");
    assert!(matches!(
        "linear".parse::<PowerAccountingModel>(),
        Err(ConfigError::UnknownPowerModel(name)) if name == "linear"
    ));
}

struct MeterSetup {
    sim: Simulation,
    workflow: Rc<RefCell<Workflow>>,
    cloud: Rc<RefCell<CloudService>>,
    output: Rc<RefCell<SimulationOutput>>,
    requester: Id,
}

fn meter_setup(task_flops: f64) -> MeterSetup {
    let mut sim = Simulation::new();
    let mut workflow = Workflow::new();
    workflow.add_task("task0", task_flops, 100.);
    let workflow = rc!(refcell!(workflow));
    let cloud = rc!(refcell!(CloudService::new(workflow.clone(), sim.create_context("cloud"))));
    sim.add_handler("cloud", cloud.clone());
    cloud.borrow_mut().add_host(host(100., 200., 4));
    let requester = sim.create_context("wms").id();
    MeterSetup {
        sim,
        workflow,
        cloud,
        output: rc!(refcell!(SimulationOutput::new())),
        requester,
    }
}

fn new_meter(setup: &mut MeterSetup, hosts: &[&str], period: f64) -> Result<PowerMeter, ConfigError> {
    PowerMeter::new(
        hosts.iter().map(|h| h.to_string()).collect(),
        PowerAccountingModel::Traditional,
        PowerCoefficients::default(),
        period,
        setup.cloud.clone(),
        setup.workflow.clone(),
        setup.output.clone(),
        setup.sim.create_context("power_meter"),
    )
}

fn add_meter(setup: &mut MeterSetup, period: f64) -> (Rc<RefCell<PowerMeter>>, Id) {
    let meter = match new_meter(setup, &["h0"], period) {
        Ok(meter) => rc!(refcell!(meter)),
        Err(e) => panic!("can't create power meter: {}", e),
    };
    let id = setup.sim.add_handler("power_meter", meter.clone());
    (meter, id)
}

fn start_task(setup: &MeterSetup) {
    let mut cloud = setup.cloud.borrow_mut();
    let vm = cloud.create_vm(1, 1_000_000_000);
    cloud.start_vm(vm, None).unwrap();
    let job = StandardJob {
        task: 0,
        file_locations: Default::default(),
    };
    cloud.submit_job(job, vm, setup.requester).unwrap();
}

#[test]
fn test_meter_samples_running_tasks() {
    let mut setup = meter_setup(150e9);
    let (meter, meter_id) = add_meter(&mut setup, 60.);
    meter.borrow_mut().start();
    start_task(&setup);

    setup.sim.step_for_duration(200.);
    assert_eq!(setup.sim.time(), 180.);
    {
        let output = setup.output.borrow();
        // the task runs from 0 to 150, at time 0 it is not started yet
        let times: Vec<f64> = output.measurements().iter().map(|m| m.time).collect();
        assert_eq!(times, vec![60., 120.]);
        for m in output.measurements() {
            assert_eq!(m.host, "h0");
            assert_eq!(m.model, "traditional");
            assert_float_eq(m.power, 125., 1e-9);
            assert_float_eq(m.energy_wh(), 125. * 60. / 3600., 1e-9);
        }
        assert_float_eq(output.total_energy("traditional"), 2. * 125. * 60. / 3600., 1e-9);
        assert_eq!(output.measurements_for_host("h0").count(), 2);
        assert_eq!(output.measurements_for_model("pairwise").count(), 0);
    }

    let mut ctx = setup.sim.create_context("test");
    ctx.emit_now(StopMeter {}, meter_id);
    setup.sim.step_until_no_events();
    assert!(meter.borrow().is_stopped());
    assert_eq!(setup.sim.time(), 180.);
    assert_eq!(setup.output.borrow().measurements().len(), 2);
}

#[test]
fn test_meter_without_running_tasks_records_nothing() {
    let mut setup = meter_setup(1e9);
    let (meter, meter_id) = add_meter(&mut setup, 1.);
    meter.borrow_mut().start();

    setup.sim.step_for_duration(10.);
    assert!(setup.output.borrow().measurements().is_empty());

    let mut ctx = setup.sim.create_context("test");
    ctx.emit_now(StopMeter {}, meter_id);
    setup.sim.step_until_no_events();
    assert!(meter.borrow().is_stopped());
}

#[test]
fn test_meter_validation() {
    let mut setup = meter_setup(1e9);
    assert!(matches!(new_meter(&mut setup, &[], 1.), Err(ConfigError::NoMeteredHosts)));
    assert!(matches!(
        new_meter(&mut setup, &["h0"], 0.5),
        Err(ConfigError::InvalidMeasurementPeriod(_))
    ));
    assert!(matches!(
        new_meter(&mut setup, &["h0", "h9"], 1.),
        Err(ConfigError::UnknownHost(host)) if host == "h9"
    ));
    assert!(new_meter(&mut setup, &["h0"], 1.).is_ok());
}

#[test]
#[should_panic(expected = "unexpected event")]
fn test_meter_rejects_unexpected_event() {
    let mut setup = meter_setup(1e9);
    let (_meter, meter_id) = add_meter(&mut setup, 1.);
    let mut ctx = setup.sim.create_context("test");
    ctx.emit_now(JobCompleted { task: 0, vm: 0 }, meter_id);
    setup.sim.step();
}
