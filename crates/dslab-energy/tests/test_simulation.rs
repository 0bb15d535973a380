use simcore::Simulation;

use dslab_energy::config::sim_config::SimulationConfig;
use dslab_energy::error::ConfigError;
use dslab_energy::power_meter::PowerAccountingModel;
use dslab_energy::simulation::EnergyAwareSimulation;
use dslab_energy::workflow::Workflow;

fn name_wrapper(file_name: &str) -> String {
    format!("test-configs/{}", file_name)
}

/// Root task, `width` independent tasks and a final task joining them, every task takes 1 s.
fn fork_join(width: usize) -> Workflow {
    let mut workflow = Workflow::new();
    let root = workflow.add_task("root", 1e9, 60.);
    workflow.add_output(root, "root.out");
    let join = workflow.add_task("join", 1e9, 40.);
    for i in 0..width {
        let task = workflow.add_task(&format!("part{}", i), 1e9, 80.);
        workflow.add_input(task, "root.out");
        workflow.add_dependency(root, task);
        workflow.add_dependency(task, join);
    }
    workflow
}

fn config_with_algorithm(algorithm: &str) -> SimulationConfig {
    let mut config = SimulationConfig::from_file(&name_wrapper("config.yaml")).unwrap();
    config.scheduling_algorithm = algorithm.to_string();
    config
}

fn run(config: SimulationConfig, workflow: Workflow) -> EnergyAwareSimulation {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut sim = match EnergyAwareSimulation::new(Simulation::new(), config, workflow) {
        Ok(sim) => sim,
        Err(e) => panic!("can't build simulation: {}", e),
    };
    sim.step_until_no_events();
    sim
}

fn build_error(config: SimulationConfig) -> ConfigError {
    match EnergyAwareSimulation::new(Simulation::new(), config, fork_join(1)) {
        Ok(_) => panic!("simulation was built from an invalid config"),
        Err(e) => e,
    }
}

#[test]
fn test_config_loading() {
    let config = SimulationConfig::from_file(&name_wrapper("config.yaml")).unwrap();
    assert_eq!(config.number_of_hosts(), 2);
    let hosts = config.physical_hosts().unwrap();
    let names: Vec<&str> = hosts.iter().map(|h| h.name.as_str()).collect();
    assert_eq!(names, vec!["host1", "host2"]);
    assert_eq!(hosts[0].cores, 4);
    assert_eq!(config.measurement_period, 1.);
    assert_eq!(config.power_models.len(), 3);
    assert_eq!(config.scheduling_algorithm, "CostRankedPoolReuse[cost_model=Traditional]");
    assert_eq!(config.default_storage, "data_server");
    assert_eq!(config.balance.max_batch_size, 48);
}

#[test]
fn test_config_defaults() {
    let config = SimulationConfig::from_yaml("{}").unwrap();
    assert_eq!(config, SimulationConfig::default());
    assert!(config.physical_hosts().unwrap().is_empty());
}

#[test]
fn test_config_overrides_tuned_parameters() {
    let yaml = "
power_models: [Unpaired]
power_coefficients:
  unpaired_decay: 0.8
balance:
  host_capacity: 8
";
    let config = SimulationConfig::from_yaml(yaml).unwrap();
    assert_eq!(config.power_models, vec![PowerAccountingModel::Unpaired]);
    assert_eq!(config.power_coefficients.unpaired_decay, 0.8);
    assert_eq!(config.power_coefficients.sockets, 2.);
    assert_eq!(config.balance.host_capacity, 8);
    assert_eq!(config.balance.max_batch_size, 48);
}

#[test]
fn test_config_errors() {
    assert!(matches!(
        SimulationConfig::from_file(&name_wrapper("missing.yaml")),
        Err(ConfigError::Io { .. })
    ));
    assert!(matches!(
        SimulationConfig::from_yaml("power_models: [linear]"),
        Err(ConfigError::UnknownPowerModel(_))
    ));
    assert!(matches!(
        SimulationConfig::from_yaml("hosts: 3"),
        Err(ConfigError::Parse(_))
    ));
    let bad_host = SimulationConfig::from_file(&name_wrapper("bad-host.yaml")).unwrap();
    assert!(matches!(bad_host.physical_hosts(), Err(ConfigError::InvalidHost(_))));
}

#[test]
fn test_invalid_algorithms_are_rejected() {
    assert!(matches!(
        build_error(config_with_algorithm("RoundRobin")),
        ConfigError::UnknownAlgorithm(name) if name == "RoundRobin"
    ));
    assert!(matches!(
        build_error(config_with_algorithm("CostRankedPoolReuse[cost_model=Linear]")),
        ConfigError::UnknownCostModel(_)
    ));
    assert!(matches!(
        build_error(config_with_algorithm("HostAffinity[max_batch_size=4]")),
        ConfigError::InvalidOption(_)
    ));
    assert!(matches!(
        build_error(config_with_algorithm("BalancedHostAffinity[host_capacity=0]")),
        ConfigError::InvalidOption(_)
    ));
    assert!(matches!(
        build_error(config_with_algorithm("BalancedHostAffinity[max_batch_size=many]")),
        ConfigError::InvalidOption(_)
    ));
}

#[test]
fn test_invalid_measurement_period_is_rejected() {
    let mut config = SimulationConfig::from_file(&name_wrapper("config.yaml")).unwrap();
    config.measurement_period = 0.1;
    assert!(matches!(build_error(config), ConfigError::InvalidMeasurementPeriod(_)));
}

#[test]
fn test_empty_vm_size_is_rejected() {
    assert!(matches!(
        SimulationConfig::from_yaml("vm_cores: 0"),
        Err(ConfigError::InvalidOption(option)) if option == "vm_cores=0"
    ));
    assert!(matches!(
        SimulationConfig::from_yaml("vm_memory: 0"),
        Err(ConfigError::InvalidOption(option)) if option == "vm_memory=0"
    ));
    let mut config = SimulationConfig::from_file(&name_wrapper("config.yaml")).unwrap();
    config.vm_memory = 0;
    assert!(matches!(build_error(config), ConfigError::InvalidOption(_)));
}

#[test]
fn test_cost_ranked_run() {
    let sim = run(SimulationConfig::from_file(&name_wrapper("config.yaml")).unwrap(), fork_join(10));

    assert!(sim.is_finished());
    assert_eq!(sim.makespan(), Some(4.));
    assert_eq!(sim.current_time(), 4.);
    {
        let workflow = sim.workflow();
        let workflow = workflow.borrow();
        assert!(workflow.is_done());
        assert!(workflow.tasks().iter().all(|t| t.execution_host.is_some()));
    }

    // all VMs are stopped and every host is turned off at the end
    let cloud = sim.cloud();
    let cloud = cloud.borrow();
    assert!(cloud.vms().all(|vm| cloud.is_vm_down(vm.id)));
    for host in cloud.execution_hosts() {
        assert!(!cloud.is_host_on(&host), "{} is on", host);
    }

    assert_eq!(sim.power_meters().len(), 3);
    assert!(sim.power_meters().iter().all(|m| m.borrow().is_stopped()));
    let output = sim.output();
    for model in ["traditional", "pairwise", "unpaired"] {
        assert!(output.total_energy(model) > 0., "{}", model);
        assert!(output
            .measurements_for_model(model)
            .all(|m| m.power > 100. && m.time <= 4.));
    }
    assert!(output.to_json().unwrap().contains("\"unpaired\""));
}

#[test]
fn test_all_algorithms_complete_workflow() {
    for algorithm in [
        "SimplePoolReuse",
        "CostRankedPoolReuse",
        "HostAffinity",
        "BalancedHostAffinity[max_batch_size=6,host_capacity=3]",
        "IdleCapacityFirst",
    ] {
        let sim = run(config_with_algorithm(algorithm), fork_join(10));
        assert!(sim.is_finished(), "{}", algorithm);
        assert!(sim.workflow().borrow().is_done(), "{}", algorithm);
        // the critical path is 3 tasks long
        assert!(sim.makespan().unwrap() >= 3., "{}", algorithm);
        assert!(sim.output().total_energy("traditional") > 0., "{}", algorithm);
        assert!(sim.power_meters().iter().all(|m| m.borrow().is_stopped()), "{}", algorithm);
        let cloud = sim.cloud();
        let cloud = cloud.borrow();
        assert!(cloud.vms().all(|vm| cloud.is_vm_down(vm.id)), "{}", algorithm);
        for host in cloud.execution_hosts() {
            assert!(!cloud.is_host_on(&host), "{} is on with {}", host, algorithm);
        }
    }
}

#[test]
fn test_empty_workflow() {
    let sim = run(SimulationConfig::from_file(&name_wrapper("config.yaml")).unwrap(), Workflow::new());
    assert!(sim.is_finished());
    assert_eq!(sim.current_time(), 0.);
    assert!(sim.output().measurements().is_empty());
}

#[test]
fn test_stalled_workflow_stops_meters() {
    let mut config = SimulationConfig::from_file(&name_wrapper("config.yaml")).unwrap();
    // no host can fit a VM
    config.vm_memory = 1_000_000_000_000;
    let sim = run(config, fork_join(2));
    assert!(sim.is_finished());
    assert!(!sim.workflow().borrow().is_done());
    assert_eq!(sim.makespan(), None);
    assert_eq!(sim.cloud().borrow().vms().count(), 0);
}
