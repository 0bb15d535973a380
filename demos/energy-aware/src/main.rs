use std::io::Write;

use clap::Parser;
use env_logger::Builder;

use dslab_energy::config::sim_config::SimulationConfig;
use dslab_energy::simulation::EnergyAwareSimulation;
use dslab_energy::workflow::Workflow;
use simcore::Simulation;

const ALGORITHMS: &[&str] = &[
    "SimplePoolReuse",
    "CostRankedPoolReuse[cost_model=Traditional]",
    "HostAffinity",
    "BalancedHostAffinity",
    "BalancedHostAffinity[max_batch_size=24,host_capacity=6]",
    "IdleCapacityFirst",
];

#[derive(Parser, Debug)]
#[command(about, long_about = None)]
/// Runs a fork-join workflow with energy-aware scheduling algorithms and outputs makespan and consumed energy.
struct Args {
    /// Path to simulation config
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Number of parallel tasks in the workflow
    #[arg(short, long, default_value_t = 100)]
    tasks: usize,

    /// Scheduling algorithm overriding the one from config, e.g. "HostAffinity"
    #[arg(short, long)]
    algorithm: Option<String>,

    /// Compare all scheduling algorithms
    #[arg(long)]
    all: bool,
}

/// Stage-in task, `width` processing tasks of varying size and utilization, and a stage-out task.
fn fork_join_workflow(width: usize) -> Workflow {
    let mut workflow = Workflow::new();
    let stage_in = workflow.add_task("stage_in", 30e9, 20.);
    workflow.add_output(stage_in, "input.dat");
    let stage_out = workflow.add_task("stage_out", 60e9, 35.);
    for i in 0..width {
        let flops = (1 + i % 4) as f64 * 150e9;
        let cpu = 40. + ((i * 17) % 60) as f64;
        let task = workflow.add_task(&format!("process_{}", i), flops, cpu);
        workflow.add_input(task, "input.dat");
        workflow.add_output(task, &format!("part_{}.dat", i));
        workflow.add_input(stage_out, &format!("part_{}.dat", i));
        workflow.add_dependency(stage_in, task);
        workflow.add_dependency(task, stage_out);
    }
    workflow
}

fn main() {
    Builder::from_default_env()
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .init();

    let args = Args::parse();
    let base_config = match SimulationConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };
    let algorithms: Vec<String> = if args.all {
        ALGORITHMS.iter().map(|a| a.to_string()).collect()
    } else {
        vec![args
            .algorithm
            .clone()
            .unwrap_or_else(|| base_config.scheduling_algorithm.clone())]
    };
    let width = algorithms.iter().map(|a| a.len()).max().unwrap_or(0);

    println!("\nConfig: {} ({} hosts)", args.config, base_config.number_of_hosts());
    println!("Workflow: fork-join with {} parallel tasks\n", args.tasks);
    println!(
        "{:>width$}  {:>10}  {:>12}  {:>12}  {:>12}",
        "algorithm", "makespan", "traditional", "pairwise", "unpaired"
    );
    for algorithm in algorithms {
        let mut config = base_config.clone();
        config.scheduling_algorithm = algorithm.clone();
        let mut sim = match EnergyAwareSimulation::new(Simulation::new(), config, fork_join_workflow(args.tasks)) {
            Ok(sim) => sim,
            Err(e) => {
                eprintln!("{}: {}", algorithm, e);
                continue;
            }
        };
        sim.step_until_no_events();
        let makespan = match sim.makespan() {
            Some(makespan) => format!("{:.2}", makespan),
            None => "stalled".to_string(),
        };
        let output = sim.output();
        println!(
            "{:>width$}  {:>10}  {:>12.3}  {:>12.3}  {:>12.3}",
            algorithm,
            makespan,
            output.total_energy("traditional"),
            output.total_energy("pairwise"),
            output.total_energy("unpaired")
        );
    }
}
