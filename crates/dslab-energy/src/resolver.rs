//! Construction of scheduling algorithms and cost models from their config names.

use simcore::SimulationContext;

use crate::config::options::AlgorithmParams;
use crate::cost_model::{CostModel, TraditionalPowerModel};
use crate::error::ConfigError;
use crate::scheduling_algorithm::{SchedulingAlgorithm, VmSpec};
use crate::scheduling_algorithms::balanced_host_affinity::{BalanceParams, BalancedHostAffinity};
use crate::scheduling_algorithms::cost_ranked_pool_reuse::CostRankedPoolReuse;
use crate::scheduling_algorithms::host_affinity::HostAffinity;
use crate::scheduling_algorithms::idle_capacity_first::IdleCapacityFirst;
use crate::scheduling_algorithms::simple_pool_reuse::SimplePoolReuse;

pub fn cost_model_resolver(name: &str) -> Result<Box<dyn CostModel>, ConfigError> {
    match name {
        "Traditional" => Ok(Box::new(TraditionalPowerModel::new())),
        _ => Err(ConfigError::UnknownCostModel(name.to_string())),
    }
}

/// Creates the scheduling algorithm described by a config value such as
/// `CostRankedPoolReuse[cost_model=Traditional]` or `BalancedHostAffinity[max_batch_size=24]`.
///
/// Options given in the config value override `balance`.
pub fn scheduling_algorithm_resolver(
    config_str: &str,
    vm_spec: VmSpec,
    balance: BalanceParams,
    ctx: SimulationContext,
) -> Result<Box<dyn SchedulingAlgorithm>, ConfigError> {
    let params = AlgorithmParams::parse(config_str)?;
    match params.name() {
        "SimplePoolReuse" => {
            params.check_keys(&[])?;
            Ok(Box::new(SimplePoolReuse::new(vm_spec, ctx)))
        }
        "CostRankedPoolReuse" => {
            params.check_keys(&["cost_model"])?;
            let cost_model = cost_model_resolver(&params.get_or("cost_model", "Traditional".to_string())?)?;
            Ok(Box::new(CostRankedPoolReuse::new(cost_model, vm_spec, ctx)))
        }
        "HostAffinity" => {
            params.check_keys(&[])?;
            Ok(Box::new(HostAffinity::new(vm_spec, ctx)))
        }
        "BalancedHostAffinity" => {
            params.check_keys(&["max_batch_size", "host_capacity"])?;
            let balance = BalanceParams {
                max_batch_size: params.get_or("max_batch_size", balance.max_batch_size)?,
                host_capacity: params.get_or("host_capacity", balance.host_capacity)?,
            };
            if balance.host_capacity == 0 {
                return Err(ConfigError::InvalidOption("host_capacity=0".to_string()));
            }
            Ok(Box::new(BalancedHostAffinity::new(balance, vm_spec, ctx)))
        }
        "IdleCapacityFirst" => {
            params.check_keys(&[])?;
            Ok(Box::new(IdleCapacityFirst::new(vm_spec, ctx)))
        }
        _ => Err(ConfigError::UnknownAlgorithm(params.name().to_string())),
    }
}
