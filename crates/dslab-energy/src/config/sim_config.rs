//! Simulation configuration loaded from YAML.

use serde::{Deserialize, Serialize};

use crate::cloud::PhysicalHost;
use crate::error::ConfigError;
use crate::power_meter::{PowerAccountingModel, PowerCoefficients};
use crate::scheduling_algorithm::VmSpec;
use crate::scheduling_algorithms::balanced_host_affinity::BalanceParams;

/// Holds raw simulation config parsed from YAML file.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone, Default)]
struct RawSimulationConfig {
    pub hosts: Option<Vec<HostConfig>>,
    pub measurement_period: Option<f64>,
    pub power_models: Option<Vec<String>>,
    pub scheduling_algorithm: Option<String>,
    pub vm_cores: Option<u32>,
    pub vm_memory: Option<u64>,
    pub default_storage: Option<String>,
    pub power_coefficients: Option<PowerCoefficients>,
    pub balance: Option<BalanceParams>,
}

/// Holds configuration of a single physical host or a set of identical hosts.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct HostConfig {
    /// Host name.
    /// Should be set if count = 1.
    pub name: Option<String>,
    /// Host name prefix.
    /// Full name is produced by appending host instance number to the prefix.
    /// Should be set if count > 1.
    pub name_prefix: Option<String>,
    pub cores: u32,
    /// Memory capacity in bytes.
    pub memory: u64,
    /// Per-core speed in flop/s.
    pub speed: f64,
    /// Idle power in W.
    pub min_power: f64,
    /// Full load power in W.
    pub max_power: f64,
    /// Number of such hosts.
    pub count: Option<u32>,
}

/// Represents simulation configuration.
#[derive(Debug, PartialEq, Clone)]
pub struct SimulationConfig {
    /// Configurations of physical hosts.
    pub hosts: Vec<HostConfig>,
    /// Power meter sampling period in seconds.
    pub measurement_period: f64,
    /// A power meter is started for every model.
    pub power_models: Vec<PowerAccountingModel>,
    /// Scheduling algorithm with options, e.g. `CostRankedPoolReuse[cost_model=Traditional]`.
    pub scheduling_algorithm: String,
    /// Cores of every created VM.
    pub vm_cores: u32,
    /// Memory of every created VM in bytes.
    pub vm_memory: u64,
    /// Storage service holding all task files.
    pub default_storage: String,
    pub power_coefficients: PowerCoefficients,
    pub balance: BalanceParams,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            hosts: Vec::new(),
            measurement_period: 1.,
            power_models: vec![
                PowerAccountingModel::Traditional,
                PowerAccountingModel::Pairwise,
                PowerAccountingModel::Unpaired,
            ],
            scheduling_algorithm: "CostRankedPoolReuse".to_string(),
            vm_cores: 1,
            vm_memory: 1_000_000_000,
            default_storage: "data_server".to_string(),
            power_coefficients: PowerCoefficients::default(),
            balance: BalanceParams::default(),
        }
    }
}

impl SimulationConfig {
    /// Creates simulation config by reading parameter values from YAML file
    /// (uses default values if some parameters are absent).
    pub fn from_file(file_name: &str) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(file_name).map_err(|source| ConfigError::Io {
            path: file_name.to_string(),
            source,
        })?;
        Self::from_yaml(&yaml)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let raw: RawSimulationConfig = serde_yaml::from_str(yaml)?;
        let default = Self::default();
        let power_models = match raw.power_models {
            Some(names) => names
                .iter()
                .map(|name| name.parse())
                .collect::<Result<Vec<PowerAccountingModel>, ConfigError>>()?,
            None => default.power_models,
        };
        let config = Self {
            hosts: raw.hosts.unwrap_or_default(),
            measurement_period: raw.measurement_period.unwrap_or(default.measurement_period),
            power_models,
            scheduling_algorithm: raw.scheduling_algorithm.unwrap_or(default.scheduling_algorithm),
            vm_cores: raw.vm_cores.unwrap_or(default.vm_cores),
            vm_memory: raw.vm_memory.unwrap_or(default.vm_memory),
            default_storage: raw.default_storage.unwrap_or(default.default_storage),
            power_coefficients: raw.power_coefficients.unwrap_or(default.power_coefficients),
            balance: raw.balance.unwrap_or(default.balance),
        };
        config.vm_spec()?;
        Ok(config)
    }

    /// Size of every created VM, both values must be positive.
    pub fn vm_spec(&self) -> Result<VmSpec, ConfigError> {
        if self.vm_cores == 0 {
            return Err(ConfigError::InvalidOption("vm_cores=0".to_string()));
        }
        if self.vm_memory == 0 {
            return Err(ConfigError::InvalidOption("vm_memory=0".to_string()));
        }
        Ok(VmSpec {
            cores: self.vm_cores,
            memory: self.vm_memory,
        })
    }

    /// Expands host configs into physical hosts, in config order.
    pub fn physical_hosts(&self) -> Result<Vec<PhysicalHost>, ConfigError> {
        let mut hosts = Vec::new();
        for host in &self.hosts {
            let count = host.count.unwrap_or(1);
            let names = match (count, &host.name, &host.name_prefix) {
                (0, _, _) => return Err(ConfigError::InvalidHost("host count must be positive".to_string())),
                (1, Some(name), _) => vec![name.clone()],
                (_, _, Some(prefix)) => (1..=count).map(|i| format!("{}{}", prefix, i)).collect(),
                _ => {
                    return Err(ConfigError::InvalidHost(format!(
                        "host config with count {} needs {}",
                        count,
                        if count == 1 { "a name" } else { "a name prefix" }
                    )))
                }
            };
            if host.cores == 0 || host.speed <= 0. || host.max_power < host.min_power {
                return Err(ConfigError::InvalidHost(format!(
                    "{}: cores and speed must be positive and max_power at least min_power",
                    names[0]
                )));
            }
            for name in names {
                hosts.push(PhysicalHost::new(
                    &name,
                    host.cores,
                    host.memory,
                    host.speed,
                    host.min_power,
                    host.max_power,
                ));
            }
        }
        Ok(hosts)
    }

    /// Total number of hosts.
    pub fn number_of_hosts(&self) -> u32 {
        self.hosts.iter().map(|h| h.count.unwrap_or(1)).sum()
    }
}
