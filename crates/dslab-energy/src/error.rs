//! Error types.

use thiserror::Error;

use crate::cloud::{VmId, VmState};

/// Errors returned by the job scheduler when it is given an unsupported set of compute services.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchedulerError {
    #[error("energy-aware job scheduler supports a single compute service, got {0}")]
    MultipleComputeServices(usize),

    #[error("compute service `{0}` is not an elastic cloud service")]
    NotElastic(String),
}

/// Errors returned by the cloud service operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CloudError {
    #[error("unknown VM {0}")]
    UnknownVm(VmId),

    #[error("unknown host `{0}`")]
    UnknownHost(String),

    #[error("host `{0}` is turned off")]
    HostIsOff(String),

    #[error("not enough resources to start VM {0}")]
    NotEnoughResources(VmId),

    #[error("VM {vm} is {state:?}")]
    InvalidVmState { vm: VmId, state: VmState },

    #[error("VM {0} has no idle cores")]
    VmIsBusy(VmId),
}

/// Errors produced while building a simulation from configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("can't read file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("can't parse YAML config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("unknown scheduling algorithm `{0}`")]
    UnknownAlgorithm(String),

    #[error("unknown cost model `{0}`")]
    UnknownCostModel(String),

    #[error("unknown power model `{0}`")]
    UnknownPowerModel(String),

    #[error("invalid option `{0}`")]
    InvalidOption(String),

    #[error("invalid host config: {0}")]
    InvalidHost(String),

    #[error("power meter has no hosts to measure")]
    NoMeteredHosts,

    #[error("measurement period must be at least 1 second, got {0}")]
    InvalidMeasurementPeriod(f64),

    #[error("power meter references unknown host `{0}`")]
    UnknownHost(String),
}
