//! Scheduling algorithm implementations.

pub mod balanced_host_affinity;
pub mod cost_ranked_pool_reuse;
pub mod host_affinity;
pub mod idle_capacity_first;
pub mod simple_pool_reuse;
