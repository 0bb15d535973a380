//! Batch placement that spreads a round of tasks evenly over the hosts.

use serde::{Deserialize, Serialize};

use simcore::{log_debug, SimulationContext};

use crate::cloud::{CloudService, VmId};
use crate::scheduling_algorithm::{sort_by_cpu_usage, SchedulingAlgorithm, VmBookkeeping, VmSpec};
use crate::scheduling_algorithms::host_affinity::HostAffinityPlacement;
use crate::workflow::{Task, TaskId, Workflow};

/// Tuned parameters of the balanced placement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalanceParams {
    /// Maximum number of tasks planned in one round.
    pub max_batch_size: usize,
    /// Number of cores assumed for every host.
    pub host_capacity: usize,
}

impl Default for BalanceParams {
    fn default() -> Self {
        Self {
            max_batch_size: 48,
            host_capacity: 12,
        }
    }
}

/// Distributes up to `max_batch_size` tasks round-robin over the hosts.
///
/// The batch is split into hosts that get a full `host_capacity` share and at most one host with the remainder.
/// Hosts that received their share are skipped. The returned order groups tasks by host, tasks beyond the batch
/// follow unplanned and are deferred by [`schedule_task`](SchedulingAlgorithm::schedule_task).
pub struct BalancedHostAffinity {
    placement: HostAffinityPlacement,
    params: BalanceParams,
    ctx: SimulationContext,
}

impl BalancedHostAffinity {
    pub fn new(params: BalanceParams, vm_spec: VmSpec, ctx: SimulationContext) -> Self {
        assert!(params.host_capacity > 0, "host capacity must be positive");
        Self {
            placement: HostAffinityPlacement::new(vm_spec),
            params,
            ctx,
        }
    }

    pub fn bookkeeping(&self) -> &VmBookkeeping {
        &self.placement.bookkeeping
    }

    pub fn planned_host(&self, task: TaskId) -> Option<&str> {
        self.placement.plan.get(&task).map(|h| h.as_str())
    }
}

impl SchedulingAlgorithm for BalancedHostAffinity {
    fn sort_tasks(&mut self, tasks: &[TaskId], workflow: &Workflow, cloud: &CloudService) -> Vec<TaskId> {
        let sorted = sort_by_cpu_usage(tasks, workflow);
        self.placement.plan.clear();

        let hosts = cloud.execution_hosts();
        let capacity = self.params.host_capacity;
        let batch = sorted
            .len()
            .min(self.params.max_batch_size)
            .min(hosts.len() * capacity);
        if batch == 0 {
            return sorted;
        }

        let mut quotas = vec![capacity; batch / capacity];
        if batch % capacity > 0 {
            quotas.push(batch % capacity);
        }
        let mut per_host: Vec<Vec<TaskId>> = vec![Vec::new(); quotas.len()];
        let mut host_index = 0;
        for &task in &sorted[..batch] {
            while per_host[host_index].len() >= quotas[host_index] {
                host_index = (host_index + 1) % quotas.len();
            }
            per_host[host_index].push(task);
            self.placement.plan.insert(task, hosts[host_index].clone());
            host_index = (host_index + 1) % quotas.len();
        }
        log_debug!(
            self.ctx,
            "planned {} of {} tasks over {} hosts",
            batch,
            sorted.len(),
            quotas.len()
        );

        let mut ordered: Vec<TaskId> = per_host.into_iter().flatten().collect();
        ordered.extend_from_slice(&sorted[batch..]);
        ordered
    }

    fn schedule_task(&mut self, task: &Task, cloud: &mut CloudService) -> Option<VmId> {
        self.placement.schedule_task(task, cloud, &self.ctx)
    }

    fn notify_vm_shutdown(&mut self, _vm: VmId, host: &str, cloud: &mut CloudService) {
        self.placement.notify_vm_shutdown(host, cloud);
    }
}
