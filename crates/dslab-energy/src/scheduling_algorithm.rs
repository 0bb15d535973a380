//! Scheduling algorithm trait and the VM bookkeeping shared by its implementations.

use std::collections::BTreeMap;

use simcore::{log_debug, log_warn, SimulationContext};

use crate::cloud::{CloudService, VmId};
use crate::workflow::{Task, TaskId, Workflow};

/// Places tasks onto VMs, creating, starting and releasing VMs and switching hosts as a side effect.
pub trait SchedulingAlgorithm {
    /// Orders a round of ready tasks. Never adds or removes tasks.
    ///
    /// Batch placement algorithms also plan the task to host assignment here.
    fn sort_tasks(&mut self, tasks: &[TaskId], workflow: &Workflow, cloud: &CloudService) -> Vec<TaskId>;

    /// Returns a running VM that can accept the task now, or `None` if no resources are available,
    /// in which case the task should be retried in the next round.
    fn schedule_task(&mut self, task: &Task, cloud: &mut CloudService) -> Option<VmId>;

    /// Called after the last task of a VM has finished and the VM was shut down.
    fn notify_vm_shutdown(&mut self, vm: VmId, host: &str, cloud: &mut CloudService);
}

/// Resources requested for every VM created by an algorithm.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VmSpec {
    pub cores: u32,
    /// Memory in bytes.
    pub memory: u64,
}

impl Default for VmSpec {
    fn default() -> Self {
        Self {
            cores: 1,
            memory: 1_000_000_000,
        }
    }
}

/// VM to host bindings and the number of running VMs per host, as seen by an algorithm.
#[derive(Debug, Clone, Default)]
pub struct VmBookkeeping {
    pub vm_to_host: BTreeMap<VmId, String>,
    pub running_vms_per_host: BTreeMap<String, u32>,
}

impl VmBookkeeping {
    /// Records that the VM has been started on the host.
    pub fn bind(&mut self, vm: VmId, host: &str) {
        self.vm_to_host.insert(vm, host.to_string());
        *self.running_vms_per_host.entry(host.to_string()).or_insert(0) += 1;
    }

    /// Decrements the number of running VMs on the host and returns the remaining number.
    ///
    /// Panics if the host has no running VMs recorded.
    pub fn release(&mut self, host: &str) -> u32 {
        let count = self
            .running_vms_per_host
            .get_mut(host)
            .unwrap_or_else(|| panic!("no running VMs recorded for host {}", host));
        assert!(*count > 0, "no running VMs recorded for host {}", host);
        *count -= 1;
        *count
    }

    pub fn running_vms(&self, host: &str) -> u32 {
        self.running_vms_per_host.get(host).copied().unwrap_or(0)
    }

    pub fn host_of(&self, vm: VmId) -> Option<&str> {
        self.vm_to_host.get(&vm).map(|h| h.as_str())
    }
}

/// Sorts tasks by decreasing average CPU utilization, ties by id.
pub(crate) fn sort_by_cpu_usage(tasks: &[TaskId], workflow: &Workflow) -> Vec<TaskId> {
    let mut sorted = tasks.to_vec();
    sorted.sort_by(|&a, &b| {
        workflow
            .task(b)
            .avg_cpu
            .total_cmp(&workflow.task(a).avg_cpu)
            .then(a.cmp(&b))
    });
    sorted
}

/// Starts a VM, destroying it if it was never started and can't be placed.
///
/// Returns the host the VM was started on.
pub(crate) fn start_or_discard(
    cloud: &mut CloudService,
    vm: VmId,
    host: Option<&str>,
    ctx: &SimulationContext,
) -> Option<String> {
    let was_created = cloud.vm(vm).map_or(false, |v| v.host().is_none());
    match cloud.start_vm(vm, host) {
        Ok(host) => Some(host),
        Err(e) => {
            log_warn!(ctx, "can't start vm-{}: {}", vm, e);
            if was_created {
                if let Err(e) = cloud.destroy_vm(vm) {
                    log_debug!(ctx, "can't destroy vm-{}: {}", vm, e);
                }
            }
            None
        }
    }
}

/// Powers the host off if it has no running VMs left.
pub(crate) fn release_host(bookkeeping: &mut VmBookkeeping, host: &str, cloud: &mut CloudService) {
    if bookkeeping.release(host) == 0 {
        cloud.turn_off_host(host);
    }
}
