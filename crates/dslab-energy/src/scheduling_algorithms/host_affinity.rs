//! Batch placement that plans a host for every task of a round.

use std::collections::{BTreeMap, BTreeSet};

use simcore::{log_debug, SimulationContext};

use crate::cloud::{CloudService, VmId};
use crate::scheduling_algorithm::{
    release_host, sort_by_cpu_usage, start_or_discard, SchedulingAlgorithm, VmBookkeeping, VmSpec,
};
use crate::workflow::{Task, TaskId, Workflow};

/// Task to host plan and the VM bookkeeping shared by host-affinity algorithms.
///
/// A task is only ever placed on a VM bound to its planned host.
pub(crate) struct HostAffinityPlacement {
    pub bookkeeping: VmBookkeeping,
    pub plan: BTreeMap<TaskId, String>,
    pub vm_spec: VmSpec,
}

impl HostAffinityPlacement {
    pub fn new(vm_spec: VmSpec) -> Self {
        Self {
            bookkeeping: VmBookkeeping::default(),
            plan: BTreeMap::new(),
            vm_spec,
        }
    }

    pub fn schedule_task(&mut self, task: &Task, cloud: &mut CloudService, ctx: &SimulationContext) -> Option<VmId> {
        let host = self.plan.get(&task.id)?.clone();

        let mut down_vm = None;
        for (&vm, vm_host) in &self.bookkeeping.vm_to_host {
            if *vm_host != host {
                continue;
            }
            if cloud.is_vm_running(vm) && cloud.vm_idle_cores(vm) > 0 {
                self.plan.remove(&task.id);
                return Some(vm);
            }
            if down_vm.is_none() && cloud.is_vm_down(vm) {
                down_vm = Some(vm);
            }
        }
        if down_vm.is_none() && cloud.idle_cores(&host) == 0 {
            log_debug!(ctx, "planned host {} of task {} is full", host, task.name);
            return None;
        }

        cloud.turn_on_host(&host);
        let vm = down_vm.unwrap_or_else(|| cloud.create_vm(self.vm_spec.cores, self.vm_spec.memory));
        match start_or_discard(cloud, vm, Some(&host), ctx) {
            Some(started_on) => {
                self.bookkeeping.bind(vm, &started_on);
                self.plan.remove(&task.id);
                Some(vm)
            }
            None => {
                if self.bookkeeping.running_vms(&host) == 0 {
                    cloud.turn_off_host(&host);
                }
                None
            }
        }
    }

    pub fn notify_vm_shutdown(&mut self, host: &str, cloud: &mut CloudService) {
        release_host(&mut self.bookkeeping, host, cloud);
    }
}

/// Plans hosts greedily: a task goes to the host of a not yet planned reusable VM if there is one,
/// otherwise to the host with the fewest idle cores left. Tasks are considered in the order of decreasing
/// CPU utilization, ties by id, so the plan depends only on the task set.
pub struct HostAffinity {
    placement: HostAffinityPlacement,
    ctx: SimulationContext,
}

impl HostAffinity {
    pub fn new(vm_spec: VmSpec, ctx: SimulationContext) -> Self {
        Self {
            placement: HostAffinityPlacement::new(vm_spec),
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

impl SchedulingAlgorithm for HostAffinity {
    fn sort_tasks(&mut self, tasks: &[TaskId], workflow: &Workflow, cloud: &CloudService) -> Vec<TaskId> {
        let sorted = sort_by_cpu_usage(tasks, workflow);
        self.placement.plan.clear();

        let mut idle_cores = cloud.idle_cores_per_host();
        let mut planned_vms = BTreeSet::new();
        for &task in &sorted {
            let reusable = self.placement.bookkeeping.vm_to_host.iter().find(|(&vm, _)| {
                !planned_vms.contains(&vm)
                    && ((cloud.is_vm_running(vm) && cloud.vm_idle_cores(vm) > 0) || cloud.is_vm_down(vm))
            });
            let host = match reusable {
                Some((&vm, host)) => {
                    planned_vms.insert(vm);
                    host.clone()
                }
                None => match idle_cores
                    .iter()
                    .filter(|(_, &cores)| cores > 0)
                    .min_by_key(|(_, &cores)| cores)
                {
                    Some((host, _)) => host.clone(),
                    None => break,
                },
            };
            if let Some(cores) = idle_cores.get_mut(&host) {
                *cores = cores.saturating_sub(1);
            }
            log_debug!(self.ctx, "planned task {} on host {}", workflow.task(task).name, host);
            self.placement.plan.insert(task, host);
        }
        sorted
    }

    fn schedule_task(&mut self, task: &Task, cloud: &mut CloudService) -> Option<VmId> {
        self.placement.schedule_task(task, cloud, &self.ctx)
    }

    fn notify_vm_shutdown(&mut self, _vm: VmId, host: &str, cloud: &mut CloudService) {
        self.placement.notify_vm_shutdown(host, cloud);
    }
}
