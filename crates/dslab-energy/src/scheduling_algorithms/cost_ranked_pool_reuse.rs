//! Reuse of a VM pool ranked by a cost model.

use simcore::{log_debug, log_trace, SimulationContext};

use crate::cloud::{CloudService, VmId};
use crate::cost_model::CostModel;
use crate::scheduling_algorithm::{
    release_host, start_or_discard, SchedulingAlgorithm, VmBookkeeping, VmSpec,
};
use crate::workflow::{Task, TaskId, Workflow};

/// Picks the cheapest VM among the running VMs with idle cores and the stopped VMs of the pool.
///
/// When no powered-on host has room for another VM, the next host is turned on in advance
/// so that subsequent placements can use it.
pub struct CostRankedPoolReuse {
    pool: Vec<VmId>,
    bookkeeping: VmBookkeeping,
    cost_model: Box<dyn CostModel>,
    vm_spec: VmSpec,
    ctx: SimulationContext,
}

impl CostRankedPoolReuse {
    pub fn new(cost_model: Box<dyn CostModel>, vm_spec: VmSpec, ctx: SimulationContext) -> Self {
        Self {
            pool: Vec::new(),
            bookkeeping: VmBookkeeping::default(),
            cost_model,
            vm_spec,
            ctx,
        }
    }

    pub fn bookkeeping(&self) -> &VmBookkeeping {
        &self.bookkeeping
    }

    pub fn pool(&self) -> &[VmId] {
        &self.pool
    }

    fn cheapest_candidate(&self, task: &Task, cloud: &CloudService) -> Option<VmId> {
        let mut best: Option<(VmId, f64)> = None;
        for &vm in &self.pool {
            let is_candidate = (cloud.is_vm_running(vm) && cloud.vm_idle_cores(vm) > 0) || cloud.is_vm_down(vm);
            if !is_candidate {
                continue;
            }
            let cost = self
                .cost_model
                .estimate_cost(task, vm, &self.bookkeeping.running_vms_per_host, cloud);
            log_trace!(self.ctx, "cost of vm-{} for task {}: {}", vm, task.name, cost);
            if best.map_or(true, |(_, min_cost)| cost < min_cost) {
                best = Some((vm, cost));
            }
        }
        best.map(|(vm, _)| vm)
    }

    fn power_on_spare_host(&self, cloud: &mut CloudService) {
        let cores = cloud.cores_per_host();
        let has_room = self
            .bookkeeping
            .running_vms_per_host
            .iter()
            .any(|(host, &running)| cloud.is_host_on(host) && running < cores.get(host).copied().unwrap_or(0));
        if has_room {
            return;
        }
        if let Some(host) = cloud.execution_hosts().into_iter().find(|h| !cloud.is_host_on(h)) {
            cloud.turn_on_host(&host);
        }
    }
}

impl SchedulingAlgorithm for CostRankedPoolReuse {
    fn sort_tasks(&mut self, tasks: &[TaskId], _workflow: &Workflow, _cloud: &CloudService) -> Vec<TaskId> {
        tasks.to_vec()
    }

    fn schedule_task(&mut self, task: &Task, cloud: &mut CloudService) -> Option<VmId> {
        let chosen = self.cheapest_candidate(task, cloud);
        self.power_on_spare_host(cloud);

        match chosen {
            Some(vm) if cloud.is_vm_down(vm) => {
                let host = start_or_discard(cloud, vm, None, &self.ctx)?;
                self.bookkeeping.bind(vm, &host);
                Some(vm)
            }
            Some(vm) => Some(vm),
            None => {
                if cloud.total_idle_cores() == 0 {
                    log_debug!(self.ctx, "no idle cores for task {}", task.name);
                    return None;
                }
                let vm = cloud.create_vm(self.vm_spec.cores, self.vm_spec.memory);
                let host = start_or_discard(cloud, vm, None, &self.ctx)?;
                self.pool.push(vm);
                self.bookkeeping.bind(vm, &host);
                Some(vm)
            }
        }
    }

    fn notify_vm_shutdown(&mut self, _vm: VmId, host: &str, cloud: &mut CloudService) {
        release_host(&mut self.bookkeeping, host, cloud);
    }
}
