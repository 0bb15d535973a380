//! Greedy reuse of a VM pool without cost ranking.

use simcore::{log_debug, SimulationContext};

use crate::cloud::{CloudService, VmId};
use crate::scheduling_algorithm::{
    release_host, start_or_discard, SchedulingAlgorithm, VmBookkeeping, VmSpec,
};
use crate::workflow::{Task, TaskId, Workflow};

/// Uses the first running VM from the pool that has an idle core, otherwise creates a new VM
/// while there are idle cores in the cloud.
pub struct SimplePoolReuse {
    pool: Vec<VmId>,
    bookkeeping: VmBookkeeping,
    vm_spec: VmSpec,
    ctx: SimulationContext,
}

impl SimplePoolReuse {
    pub fn new(vm_spec: VmSpec, ctx: SimulationContext) -> Self {
        Self {
            pool: Vec::new(),
            bookkeeping: VmBookkeeping::default(),
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

    /// Returns a powered-on host with idle cores, turning on the first suitable host if there is none.
    ///
    /// The flag tells whether the host was turned on by this call.
    fn ensure_host(&self, cloud: &mut CloudService) -> Option<(String, bool)> {
        let idle = cloud.idle_cores_per_host();
        if let Some((host, _)) = idle.iter().find(|(h, &cores)| cores > 0 && cloud.is_host_on(h)) {
            return Some((host.clone(), false));
        }
        let (host, _) = idle.iter().find(|(_, &cores)| cores > 0)?;
        cloud.turn_on_host(host);
        Some((host.clone(), true))
    }
}

impl SchedulingAlgorithm for SimplePoolReuse {
    fn sort_tasks(&mut self, tasks: &[TaskId], _workflow: &Workflow, _cloud: &CloudService) -> Vec<TaskId> {
        tasks.to_vec()
    }

    fn schedule_task(&mut self, task: &Task, cloud: &mut CloudService) -> Option<VmId> {
        if let Some(&vm) = self
            .pool
            .iter()
            .find(|&&vm| cloud.is_vm_running(vm) && cloud.vm_idle_cores(vm) > 0)
        {
            return Some(vm);
        }
        if cloud.total_idle_cores() == 0 {
            log_debug!(self.ctx, "no idle cores for task {}", task.name);
            return None;
        }
        let (host, turned_on) = self.ensure_host(cloud)?;
        let vm = cloud.create_vm(self.vm_spec.cores, self.vm_spec.memory);
        match start_or_discard(cloud, vm, Some(&host), &self.ctx) {
            Some(started_on) => {
                self.pool.push(vm);
                self.bookkeeping.bind(vm, &started_on);
                Some(vm)
            }
            None => {
                if turned_on {
                    cloud.turn_off_host(&host);
                }
                None
            }
        }
    }

    fn notify_vm_shutdown(&mut self, _vm: VmId, host: &str, cloud: &mut CloudService) {
        release_host(&mut self.bookkeeping, host, cloud);
    }
}
