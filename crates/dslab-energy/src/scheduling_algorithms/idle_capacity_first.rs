//! Placement preferring any running VM with idle capacity, one new host at a time.

use simcore::{log_debug, SimulationContext};

use crate::cloud::{CloudService, VmId};
use crate::scheduling_algorithm::{
    release_host, start_or_discard, SchedulingAlgorithm, VmBookkeeping, VmSpec,
};
use crate::workflow::{Task, TaskId, Workflow};

/// Uses the first known running VM with an idle core, then the first stopped one.
/// Otherwise turns on the first powered-off host and starts a new VM there.
///
/// VMs are forgotten once shut down.
pub struct IdleCapacityFirst {
    bookkeeping: VmBookkeeping,
    vm_spec: VmSpec,
    ctx: SimulationContext,
}

impl IdleCapacityFirst {
    pub fn new(vm_spec: VmSpec, ctx: SimulationContext) -> Self {
        Self {
            bookkeeping: VmBookkeeping::default(),
            vm_spec,
            ctx,
        }
    }

    pub fn bookkeeping(&self) -> &VmBookkeeping {
        &self.bookkeeping
    }
}

impl SchedulingAlgorithm for IdleCapacityFirst {
    fn sort_tasks(&mut self, tasks: &[TaskId], _workflow: &Workflow, _cloud: &CloudService) -> Vec<TaskId> {
        tasks.to_vec()
    }

    fn schedule_task(&mut self, task: &Task, cloud: &mut CloudService) -> Option<VmId> {
        let mut down_vm = None;
        for &vm in self.bookkeeping.vm_to_host.keys() {
            if cloud.is_vm_running(vm) && cloud.vm_idle_cores(vm) > 0 {
                return Some(vm);
            }
            if down_vm.is_none() && cloud.is_vm_down(vm) {
                down_vm = Some(vm);
            }
        }

        let (vm, host) = match down_vm {
            Some(vm) => (vm, None),
            None => {
                if cloud.total_idle_cores() == 0 {
                    return None;
                }
                let host = match cloud.execution_hosts().into_iter().find(|h| !cloud.is_host_on(h)) {
                    Some(host) => host,
                    None => {
                        log_debug!(self.ctx, "no powered-off host left for task {}", task.name);
                        return None;
                    }
                };
                cloud.turn_on_host(&host);
                (cloud.create_vm(self.vm_spec.cores, self.vm_spec.memory), Some(host))
            }
        };

        match start_or_discard(cloud, vm, host.as_deref(), &self.ctx) {
            Some(started_on) => {
                self.bookkeeping.bind(vm, &started_on);
                Some(vm)
            }
            None => {
                // the host was turned on for this VM only
                if let Some(host) = host {
                    cloud.turn_off_host(&host);
                }
                None
            }
        }
    }

    fn notify_vm_shutdown(&mut self, vm: VmId, host: &str, cloud: &mut CloudService) {
        self.bookkeeping.vm_to_host.remove(&vm);
        release_host(&mut self.bookkeeping, host, cloud);
    }
}
