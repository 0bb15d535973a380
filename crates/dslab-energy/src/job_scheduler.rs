//! Job scheduler turning rounds of ready tasks into jobs submitted to VMs.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use simcore::{log_debug, log_info, log_warn, Id, SimulationContext};

use crate::cloud::{CloudService, ComputeService, StandardJob, VmId};
use crate::error::SchedulerError;
use crate::scheduling_algorithm::SchedulingAlgorithm;
use crate::workflow::{Task, TaskId, Workflow};

/// Schedules ready tasks on a single cloud service using the configured [`SchedulingAlgorithm`].
///
/// Tasks that can't be placed are left for the next round. The number of such tasks is remembered,
/// and while it is positive completed tasks leave their VMs running so that the deferred tasks can reuse them.
/// Such VMs that are still idle after the next round are shut down.
pub struct EnergyAwareJobScheduler {
    algorithm: Box<dyn SchedulingAlgorithm>,
    default_storage: String,
    task_vm: BTreeMap<TaskId, VmId>,
    unscheduled_count: usize,
    warm_vms: BTreeSet<VmId>,
    ctx: SimulationContext,
}

impl EnergyAwareJobScheduler {
    pub fn new(algorithm: Box<dyn SchedulingAlgorithm>, default_storage: &str, ctx: SimulationContext) -> Self {
        Self {
            algorithm,
            default_storage: default_storage.to_string(),
            task_vm: BTreeMap::new(),
            unscheduled_count: 0,
            warm_vms: BTreeSet::new(),
            ctx,
        }
    }

    /// Number of tasks deferred in the last scheduling round and not yet accounted by completions.
    pub fn unscheduled_count(&self) -> usize {
        self.unscheduled_count
    }

    pub fn vm_of(&self, task: TaskId) -> Option<VmId> {
        self.task_vm.get(&task).copied()
    }

    /// VMs left running by completions while tasks were deferred.
    pub fn warm_vms(&self) -> &BTreeSet<VmId> {
        &self.warm_vms
    }

    /// Shuts the VM down if it runs no tasks and lets the algorithm release its host.
    fn release_if_idle(&mut self, vm: VmId, cloud: &mut CloudService) -> bool {
        let is_idle = cloud.is_vm_running(vm) && Some(cloud.vm_idle_cores(vm)) == cloud.vm_cores(vm);
        if !is_idle {
            return false;
        }
        let host = cloud
            .vm_host(vm)
            .unwrap_or_else(|| panic!("running vm-{} is not bound to a host", vm))
            .to_string();
        if let Err(e) = cloud.shutdown_vm(vm) {
            panic!("can't shut down idle vm-{}: {}", vm, e);
        }
        self.algorithm.notify_vm_shutdown(vm, &host, cloud);
        true
    }

    fn file_locations(&self, task: &Task) -> BTreeMap<String, String> {
        task.inputs
            .iter()
            .chain(task.outputs.iter())
            .map(|file| (file.clone(), self.default_storage.clone()))
            .collect()
    }

    /// Tries to place every task and submits the placed ones as jobs, returns the submitted tasks.
    ///
    /// Tasks are ordered by decreasing flops (ties by id) and then by the algorithm's own ordering.
    /// `requester` receives the job completion events.
    pub fn schedule_tasks(
        &mut self,
        services: &[ComputeService],
        tasks: &[TaskId],
        workflow: &Workflow,
        requester: Id,
    ) -> Result<Vec<TaskId>, SchedulerError> {
        if services.is_empty() || tasks.is_empty() {
            return Ok(Vec::new());
        }
        let cloud = single_cloud(services)?;
        let mut cloud = cloud.borrow_mut();
        log_info!(self.ctx, "scheduling {} ready tasks", tasks.len());

        let mut by_demand = tasks.to_vec();
        by_demand.sort_by(|&a, &b| {
            workflow
                .task(b)
                .flops
                .total_cmp(&workflow.task(a).flops)
                .then(a.cmp(&b))
        });
        let ordered = self.algorithm.sort_tasks(&by_demand, workflow, &cloud);

        let mut scheduled = Vec::new();
        for task_id in ordered {
            let task = workflow.task(task_id);
            let vm = match self.algorithm.schedule_task(task, &mut cloud) {
                Some(vm) => vm,
                None => {
                    log_debug!(self.ctx, "no VM for task {}, deferred", task.name);
                    continue;
                }
            };
            let job = StandardJob {
                task: task_id,
                file_locations: self.file_locations(task),
            };
            match cloud.submit_job(job, vm, requester) {
                Ok(()) => {
                    log_info!(
                        self.ctx,
                        "task {} -> vm-{} on {}",
                        task.name,
                        vm,
                        cloud.vm_host(vm).unwrap_or("-")
                    );
                    self.task_vm.insert(task_id, vm);
                    scheduled.push(task_id);
                }
                Err(e) => {
                    log_warn!(self.ctx, "can't submit task {} to vm-{}: {}", task.name, vm, e);
                }
            }
        }
        self.unscheduled_count = tasks.len() - scheduled.len();

        // warm VMs that got no task in this round are not needed anymore
        for vm in std::mem::take(&mut self.warm_vms) {
            if self.release_if_idle(vm, &mut cloud) {
                log_debug!(self.ctx, "released unused warm vm-{}", vm);
            }
        }
        Ok(scheduled)
    }

    /// Releases the VM of a completed task.
    ///
    /// Panics if the task was not submitted by this scheduler.
    pub fn notify_task_completion(&mut self, services: &[ComputeService], task: TaskId) -> Result<(), SchedulerError> {
        let vm = self
            .task_vm
            .remove(&task)
            .unwrap_or_else(|| panic!("task {} completed without a VM binding", task));
        if self.unscheduled_count > 0 {
            self.unscheduled_count -= 1;
            self.warm_vms.insert(vm);
            log_debug!(self.ctx, "keeping vm-{} running for deferred tasks", vm);
            return Ok(());
        }
        if services.is_empty() {
            return Ok(());
        }
        let cloud = single_cloud(services)?;
        let mut cloud = cloud.borrow_mut();
        self.release_if_idle(vm, &mut cloud);
        Ok(())
    }
}

fn single_cloud(services: &[ComputeService]) -> Result<&Rc<RefCell<CloudService>>, SchedulerError> {
    if services.len() > 1 {
        return Err(SchedulerError::MultipleComputeServices(services.len()));
    }
    match &services[0] {
        ComputeService::Cloud(cloud) => Ok(cloud),
        other => Err(SchedulerError::NotElastic(other.name())),
    }
}
