//! Workflow manager driving the scheduling rounds.

use std::cell::RefCell;
use std::rc::Rc;

use simcore::{cast, log_error, log_info, Event, EventHandler, Id, SimulationContext};

use crate::cloud::{CloudService, ComputeService};
use crate::events::job::JobCompleted;
use crate::events::power::StopMeter;
use crate::events::wms::StartWorkflow;
use crate::job_scheduler::EnergyAwareJobScheduler;
use crate::workflow::{TaskId, Workflow};

/// Runs a workflow: schedules ready tasks at start and after every job completion,
/// and stops the power meters once the workflow is done.
pub struct WorkflowManager {
    scheduler: EnergyAwareJobScheduler,
    services: Vec<ComputeService>,
    cloud: Rc<RefCell<CloudService>>,
    workflow: Rc<RefCell<Workflow>>,
    meters: Vec<Id>,
    running_jobs: usize,
    finished: bool,
    ctx: SimulationContext,
}

impl WorkflowManager {
    pub fn new(
        scheduler: EnergyAwareJobScheduler,
        cloud: Rc<RefCell<CloudService>>,
        workflow: Rc<RefCell<Workflow>>,
        meters: Vec<Id>,
        ctx: SimulationContext,
    ) -> Self {
        Self {
            scheduler,
            services: vec![ComputeService::Cloud(cloud.clone())],
            cloud,
            workflow,
            meters,
            running_jobs: 0,
            finished: false,
            ctx,
        }
    }

    pub fn id(&self) -> Id {
        self.ctx.id()
    }

    pub fn start(&mut self) {
        self.ctx.emit_self_now(StartWorkflow {});
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn scheduler(&self) -> &EnergyAwareJobScheduler {
        &self.scheduler
    }

    fn on_start(&mut self) {
        log_info!(
            self.ctx,
            "starting workflow with {} tasks",
            self.workflow.borrow().task_count()
        );
        {
            let mut cloud = self.cloud.borrow_mut();
            for host in cloud.execution_hosts() {
                cloud.turn_off_host(&host);
            }
        }
        self.schedule_ready_tasks();
    }

    fn schedule_ready_tasks(&mut self) {
        let ready = self.workflow.borrow().ready_tasks();
        if !ready.is_empty() {
            log_info!(self.ctx, "{} ready tasks", ready.len());
            let result = {
                let workflow = self.workflow.borrow();
                self.scheduler
                    .schedule_tasks(&self.services, &ready, &workflow, self.ctx.id())
            };
            let scheduled = result.unwrap_or_else(|e| panic!("job scheduler failed: {}", e));
            let mut workflow = self.workflow.borrow_mut();
            for task in scheduled {
                workflow.mark_scheduled(task);
                self.running_jobs += 1;
            }
        }
        if self.workflow.borrow().is_done() {
            self.stop_meters();
        } else if self.running_jobs == 0 {
            log_error!(
                self.ctx,
                "no job is running and {} ready tasks can't be placed, stopping",
                self.workflow.borrow().ready_tasks().len()
            );
            self.stop_meters();
        }
    }

    fn on_job_completed(&mut self, task: TaskId) {
        self.running_jobs -= 1;
        if let Err(e) = self.scheduler.notify_task_completion(&self.services, task) {
            panic!("job scheduler failed: {}", e);
        }
        if self.workflow.borrow().is_done() {
            log_info!(
                self.ctx,
                "workflow completed, makespan {:.3}",
                self.workflow.borrow().makespan().unwrap_or(0.)
            );
            self.stop_meters();
        } else {
            self.schedule_ready_tasks();
        }
    }

    fn stop_meters(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        for &meter in &self.meters {
            self.ctx.emit_now(StopMeter {}, meter);
        }
    }
}

impl EventHandler for WorkflowManager {
    fn on(&mut self, event: Event) {
        cast!(match event.data {
            StartWorkflow {} => {
                self.on_start();
            }
            JobCompleted { task, vm: _vm } => {
                self.on_job_completed(task);
            }
        })
    }
}
