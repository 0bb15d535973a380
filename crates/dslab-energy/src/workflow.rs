//! Workflow tasks and their dependencies.

use std::collections::BTreeSet;

use serde::Serialize;

/// Task identifier, assigned sequentially starting from 0 in the order of task creation.
pub type TaskId = usize;

/// Represents a workflow task state.
#[derive(Eq, PartialEq, Copy, Clone, Debug, Serialize)]
pub enum TaskState {
    /// Waiting for its parents.
    Pending,
    /// All parents are completed, ready to be scheduled.
    Ready,
    /// Submitted to a VM, not started yet.
    Scheduled,
    Running,
    Done,
}

/// Represents a workflow task.
///
/// Described by the amount of computations in flops and the average CPU utilization in percents,
/// which is used by the power meter. Input and output files are referenced by name.
#[derive(Clone, Debug, Serialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub flops: f64,
    /// Average CPU utilization in percents (0-100).
    pub avg_cpu: f64,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub start_date: Option<f64>,
    pub end_date: Option<f64>,
    pub execution_host: Option<String>,
    pub state: TaskState,
    children: Vec<TaskId>,
    pending_parents: usize,
}

impl Task {
    fn new(id: TaskId, name: &str, flops: f64, avg_cpu: f64) -> Self {
        Self {
            id,
            name: name.to_string(),
            flops,
            avg_cpu,
            inputs: Vec::new(),
            outputs: Vec::new(),
            start_date: None,
            end_date: None,
            execution_host: None,
            state: TaskState::Ready,
            children: Vec::new(),
            pending_parents: 0,
        }
    }

    /// Returns true if the task has started and not yet finished.
    pub fn is_running(&self) -> bool {
        self.start_date.is_some() && self.end_date.is_none()
    }

    pub fn children(&self) -> &[TaskId] {
        &self.children
    }
}

/// A set of tasks connected by parent-child dependencies.
#[derive(Clone, Debug, Default)]
pub struct Workflow {
    tasks: Vec<Task>,
    ready_tasks: BTreeSet<TaskId>,
    completed_task_count: usize,
}

impl Workflow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_task(&mut self, name: &str, flops: f64, avg_cpu: f64) -> TaskId {
        let task_id = self.tasks.len();
        self.tasks.push(Task::new(task_id, name, flops, avg_cpu));
        self.ready_tasks.insert(task_id);
        task_id
    }

    pub fn add_input(&mut self, task_id: TaskId, file: &str) {
        self.tasks[task_id].inputs.push(file.to_string());
    }

    pub fn add_output(&mut self, task_id: TaskId, file: &str) {
        self.tasks[task_id].outputs.push(file.to_string());
    }

    /// Makes `child` wait for completion of `parent`.
    ///
    /// Dependencies can only be added between tasks that have not been scheduled yet.
    pub fn add_dependency(&mut self, parent: TaskId, child: TaskId) {
        assert_ne!(parent, child, "task {} can't depend on itself", parent);
        for id in [parent, child] {
            let state = self.tasks[id].state;
            assert!(
                state == TaskState::Ready || state == TaskState::Pending,
                "can't add dependency to task {} in state {:?}",
                self.tasks[id].name,
                state
            );
        }
        self.tasks[parent].children.push(child);
        let child_task = &mut self.tasks[child];
        child_task.pending_parents += 1;
        child_task.state = TaskState::Pending;
        self.ready_tasks.remove(&child);
    }

    pub fn task(&self, task_id: TaskId) -> &Task {
        &self.tasks[task_id]
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Returns the ready tasks in the order of their ids.
    pub fn ready_tasks(&self) -> Vec<TaskId> {
        self.ready_tasks.iter().copied().collect()
    }

    pub fn mark_scheduled(&mut self, task_id: TaskId) {
        let task = &mut self.tasks[task_id];
        assert_eq!(task.state, TaskState::Ready, "task {} is not ready", task.name);
        task.state = TaskState::Scheduled;
        self.ready_tasks.remove(&task_id);
    }

    pub fn on_task_started(&mut self, task_id: TaskId, time: f64, host: &str) {
        let task = &mut self.tasks[task_id];
        task.state = TaskState::Running;
        task.start_date = Some(time);
        task.execution_host = Some(host.to_string());
        self.ready_tasks.remove(&task_id);
    }

    /// Marks the task as completed and returns the children that became ready.
    pub fn on_task_finished(&mut self, task_id: TaskId, time: f64) -> Vec<TaskId> {
        let task = &mut self.tasks[task_id];
        task.state = TaskState::Done;
        task.end_date = Some(time);
        self.completed_task_count += 1;
        let mut released = Vec::new();
        for child_id in self.tasks[task_id].children.clone() {
            let child = &mut self.tasks[child_id];
            child.pending_parents -= 1;
            if child.pending_parents == 0 && child.state == TaskState::Pending {
                child.state = TaskState::Ready;
                self.ready_tasks.insert(child_id);
                released.push(child_id);
            }
        }
        released
    }

    pub fn completed_task_count(&self) -> usize {
        self.completed_task_count
    }

    pub fn is_done(&self) -> bool {
        self.tasks.len() == self.completed_task_count
    }

    /// Returns the completion time of the last task, if all tasks are done.
    pub fn makespan(&self) -> Option<f64> {
        if !self.is_done() {
            return None;
        }
        Some(self.tasks.iter().filter_map(|t| t.end_date).fold(0., f64::max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependencies_release_children() {
        let mut workflow = Workflow::new();
        let a = workflow.add_task("a", 1., 50.);
        let b = workflow.add_task("b", 1., 50.);
        let c = workflow.add_task("c", 1., 50.);
        workflow.add_dependency(a, c);
        workflow.add_dependency(b, c);
        assert_eq!(workflow.ready_tasks(), vec![a, b]);

        workflow.mark_scheduled(a);
        workflow.on_task_started(a, 0., "h0");
        assert!(workflow.task(a).is_running());
        assert!(workflow.on_task_finished(a, 1.).is_empty());
        assert_eq!(workflow.ready_tasks(), vec![b]);

        workflow.mark_scheduled(b);
        workflow.on_task_started(b, 0., "h0");
        assert_eq!(workflow.on_task_finished(b, 2.), vec![c]);
        assert_eq!(workflow.ready_tasks(), vec![c]);
        assert!(!workflow.is_done());
        assert_eq!(workflow.makespan(), None);

        workflow.mark_scheduled(c);
        workflow.on_task_started(c, 2., "h1");
        workflow.on_task_finished(c, 5.);
        assert!(workflow.is_done());
        assert_eq!(workflow.makespan(), Some(5.));
        assert_eq!(workflow.task(c).execution_host.as_deref(), Some("h1"));
    }

    #[test]
    #[should_panic]
    fn test_self_dependency_panics() {
        let mut workflow = Workflow::new();
        let a = workflow.add_task("a", 1., 50.);
        workflow.add_dependency(a, a);
    }
}
