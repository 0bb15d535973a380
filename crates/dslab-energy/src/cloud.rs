//! Simulated cloud service: physical hosts, virtual machines and job execution.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use indexmap::IndexMap;
use serde::Serialize;

use simcore::{cast, log_debug, log_info, Event, EventHandler, Id, SimulationContext};

use crate::error::CloudError;
use crate::events::job::{JobCompleted, JobFinished, JobStarted};
use crate::workflow::{TaskId, Workflow};

/// VM identifier, assigned sequentially by the cloud service.
pub type VmId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VmState {
    /// Created but never started, not bound to any host.
    Created,
    Running,
    /// Shut down, keeps the binding to its last host.
    Down,
}

/// Physical host with its capacity and power characteristics.
#[derive(Debug, Clone, Serialize)]
pub struct PhysicalHost {
    pub name: String,
    pub cores: u32,
    /// Memory capacity in bytes.
    pub memory: u64,
    /// Per-core speed in flop/s.
    pub speed: f64,
    /// Power draw in W when the host is on and idle.
    pub min_power: f64,
    /// Power draw in W when all host cores are busy.
    pub max_power: f64,
    on: bool,
}

impl PhysicalHost {
    pub fn new(name: &str, cores: u32, memory: u64, speed: f64, min_power: f64, max_power: f64) -> Self {
        Self {
            name: name.to_string(),
            cores,
            memory,
            speed,
            min_power,
            max_power,
            on: true,
        }
    }

    pub fn is_on(&self) -> bool {
        self.on
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VirtualMachine {
    pub id: VmId,
    pub cores: u32,
    pub memory: u64,
    host: Option<String>,
    state: VmState,
    running_tasks: u32,
}

impl VirtualMachine {
    pub fn name(&self) -> String {
        format!("vm-{}", self.id)
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn state(&self) -> VmState {
        self.state
    }

    pub fn running_tasks(&self) -> u32 {
        self.running_tasks
    }

    /// Cores not occupied by tasks, zero if the VM is not running.
    pub fn idle_cores(&self) -> u32 {
        match self.state {
            VmState::Running => self.cores.saturating_sub(self.running_tasks),
            _ => 0,
        }
    }
}

/// Task submitted for execution together with the locations of its files.
#[derive(Debug, Clone, Serialize)]
pub struct StandardJob {
    pub task: TaskId,
    /// File name -> storage service holding it.
    pub file_locations: BTreeMap<String, String>,
}

struct RunningJob {
    vm: VmId,
    requester: Id,
}

/// Elastic compute service that runs jobs on VMs placed on a set of physical hosts.
///
/// Idle cores are accounted by capacity: a host's idle cores are its cores minus the cores of running VMs
/// bound to it, regardless of the host power state.
pub struct CloudService {
    hosts: IndexMap<String, PhysicalHost>,
    vms: BTreeMap<VmId, VirtualMachine>,
    vm_counter: VmId,
    jobs: HashMap<TaskId, RunningJob>,
    workflow: Rc<RefCell<Workflow>>,
    ctx: SimulationContext,
}

impl CloudService {
    pub fn new(workflow: Rc<RefCell<Workflow>>, ctx: SimulationContext) -> Self {
        Self {
            hosts: IndexMap::new(),
            vms: BTreeMap::new(),
            vm_counter: 0,
            jobs: HashMap::new(),
            workflow,
            ctx,
        }
    }

    pub fn id(&self) -> Id {
        self.ctx.id()
    }

    pub fn name(&self) -> &str {
        self.ctx.name()
    }

    // HOSTS ///////////////////////////////////////////////////////////////////////////////////////

    pub fn add_host(&mut self, host: PhysicalHost) {
        assert!(!self.hosts.contains_key(&host.name), "host {} already exists", host.name);
        log_debug!(self.ctx, "added host {} with {} cores", host.name, host.cores);
        self.hosts.insert(host.name.clone(), host);
    }

    pub fn host(&self, name: &str) -> Option<&PhysicalHost> {
        self.hosts.get(name)
    }

    /// Returns host names in the order they were added.
    pub fn execution_hosts(&self) -> Vec<String> {
        self.hosts.keys().cloned().collect()
    }

    pub fn cores_per_host(&self) -> IndexMap<String, u32> {
        self.hosts.values().map(|h| (h.name.clone(), h.cores)).collect()
    }

    fn allocated(&self, host: &str) -> (u32, u64) {
        self.vms
            .values()
            .filter(|vm| vm.state == VmState::Running && vm.host.as_deref() == Some(host))
            .fold((0, 0), |(cores, memory), vm| (cores + vm.cores, memory + vm.memory))
    }

    /// Number of running VMs bound to the host.
    pub fn running_vm_count(&self, host: &str) -> u32 {
        self.vms
            .values()
            .filter(|vm| vm.state == VmState::Running && vm.host.as_deref() == Some(host))
            .count() as u32
    }

    pub fn idle_cores(&self, host: &str) -> u32 {
        match self.hosts.get(host) {
            Some(h) => h.cores.saturating_sub(self.allocated(host).0),
            None => 0,
        }
    }

    pub fn idle_cores_per_host(&self) -> IndexMap<String, u32> {
        self.hosts.keys().map(|h| (h.clone(), self.idle_cores(h))).collect()
    }

    pub fn total_idle_cores(&self) -> u32 {
        self.hosts.keys().map(|h| self.idle_cores(h)).sum()
    }

    fn fits(&self, host: &str, cores: u32, memory: u64) -> bool {
        match self.hosts.get(host) {
            Some(h) => {
                let (used_cores, used_memory) = self.allocated(host);
                used_cores + cores <= h.cores && used_memory + memory <= h.memory
            }
            None => false,
        }
    }

    pub fn is_host_on(&self, host: &str) -> bool {
        self.hosts.get(host).map_or(false, |h| h.on)
    }

    fn host_mut(&mut self, host: &str) -> &mut PhysicalHost {
        self.hosts
            .get_mut(host)
            .unwrap_or_else(|| panic!("unknown host {}", host))
    }

    /// Turns the host on. Panics if the host does not exist.
    pub fn turn_on_host(&mut self, host: &str) {
        let h = self.host_mut(host);
        if !h.on {
            h.on = true;
            log_info!(self.ctx, "turned on host {}", host);
        }
    }

    /// Turns the host off. Panics if the host does not exist or some running VM is bound to it.
    pub fn turn_off_host(&mut self, host: &str) {
        let running = self.running_vm_count(host);
        assert_eq!(running, 0, "can't turn off host {} with {} running VMs", host, running);
        let h = self.host_mut(host);
        if h.on {
            h.on = false;
            log_info!(self.ctx, "turned off host {}", host);
        }
    }

    // VMS /////////////////////////////////////////////////////////////////////////////////////////

    pub fn create_vm(&mut self, cores: u32, memory: u64) -> VmId {
        let id = self.vm_counter;
        self.vm_counter += 1;
        self.vms.insert(
            id,
            VirtualMachine {
                id,
                cores,
                memory,
                host: None,
                state: VmState::Created,
                running_tasks: 0,
            },
        );
        log_debug!(self.ctx, "created vm-{} with {} cores", id, cores);
        id
    }

    /// Starts a created or stopped VM and returns the name of the host it was placed on.
    ///
    /// The host is the requested one if given, otherwise the previous host of the VM if it is on and has room,
    /// otherwise the first powered-on host with enough idle cores and memory.
    pub fn start_vm(&mut self, vm_id: VmId, host: Option<&str>) -> Result<String, CloudError> {
        let vm = self.vms.get(&vm_id).ok_or(CloudError::UnknownVm(vm_id))?;
        if vm.state == VmState::Running {
            return Err(CloudError::InvalidVmState {
                vm: vm_id,
                state: vm.state,
            });
        }
        let (cores, memory) = (vm.cores, vm.memory);
        let target = match host {
            Some(host) => {
                if !self.hosts.contains_key(host) {
                    return Err(CloudError::UnknownHost(host.to_string()));
                }
                if !self.is_host_on(host) {
                    return Err(CloudError::HostIsOff(host.to_string()));
                }
                if !self.fits(host, cores, memory) {
                    return Err(CloudError::NotEnoughResources(vm_id));
                }
                host.to_string()
            }
            None => {
                let previous = vm
                    .host
                    .clone()
                    .filter(|h| self.is_host_on(h) && self.fits(h, cores, memory));
                previous
                    .or_else(|| {
                        self.hosts
                            .values()
                            .find(|h| h.on && self.fits(&h.name, cores, memory))
                            .map(|h| h.name.clone())
                    })
                    .ok_or(CloudError::NotEnoughResources(vm_id))?
            }
        };
        if let Some(vm) = self.vms.get_mut(&vm_id) {
            vm.host = Some(target.clone());
            vm.state = VmState::Running;
        }
        log_info!(self.ctx, "started vm-{} on host {}", vm_id, target);
        Ok(target)
    }

    /// Stops an idle running VM. The VM keeps its binding to the host.
    pub fn shutdown_vm(&mut self, vm_id: VmId) -> Result<(), CloudError> {
        let vm = self.vms.get_mut(&vm_id).ok_or(CloudError::UnknownVm(vm_id))?;
        if vm.state != VmState::Running {
            return Err(CloudError::InvalidVmState {
                vm: vm_id,
                state: vm.state,
            });
        }
        if vm.running_tasks > 0 {
            return Err(CloudError::VmIsBusy(vm_id));
        }
        vm.state = VmState::Down;
        log_info!(self.ctx, "shut down vm-{} on host {}", vm_id, vm.host().unwrap_or("-"));
        Ok(())
    }

    /// Removes a VM that is not running.
    pub fn destroy_vm(&mut self, vm_id: VmId) -> Result<(), CloudError> {
        let vm = self.vms.get(&vm_id).ok_or(CloudError::UnknownVm(vm_id))?;
        if vm.state == VmState::Running {
            return Err(CloudError::InvalidVmState {
                vm: vm_id,
                state: vm.state,
            });
        }
        self.vms.remove(&vm_id);
        log_debug!(self.ctx, "destroyed vm-{}", vm_id);
        Ok(())
    }

    pub fn vm(&self, vm_id: VmId) -> Option<&VirtualMachine> {
        self.vms.get(&vm_id)
    }

    pub fn vms(&self) -> impl Iterator<Item = &VirtualMachine> {
        self.vms.values()
    }

    pub fn is_vm_running(&self, vm_id: VmId) -> bool {
        self.vms.get(&vm_id).map_or(false, |vm| vm.state == VmState::Running)
    }

    pub fn is_vm_down(&self, vm_id: VmId) -> bool {
        self.vms.get(&vm_id).map_or(false, |vm| vm.state == VmState::Down)
    }

    pub fn vm_host(&self, vm_id: VmId) -> Option<&str> {
        self.vms.get(&vm_id).and_then(|vm| vm.host())
    }

    pub fn vm_cores(&self, vm_id: VmId) -> Option<u32> {
        self.vms.get(&vm_id).map(|vm| vm.cores)
    }

    pub fn vm_idle_cores(&self, vm_id: VmId) -> u32 {
        self.vms.get(&vm_id).map_or(0, |vm| vm.idle_cores())
    }

    // JOBS ////////////////////////////////////////////////////////////////////////////////////////

    /// Submits the job to a running VM with an idle core.
    ///
    /// The core is occupied immediately, the task starts at the current time and runs for `flops / host speed`.
    /// On completion [`JobCompleted`] is sent to `requester`.
    pub fn submit_job(&mut self, job: StandardJob, vm_id: VmId, requester: Id) -> Result<(), CloudError> {
        let vm = self.vms.get_mut(&vm_id).ok_or(CloudError::UnknownVm(vm_id))?;
        if vm.state != VmState::Running {
            return Err(CloudError::InvalidVmState {
                vm: vm_id,
                state: vm.state,
            });
        }
        if vm.idle_cores() == 0 {
            return Err(CloudError::VmIsBusy(vm_id));
        }
        vm.running_tasks += 1;
        self.jobs.insert(job.task, RunningJob { vm: vm_id, requester });
        self.ctx.emit_self_now(JobStarted { task: job.task, vm: vm_id });
        Ok(())
    }

    fn on_job_started(&mut self, task_id: TaskId, vm_id: VmId) {
        let host_name = self
            .vm_host(vm_id)
            .unwrap_or_else(|| panic!("vm-{} runs a job but is not bound to a host", vm_id))
            .to_string();
        let speed = self.hosts[&host_name].speed;
        let flops = {
            let mut workflow = self.workflow.borrow_mut();
            workflow.on_task_started(task_id, self.ctx.time(), &host_name);
            workflow.task(task_id).flops
        };
        log_debug!(self.ctx, "task {} started on vm-{} ({})", task_id, vm_id, host_name);
        self.ctx.emit_self(JobFinished { task: task_id, vm: vm_id }, flops / speed);
    }

    fn on_job_finished(&mut self, task_id: TaskId, vm_id: VmId) {
        self.workflow.borrow_mut().on_task_finished(task_id, self.ctx.time());
        if let Some(vm) = self.vms.get_mut(&vm_id) {
            vm.running_tasks -= 1;
        }
        let job = self
            .jobs
            .remove(&task_id)
            .unwrap_or_else(|| panic!("no running job for task {}", task_id));
        log_debug!(self.ctx, "task {} finished on vm-{}", task_id, job.vm);
        self.ctx.emit_now(JobCompleted { task: task_id, vm: vm_id }, job.requester);
    }
}

impl EventHandler for CloudService {
    fn on(&mut self, event: Event) {
        cast!(match event.data {
            JobStarted { task, vm } => {
                self.on_job_started(task, vm);
            }
            JobFinished { task, vm } => {
                self.on_job_finished(task, vm);
            }
        })
    }
}

/// Compute service handed to the job scheduler.
pub enum ComputeService {
    Cloud(Rc<RefCell<CloudService>>),
    /// Fixed set of hosts without VM management.
    BareMetal { name: String, hosts: Vec<String> },
}

impl ComputeService {
    pub fn name(&self) -> String {
        match self {
            ComputeService::Cloud(cloud) => cloud.borrow().name().to_string(),
            ComputeService::BareMetal { name, .. } => name.clone(),
        }
    }
}
