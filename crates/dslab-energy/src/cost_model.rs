//! Cost models ranking candidate VMs for a task.

use std::collections::BTreeMap;

use crate::cloud::{CloudService, VmId};
use crate::workflow::Task;

/// Estimates the cost of running a task on a VM. Lower cost is preferred, the value has no unit.
pub trait CostModel {
    /// * `running_vms_per_host` - number of running VMs bound to each host, hosts without an entry have none.
    fn estimate_cost(
        &self,
        task: &Task,
        vm: VmId,
        running_vms_per_host: &BTreeMap<String, u32>,
        cloud: &CloudService,
    ) -> f64;
}

/// Occupancy-based model.
///
/// A running VM costs nothing. Otherwise starting a VM is cheap if some host is partially occupied
/// and expensive if every host is either empty or full.
pub struct TraditionalPowerModel;

impl TraditionalPowerModel {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TraditionalPowerModel {
    fn default() -> Self {
        Self::new()
    }
}

impl CostModel for TraditionalPowerModel {
    fn estimate_cost(
        &self,
        _task: &Task,
        vm: VmId,
        running_vms_per_host: &BTreeMap<String, u32>,
        cloud: &CloudService,
    ) -> f64 {
        if cloud.is_vm_running(vm) {
            return 0.;
        }
        let has_partial_host = cloud.cores_per_host().iter().any(|(host, &cores)| {
            let running = running_vms_per_host.get(host).copied().unwrap_or(0);
            running > 0 && running < cores
        });
        if has_partial_host {
            1.
        } else {
            2.
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use simcore::Simulation;

    use super::*;
    use crate::cloud::PhysicalHost;
    use crate::workflow::Workflow;

    fn cloud_with_hosts(sim: &mut Simulation) -> (CloudService, Task) {
        let mut workflow = Workflow::new();
        let task_id = workflow.add_task("t", 1e9, 100.);
        let task = workflow.task(task_id).clone();
        let mut cloud = CloudService::new(Rc::new(RefCell::new(workflow)), sim.create_context("cloud"));
        cloud.add_host(PhysicalHost::new("h0", 4, 16_000_000_000, 1e9, 100., 200.));
        cloud.add_host(PhysicalHost::new("h1", 4, 16_000_000_000, 1e9, 100., 200.));
        (cloud, task)
    }

    #[test]
    fn test_running_vm_is_free() {
        let mut sim = Simulation::new();
        let (mut cloud, task) = cloud_with_hosts(&mut sim);
        let vm = cloud.create_vm(1, 1_000_000_000);
        cloud.start_vm(vm, None).unwrap();
        let model = TraditionalPowerModel::new();
        // occupancy map contents do not matter for running VMs
        assert_eq!(model.estimate_cost(&task, vm, &BTreeMap::new(), &cloud), 0.);
        let full: BTreeMap<String, u32> = [("h0".to_string(), 4), ("h1".to_string(), 4)].into();
        assert_eq!(model.estimate_cost(&task, vm, &full, &cloud), 0.);
    }

    #[test]
    fn test_partial_host_is_cheaper() {
        let mut sim = Simulation::new();
        let (mut cloud, task) = cloud_with_hosts(&mut sim);
        let vm = cloud.create_vm(1, 1_000_000_000);
        let model = TraditionalPowerModel::new();

        let partial: BTreeMap<String, u32> = [("h0".to_string(), 2)].into();
        assert_eq!(model.estimate_cost(&task, vm, &partial, &cloud), 1.);

        let empty_and_full: BTreeMap<String, u32> = [("h0".to_string(), 0), ("h1".to_string(), 4)].into();
        assert_eq!(model.estimate_cost(&task, vm, &empty_and_full, &cloud), 2.);

        // missing hosts count as having no running VMs
        assert_eq!(model.estimate_cost(&task, vm, &BTreeMap::new(), &cloud), 2.);

        cloud.start_vm(vm, None).unwrap();
        cloud.shutdown_vm(vm).unwrap();
        assert_eq!(model.estimate_cost(&task, vm, &partial, &cloud), 1.);
    }
}
