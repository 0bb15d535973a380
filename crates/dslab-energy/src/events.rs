//! Standard simulation events.

// JOB EXECUTION EVENTS ////////////////////////////////////////////////////////////////////////////

pub mod job {
    use serde::Serialize;

    use crate::cloud::VmId;
    use crate::workflow::TaskId;

    #[derive(Serialize, Clone)]
    pub struct JobStarted {
        pub task: TaskId,
        pub vm: VmId,
    }

    #[derive(Serialize, Clone)]
    pub struct JobFinished {
        pub task: TaskId,
        pub vm: VmId,
    }

    /// Sent by the cloud service to the job submitter.
    #[derive(Serialize, Clone)]
    pub struct JobCompleted {
        pub task: TaskId,
        pub vm: VmId,
    }
}

// WORKFLOW MANAGER EVENTS /////////////////////////////////////////////////////////////////////////

pub mod wms {
    use serde::Serialize;

    #[derive(Serialize, Clone)]
    pub struct StartWorkflow {}
}

// POWER METER EVENTS //////////////////////////////////////////////////////////////////////////////

pub mod power {
    use serde::Serialize;

    #[derive(Serialize, Clone)]
    pub struct MeasurementTimeout {}

    #[derive(Serialize, Clone)]
    pub struct StopMeter {}
}
