use std::{
    fmt,
    path::{Path, PathBuf},
};

use crate::{error::ScenarioError, scenario::input_files::SimulationRequest};

/// Identifies a submitted simulation job.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobHandle {
    pub id: String,
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Terminal state of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Success,
    Failed(String),
    Killed,
}

impl JobStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, JobStatus::Success)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Success => f.write_str("success"),
            JobStatus::Failed(reason) => write!(f, "failed ({})", reason),
            JobStatus::Killed => f.write_str("killed"),
        }
    }
}

/// A job system that runs simulators on prepared input directories.
pub trait SimulationService {
    /// Uploads `input_dir` and starts the job described by `request`.
    fn submit(&self, input_dir: &Path, request: &SimulationRequest) -> Result<JobHandle, ScenarioError>;

    /// Blocks until the job reaches a terminal state.
    fn wait(&self, job: &JobHandle) -> Result<JobStatus, ScenarioError>;

    /// Copies the job outputs below `dest` and returns the directory that
    /// holds them. Snapshots are expected in its `vtk` subdirectory.
    fn download_outputs(&self, job: &JobHandle, dest: &Path) -> Result<PathBuf, ScenarioError>;
}

impl<S: SimulationService + ?Sized> SimulationService for &S {
    fn submit(&self, input_dir: &Path, request: &SimulationRequest) -> Result<JobHandle, ScenarioError> {
        (**self).submit(input_dir, request)
    }

    fn wait(&self, job: &JobHandle) -> Result<JobStatus, ScenarioError> {
        (**self).wait(job)
    }

    fn download_outputs(&self, job: &JobHandle, dest: &Path) -> Result<PathBuf, ScenarioError> {
        (**self).download_outputs(job, dest)
    }
}
