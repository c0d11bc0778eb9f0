//! Fluid block scenarios: typed models, simulator input files and the job
//! round trip through a [`SimulationService`].

pub mod input_files;
pub mod models;
pub mod service;
pub mod simulation_parameters;

use std::{
    fs,
    path::{Path, PathBuf},
};

pub use input_files::{InputFileWriter, SimulationRequest, Simulator};
pub use models::{FluidBlock, FluidType, ParticleResolution, HONEY, OLIVE_OIL, WATER};
pub use service::{JobHandle, JobStatus, SimulationService};
pub use simulation_parameters::SimulationParameters;

use crate::error::ScenarioError;

/// A single fluid block simulated by one simulator through `service`.
pub struct FluidBlockScenario<S> {
    pub block: FluidBlock,
    pub simulator: Simulator,
    service: S,
}

impl<S: SimulationService> FluidBlockScenario<S> {
    pub fn new(block: FluidBlock, simulator: Simulator, service: S) -> Result<Self, ScenarioError> {
        block.validate()?;
        Ok(FluidBlockScenario {
            block,
            simulator,
            service,
        })
    }

    /// Writes the input files into `workdir` and submits the job.
    pub fn simulate(&self, params: &SimulationParameters, workdir: &Path) -> Result<JobHandle, ScenarioError> {
        fs::create_dir_all(workdir).map_err(|source| ScenarioError::InputFile {
            path: workdir.to_path_buf(),
            source,
        })?;
        let request = self.simulator.write_inputs(&self.block, params, workdir)?;
        let job = self.service.submit(workdir, &request)?;
        log::info!("submitted {} job {} from {:?}", self.simulator, job, workdir);
        Ok(job)
    }

    /// Submits, waits for the job and downloads its outputs into
    /// `output_dir`. Returns the directory the outputs ended up in.
    pub fn run(
        &self,
        params: &SimulationParameters,
        workdir: &Path,
        output_dir: &Path,
    ) -> Result<PathBuf, ScenarioError> {
        let job = self.simulate(params, workdir)?;

        let status = self.service.wait(&job)?;
        if !status.is_success() {
            return Err(ScenarioError::JobFailed {
                job: job.id,
                status: status.to_string(),
            });
        }

        let outputs = self.service.download_outputs(&job, output_dir)?;
        log::info!("job {} finished, outputs in {:?}", job, outputs);
        Ok(outputs)
    }
}

/// Edge length of the dam break water column.
pub const DAM_BREAK_COLUMN: f64 = 0.3;

/// A column of fluid in the tank released at t = 0. Defaults to a 0.3 m
/// water cube in the corner at the origin, low resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DamBreak {
    pub fluid: FluidType,
    /// Column edge lengths (m).
    pub dimensions: [f64; 3],
    /// Lower corner of the column in the tank (m).
    pub position: [f64; 3],
    pub resolution: ParticleResolution,
    pub simulation_time: f64,
}

impl Default for DamBreak {
    fn default() -> Self {
        DamBreak {
            fluid: WATER,
            dimensions: [DAM_BREAK_COLUMN; 3],
            position: [0.; 3],
            resolution: ParticleResolution::Low,
            simulation_time: SimulationParameters::default().simulation_time,
        }
    }
}

impl DamBreak {
    pub fn block(&self) -> Result<FluidBlock, ScenarioError> {
        let block = FluidBlock::new(self.fluid, self.dimensions)?.with_position(self.position);
        block.validate()?;
        Ok(block)
    }

    pub fn parameters(&self) -> SimulationParameters {
        SimulationParameters {
            simulation_time: self.simulation_time,
            particle_radius: self.resolution.radius(),
            ..Default::default()
        }
    }

    pub fn scenario<S: SimulationService>(
        &self,
        simulator: Simulator,
        service: S,
    ) -> Result<FluidBlockScenario<S>, ScenarioError> {
        FluidBlockScenario::new(self.block()?, simulator, service)
    }
}
