use serde::{Deserialize, Serialize};

use crate::error::ScenarioError;

/// Simulator independent run settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationParameters {
    /// Simulated time in seconds.
    pub simulation_time: f64,
    /// m
    pub particle_radius: f64,
    /// s
    pub time_step: f64,
    /// Snapshots written per simulated second.
    pub output_export_rate: f64,
}

impl Default for SimulationParameters {
    fn default() -> Self {
        SimulationParameters {
            simulation_time: 1.,
            particle_radius: 0.02,
            time_step: 0.001,
            output_export_rate: 60.,
        }
    }
}

impl SimulationParameters {
    pub fn validate(&self) -> Result<(), ScenarioError> {
        let fields = [
            ("simulation_time", self.simulation_time),
            ("particle_radius", self.particle_radius),
            ("time_step", self.time_step),
            ("output_export_rate", self.output_export_rate),
        ];
        for (name, value) in fields {
            if !(value.is_finite() && value > 0.) {
                return Err(ScenarioError::InvalidModel(format!("{} = {} should be positive", name, value)));
            }
        }
        Ok(())
    }

    /// Spacing of the initial particle lattice.
    pub fn particle_distance(&self) -> f64 {
        2. * self.particle_radius
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let params = SimulationParameters::default();
        params.validate().unwrap();
        assert_eq!(params.particle_distance(), 0.04);
    }

    #[test]
    fn rejects_zero_time_step() {
        let params = SimulationParameters {
            time_step: 0.,
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }
}
