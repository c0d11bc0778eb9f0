use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::ScenarioError;

/// Physical properties of a fluid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FluidType {
    /// kg/m^3
    pub density: f64,
    /// m^2/s
    pub kinematic_viscosity: f64,
}

pub const WATER: FluidType = FluidType {
    density: 1000.,
    kinematic_viscosity: 1e-6,
};

pub const HONEY: FluidType = FluidType {
    density: 1400.,
    kinematic_viscosity: 7.14e-3,
};

pub const OLIVE_OIL: FluidType = FluidType {
    density: 905.,
    kinematic_viscosity: 4.32e-5,
};

impl FluidType {
    pub fn by_name(name: &str) -> Option<FluidType> {
        match name.trim().to_ascii_lowercase().replace([' ', '-'], "_").as_str() {
            "water" => Some(WATER),
            "honey" => Some(HONEY),
            "olive_oil" => Some(OLIVE_OIL),
            _ => None,
        }
    }
}

pub const MIN_DENSITY: f64 = 400.;
pub const MAX_DENSITY: f64 = 2000.;

/// A box of fluid inside the unit tank.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FluidBlock {
    /// kg/m^3, within [400, 2000]
    pub density: f64,
    /// m^2/s
    pub kinematic_viscosity: f64,
    /// Edge lengths in x, y, z (m).
    pub dimensions: [f64; 3],
    /// Lower corner in the tank (m).
    #[serde(default)]
    pub position: [f64; 3],
    /// m/s
    #[serde(default)]
    pub initial_velocity: [f64; 3],
}

impl FluidBlock {
    pub fn new(fluid: FluidType, dimensions: [f64; 3]) -> Result<Self, ScenarioError> {
        let block = FluidBlock {
            density: fluid.density,
            kinematic_viscosity: fluid.kinematic_viscosity,
            dimensions,
            position: [0.; 3],
            initial_velocity: [0.; 3],
        };
        block.validate()?;
        Ok(block)
    }

    pub fn with_position(mut self, position: [f64; 3]) -> Self {
        self.position = position;
        self
    }

    pub fn with_initial_velocity(mut self, initial_velocity: [f64; 3]) -> Self {
        self.initial_velocity = initial_velocity;
        self
    }

    pub fn fluid(&self) -> FluidType {
        FluidType {
            density: self.density,
            kinematic_viscosity: self.kinematic_viscosity,
        }
    }

    pub fn validate(&self) -> Result<(), ScenarioError> {
        if !(MIN_DENSITY..=MAX_DENSITY).contains(&self.density) {
            return Err(ScenarioError::InvalidModel(format!(
                "density {} should be in [{}, {}] kg/m^3",
                self.density, MIN_DENSITY, MAX_DENSITY
            )));
        }
        if !(self.kinematic_viscosity.is_finite() && self.kinematic_viscosity > 0.) {
            return Err(ScenarioError::InvalidModel(format!(
                "kinematic viscosity {} should be positive",
                self.kinematic_viscosity
            )));
        }
        if self.dimensions.iter().any(|d| !(d.is_finite() && *d > 0.)) {
            return Err(ScenarioError::InvalidModel(format!(
                "dimensions {:?} should be positive",
                self.dimensions
            )));
        }
        if self.position.iter().chain(&self.initial_velocity).any(|v| !v.is_finite()) {
            return Err(ScenarioError::InvalidModel(
                "position and initial velocity must be finite".into(),
            ));
        }
        Ok(())
    }
}

/// Particle radius presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticleResolution {
    High,
    Medium,
    Low,
}

impl ParticleResolution {
    /// Particle radius in meters.
    pub fn radius(self) -> f64 {
        match self {
            ParticleResolution::High => 0.008,
            ParticleResolution::Medium => 0.01,
            ParticleResolution::Low => 0.02,
        }
    }
}

impl FromStr for ParticleResolution {
    type Err = ScenarioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(ParticleResolution::High),
            "medium" => Ok(ParticleResolution::Medium),
            "low" => Ok(ParticleResolution::Low),
            _ => Err(ScenarioError::InvalidModel(format!(
                "unknown resolution '{}', expected high, medium or low",
                s
            ))),
        }
    }
}

impl fmt::Display for ParticleResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ParticleResolution::High => "high",
            ParticleResolution::Medium => "medium",
            ParticleResolution::Low => "low",
        };
        f.write_str(s)
    }
}
