//! YAML configuration files.
//!
//! A config file is parsed into a YAML mapping first. An optional overwrite
//! file may then replace top-level keys of that mapping before it is turned
//! into the typed settings. Keys the overwrite file names must already exist.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_yaml::Value;

use crate::{
    error::{ConfigError, ScenarioError},
    post_processing::MovieSettings,
    scenario::{DamBreak, FluidBlock, FluidType, ParticleResolution, SimulationParameters, Simulator},
};

fn read_yaml(path: &Path) -> Result<Value, ConfigError> {
    let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let value: Value = serde_yaml::from_str(&yaml).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    match value {
        Value::Mapping(_) => Ok(value),
        // an empty file
        Value::Null => Ok(Value::Mapping(Default::default())),
        _ => Err(ConfigError::NotAMapping {
            path: path.to_path_buf(),
        }),
    }
}

/// Replaces the values of `base` for every key in `overwrite`.
pub fn apply_overwrites(base: &mut Value, overwrite: BTreeMap<String, Value>) -> Result<(), ConfigError> {
    let mapping = match base.as_mapping_mut() {
        Some(mapping) => mapping,
        None => {
            return Err(ConfigError::NotAMapping {
                path: PathBuf::new(),
            })
        }
    };
    for (k, v) in overwrite.into_iter() {
        match mapping.get_mut(&Value::String(k.clone())) {
            Some(slot) => *slot = v,
            None => return Err(ConfigError::UnknownAttribute { key: k }),
        }
    }
    Ok(())
}

fn apply_overwrite_file(base: &mut Value, overwrite_file: &Path) -> Result<(), ConfigError> {
    let overwrite = read_yaml(overwrite_file)?;
    let overwrite: BTreeMap<String, Value> =
        serde_yaml::from_value(overwrite).map_err(|source| ConfigError::Parse {
            path: overwrite_file.to_path_buf(),
            source,
        })?;
    log::debug!("overwriting {:?} from {:?}", overwrite.keys().collect::<Vec<_>>(), overwrite_file);
    apply_overwrites(base, overwrite)
}

/// Loads a config file, applies the overwrite file and deserializes the
/// result.
pub fn load_config<T: DeserializeOwned>(path: &Path, overwrite_file: Option<&Path>) -> Result<T, ConfigError> {
    let mut value = read_yaml(path)?;
    if let Some(overwrite_file) = overwrite_file {
        apply_overwrite_file(&mut value, overwrite_file)?;
    }
    serde_yaml::from_value(value).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Movie settings from the defaults, then `config_file`, then the overwrite
/// file. Every layer may only name keys [`MovieSettings`] knows.
pub fn load_movie_settings(
    config_file: Option<&Path>,
    overwrite_file: Option<&Path>,
) -> Result<MovieSettings, ConfigError> {
    let mut value = serde_yaml::to_value(MovieSettings::default()).map_err(ConfigError::Invalid)?;

    if let Some(config_file) = config_file {
        let layer = read_yaml(config_file)?;
        let layer: BTreeMap<String, Value> = serde_yaml::from_value(layer).map_err(|source| ConfigError::Parse {
            path: config_file.to_path_buf(),
            source,
        })?;
        apply_overwrites(&mut value, layer)?;
    }
    if let Some(overwrite_file) = overwrite_file {
        apply_overwrite_file(&mut value, overwrite_file)?;
    }

    serde_yaml::from_value(value).map_err(ConfigError::Invalid)
}

/// Describes a fluid block scenario to prepare.
///
/// Without an explicit `block` a dam break column of `fluid` (water when
/// missing) is used, sized and placed by `dimensions` and `position` when
/// given. `resolution` overrides `parameters.particle_radius`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    pub simulator: Simulator,
    #[serde(default)]
    pub fluid: Option<String>,
    #[serde(default)]
    pub block: Option<FluidBlock>,
    #[serde(default)]
    pub dimensions: Option<[f64; 3]>,
    #[serde(default)]
    pub position: Option<[f64; 3]>,
    #[serde(default)]
    pub resolution: Option<ParticleResolution>,
    #[serde(default)]
    pub parameters: SimulationParameters,
}

impl ScenarioConfig {
    pub fn resolve(&self) -> Result<(FluidBlock, SimulationParameters), ScenarioError> {
        let column_given = self.fluid.is_some() || self.dimensions.is_some() || self.position.is_some();
        let block = match &self.block {
            Some(_) if column_given => {
                return Err(ScenarioError::InvalidModel(
                    "'block' cannot be combined with 'fluid', 'dimensions' or 'position'".into(),
                ))
            }
            Some(block) => {
                block.validate()?;
                *block
            }
            None => {
                let defaults = DamBreak::default();
                let fluid = match &self.fluid {
                    Some(name) => FluidType::by_name(name)
                        .ok_or_else(|| ScenarioError::InvalidModel(format!("unknown fluid '{}'", name)))?,
                    None => defaults.fluid,
                };
                DamBreak {
                    fluid,
                    dimensions: self.dimensions.unwrap_or(defaults.dimensions),
                    position: self.position.unwrap_or(defaults.position),
                    ..defaults
                }
                .block()?
            }
        };

        let mut parameters = self.parameters;
        if let Some(resolution) = self.resolution {
            parameters.particle_radius = resolution.radius();
        }
        parameters.validate()?;

        Ok((block, parameters))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn movie_settings_layers() {
        let dir = tempfile::tempdir().unwrap();
        let config = write(dir.path(), "movie.yaml", "frame_rate: 30\ncolor: red\n");
        let overwrite = write(dir.path(), "overwrite.yaml", "color: green\nscalars: velocity\n");

        let settings = load_movie_settings(Some(&config), Some(&overwrite)).unwrap();
        assert_eq!(settings.frame_rate, 30.);
        assert_eq!(settings.color, "green");
        assert_eq!(settings.scalars.as_deref(), Some("velocity"));
        assert_eq!(settings.width, 1024);
    }

    #[test]
    fn movie_settings_without_files_are_defaults() {
        assert_eq!(load_movie_settings(None, None).unwrap(), MovieSettings::default());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let overwrite = write(dir.path(), "overwrite.yaml", "fps: 30\n");
        match load_movie_settings(None, Some(&overwrite)) {
            Err(ConfigError::UnknownAttribute { key }) => assert_eq!(key, "fps"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn non_mapping_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = write(dir.path(), "list.yaml", "- 1\n- 2\n");
        assert!(matches!(
            load_movie_settings(Some(&config), None),
            Err(ConfigError::NotAMapping { .. })
        ));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_config::<ScenarioConfig>(&dir.path().join("nope.yaml"), None),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn scenario_config_with_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let config = write(
            dir.path(),
            "scenario.yaml",
            "simulator: dualsphysics\nfluid: honey\nresolution: low\nparameters:\n  simulation_time: 2\n",
        );
        let overwrite = write(dir.path(), "overwrite.yaml", "resolution: high\n");

        let config: ScenarioConfig = load_config(&config, Some(&overwrite)).unwrap();
        assert_eq!(config.simulator, Simulator::DualSPHysics);

        let (block, params) = config.resolve().unwrap();
        assert_eq!(block.density, 1400.);
        assert_eq!(block.dimensions, [0.3; 3]);
        assert_eq!(params.particle_radius, 0.008);
        assert_eq!(params.simulation_time, 2.);
        assert_eq!(params.time_step, 0.001);
    }

    #[test]
    fn scenario_config_explicit_block() {
        let config: ScenarioConfig = serde_yaml::from_str(
            "simulator: splishsplash\nblock:\n  density: 905\n  kinematic_viscosity: 4.32e-5\n  dimensions: [0.5, 0.2, 0.4]\n  position: [0.1, 0.1, 0]\n",
        )
        .unwrap();
        let (block, params) = config.resolve().unwrap();
        assert_eq!(block.position, [0.1, 0.1, 0.]);
        assert_eq!(params, SimulationParameters::default());
    }

    #[test]
    fn scenario_config_places_dam_break_column() {
        let config: ScenarioConfig = serde_yaml::from_str(
            "simulator: splishsplash\nfluid: water\ndimensions: [0.2, 0.3, 0.5]\nposition: [0.4, 0, 0]\n",
        )
        .unwrap();
        let (block, params) = config.resolve().unwrap();
        assert_eq!(block.dimensions, [0.2, 0.3, 0.5]);
        assert_eq!(block.position, [0.4, 0., 0.]);
        assert_eq!(params.particle_radius, 0.02);

        let config: ScenarioConfig = serde_yaml::from_str(
            "simulator: splishsplash\nposition: [0.1, 0, 0]\nblock:\n  density: 1000\n  kinematic_viscosity: 1.0e-6\n  dimensions: [0.3, 0.3, 0.3]\n",
        )
        .unwrap();
        assert!(matches!(config.resolve(), Err(ScenarioError::InvalidModel(_))));
    }

    #[test]
    fn scenario_config_rejects_unknown_fluid() {
        let config: ScenarioConfig = serde_yaml::from_str("simulator: splishsplash\nfluid: mercury\n").unwrap();
        assert!(matches!(config.resolve(), Err(ScenarioError::InvalidModel(_))));
    }
}
