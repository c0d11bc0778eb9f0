//! Typed input-file generation for the supported simulators.
//!
//! Both simulators get a fluid block inside a unit tank with its lower corner
//! at the origin and gravity along -z.

use std::{
    fmt::{self, Write as _},
    fs,
    path::Path,
};

use serde::{Deserialize, Serialize};

use crate::{
    error::ScenarioError,
    scenario::{models::FluidBlock, simulation_parameters::SimulationParameters},
};

pub const SPLISHSPLASH_SCENE_FILE: &str = "fluid_block.json";
pub const DUALSPHYSICS_CASE_FILE: &str = "fluid_block.xml";
pub const DUALSPHYSICS_CASE_NAME: &str = "fluid_block";

const GRAVITY: [f64; 3] = [0., 0., -9.81];
const TANK_SIZE: f64 = 1.;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Simulator {
    SplishSplash,
    DualSPHysics,
}

impl fmt::Display for Simulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Simulator::SplishSplash => f.write_str("SPlisHSPlasH"),
            Simulator::DualSPHysics => f.write_str("DualSPHysics"),
        }
    }
}

/// What a simulation service needs, besides the input directory, to start a
/// job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimulationRequest {
    /// Run SPlisHSPlasH on the given scene file.
    SplishSplash { scene_file: String },
    /// Run the DualSPHysics tool chain, one command after the other.
    DualSPHysics { commands: Vec<String> },
}

impl SimulationRequest {
    pub fn simulator(&self) -> Simulator {
        match self {
            SimulationRequest::SplishSplash { .. } => Simulator::SplishSplash,
            SimulationRequest::DualSPHysics { .. } => Simulator::DualSPHysics,
        }
    }
}

/// Writes the files a simulator needs to run a fluid block scenario.
pub trait InputFileWriter {
    fn write_inputs(
        &self,
        block: &FluidBlock,
        params: &SimulationParameters,
        dir: &Path,
    ) -> Result<SimulationRequest, ScenarioError>;
}

impl InputFileWriter for Simulator {
    fn write_inputs(
        &self,
        block: &FluidBlock,
        params: &SimulationParameters,
        dir: &Path,
    ) -> Result<SimulationRequest, ScenarioError> {
        block.validate()?;
        params.validate()?;
        match self {
            Simulator::SplishSplash => write_splishsplash_scene(block, params, dir),
            Simulator::DualSPHysics => write_dualsphysics_case(block, params, dir),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct SplishSplashScene {
    configuration: SceneConfiguration,
    materials: Vec<Material>,
    rigid_bodies: Vec<RigidBody>,
    fluid_blocks: Vec<FluidBlockEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SceneConfiguration {
    particle_radius: f64,
    stop_at: f64,
    time_step_size: f64,
    #[serde(rename = "enableVTKExport")]
    enable_vtk_export: bool,
    #[serde(rename = "dataExportFPS")]
    data_export_fps: f64,
    particle_attributes: &'static str,
    gravitation: [f64; 3],
    simulation_method: u32,
    boundary_handling_method: u32,
    cfl_method: u32,
    cfl_factor: f64,
    cfl_max_time_step_size: f64,
    max_iterations: u32,
    max_error: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Material {
    id: &'static str,
    density0: f64,
    viscosity: f64,
    viscosity_method: u32,
    color_map_type: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RigidBody {
    geometry_file: &'static str,
    translation: [f64; 3],
    scale: [f64; 3],
    is_dynamic: bool,
    is_wall: bool,
    map_invert: bool,
    map_thickness: f64,
    map_resolution: [u32; 3],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FluidBlockEntry {
    id: &'static str,
    dense_mode: u32,
    start: [f64; 3],
    end: [f64; 3],
    translation: [f64; 3],
    scale: [f64; 3],
    initial_velocity: [f64; 3],
}

const FLUID_ID: &str = "Fluid";
// DFSPH
const SIMULATION_METHOD_DFSPH: u32 = 4;
// volume maps
const BOUNDARY_HANDLING_VOLUME_MAPS: u32 = 2;
// Weiler 2018, takes the kinematic viscosity directly
const VISCOSITY_METHOD_WEILER: u32 = 6;

/// Sampled particles must not touch the tank walls, so the block is shrunk
/// by twice the particle radius on every side.
fn splishsplash_fluid_bounds(
    block: &FluidBlock,
    params: &SimulationParameters,
) -> Result<([f64; 3], [f64; 3]), ScenarioError> {
    let margin = 2. * params.particle_radius;
    let mut start = [0.; 3];
    let mut end = [0.; 3];
    for axis in 0..3 {
        let size = block.dimensions[axis] - 2. * margin;
        if size <= 0. {
            return Err(ScenarioError::InvalidModel(format!(
                "fluid block dimensions {:?} leave no room for particles of radius {}",
                block.dimensions, params.particle_radius
            )));
        }
        start[axis] = block.position[axis] + margin;
        end[axis] = start[axis] + size;
    }
    Ok((start, end))
}

fn write_splishsplash_scene(
    block: &FluidBlock,
    params: &SimulationParameters,
    dir: &Path,
) -> Result<SimulationRequest, ScenarioError> {
    let (start, end) = splishsplash_fluid_bounds(block, params)?;

    let scene = SplishSplashScene {
        configuration: SceneConfiguration {
            particle_radius: params.particle_radius,
            stop_at: params.simulation_time,
            time_step_size: params.time_step,
            enable_vtk_export: true,
            data_export_fps: params.output_export_rate,
            particle_attributes: "velocity;density",
            gravitation: GRAVITY,
            simulation_method: SIMULATION_METHOD_DFSPH,
            boundary_handling_method: BOUNDARY_HANDLING_VOLUME_MAPS,
            cfl_method: 1,
            cfl_factor: 1.,
            cfl_max_time_step_size: 0.005,
            max_iterations: 100,
            max_error: 0.01,
        },
        materials: vec![Material {
            id: FLUID_ID,
            density0: block.density,
            viscosity: block.kinematic_viscosity,
            viscosity_method: VISCOSITY_METHOD_WEILER,
            color_map_type: 1,
        }],
        rigid_bodies: vec![RigidBody {
            geometry_file: "../models/UnitBox.obj",
            translation: [TANK_SIZE / 2.; 3],
            scale: [TANK_SIZE; 3],
            is_dynamic: false,
            is_wall: true,
            map_invert: true,
            map_thickness: 0.,
            map_resolution: [25, 25, 25],
        }],
        fluid_blocks: vec![FluidBlockEntry {
            id: FLUID_ID,
            dense_mode: 0,
            start,
            end,
            translation: [0.; 3],
            scale: [1.; 3],
            initial_velocity: block.initial_velocity,
        }],
    };

    let path = dir.join(SPLISHSPLASH_SCENE_FILE);
    let json = serde_json::to_string_pretty(&scene)?;
    fs::write(&path, json).map_err(|source| ScenarioError::InputFile {
        path: path.clone(),
        source,
    })?;
    log::info!("wrote SPlisHSPlasH scene {:?}", path);

    Ok(SimulationRequest::SplishSplash {
        scene_file: SPLISHSPLASH_SCENE_FILE.to_string(),
    })
}

fn xyz(tag: &str, v: [f64; 3]) -> String {
    format!("<{} x=\"{}\" y=\"{}\" z=\"{}\" />", tag, v[0], v[1], v[2])
}

fn parameter(out: &mut String, key: &str, value: impl fmt::Display) {
    writeln!(out, "      <parameter key=\"{}\" value=\"{}\" />", key, value).ok();
}

fn dualsphysics_case_xml(block: &FluidBlock, params: &SimulationParameters) -> String {
    let dp = params.particle_distance();
    let domain_min = [-2. * dp; 3];
    let domain_max = [TANK_SIZE + 2. * dp; 3];

    let mut xml = String::new();
    // writing into a String cannot fail
    writeln!(xml, "<?xml version=\"1.0\" encoding=\"UTF-8\" ?>").ok();
    writeln!(xml, "<case>").ok();
    writeln!(xml, "  <casedef>").ok();
    writeln!(xml, "    <constantsdef>").ok();
    writeln!(xml, "      {}", xyz("gravity", GRAVITY)).ok();
    writeln!(xml, "      <rhop0 value=\"{}\" />", block.density).ok();
    writeln!(xml, "      <hswl value=\"0\" auto=\"true\" />").ok();
    writeln!(xml, "      <gamma value=\"7\" />").ok();
    writeln!(xml, "      <speedsystem value=\"0\" auto=\"true\" />").ok();
    writeln!(xml, "      <coefsound value=\"20\" />").ok();
    writeln!(xml, "      <speedsound value=\"0\" auto=\"true\" />").ok();
    writeln!(xml, "      <coefh value=\"1.2\" />").ok();
    writeln!(xml, "      <cflnumber value=\"0.2\" />").ok();
    writeln!(xml, "    </constantsdef>").ok();
    writeln!(xml, "    <mkconfig boundcount=\"240\" fluidcount=\"9\" />").ok();
    writeln!(xml, "    <geometry>").ok();
    writeln!(xml, "      <definition dp=\"{}\">", dp).ok();
    writeln!(xml, "        {}", xyz("pointmin", domain_min)).ok();
    writeln!(xml, "        {}", xyz("pointmax", domain_max)).ok();
    writeln!(xml, "      </definition>").ok();
    writeln!(xml, "      <commands>").ok();
    writeln!(xml, "        <mainlist>").ok();
    writeln!(xml, "          <setshapemode>actual | dp | bound</setshapemode>").ok();
    writeln!(xml, "          <setdrawmode mode=\"full\" />").ok();
    writeln!(xml, "          <setmkfluid mk=\"0\" />").ok();
    writeln!(xml, "          <drawbox>").ok();
    writeln!(xml, "            <boxfill>solid</boxfill>").ok();
    writeln!(xml, "            {}", xyz("point", block.position)).ok();
    writeln!(xml, "            {}", xyz("size", block.dimensions)).ok();
    writeln!(xml, "          </drawbox>").ok();
    writeln!(xml, "          <setmkbound mk=\"0\" />").ok();
    writeln!(xml, "          <setdrawmode mode=\"face\" />").ok();
    writeln!(xml, "          <drawbox>").ok();
    writeln!(xml, "            <boxfill>all ^top</boxfill>").ok();
    writeln!(xml, "            {}", xyz("point", [0.; 3])).ok();
    writeln!(xml, "            {}", xyz("size", [TANK_SIZE; 3])).ok();
    writeln!(xml, "          </drawbox>").ok();
    writeln!(xml, "          <shapeout file=\"\" />").ok();
    writeln!(xml, "        </mainlist>").ok();
    writeln!(xml, "      </commands>").ok();
    writeln!(xml, "    </geometry>").ok();
    writeln!(xml, "    <initials>").ok();
    let v = block.initial_velocity;
    writeln!(
        xml,
        "      <velocity mkfluid=\"0\" x=\"{}\" y=\"{}\" z=\"{}\" />",
        v[0], v[1], v[2]
    )
    .ok();
    writeln!(xml, "    </initials>").ok();
    writeln!(xml, "  </casedef>").ok();
    writeln!(xml, "  <execution>").ok();
    writeln!(xml, "    <parameters>").ok();
    parameter(&mut xml, "StepAlgorithm", 2);
    parameter(&mut xml, "Kernel", 2);
    parameter(&mut xml, "ViscoTreatment", 2);
    parameter(&mut xml, "Visco", block.kinematic_viscosity);
    parameter(&mut xml, "ViscoBoundFactor", 1);
    parameter(&mut xml, "DensityDT", 2);
    parameter(&mut xml, "DensityDTvalue", 0.1);
    parameter(&mut xml, "DtIni", params.time_step);
    parameter(&mut xml, "DtMin", 0.00001);
    parameter(&mut xml, "TimeMax", params.simulation_time);
    parameter(&mut xml, "TimeOut", 1. / params.output_export_rate);
    parameter(&mut xml, "RhopOutMin", 0.7 * block.density);
    parameter(&mut xml, "RhopOutMax", 1.3 * block.density);
    writeln!(xml, "    </parameters>").ok();
    writeln!(xml, "  </execution>").ok();
    writeln!(xml, "</case>").ok();
    xml
}

/// Commands that turn the case file into particle snapshots under `vtk/`.
pub fn dualsphysics_commands() -> Vec<String> {
    let case = DUALSPHYSICS_CASE_NAME;
    vec![
        format!("gencase {} {} -save:all", case, case),
        format!("dualsphysics {} {} -dirdataout data -svres", case, case),
        format!(
            "partvtk -dirin {}/data -savevtk vtk/PartFluid -onlytype:-all,+fluid",
            case
        ),
    ]
}

fn write_dualsphysics_case(
    block: &FluidBlock,
    params: &SimulationParameters,
    dir: &Path,
) -> Result<SimulationRequest, ScenarioError> {
    let path = dir.join(DUALSPHYSICS_CASE_FILE);
    fs::write(&path, dualsphysics_case_xml(block, params)).map_err(|source| ScenarioError::InputFile {
        path: path.clone(),
        source,
    })?;
    log::info!("wrote DualSPHysics case {:?}", path);

    Ok(SimulationRequest::DualSPHysics {
        commands: dualsphysics_commands(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::models::{HONEY, WATER};

    fn assert_close(a: [f64; 3], b: [f64; 3]) {
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-12, "{:?} != {:?}", a, b);
        }
    }

    #[test]
    fn splishsplash_scene_is_inset_by_margin() {
        let dir = tempfile::tempdir().unwrap();
        let block = FluidBlock::new(HONEY, [0.3, 0.4, 0.5]).unwrap().with_position([0.1, 0., 0.]);
        let params = SimulationParameters::default();

        let request = Simulator::SplishSplash.write_inputs(&block, &params, dir.path()).unwrap();
        assert_eq!(
            request,
            SimulationRequest::SplishSplash {
                scene_file: "fluid_block.json".into()
            }
        );

        let json = fs::read_to_string(dir.path().join(SPLISHSPLASH_SCENE_FILE)).unwrap();
        let scene: serde_json::Value = serde_json::from_str(&json).unwrap();
        let fluid = &scene["FluidBlocks"][0];
        let start: [f64; 3] = serde_json::from_value(fluid["start"].clone()).unwrap();
        let end: [f64; 3] = serde_json::from_value(fluid["end"].clone()).unwrap();
        assert_close(start, [0.14, 0.04, 0.04]);
        assert_close(end, [0.36, 0.36, 0.46]);

        assert_eq!(scene["Configuration"]["particleRadius"], 0.02);
        assert_eq!(scene["Configuration"]["enableVTKExport"], true);
        assert_eq!(scene["Materials"][0]["density0"], 1400.);
    }

    #[test]
    fn splishsplash_rejects_block_smaller_than_margin() {
        let dir = tempfile::tempdir().unwrap();
        let block = FluidBlock::new(WATER, [0.3, 0.05, 0.3]).unwrap();
        let params = SimulationParameters::default();
        assert!(matches!(
            Simulator::SplishSplash.write_inputs(&block, &params, dir.path()),
            Err(ScenarioError::InvalidModel(_))
        ));
        assert!(!dir.path().join(SPLISHSPLASH_SCENE_FILE).exists());
    }

    #[test]
    fn dualsphysics_case_and_commands() {
        let dir = tempfile::tempdir().unwrap();
        let block = FluidBlock::new(WATER, [0.3; 3]).unwrap();
        let params = SimulationParameters::default();

        let request = Simulator::DualSPHysics.write_inputs(&block, &params, dir.path()).unwrap();
        assert_eq!(
            request,
            SimulationRequest::DualSPHysics {
                commands: vec![
                    "gencase fluid_block fluid_block -save:all".to_string(),
                    "dualsphysics fluid_block fluid_block -dirdataout data -svres".to_string(),
                    "partvtk -dirin fluid_block/data -savevtk vtk/PartFluid -onlytype:-all,+fluid".to_string(),
                ]
            }
        );
        assert_eq!(request.simulator(), Simulator::DualSPHysics);

        let xml = fs::read_to_string(dir.path().join(DUALSPHYSICS_CASE_FILE)).unwrap();
        assert!(xml.contains("<definition dp=\"0.04\">"));
        assert!(xml.contains("<rhop0 value=\"1000\" />"));
        assert!(xml.contains("<size x=\"0.3\" y=\"0.3\" z=\"0.3\" />"));
        assert!(xml.contains("key=\"TimeMax\" value=\"1\""));
    }

    #[test]
    fn write_into_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        let block = FluidBlock::new(WATER, [0.3; 3]).unwrap();
        assert!(matches!(
            Simulator::DualSPHysics.write_inputs(&block, &SimulationParameters::default(), &missing),
            Err(ScenarioError::InputFile { .. })
        ));
    }

    #[test]
    fn simulator_names_in_yaml() {
        let s: Simulator = serde_yaml::from_str("splishsplash").unwrap();
        assert_eq!(s, Simulator::SplishSplash);
        let s: Simulator = serde_yaml::from_str("dualsphysics").unwrap();
        assert_eq!(s, Simulator::DualSPHysics);
    }
}
