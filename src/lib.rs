/*!
Renders SPH particle snapshots into movies and prepares fluid block
scenarios for SPlisHSPlasH and DualSPHysics.
*/

pub mod cli;
pub mod config;
pub mod error;
pub mod post_processing;
pub mod scenario;

pub use error::{ConfigError, RenderError, RenderResult, ScenarioError};
pub use post_processing::{render_movie, render_simulation_output, MovieSettings, MovieSummary};
