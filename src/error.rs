//! Error types shared by the render pipeline, the scenario toolkit and the
//! configuration loader.

use std::path::PathBuf;

use thiserror::Error;

pub type RenderResult<T> = Result<T, RenderError>;

/// Everything that can abort a movie render. None of these are retried.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("no snapshot files found in {dir:?}")]
    EmptyInput { dir: PathBuf },

    #[error("snapshot file name {path:?} has no frame index (digits fitting a u64) after the last '_'")]
    MalformedFilename { path: PathBuf },

    #[error("encoding movie {output:?} failed: {reason}")]
    Encoding { output: PathBuf, reason: String },

    #[error("i/o error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed reading snapshot {path:?}: {reason}")]
    SnapshotRead { path: PathBuf, reason: String },

    #[error("snapshot {path:?} has no point data array named '{field}'")]
    ScalarFieldMissing { path: PathBuf, field: String },

    #[error("invalid color '{0}'")]
    InvalidColor(String),

    #[error("unknown colormap '{0}'")]
    UnknownColormap(String),

    #[error("invalid camera: {0}")]
    InvalidCamera(String),

    #[error("invalid setting '{name}': {reason}")]
    InvalidSetting { name: &'static str, reason: String },

    #[error("drawing frame {path:?} failed: {reason}")]
    Raster { path: PathBuf, reason: String },

    #[error("virtual display: {0}")]
    VirtualDisplay(String),
}

impl RenderError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RenderError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failures of scenario preparation and of the remote job round trip.
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("invalid model: {0}")]
    InvalidModel(String),

    #[error("failed writing input file {path:?}: {source}")]
    InputFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serializing scene description failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("simulation service: {0}")]
    Service(String),

    #[error("job {job} ended with status {status}")]
    JobFailed { job: String, status: String },
}

/// Failures while loading YAML configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed reading config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed parsing config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("config file {path:?} is not a mapping")]
    NotAMapping { path: PathBuf },

    #[error("not able to find attribute '{key}' to overwrite")]
    UnknownAttribute { key: String },

    #[error("invalid configuration: {0}")]
    Invalid(#[source] serde_yaml::Error),

    #[error("invalid command line value for --{flag}: {reason}")]
    Argument { flag: &'static str, reason: String },
}
