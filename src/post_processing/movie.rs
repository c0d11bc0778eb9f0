use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

use crate::{
    error::{RenderError, RenderResult},
    post_processing::{
        cairo_renderer::{CairoFrameRenderer, Coloring, FrameRenderer, FrameStyle},
        camera::CameraSpec,
        colors::parse_color,
        snapshot::{discover_snapshots, SnapshotFile},
        video_encoder::{FfmpegEncoder, MovieEncoder},
        virtual_display::VirtualDisplay,
    },
};

/// Subdirectory of a downloaded simulation output that holds the snapshots.
pub const VTK_SUBDIR: &str = "vtk";
pub const DEFAULT_MOVIE_NAME: &str = "movie.mp4";
const VIRTUAL_DISPLAY_NUMBER: u32 = 99;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MovieSettings {
    /// Frames per second of the output video.
    pub frame_rate: f64,
    /// Marker color when no scalar field is given.
    pub color: String,
    /// Point data array used to color the markers instead of `color`.
    pub scalars: Option<String>,
    /// Color map range, computed from each frame when missing.
    pub scalar_range: Option<[f64; 2]>,
    /// Defaults to viridis.
    pub colormap: Option<String>,
    pub camera: CameraSpec,
    pub width: u32,
    pub height: u32,
    /// Marker diameter in pixels.
    pub point_size: f64,
    pub background: String,
    pub show_scalar_bar: bool,
    pub parallel: bool,
    /// Where the temporary frame directory is created, system temp dir if missing.
    pub scratch_dir: Option<PathBuf>,
    /// Start an Xvfb server on display :99 for the duration of the render.
    /// This sets the process wide `DISPLAY`, so renders using it run one at
    /// a time within a process.
    pub virtual_display: bool,
    pub ffmpeg: PathBuf,
}

impl Default for MovieSettings {
    fn default() -> Self {
        MovieSettings {
            frame_rate: 10.,
            color: String::from("blue"),
            scalars: None,
            scalar_range: None,
            colormap: None,
            camera: CameraSpec::default(),
            width: 1024,
            height: 768,
            point_size: 5.,
            background: String::from("white"),
            show_scalar_bar: true,
            parallel: false,
            scratch_dir: None,
            virtual_display: false,
            ffmpeg: PathBuf::from("ffmpeg"),
        }
    }
}

impl MovieSettings {
    pub fn validate(&self) -> RenderResult<()> {
        if !(self.frame_rate.is_finite() && self.frame_rate > 0.) {
            return Err(RenderError::InvalidSetting {
                name: "frame_rate",
                reason: format!("{} is not a positive number", self.frame_rate),
            });
        }
        if let Some([lo, hi]) = self.scalar_range {
            if !(lo.is_finite() && hi.is_finite() && lo < hi) {
                return Err(RenderError::InvalidSetting {
                    name: "scalar_range",
                    reason: format!("[{}, {}] is not a finite range with min < max", lo, hi),
                });
            }
        }
        self.camera.validate()
    }

    pub fn frame_style(&self) -> RenderResult<FrameStyle> {
        let coloring = match &self.scalars {
            Some(field) => Coloring::Scalars {
                field: field.clone(),
                range: self.scalar_range.map(|[lo, hi]| (lo, hi)),
                colormap: self.colormap.clone().unwrap_or_else(|| String::from("viridis")),
            },
            None => Coloring::Flat(parse_color(&self.color)?),
        };

        Ok(FrameStyle {
            width: self.width,
            height: self.height,
            point_size: self.point_size,
            background: parse_color(&self.background)?,
            coloring,
            camera: self.camera,
            show_scalar_bar: self.show_scalar_bar,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovieSummary {
    pub output_path: PathBuf,
    pub frame_count: usize,
    /// Frame indices in the order they appear in the movie.
    pub frame_indices: Vec<u64>,
}

/// Renders every snapshot in `snapshot_dir` with cairo and encodes the
/// frames with ffmpeg into `output_path`.
pub fn render_movie(snapshot_dir: &Path, output_path: &Path, settings: &MovieSettings) -> RenderResult<MovieSummary> {
    settings.validate()?;
    let renderer = CairoFrameRenderer::new(settings.frame_style()?)?;
    let encoder = FfmpegEncoder::new(&settings.ffmpeg);

    let _display = if settings.virtual_display {
        Some(VirtualDisplay::start(VIRTUAL_DISPLAY_NUMBER)?)
    } else {
        None
    };

    render_movie_with(&renderer, &encoder, snapshot_dir, output_path, settings)
}

/// Same as [`render_movie`] with caller supplied rendering and encoding
/// backends. Only `frame_rate`, `parallel` and `scratch_dir` of `settings`
/// are used here.
pub fn render_movie_with<R, E>(
    renderer: &R,
    encoder: &E,
    snapshot_dir: &Path,
    output_path: &Path,
    settings: &MovieSettings,
) -> RenderResult<MovieSummary>
where
    R: FrameRenderer + Sync,
    E: MovieEncoder,
{
    settings.validate()?;

    let snapshots = discover_snapshots(snapshot_dir)?;
    log::info!(
        "rendering {} snapshots from {:?} into {:?} at {} fps",
        snapshots.len(),
        snapshot_dir,
        output_path,
        settings.frame_rate
    );

    let scratch = create_scratch_dir(settings.scratch_dir.as_deref())?;
    let mut frames = render_frames(renderer, &snapshots, scratch.path(), settings.parallel)?;
    // zero padded names, lexical order is frame order
    frames.sort();

    encoder.encode(&frames, settings.frame_rate, output_path)?;

    let scratch_path = scratch.path().to_path_buf();
    if let Err(e) = scratch.close() {
        log::warn!("failed to remove frame directory {:?}: {}", scratch_path, e);
    }

    log::info!("wrote {} frames to {:?}", frames.len(), output_path);
    Ok(MovieSummary {
        output_path: output_path.to_path_buf(),
        frame_count: frames.len(),
        frame_indices: snapshots.iter().map(|s| s.frame_index).collect(),
    })
}

fn create_scratch_dir(root: Option<&Path>) -> RenderResult<TempDir> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("sph-movie-frames-");
    match root {
        Some(root) => builder.tempdir_in(root).map_err(|e| RenderError::io(root, e)),
        None => builder.tempdir().map_err(|e| RenderError::io(std::env::temp_dir(), e)),
    }
}

fn render_frames<R: FrameRenderer + Sync>(
    renderer: &R,
    snapshots: &[SnapshotFile],
    scratch: &Path,
    parallel: bool,
) -> RenderResult<Vec<PathBuf>> {
    let render_one = |(rank, snapshot): (usize, &SnapshotFile)| -> RenderResult<PathBuf> {
        let image_path = scratch.join(snapshot.image_file_name(rank));
        log::debug!("frame {}: {:?} -> {:?}", snapshot.frame_index, snapshot.path, image_path);
        renderer.render_frame(snapshot, &image_path)?;
        Ok(image_path)
    };

    if parallel {
        snapshots.par_iter().enumerate().map(render_one).collect()
    } else {
        snapshots.iter().enumerate().map(render_one).collect()
    }
}

/// Renders `<source_dir>/vtk` of a downloaded simulation into
/// `<source_dir>/<movie_name>`.
pub fn render_simulation_output(
    source_dir: &Path,
    movie_name: &str,
    settings: &MovieSettings,
) -> RenderResult<MovieSummary> {
    let vtk_dir = source_dir.join(VTK_SUBDIR);
    let movie_path = source_dir.join(movie_name);

    log::info!(
        "Rendering movie to {:?} with {} fps.",
        movie_path,
        settings.frame_rate
    );
    render_movie(&vtk_dir, &movie_path, settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_scripts() {
        let settings = MovieSettings::default();
        assert_eq!(settings.frame_rate, 10.);
        assert_eq!(settings.color, "blue");
        assert_eq!(settings.camera, CameraSpec::default());
        assert!(settings.scalars.is_none());
    }

    #[test]
    fn rejects_non_positive_frame_rate() {
        for frame_rate in [0., -1., f64::NAN, f64::INFINITY] {
            let settings = MovieSettings {
                frame_rate,
                ..Default::default()
            };
            assert!(matches!(
                settings.validate(),
                Err(RenderError::InvalidSetting { name: "frame_rate", .. })
            ));
        }
    }

    #[test]
    fn rejects_unbounded_scalar_range() {
        for range in [[0., f64::INFINITY], [f64::NEG_INFINITY, 0.], [1., 1.]] {
            let settings = MovieSettings {
                scalars: Some("velocity".into()),
                scalar_range: Some(range),
                ..Default::default()
            };
            assert!(matches!(
                settings.validate(),
                Err(RenderError::InvalidSetting { name: "scalar_range", .. })
            ));
        }
    }

    #[test]
    fn scalar_settings_become_scalar_coloring() {
        let settings = MovieSettings {
            scalars: Some("velocity".into()),
            scalar_range: Some([0., 2.]),
            ..Default::default()
        };
        match settings.frame_style().unwrap().coloring {
            Coloring::Scalars { field, range, colormap } => {
                assert_eq!(field, "velocity");
                assert_eq!(range, Some((0., 2.)));
                assert_eq!(colormap, "viridis");
            }
            other => panic!("unexpected coloring {:?}", other),
        }
    }

    #[test]
    fn bad_color_is_rejected_before_rendering() {
        let settings = MovieSettings {
            color: "not-a-color".into(),
            ..Default::default()
        };
        assert!(matches!(settings.frame_style(), Err(RenderError::InvalidColor(_))));
    }

    #[test]
    fn yaml_overrides_only_given_fields() {
        let settings: MovieSettings = serde_yaml::from_str("frame_rate: 60\ncolor: red\n").unwrap();
        assert_eq!(settings.frame_rate, 60.);
        assert_eq!(settings.color, "red");
        assert_eq!(settings.width, 1024);

        assert!(serde_yaml::from_str::<MovieSettings>("fps: 60\n").is_err());
    }
}
