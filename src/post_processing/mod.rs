//! Turns a directory of particle snapshots into a movie.
//!
//! Snapshots are ordered by the frame index in their file name, rendered one
//! by one into a temporary directory and then handed to the video encoder.

pub mod cairo_renderer;
pub mod camera;
pub mod color_map;
pub mod colors;
pub mod mesh_reader;
pub mod movie;
pub mod snapshot;
pub mod video_encoder;
pub mod virtual_display;

pub use cairo_renderer::{CairoFrameRenderer, Coloring, FrameRenderer, FrameStyle};
pub use camera::CameraSpec;
pub use movie::{render_movie, render_movie_with, render_simulation_output, MovieSettings, MovieSummary};
pub use snapshot::{discover_snapshots, parse_frame_index, SnapshotFile};
pub use video_encoder::{FfmpegEncoder, MovieEncoder};
