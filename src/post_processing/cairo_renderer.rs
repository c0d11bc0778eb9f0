use std::{f64::consts::TAU, fs::File, path::Path};

use cairo::{Context, FontSlant, FontWeight, Format, ImageSurface, LinearGradient, RadialGradient};

use crate::{
    error::{RenderError, RenderResult},
    post_processing::{
        camera::{CameraSpec, Projection},
        color_map::{Color, ColorMap},
        colors::{highlight, shade},
        mesh_reader::{finite_range, ParticleCloud},
        snapshot::SnapshotFile,
    },
};

/// Renders one snapshot to one image file.
///
/// Implementations must not keep state between calls; frames may be
/// rendered in any order and from several threads.
pub trait FrameRenderer {
    fn render_frame(&self, snapshot: &SnapshotFile, image_path: &Path) -> RenderResult<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum Coloring {
    Flat(Color),
    Scalars {
        field: String,
        /// Computed per frame from the finite values when `None`.
        range: Option<(f64, f64)>,
        colormap: String,
    },
}

#[derive(Debug, Clone)]
pub struct FrameStyle {
    pub width: u32,
    pub height: u32,
    /// Marker diameter in pixels.
    pub point_size: f64,
    pub background: Color,
    pub coloring: Coloring,
    pub camera: CameraSpec,
    pub show_scalar_bar: bool,
}

pub struct Legend<'a> {
    pub color_map: &'a ColorMap,
    pub title: &'a str,
}

pub struct CairoFrameRenderer {
    style: FrameStyle,
    projection: Projection,
}

impl CairoFrameRenderer {
    pub fn new(style: FrameStyle) -> RenderResult<Self> {
        if !(style.point_size.is_finite() && style.point_size > 0.) {
            return Err(RenderError::InvalidSetting {
                name: "point_size",
                reason: format!("{} is not a positive size", style.point_size),
            });
        }
        if let Coloring::Scalars { colormap, range, .. } = &style.coloring {
            ColorMap::named(colormap, 0., 1.)?;
            if let Some((lo, hi)) = range {
                if !(lo.is_finite() && hi.is_finite()) {
                    return Err(RenderError::InvalidSetting {
                        name: "scalar_range",
                        reason: format!("bounds {} and {} must be finite", lo, hi),
                    });
                }
                if !(lo < hi) {
                    return Err(RenderError::InvalidSetting {
                        name: "scalar_range",
                        reason: format!("min {} must be smaller than max {}", lo, hi),
                    });
                }
            }
        }

        let projection = Projection::new(&style.camera, style.width, style.height)?;
        Ok(CairoFrameRenderer { style, projection })
    }

    pub fn style(&self) -> &FrameStyle {
        &self.style
    }

    /// Draws `cloud` and writes it as PNG to `image_path`. `source` is only
    /// used in error messages.
    pub fn render_cloud(&self, cloud: &ParticleCloud, source: &Path, image_path: &Path) -> RenderResult<()> {
        let (colors, color_map) = self.particle_colors(cloud, source)?;

        let mut projected: Vec<_> = cloud
            .positions
            .iter()
            .zip(colors)
            .filter_map(|(p, color)| self.projection.project(p).map(|pp| (pp, color)))
            .collect();
        // painter's algorithm, far particles first
        projected.sort_by(|a, b| b.0.depth.total_cmp(&a.0.depth));

        let raster = |reason: String| RenderError::Raster {
            path: image_path.to_path_buf(),
            reason,
        };

        let surface = ImageSurface::create(Format::ARgb32, self.style.width as i32, self.style.height as i32)
            .map_err(|e| raster(e.to_string()))?;
        {
            let context = Context::new(&surface).map_err(|e| raster(e.to_string()))?;
            let bg = self.style.background;
            context.set_source_rgb(bg.x, bg.y, bg.z);
            context.paint().map_err(|e| raster(e.to_string()))?;

            let radius = self.style.point_size * 0.5;
            for (p, color) in &projected {
                draw_sphere_marker(&context, p.x, p.y, radius, *color).map_err(|e| raster(e.to_string()))?;
            }

            if let (Some(color_map), Coloring::Scalars { field, .. }) = (&color_map, &self.style.coloring) {
                if self.style.show_scalar_bar {
                    let legend = Legend {
                        color_map,
                        title: field,
                    };
                    draw_legend(&context, &legend, self.style.width as f64, self.style.height as f64)
                        .map_err(|e| raster(e.to_string()))?;
                }
            }
        }

        let mut file = File::create(image_path).map_err(|e| RenderError::io(image_path, e))?;
        surface.write_to_png(&mut file).map_err(|e| raster(e.to_string()))?;

        log::trace!(
            "rendered {:?} ({} of {} particles visible) to {:?}",
            source,
            projected.len(),
            cloud.len(),
            image_path
        );
        Ok(())
    }

    fn particle_colors(&self, cloud: &ParticleCloud, source: &Path) -> RenderResult<(Vec<Color>, Option<ColorMap>)> {
        match &self.style.coloring {
            Coloring::Flat(color) => Ok((vec![*color; cloud.len()], None)),
            Coloring::Scalars { field, range, colormap } => {
                let values = cloud
                    .scalar_values(field)
                    .ok_or_else(|| RenderError::ScalarFieldMissing {
                        path: source.to_path_buf(),
                        field: field.clone(),
                    })?;
                let (lo, hi) = range.or_else(|| finite_range(&values)).unwrap_or((0., 1.));
                let color_map = ColorMap::named(colormap, lo, hi)?;
                let colors = values.iter().map(|&v| color_map.get(v)).collect();
                Ok((colors, Some(color_map)))
            }
        }
    }
}

impl FrameRenderer for CairoFrameRenderer {
    fn render_frame(&self, snapshot: &SnapshotFile, image_path: &Path) -> RenderResult<()> {
        let cloud = ParticleCloud::load(&snapshot.path)?;
        self.render_cloud(&cloud, &snapshot.path, image_path)
    }
}

fn draw_sphere_marker(context: &Context, x: f64, y: f64, radius: f64, color: Color) -> Result<(), cairo::Error> {
    let light = highlight(color, 0.6);
    let dark = shade(color, 0.55);

    let gradient = RadialGradient::new(x - radius * 0.35, y - radius * 0.35, 0., x, y, radius);
    gradient.add_color_stop_rgb(0., light.x, light.y, light.z);
    gradient.add_color_stop_rgb(0.6, color.x, color.y, color.z);
    gradient.add_color_stop_rgb(1., dark.x, dark.y, dark.z);

    context.set_source(&gradient)?;
    context.arc(x, y, radius, 0., TAU);
    context.fill()
}

/// Vertical color bar on the right edge with min, mid and max labels.
fn draw_legend(context: &Context, legend: &Legend, img_width: f64, img_height: f64) -> Result<(), cairo::Error> {
    let min_value = legend.color_map.min_value();
    let max_value = legend.color_map.max_value();
    let span = max_value - min_value;

    let bar_x = img_width * 0.88;
    let bar_y = img_height * 0.25;
    let bar_w = img_width * 0.03;
    let bar_h = img_height * 0.5;

    // top of the bar is the maximum
    let gradient = LinearGradient::new(0., bar_y + bar_h, 0., bar_y);
    for (v, color) in legend.color_map.color_stops() {
        let interp = if span > 0. { (v - min_value) / span } else { 0. };
        gradient.add_color_stop_rgb(interp, color.x, color.y, color.z);
    }

    context.identity_matrix();
    context.set_source(&gradient)?;
    context.rectangle(bar_x, bar_y, bar_w, bar_h);
    context.fill()?;

    context.set_source_rgb(0., 0., 0.);
    context.set_line_width(img_height * 0.002);
    context.rectangle(bar_x, bar_y, bar_w, bar_h);
    context.stroke()?;

    context.select_font_face("Sans", FontSlant::Normal, FontWeight::Normal);
    context.set_font_size(img_height * 0.025);

    let stops = if span > 0. {
        vec![min_value, min_value + span * 0.5, max_value]
    } else {
        vec![min_value]
    };
    for v in stops {
        let interp = if span > 0. { (v - min_value) / span } else { 0. };
        let ycenter = bar_y + bar_h - interp * bar_h;
        let s = format_label(v);
        let extents = context.text_extents(&s)?;

        context.move_to(bar_x - extents.width() - img_width * 0.01, ycenter + extents.height() * 0.5);
        context.show_text(&s)?;
    }

    let title_extents = context.text_extents(legend.title)?;
    context.move_to(bar_x + bar_w * 0.5 - title_extents.width() * 0.5, bar_y - img_height * 0.02);
    context.show_text(legend.title)?;

    Ok(())
}

fn format_label(v: f64) -> String {
    if v != 0. && (v.abs() >= 1e4 || v.abs() < 1e-2) {
        format!("{:.2e}", v)
    } else {
        format!("{}", (v * 1000.).round() / 1000.)
    }
}

#[cfg(test)]
mod tests {
    use std::io::BufReader;

    use nalgebra::Point3;

    use super::*;
    use crate::post_processing::{colors::parse_color, mesh_reader::PointArray};

    fn style(coloring: Coloring) -> FrameStyle {
        FrameStyle {
            width: 64,
            height: 48,
            point_size: 6.,
            background: parse_color("white").unwrap(),
            coloring,
            camera: CameraSpec::default(),
            show_scalar_bar: true,
        }
    }

    fn cloud() -> ParticleCloud {
        ParticleCloud {
            positions: vec![Point3::origin(), Point3::new(0.1, 0., 0.), Point3::new(0., 0.1, 0.)],
            arrays: vec![PointArray {
                name: "density".into(),
                num_comp: 1,
                values: vec![990., 1000., 1010.],
            }],
        }
    }

    fn read_png(path: &Path) -> (u32, u32, Vec<u8>) {
        let decoder = png::Decoder::new(BufReader::new(File::open(path).unwrap()));
        let mut reader = decoder.read_info().unwrap();
        let mut buf = vec![0; reader.output_buffer_size()];
        let info = reader.next_frame(&mut buf).unwrap();
        buf.truncate(info.buffer_size());
        (info.width, info.height, buf)
    }

    #[test]
    fn flat_color_frame_has_configured_size() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("frame.png");
        let renderer = CairoFrameRenderer::new(style(Coloring::Flat(parse_color("blue").unwrap()))).unwrap();

        renderer.render_cloud(&cloud(), Path::new("x_1.vtk"), &image).unwrap();

        let (w, h, pixels) = read_png(&image);
        assert_eq!((w, h), (64, 48));
        // the focal point sits in the middle of the image and is covered by a particle
        let center = ((24 * 64 + 32) * 4) as usize;
        assert!(pixels[center + 2] > pixels[center], "center pixel should be blue-ish");
    }

    #[test]
    fn scalar_coloring_requires_the_field() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = CairoFrameRenderer::new(style(Coloring::Scalars {
            field: "pressure".into(),
            range: None,
            colormap: "viridis".into(),
        }))
        .unwrap();

        let result = renderer.render_cloud(&cloud(), Path::new("x_1.vtk"), &dir.path().join("f.png"));
        assert!(matches!(result, Err(RenderError::ScalarFieldMissing { .. })));
    }

    #[test]
    fn scalar_coloring_with_legend() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("f.png");
        let renderer = CairoFrameRenderer::new(style(Coloring::Scalars {
            field: "density".into(),
            range: Some((900., 1100.)),
            colormap: "coolwarm".into(),
        }))
        .unwrap();

        renderer.render_cloud(&cloud(), Path::new("x_1.vtk"), &image).unwrap();
        assert!(image.exists());
    }

    #[test]
    fn rejects_bad_style() {
        let mut bad_size = style(Coloring::Flat(Color::zeros()));
        bad_size.point_size = 0.;
        assert!(CairoFrameRenderer::new(bad_size).is_err());

        for range in [(2., 1.), (0., f64::INFINITY), (f64::NEG_INFINITY, 0.), (f64::NAN, 1.)] {
            let bad_range = style(Coloring::Scalars {
                field: "density".into(),
                range: Some(range),
                colormap: "viridis".into(),
            });
            assert!(
                matches!(
                    CairoFrameRenderer::new(bad_range),
                    Err(RenderError::InvalidSetting { name: "scalar_range", .. })
                ),
                "{:?} accepted",
                range
            );
        }

        let bad_map = style(Coloring::Scalars {
            field: "density".into(),
            range: None,
            colormap: "nope".into(),
        });
        assert!(matches!(CairoFrameRenderer::new(bad_map), Err(RenderError::UnknownColormap(_))));
    }

    #[test]
    fn labels() {
        assert_eq!(format_label(0.), "0");
        assert_eq!(format_label(1000.5), "1000.5");
        assert_eq!(format_label(123456.), "1.23e5");
    }
}
