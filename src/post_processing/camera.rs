use nalgebra::{Isometry3, Perspective3, Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::{RenderError, RenderResult};

/// Vertical view angle of the virtual camera, in degrees.
pub const VIEW_ANGLE_DEG: f64 = 30.;

const Z_NEAR: f64 = 1e-3;
const Z_FAR: f64 = 1e4;

/// Fixed viewpoint shared by every frame of one movie.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraSpec {
    pub position: [f64; 3],
    pub focal_point: [f64; 3],
    pub view_up: [f64; 3],
}

impl Default for CameraSpec {
    /// Diagonal view onto the unit tank from above.
    fn default() -> Self {
        CameraSpec {
            position: [3., 3., 2.],
            focal_point: [0., 0., 0.],
            view_up: [1., 1., 2.],
        }
    }
}

impl CameraSpec {
    /// Parses `px,py,pz,fx,fy,fz,ux,uy,uz`.
    pub fn parse(s: &str) -> RenderResult<Self> {
        let values = s
            .split(',')
            .map(|v| v.trim().parse::<f64>())
            .collect::<Result<Vec<f64>, _>>()
            .map_err(|e| RenderError::InvalidCamera(format!("'{}': {}", s, e)))?;

        if values.len() != 9 {
            return Err(RenderError::InvalidCamera(format!(
                "expected 9 comma separated numbers, got {}",
                values.len()
            )));
        }

        let camera = CameraSpec {
            position: [values[0], values[1], values[2]],
            focal_point: [values[3], values[4], values[5]],
            view_up: [values[6], values[7], values[8]],
        };
        camera.validate()?;
        Ok(camera)
    }

    pub fn eye(&self) -> Point3<f64> {
        Point3::new(self.position[0], self.position[1], self.position[2])
    }

    pub fn target(&self) -> Point3<f64> {
        Point3::new(self.focal_point[0], self.focal_point[1], self.focal_point[2])
    }

    pub fn up(&self) -> Vector3<f64> {
        Vector3::new(self.view_up[0], self.view_up[1], self.view_up[2])
    }

    pub fn validate(&self) -> RenderResult<()> {
        let mut all = self.position.iter().chain(&self.focal_point).chain(&self.view_up);
        if all.any(|v| !v.is_finite()) {
            return Err(RenderError::InvalidCamera("non-finite coordinate".into()));
        }

        let view_dir = self.target() - self.eye();
        if view_dir.norm() < 1e-12 {
            return Err(RenderError::InvalidCamera(
                "position and focal point coincide".into(),
            ));
        }
        if view_dir.normalize().cross(&self.up()).norm() < 1e-9 {
            return Err(RenderError::InvalidCamera(
                "view-up is zero or parallel to the view direction".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectedPoint {
    /// Pixel coordinates, origin top left.
    pub x: f64,
    pub y: f64,
    /// Distance along the view axis, larger is further away.
    pub depth: f64,
}

/// World to pixel transform for a fixed camera and image size.
#[derive(Debug, Clone)]
pub struct Projection {
    view: Isometry3<f64>,
    perspective: Perspective3<f64>,
    width: f64,
    height: f64,
}

impl Projection {
    pub fn new(camera: &CameraSpec, width: u32, height: u32) -> RenderResult<Self> {
        camera.validate()?;
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidSetting {
                name: "width/height",
                reason: "image size must be positive".into(),
            });
        }

        let view = Isometry3::look_at_rh(&camera.eye(), &camera.target(), &camera.up());
        let aspect = width as f64 / height as f64;
        let perspective = Perspective3::new(aspect, VIEW_ANGLE_DEG.to_radians(), Z_NEAR, Z_FAR);

        Ok(Projection {
            view,
            perspective,
            width: width as f64,
            height: height as f64,
        })
    }

    /// `None` for points behind the camera and for non-finite positions.
    pub fn project(&self, point: &Point3<f64>) -> Option<ProjectedPoint> {
        let in_view = self.view.transform_point(point);
        if !in_view.coords.iter().all(|c| c.is_finite()) {
            return None;
        }
        // camera looks down -z
        let depth = -in_view.z;
        if depth <= Z_NEAR {
            return None;
        }

        let ndc = self.perspective.project_point(&in_view);
        Some(ProjectedPoint {
            x: (ndc.x + 1.) * 0.5 * self.width,
            y: (1. - ndc.y) * 0.5 * self.height,
            depth,
        })
    }
}
