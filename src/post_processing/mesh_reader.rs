use std::path::{Path, PathBuf};

use nalgebra::Point3;
use vtkio::model::{Attribute, Attributes, DataSet, IOBuffer, Piece};
use vtkio::Vtk;

use crate::error::{RenderError, RenderResult};

/// One named per-point data array, flattened with `num_comp` values per point.
#[derive(Debug, Clone, PartialEq)]
pub struct PointArray {
    pub name: String,
    pub num_comp: usize,
    pub values: Vec<f64>,
}

/// Particle positions and per-particle data of one snapshot.
#[derive(Debug, Clone, Default)]
pub struct ParticleCloud {
    pub positions: Vec<Point3<f64>>,
    pub arrays: Vec<PointArray>,
}

fn buffer_to_f64(buffer: &IOBuffer) -> Option<Vec<f64>> {
    fn conv<T: Copy + Into<f64>>(v: &[T]) -> Vec<f64> {
        v.iter().map(|&x| x.into()).collect()
    }

    Some(match buffer {
        IOBuffer::F32(v) => conv(v),
        IOBuffer::F64(v) => v.clone(),
        IOBuffer::U8(v) => conv(v),
        IOBuffer::I8(v) => conv(v),
        IOBuffer::U16(v) => conv(v),
        IOBuffer::I16(v) => conv(v),
        IOBuffer::U32(v) => conv(v),
        IOBuffer::I32(v) => conv(v),
        IOBuffer::U64(v) => v.iter().map(|&x| x as f64).collect(),
        IOBuffer::I64(v) => v.iter().map(|&x| x as f64).collect(),
        _ => return None,
    })
}

impl ParticleCloud {
    pub fn load(path: &Path) -> RenderResult<Self> {
        let vtk = Vtk::import(path).map_err(|e| RenderError::SnapshotRead {
            path: path.to_path_buf(),
            reason: format!("{:?}", e),
        })?;
        Self::from_vtk(vtk, path)
    }

    /// Collects all inline pieces of a poly data or unstructured grid data
    /// set. SPlisHSPlasH writes unstructured grids, DualSPHysics poly data.
    pub fn from_vtk(vtk: Vtk, path: &Path) -> RenderResult<Self> {
        let unsupported = |what: &str| RenderError::SnapshotRead {
            path: path.to_path_buf(),
            reason: format!("unsupported {}", what),
        };

        let mut cloud = ParticleCloud::default();
        match vtk.data {
            DataSet::PolyData { pieces, .. } => {
                for piece in pieces {
                    match piece {
                        Piece::Inline(p) => cloud.append(&p.points, &p.data, path)?,
                        _ => return Err(unsupported("external poly data piece")),
                    }
                }
            }
            DataSet::UnstructuredGrid { pieces, .. } => {
                for piece in pieces {
                    match piece {
                        Piece::Inline(p) => cloud.append(&p.points, &p.data, path)?,
                        _ => return Err(unsupported("external unstructured grid piece")),
                    }
                }
            }
            _ => return Err(unsupported("data set type (expected POLYDATA or UNSTRUCTURED_GRID)")),
        }
        Ok(cloud)
    }

    fn append(&mut self, points: &IOBuffer, data: &Attributes, path: &Path) -> RenderResult<()> {
        let bad = |reason: String| RenderError::SnapshotRead {
            path: PathBuf::from(path),
            reason,
        };

        let coords = buffer_to_f64(points).ok_or_else(|| bad("point coordinates are not numeric".into()))?;
        if coords.len() % 3 != 0 {
            return Err(bad(format!("{} point coordinates is not a multiple of 3", coords.len())));
        }
        let num_points = coords.len() / 3;
        let first_new = self.positions.len();
        self.positions
            .extend(coords.chunks_exact(3).map(|c| Point3::new(c[0], c[1], c[2])));

        let mut named: Vec<(String, Vec<f64>)> = Vec::new();
        for attribute in &data.point {
            match attribute {
                Attribute::DataArray(array) => {
                    if let Some(values) = buffer_to_f64(&array.data) {
                        named.push((array.name.clone(), values));
                    }
                }
                Attribute::Field { data_array, .. } => {
                    for array in data_array {
                        if let Some(values) = buffer_to_f64(&array.data) {
                            named.push((array.name.clone(), values));
                        }
                    }
                }
            }
        }

        for (name, values) in named {
            if num_points == 0 || values.len() % num_points != 0 {
                log::debug!("skipping point array '{}' of {:?}: length mismatch", name, path);
                continue;
            }
            let num_comp = values.len() / num_points;

            match self.arrays.iter_mut().find(|a| a.name == name) {
                Some(existing) if existing.num_comp == num_comp => existing.values.extend(values),
                Some(_) => {
                    return Err(bad(format!("array '{}' changes component count between pieces", name)));
                }
                None if first_new == 0 => self.arrays.push(PointArray { name, num_comp, values }),
                // array missing in earlier pieces, pad them with NaN
                None => {
                    let mut padded = vec![f64::NAN; first_new * num_comp];
                    padded.extend(values);
                    self.arrays.push(PointArray {
                        name,
                        num_comp,
                        values: padded,
                    });
                }
            }
        }

        // arrays missing in this piece
        let total = self.positions.len();
        for array in &mut self.arrays {
            array.values.resize(total * array.num_comp, f64::NAN);
        }

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// One value per particle; vector arrays are reduced to their magnitude.
    pub fn scalar_values(&self, name: &str) -> Option<Vec<f64>> {
        let array = self.arrays.iter().find(|a| a.name == name)?;
        if array.num_comp == 1 {
            return Some(array.values.clone());
        }
        Some(
            array
                .values
                .chunks_exact(array.num_comp)
                .map(|c| c.iter().map(|v| v * v).sum::<f64>().sqrt())
                .collect(),
        )
    }
}

/// Min and max of the finite values, `None` if there are none.
pub fn finite_range(values: &[f64]) -> Option<(f64, f64)> {
    values
        .iter()
        .filter(|v| v.is_finite())
        .fold(None, |acc, &v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((f64::min(lo, v), f64::max(hi, v))),
        })
}
