use std::{
    ffi::OsStr,
    fs::read_dir,
    path::{Path, PathBuf},
};

use crate::error::{RenderError, RenderResult};

/// File extensions accepted as mesh snapshots (compared case-insensitively).
pub const SNAPSHOT_EXTENSIONS: [&str; 3] = ["vtk", "vtu", "vtp"];

/// One simulation output frame on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotFile {
    pub path: PathBuf,
    /// Only used for ordering. Neither contiguous nor zero-based in general.
    pub frame_index: u64,
}

impl SnapshotFile {
    pub fn file_name(&self) -> &OsStr {
        self.path.file_name().unwrap_or_default()
    }

    /// Name of the intermediate image for this snapshot. `rank` is the
    /// position in the sorted sequence and keeps duplicate indices apart.
    /// The index is padded to 20 digits (every `u64`) and the rank to 10, so
    /// lexical order equals numeric order.
    pub fn image_file_name(&self, rank: usize) -> String {
        format!("frame_{:020}_{:010}.png", self.frame_index, rank)
    }
}

/// `ParticleData_Fluid_13.vtk` -> `Some(13)`, `PartFluid_0042.vtk` -> `Some(42)`.
///
/// The extension is stripped, then the last `_`-separated segment must be a
/// plain run of ASCII digits that fits into a `u64`.
pub fn parse_frame_index(file_name: &str) -> Option<u64> {
    let stem = Path::new(file_name).file_stem()?.to_str()?;
    let segment = stem.rsplit('_').next()?;
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse::<u64>().ok()
}

pub fn has_snapshot_extension(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .map(|ext| SNAPSHOT_EXTENSIONS.iter().any(|e| e.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Orders snapshots by frame index, ties broken by file name.
pub fn sort_snapshots(snapshots: &mut [SnapshotFile]) {
    snapshots.sort_by(|a, b| {
        a.frame_index
            .cmp(&b.frame_index)
            .then_with(|| a.file_name().cmp(b.file_name()))
    });
}

/// Lists the snapshot files of `dir` in rendering order.
///
/// Hidden entries, directories and files without a mesh extension are
/// ignored. A mesh file without a parseable frame index aborts the whole
/// listing so that a movie never silently skips frames.
pub fn discover_snapshots(dir: &Path) -> RenderResult<Vec<SnapshotFile>> {
    let entries = read_dir(dir).map_err(|e| RenderError::io(dir, e))?;

    let mut snapshots = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| RenderError::io(dir, e))?;
        let path = entry.path();
        let file_name = entry.file_name();
        let file_name = file_name.to_string_lossy();

        if file_name.starts_with('.') {
            log::debug!("ignoring hidden entry {:?}", path);
            continue;
        }

        // follows symlinks, downloaded outputs are sometimes linked in
        let metadata = std::fs::metadata(&path).map_err(|e| RenderError::io(&path, e))?;
        if !metadata.is_file() || !has_snapshot_extension(&path) {
            log::debug!("ignoring non-snapshot entry {:?}", path);
            continue;
        }

        let frame_index = parse_frame_index(&file_name).ok_or_else(|| RenderError::MalformedFilename {
            path: path.clone(),
        })?;

        snapshots.push(SnapshotFile { path, frame_index });
    }

    if snapshots.is_empty() {
        return Err(RenderError::EmptyInput { dir: dir.to_path_buf() });
    }

    sort_snapshots(&mut snapshots);
    Ok(snapshots)
}
