// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Code to read per-direction field solutions, either all at once or one
//! direction at a time.

mod accessor;
mod error;

pub use accessor::{FieldAccessor, InMemoryAccessor, ResidentField, StreamingAccessor};
pub use error::FieldError;

use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use ndarray::prelude::*;

use crate::{
    c32,
    config::ResourceMode,
    constants::{BYTES_PER_SAMPLE, COMPONENT_NAMES, FOCUS_COMPONENT, MEMORY_SAFETY_FACTOR},
    grid::GridGeometry,
    read_hdf5,
    types::{widen, FieldKind, VoxelIndex},
};

/// Clamp a voxel index to a component's own shape. Yee-staggered components
/// differ in length along their own axis, and the last sample along an axis
/// stands for the field at that face.
#[inline]
pub fn clamp_to_shape(voxel: VoxelIndex, shape: [usize; 3]) -> [usize; 3] {
    [
        voxel[0].min(shape[0] - 1),
        voxel[1].min(shape[1] - 1),
        voxel[2].min(shape[2] - 1),
    ]
}

/// The three complex components of one simulated field, each with its own
/// shape.
#[derive(Clone, Debug, PartialEq)]
pub struct DirectionalField {
    components: [Array3<c32>; 3],
}

impl DirectionalField {
    /// Every component needs at least one sample.
    pub fn new(components: [Array3<c32>; 3]) -> Result<Self, FieldError> {
        if let Some(component) = components.iter().position(|c| c.is_empty()) {
            return Err(FieldError::EmptyComponent { component });
        }
        Ok(Self { components })
    }

    pub fn component(&self, component: usize) -> &Array3<c32> {
        &self.components[component]
    }

    pub fn into_components(self) -> [Array3<c32>; 3] {
        self.components
    }

    pub fn component_shape(&self, component: usize) -> [usize; 3] {
        let (sx, sy, sz) = self.components[component].dim();
        [sx, sy, sz]
    }

    pub fn shapes(&self) -> [[usize; 3]; 3] {
        [0, 1, 2].map(|c| self.component_shape(c))
    }

    /// The value of one component at a voxel, clamped to that component's
    /// shape.
    #[inline]
    pub fn at(&self, component: usize, voxel: VoxelIndex) -> c32 {
        let comp = &self.components[component];
        let (sx, sy, sz) = comp.dim();
        comp[clamp_to_shape(voxel, [sx, sy, sz])]
    }

    #[inline]
    pub fn vector_at(&self, voxel: VoxelIndex) -> [c32; 3] {
        [self.at(0, voxel), self.at(1, voxel), self.at(2, voxel)]
    }

    /// `|E_z|` at a voxel; the component the focusing weights are phased on.
    #[inline]
    pub fn focus_magnitude_at(&self, voxel: VoxelIndex) -> f64 {
        widen(self.at(FOCUS_COMPONENT, voxel)).norm()
    }

    pub fn num_bytes(&self) -> usize {
        self.components.iter().map(|c| c.len()).sum::<usize>() * std::mem::size_of::<c32>()
    }
}

/// A per-direction field container whose metadata has been read. No field
/// values are held.
#[derive(Clone, Debug)]
pub struct FieldFile {
    path: PathBuf,
    geometry: GridGeometry,
    e_shapes: [[usize; 3]; 3],
    h_shapes: Option<[[usize; 3]; 3]>,
}

impl FieldFile {
    /// Read the grid and component shapes of a field container.
    pub fn open<T: AsRef<Path>>(file: T) -> Result<Self, FieldError> {
        let path = file.as_ref().to_path_buf();
        let file_str = path.display().to_string();
        if !path.exists() {
            return Err(FieldError::FileDoesntExist(file_str));
        }
        let access = |source| FieldError::DataAccess {
            file: file_str.clone(),
            source,
        };

        let h5 = read_hdf5::open(&path).map_err(access)?;
        let mesh = read_hdf5::find_mesh(&h5, None)
            .map_err(access)?
            .ok_or_else(|| FieldError::NoMesh {
                file: file_str.clone(),
            })?;
        let geometry = read_hdf5::read_axes(&mesh)
            .map_err(access)
            .and_then(|axes| {
                GridGeometry::new(axes).map_err(|source| FieldError::Grid {
                    file: file_str.clone(),
                    source,
                })
            })?;

        let e_shapes = component_shapes(&h5, FieldKind::E, &file_str)?.ok_or_else(|| {
            FieldError::MissingField {
                file: file_str.clone(),
                kind: FieldKind::E,
            }
        })?;
        let h_shapes = component_shapes(&h5, FieldKind::H, &file_str)?;
        debug!(
            "'{}': grid {:?}, E components {:?}, H present: {}",
            file_str,
            geometry.shape(),
            e_shapes,
            h_shapes.is_some()
        );

        Ok(Self {
            path,
            geometry,
            e_shapes,
            h_shapes,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    pub fn has_field(&self, kind: FieldKind) -> bool {
        match kind {
            FieldKind::E => true,
            FieldKind::H => self.h_shapes.is_some(),
        }
    }

    pub fn shapes(&self, kind: FieldKind) -> Option<[[usize; 3]; 3]> {
        match kind {
            FieldKind::E => Some(self.e_shapes),
            FieldKind::H => self.h_shapes,
        }
    }

    /// Bytes needed to hold this file's field values in memory.
    pub fn payload_bytes(&self, with_h: bool) -> usize {
        let count = |shapes: &[[usize; 3]; 3]| {
            shapes
                .iter()
                .map(|s| s.iter().product::<usize>())
                .sum::<usize>()
        };
        let mut samples = count(&self.e_shapes);
        if with_h {
            samples += self.h_shapes.as_ref().map(count).unwrap_or(0);
        }
        samples * BYTES_PER_SAMPLE
    }

    fn access_error(&self, source: hdf5::Error) -> FieldError {
        FieldError::DataAccess {
            file: self.path.display().to_string(),
            source,
        }
    }

    fn missing(&self, kind: FieldKind) -> FieldError {
        FieldError::MissingField {
            file: self.path.display().to_string(),
            kind,
        }
    }

    /// Read all three components of a field.
    pub fn load(&self, kind: FieldKind) -> Result<DirectionalField, FieldError> {
        let h5 = read_hdf5::open(&self.path).map_err(|e| self.access_error(e))?;
        let snapshot = read_hdf5::find_snapshot(&h5, kind)
            .map_err(|e| self.access_error(e))?
            .ok_or_else(|| self.missing(kind))?;
        let [d0, d1, d2] =
            read_hdf5::component_datasets(&snapshot).map_err(|e| self.access_error(e))?;
        let read = |ds: hdf5::Dataset| -> Result<Array3<c32>, FieldError> {
            let pairs = ds
                .read::<f32, Ix4>()
                .map_err(|e| self.access_error(e))?;
            Ok(read_hdf5::pairs_to_complex(pairs.view()))
        };
        Ok(DirectionalField {
            components: [read(d0)?, read(d1)?, read(d2)?],
        })
    }

    /// Read the voxels `[lo, hi)` of a single component. `lo` and `hi` must
    /// already be within the component's shape.
    pub fn load_slab(
        &self,
        kind: FieldKind,
        component: usize,
        lo: [usize; 3],
        hi: [usize; 3],
    ) -> Result<Array3<c32>, FieldError> {
        let h5 = read_hdf5::open(&self.path).map_err(|e| self.access_error(e))?;
        let snapshot = read_hdf5::find_snapshot(&h5, kind)
            .map_err(|e| self.access_error(e))?
            .ok_or_else(|| self.missing(kind))?;
        let pairs = snapshot
            .dataset(COMPONENT_NAMES[component])
            .and_then(|ds| {
                ds.read_slice::<f32, _, Ix4>(s![lo[0]..hi[0], lo[1]..hi[1], lo[2]..hi[2], ..])
            })
            .map_err(|e| self.access_error(e))?;
        Ok(read_hdf5::pairs_to_complex(pairs.view()))
    }
}

/// Read the shapes of a field's components, if the field is present.
fn component_shapes(
    h5: &hdf5::File,
    kind: FieldKind,
    file_str: &str,
) -> Result<Option<[[usize; 3]; 3]>, FieldError> {
    let access = |source| FieldError::DataAccess {
        file: file_str.to_string(),
        source,
    };
    let snapshot = match read_hdf5::find_snapshot(h5, kind).map_err(access)? {
        Some(s) => s,
        None => return Ok(None),
    };
    let datasets = read_hdf5::component_datasets(&snapshot).map_err(access)?;
    let mut shapes = [[0; 3]; 3];
    for (component, (ds, out)) in datasets.iter().zip(shapes.iter_mut()).enumerate() {
        let shape = ds.shape();
        if shape.len() != 4 || shape[3] != 2 || shape[..3].contains(&0) {
            return Err(FieldError::ComponentShape {
                file: file_str.to_string(),
                kind,
                component,
                shape,
            });
        }
        *out = [shape[0], shape[1], shape[2]];
    }
    Ok(Some(shapes))
}

/// Ensure that every field file shares one grid, and that this grid is the
/// tissue model's.
pub fn check_grids(
    reference: &GridGeometry,
    reference_name: &str,
    files: &[FieldFile],
) -> Result<(), FieldError> {
    let first = match files.first() {
        Some(f) => f,
        None => return Ok(()),
    };
    for file in files {
        let mismatch = |(axis, detail), reference: String| FieldError::GridMismatch {
            file: file.path.display().to_string(),
            reference,
            axis,
            detail,
        };
        if let Some(diff) = file.geometry.first_difference(&first.geometry) {
            return Err(mismatch(diff, first.path.display().to_string()));
        }
        if let Some(diff) = file.geometry.first_difference(reference) {
            return Err(mismatch(diff, reference_name.to_string()));
        }
    }
    Ok(())
}

/// Read `MemAvailable` from `/proc/meminfo` [bytes].
pub(crate) fn available_memory_bytes() -> Option<u64> {
    let meminfo = std::fs::read_to_string("/proc/meminfo").ok()?;
    meminfo
        .lines()
        .find_map(|l| l.strip_prefix("MemAvailable:"))
        .and_then(|rest| rest.trim().trim_end_matches("kB").trim().parse::<u64>().ok())
        .map(|kib| kib * 1024)
}

/// Decide between holding all fields in memory and streaming them. `Auto`
/// needs `available` to be known; otherwise streaming is chosen.
pub(crate) fn resolve_mode(
    requested: ResourceMode,
    needed_bytes: usize,
    available_bytes: Option<u64>,
) -> ResourceMode {
    match requested {
        ResourceMode::InMemory | ResourceMode::Streaming => requested,
        ResourceMode::Auto => match available_bytes {
            Some(available) if (available as f64) * MEMORY_SAFETY_FACTOR >= needed_bytes as f64 => {
                ResourceMode::InMemory
            }
            Some(_) => ResourceMode::Streaming,
            None => {
                warn!("Couldn't determine available memory; streaming fields from disk");
                ResourceMode::Streaming
            }
        },
    }
}

/// Prepare access to the given field files. The resource strategy is decided
/// here, once. `memory_budget_gb` replaces the memory probe when deciding
/// automatically.
pub fn open_accessor(
    files: Vec<FieldFile>,
    mode: ResourceMode,
    memory_budget_gb: Option<f64>,
) -> Result<Box<dyn FieldAccessor>, FieldError> {
    let with_h = files.iter().all(|f| f.has_field(FieldKind::H));
    let needed: usize = files.iter().map(|f| f.payload_bytes(with_h)).sum();
    let available = match memory_budget_gb {
        Some(gb) => Some((gb * 1024.0 * 1024.0 * 1024.0) as u64),
        None if matches!(mode, ResourceMode::Auto) => available_memory_bytes(),
        None => None,
    };
    let resolved = resolve_mode(mode, needed, available);
    info!(
        "Field access for {} directions: {:?} (needs {:.2} GiB in memory)",
        files.len(),
        resolved,
        needed as f64 / (1024.0 * 1024.0 * 1024.0)
    );

    Ok(match resolved {
        ResourceMode::InMemory => Box::new(InMemoryAccessor::load(&files, with_h)?),
        _ => Box::new(StreamingAccessor::new(files)?),
    })
}
