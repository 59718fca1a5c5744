// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The two strategies for reading directional fields.

use std::ops::Deref;

use log::debug;
use ndarray::prelude::*;
use parking_lot::Mutex;

use super::{clamp_to_shape, DirectionalField, FieldError, FieldFile};
use crate::{
    c32,
    config::ResourceMode,
    grid::GridGeometry,
    types::{FieldKind, VoxelIndex},
};

/// Read access to the fields of every direction. Implementations differ only
/// in how much is kept in memory; they must return identical values.
pub trait FieldAccessor {
    fn num_directions(&self) -> usize;

    /// The grid shared by every direction.
    fn geometry(&self) -> &GridGeometry;

    /// The strategy in use (never [`ResourceMode::Auto`]).
    fn mode(&self) -> ResourceMode;

    /// Is this field available for every direction?
    fn has_field(&self, kind: FieldKind) -> bool;

    /// A human-readable name for a direction (its file, usually).
    fn label(&self, direction: usize) -> String;

    /// Get the whole field of one direction. For streaming access the field
    /// is loaded now and freed when the returned guard is dropped.
    fn read_full(&self, direction: usize, kind: FieldKind)
        -> Result<ResidentField<'_>, FieldError>;

    /// The component shapes of a field, shared by every direction, if the
    /// field is available.
    fn component_shapes(&self, kind: FieldKind) -> Option<[[usize; 3]; 3]>;

    /// Get the samples `[lo, hi)` of one component of a field. `hi` must be
    /// within the component's shape.
    fn read_window(
        &self,
        direction: usize,
        kind: FieldKind,
        component: usize,
        lo: [usize; 3],
        hi: [usize; 3],
    ) -> Result<Array3<c32>, FieldError>;

    /// Get one component of a field at a batch of voxels. Indices are clamped
    /// to the component's shape.
    fn read_component_at(
        &self,
        direction: usize,
        kind: FieldKind,
        component: usize,
        voxels: &[VoxelIndex],
    ) -> Result<Vec<c32>, FieldError>;

    /// Get all three components of a field at a batch of voxels; the result
    /// has shape `(voxels.len(), 3)`.
    fn read_at(
        &self,
        direction: usize,
        kind: FieldKind,
        voxels: &[VoxelIndex],
    ) -> Result<Array2<c32>, FieldError> {
        let mut out = Array2::zeros((voxels.len(), 3));
        for c in 0..3 {
            let values = self.read_component_at(direction, kind, c, voxels)?;
            out.column_mut(c)
                .iter_mut()
                .zip(values)
                .for_each(|(o, v)| *o = v);
        }
        Ok(out)
    }
}

/// A field made available by [`FieldAccessor::read_full`].
pub struct ResidentField<'a> {
    direction: usize,
    inner: Resident<'a>,
}

enum Resident<'a> {
    /// Owned by an in-memory accessor.
    Shared(&'a DirectionalField),
    /// Loaded for this guard alone. `slot` records the resident direction
    /// and is cleared on drop.
    Owned {
        field: DirectionalField,
        slot: &'a Mutex<Option<usize>>,
    },
}

impl ResidentField<'_> {
    pub fn direction(&self) -> usize {
        self.direction
    }
}

impl Deref for ResidentField<'_> {
    type Target = DirectionalField;

    fn deref(&self) -> &Self::Target {
        match &self.inner {
            Resident::Shared(f) => f,
            Resident::Owned { field, .. } => field,
        }
    }
}

impl Drop for ResidentField<'_> {
    fn drop(&mut self) {
        if let Resident::Owned { slot, .. } = &self.inner {
            slot.lock().take();
            debug!("Released field of direction {}", self.direction);
        }
    }
}

fn check_direction(direction: usize, num_directions: usize) -> Result<(), FieldError> {
    if direction >= num_directions {
        return Err(FieldError::DirectionOutOfRange {
            direction,
            num_directions,
        });
    }
    Ok(())
}

fn check_window(shape: [usize; 3], lo: [usize; 3], hi: [usize; 3]) -> Result<(), FieldError> {
    if (0..3).any(|a| lo[a] >= hi[a] || hi[a] > shape[a]) {
        return Err(FieldError::BadWindow { lo, hi, shape });
    }
    Ok(())
}

/// Ensure every direction's components have the shapes of direction 0.
fn check_shapes<I>(kind: FieldKind, shapes: I) -> Result<(), FieldError>
where
    I: IntoIterator<Item = [[usize; 3]; 3]>,
{
    let mut shapes = shapes.into_iter();
    let expected = match shapes.next() {
        Some(s) => s,
        None => return Ok(()),
    };
    for (d, got) in shapes.enumerate() {
        for c in 0..3 {
            if got[c] != expected[c] {
                return Err(FieldError::InconsistentComponents {
                    direction: d + 1,
                    kind,
                    component: c,
                    expected: expected[c],
                    got: got[c],
                });
            }
        }
    }
    Ok(())
}

/// Every direction's fields are loaded once and kept.
pub struct InMemoryAccessor {
    geometry: GridGeometry,
    labels: Vec<String>,
    e: Vec<DirectionalField>,
    h: Option<Vec<DirectionalField>>,
}

impl InMemoryAccessor {
    /// Load the E field (and the H field if `with_h`) of every file.
    pub fn load(files: &[FieldFile], with_h: bool) -> Result<Self, FieldError> {
        let geometry = match files.first() {
            Some(f) => f.geometry().clone(),
            None => return Err(FieldError::NoDirections),
        };
        let mut e = Vec::with_capacity(files.len());
        let mut h = Vec::with_capacity(if with_h { files.len() } else { 0 });
        for (d, file) in files.iter().enumerate() {
            debug!("Loading direction {} from '{}'", d, file.path().display());
            e.push(file.load(FieldKind::E)?);
            if with_h {
                h.push(file.load(FieldKind::H)?);
            }
        }
        let mut accessor = Self::from_fields(geometry, e, with_h.then_some(h))?;
        accessor.labels = files
            .iter()
            .map(|f| f.path().display().to_string())
            .collect();
        Ok(accessor)
    }

    /// Use fields that are already in memory.
    pub fn from_fields(
        geometry: GridGeometry,
        e: Vec<DirectionalField>,
        h: Option<Vec<DirectionalField>>,
    ) -> Result<Self, FieldError> {
        check_shapes(FieldKind::E, e.iter().map(|f| f.shapes()))?;
        if let Some(h) = &h {
            if h.len() != e.len() {
                return Err(FieldError::DirectionOutOfRange {
                    direction: h.len().min(e.len()),
                    num_directions: h.len().max(e.len()),
                });
            }
            check_shapes(FieldKind::H, h.iter().map(|f| f.shapes()))?;
        }
        let labels = (0..e.len()).map(|d| format!("direction {d}")).collect();
        Ok(Self {
            geometry,
            labels,
            e,
            h,
        })
    }

    fn fields(&self, kind: FieldKind) -> Option<&[DirectionalField]> {
        match kind {
            FieldKind::E => Some(&self.e),
            FieldKind::H => self.h.as_deref(),
        }
    }

    fn field(&self, direction: usize, kind: FieldKind) -> Result<&DirectionalField, FieldError> {
        check_direction(direction, self.e.len())?;
        self.fields(kind)
            .map(|f| &f[direction])
            .ok_or_else(|| FieldError::MissingField {
                file: self.labels[direction].clone(),
                kind,
            })
    }
}

impl FieldAccessor for InMemoryAccessor {
    fn num_directions(&self) -> usize {
        self.e.len()
    }

    fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    fn mode(&self) -> ResourceMode {
        ResourceMode::InMemory
    }

    fn has_field(&self, kind: FieldKind) -> bool {
        self.fields(kind).is_some()
    }

    fn label(&self, direction: usize) -> String {
        self.labels
            .get(direction)
            .cloned()
            .unwrap_or_else(|| format!("direction {direction}"))
    }

    fn read_full(
        &self,
        direction: usize,
        kind: FieldKind,
    ) -> Result<ResidentField<'_>, FieldError> {
        Ok(ResidentField {
            direction,
            inner: Resident::Shared(self.field(direction, kind)?),
        })
    }

    fn component_shapes(&self, kind: FieldKind) -> Option<[[usize; 3]; 3]> {
        self.fields(kind)
            .and_then(|f| f.first())
            .map(|f| f.shapes())
    }

    fn read_window(
        &self,
        direction: usize,
        kind: FieldKind,
        component: usize,
        lo: [usize; 3],
        hi: [usize; 3],
    ) -> Result<Array3<c32>, FieldError> {
        let field = self.field(direction, kind)?;
        check_window(field.component_shape(component), lo, hi)?;
        Ok(field
            .component(component)
            .slice(s![lo[0]..hi[0], lo[1]..hi[1], lo[2]..hi[2]])
            .to_owned())
    }

    fn read_component_at(
        &self,
        direction: usize,
        kind: FieldKind,
        component: usize,
        voxels: &[VoxelIndex],
    ) -> Result<Vec<c32>, FieldError> {
        let field = self.field(direction, kind)?;
        Ok(voxels.iter().map(|&v| field.at(component, v)).collect())
    }
}

/// At most one direction's field is in memory at any time. Whole fields are
/// read sequentially from disk when asked for, and freed as soon as the
/// caller is done with them.
pub struct StreamingAccessor {
    geometry: GridGeometry,
    files: Vec<FieldFile>,
    /// The direction whose field is currently loaded, if any.
    resident: Mutex<Option<usize>>,
}

impl StreamingAccessor {
    pub fn new(files: Vec<FieldFile>) -> Result<Self, FieldError> {
        let geometry = match files.first() {
            Some(f) => f.geometry().clone(),
            None => return Err(FieldError::NoDirections),
        };
        check_shapes(FieldKind::E, files.iter().filter_map(|f| f.shapes(FieldKind::E)))?;
        if files.iter().all(|f| f.has_field(FieldKind::H)) {
            check_shapes(FieldKind::H, files.iter().filter_map(|f| f.shapes(FieldKind::H)))?;
        }
        Ok(Self {
            geometry,
            files,
            resident: Mutex::new(None),
        })
    }

    /// The direction whose field is currently loaded, if any.
    pub fn resident(&self) -> Option<usize> {
        *self.resident.lock()
    }
}

impl FieldAccessor for StreamingAccessor {
    fn num_directions(&self) -> usize {
        self.files.len()
    }

    fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    fn mode(&self) -> ResourceMode {
        ResourceMode::Streaming
    }

    fn has_field(&self, kind: FieldKind) -> bool {
        self.files.iter().all(|f| f.has_field(kind))
    }

    fn label(&self, direction: usize) -> String {
        self.files
            .get(direction)
            .map(|f| f.path().display().to_string())
            .unwrap_or_else(|| format!("direction {direction}"))
    }

    fn read_full(
        &self,
        direction: usize,
        kind: FieldKind,
    ) -> Result<ResidentField<'_>, FieldError> {
        check_direction(direction, self.files.len())?;
        {
            let mut slot = self.resident.lock();
            if let Some(resident) = *slot {
                return Err(FieldError::AlreadyResident {
                    resident,
                    requested: direction,
                });
            }
            *slot = Some(direction);
        }

        let file = &self.files[direction];
        match file.load(kind) {
            Ok(field) => {
                debug!(
                    "Loaded {} field of direction {} from '{}' ({} MiB)",
                    kind,
                    direction,
                    file.path().display(),
                    field.num_bytes() / (1024 * 1024)
                );
                Ok(ResidentField {
                    direction,
                    inner: Resident::Owned {
                        field,
                        slot: &self.resident,
                    },
                })
            }
            Err(e) => {
                self.resident.lock().take();
                Err(e)
            }
        }
    }

    fn component_shapes(&self, kind: FieldKind) -> Option<[[usize; 3]; 3]> {
        if !self.has_field(kind) {
            return None;
        }
        self.files.first().and_then(|f| f.shapes(kind))
    }

    /// Only the window is read from disk; nothing becomes resident.
    fn read_window(
        &self,
        direction: usize,
        kind: FieldKind,
        component: usize,
        lo: [usize; 3],
        hi: [usize; 3],
    ) -> Result<Array3<c32>, FieldError> {
        check_direction(direction, self.files.len())?;
        let file = &self.files[direction];
        let shape = file
            .shapes(kind)
            .map(|s| s[component])
            .ok_or_else(|| FieldError::MissingField {
                file: file.path().display().to_string(),
                kind,
            })?;
        check_window(shape, lo, hi)?;
        file.load_slab(kind, component, lo, hi)
    }

    fn read_component_at(
        &self,
        direction: usize,
        kind: FieldKind,
        component: usize,
        voxels: &[VoxelIndex],
    ) -> Result<Vec<c32>, FieldError> {
        check_direction(direction, self.files.len())?;
        if voxels.is_empty() {
            return Ok(vec![]);
        }
        let file = &self.files[direction];
        let shape = file
            .shapes(kind)
            .map(|s| s[component])
            .ok_or_else(|| FieldError::MissingField {
                file: file.path().display().to_string(),
                kind,
            })?;

        // Only read the bounding box of the requested voxels.
        let clamped: Vec<[usize; 3]> = voxels.iter().map(|&v| clamp_to_shape(v, shape)).collect();
        let mut lo = clamped[0];
        let mut hi = clamped[0];
        for v in &clamped {
            for a in 0..3 {
                lo[a] = lo[a].min(v[a]);
                hi[a] = hi[a].max(v[a]);
            }
        }
        let hi = hi.map(|h| h + 1);
        let slab = file.load_slab(kind, component, lo, hi)?;
        Ok(clamped
            .iter()
            .map(|v| slab[[v[0] - lo[0], v[1] - lo[1], v[2] - lo[2]]])
            .collect())
    }
}
