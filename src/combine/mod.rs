// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Code to superpose directional fields with a set of weights and write the
//! result in the same container format as the inputs.

mod error;

pub use error::CombineError;

use std::path::{Path, PathBuf};

use log::{debug, info};
use ndarray::{prelude::*, Zip};
use serde::{Deserialize, Serialize};

use crate::{
    c32, c64,
    constants::{AXIS_NAMES, COMPONENT_NAMES, VOXELS_DATASET},
    field::{DirectionalField, FieldAccessor, FieldFile},
    grid::{Cube, GridGeometry},
    read_hdf5,
    search::WeightVector,
    types::{narrow, widen, FieldKind, VoxelIndex},
};

/// How much of the grid a combined field covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombineMode {
    /// Every voxel of the grid.
    Full,
    /// A cube around the focus voxel.
    #[default]
    Sliced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Full,
    Cube(Cube),
}

/// The weighted superposition of every direction over a region.
#[derive(Debug, Clone)]
pub struct CombinedField {
    pub region: Region,
    /// The voxels covered, in the full grid's indices.
    pub cube: Cube,
    /// The geometry of the covered voxels.
    pub geometry: GridGeometry,
    pub e: DirectionalField,
    /// Present when every direction has an H field.
    pub h: Option<DirectionalField>,
}

/// The window of a component covering the voxels of `cube`. Components
/// longer than the grid along an axis keep their extra sample there.
fn component_window(
    shape: [usize; 3],
    grid: [usize; 3],
    cube: &Cube,
) -> ([usize; 3], [usize; 3]) {
    let mut lo = [0; 3];
    let mut hi = [0; 3];
    for a in 0..3 {
        let extra = shape[a].saturating_sub(grid[a]);
        lo[a] = cube.lo[a].min(shape[a] - 1);
        hi[a] = (cube.hi[a] + extra).min(shape[a]).max(lo[a] + 1);
    }
    (lo, hi)
}

fn add_weighted(sum: &mut Array3<c64>, window: ArrayView3<c32>, w: c64) {
    Zip::from(sum)
        .and(window)
        .par_for_each(|s, &v| *s += w * widen(v));
}

pub struct FieldCombiner<'a> {
    accessor: &'a dyn FieldAccessor,
    template: &'a FieldFile,
}

impl<'a> FieldCombiner<'a> {
    /// `template` is copied for every output; it should be one of the
    /// directions' own containers.
    pub fn new(
        accessor: &'a dyn FieldAccessor,
        template: &'a FieldFile,
    ) -> Result<Self, CombineError> {
        if template
            .geometry()
            .first_difference(accessor.geometry())
            .is_some()
        {
            return Err(CombineError::TemplateGrid {
                file: template.path().display().to_string(),
            });
        }
        Ok(Self { accessor, template })
    }

    /// Superpose every direction with `weights` over `region`.
    /// Accumulation is in double precision, one direction at a time.
    pub fn combine(
        &self,
        weights: &WeightVector,
        region: Region,
    ) -> Result<CombinedField, CombineError> {
        let directions = self.accessor.num_directions();
        if weights.len() != directions {
            return Err(CombineError::WeightCount {
                weights: weights.len(),
                directions,
            });
        }
        let geometry = self.accessor.geometry();
        let cube = match region {
            Region::Full => geometry.full_cube(),
            Region::Cube(cube) => cube,
        };

        let e = self.superpose(weights, FieldKind::E, &region, &cube)?;
        let h = if self.accessor.has_field(FieldKind::H) {
            Some(self.superpose(weights, FieldKind::H, &region, &cube)?)
        } else {
            None
        };
        Ok(CombinedField {
            region,
            cube,
            geometry: geometry.slice(&cube),
            e,
            h,
        })
    }

    fn superpose(
        &self,
        weights: &WeightVector,
        kind: FieldKind,
        region: &Region,
        cube: &Cube,
    ) -> Result<DirectionalField, CombineError> {
        let grid = self.accessor.geometry().shape();
        let shapes = self
            .accessor
            .component_shapes(kind)
            .ok_or(CombineError::NoDirections)?;
        let windows = shapes.map(|shape| component_window(shape, grid, cube));
        let mut sums = windows.map(|(lo, hi)| {
            Array3::<c64>::zeros((hi[0] - lo[0], hi[1] - lo[1], hi[2] - lo[2]))
        });

        for (d, &w) in weights.weights().iter().enumerate() {
            let field_err = |source| CombineError::Field {
                direction: d,
                label: self.accessor.label(d),
                source,
            };
            match region {
                // Whole fields; streaming reads each file sequentially once.
                Region::Full => {
                    let field = self.accessor.read_full(d, kind).map_err(field_err)?;
                    for (c, sum) in sums.iter_mut().enumerate() {
                        add_weighted(sum, field.component(c).view(), w);
                    }
                }
                Region::Cube(_) => {
                    for (c, (sum, (lo, hi))) in sums.iter_mut().zip(windows).enumerate() {
                        let window = self
                            .accessor
                            .read_window(d, kind, c, lo, hi)
                            .map_err(field_err)?;
                        add_weighted(sum, window.view(), w);
                    }
                }
            }
            debug!("Added direction {} to the combined {} field", d, kind);
        }

        DirectionalField::new(sums.map(|sum| sum.mapv(narrow))).map_err(CombineError::Assemble)
    }

    /// Write a copy of the template with its field payload replaced by
    /// `combined`. For a sliced field, the mesh axes and the voxel array are
    /// replaced by their sub-volumes too. A field that wasn't combined is
    /// removed. Nothing else is changed.
    pub fn write<T: AsRef<Path>>(
        &self,
        combined: &CombinedField,
        output: T,
    ) -> Result<(), CombineError> {
        let output = output.as_ref();
        let file = output.display().to_string();
        std::fs::copy(self.template.path(), output).map_err(|source| CombineError::Io {
            file: file.clone(),
            source,
        })?;
        let write_err = |source| CombineError::Write {
            file: file.clone(),
            source,
        };
        let layout_err = |what: &str| CombineError::TemplateLayout {
            file: self.template.path().display().to_string(),
            what: what.to_string(),
        };

        let h5 = read_hdf5::open_rw(output).map_err(write_err)?;
        let sliced = matches!(combined.region, Region::Cube(_));
        let fields = [
            (FieldKind::E, Some(&combined.e)),
            (FieldKind::H, combined.h.as_ref()),
        ];
        for (kind, field) in fields {
            let Some(field) = field else {
                // An uncombined snapshot must not pass for a combined one.
                let removed = read_hdf5::remove_snapshots(&h5, kind).map_err(write_err)?;
                if removed > 0 {
                    debug!("Removed {} uncombined {} snapshot(s) from '{}'", removed, kind, file);
                }
                continue;
            };
            let snapshot = read_hdf5::find_snapshot(&h5, kind)
                .map_err(write_err)?
                .ok_or_else(|| layout_err(&format!("{kind} field snapshot")))?;
            let datasets = read_hdf5::component_datasets(&snapshot).map_err(write_err)?;
            for (c, ds) in datasets.iter().enumerate() {
                let pairs = read_hdf5::complex_to_pairs(field.component(c).view());
                if sliced {
                    read_hdf5::replace_dataset(&snapshot, COMPONENT_NAMES[c], pairs.view())
                        .map_err(write_err)?;
                } else {
                    ds.write(pairs.view()).map_err(write_err)?;
                }
            }
        }

        if sliced {
            let mesh = read_hdf5::find_mesh(&h5, None)
                .map_err(write_err)?
                .ok_or_else(|| layout_err("mesh"))?;
            for (a, name) in AXIS_NAMES.iter().enumerate() {
                read_hdf5::replace_dataset(&mesh, name, combined.geometry.axis(a).view())
                    .map_err(write_err)?;
            }
            if mesh.link_exists(VOXELS_DATASET) {
                let voxels = mesh
                    .dataset(VOXELS_DATASET)
                    .and_then(|ds| ds.read::<u16, Ix3>())
                    .map_err(write_err)?;
                let [x0, y0, z0] = combined.cube.lo;
                let [x1, y1, z1] = combined.cube.hi;
                let sub = voxels.slice(s![x0..x1, y0..y1, z0..z1]);
                read_hdf5::replace_dataset(&mesh, VOXELS_DATASET, sub).map_err(write_err)?;
            }
        }
        Ok(())
    }

    /// Combine the fields for a focus point and write them into
    /// `output_dir` as `combined_<rank>_<x>_<y>_<z>.h5`.
    pub fn combine_to_file<T: AsRef<Path>>(
        &self,
        weights: &WeightVector,
        focus: VoxelIndex,
        mode: CombineMode,
        half_width_mm: f64,
        output_dir: T,
        rank: usize,
    ) -> Result<PathBuf, CombineError> {
        let geometry = self.accessor.geometry();
        if !geometry.contains(focus) {
            return Err(CombineError::VoxelOutOfBounds {
                voxel: focus,
                shape: geometry.shape(),
            });
        }
        let region = match mode {
            CombineMode::Full => Region::Full,
            CombineMode::Sliced => Region::Cube(geometry.cube_around(focus, half_width_mm * 1e-3)),
        };
        let combined = self.combine(weights, region)?;
        let path = output_dir.as_ref().join(format!(
            "combined_{}_{}_{}_{}.h5",
            rank, focus[0], focus[1], focus[2]
        ));
        self.write(&combined, &path)?;
        info!(
            "Wrote combined field for focus {:?} ({:?} voxels) to '{}'",
            focus,
            combined.cube.dim(),
            path.display()
        );
        Ok(path)
    }
}
