// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Code to read a voxelised tissue model and to derive the body-surface and
//! free-space occupancy masks from it.

mod error;
#[cfg(test)]
mod tests;

pub use error::ClassificationError;

use std::{
    collections::{BTreeMap, HashSet},
    path::Path,
};

use log::{debug, info};
use ndarray::prelude::*;

use crate::{
    constants::{
        ID_MAP_DATASET, MATERIALS_GROUP, MATERIAL_IDS_DATASET, MATERIAL_NAME_ATTR,
        NAME_SUFFIX_MARKERS, VOXELS_DATASET,
    },
    grid::{GridGeometry, VoxelGrid},
    read_hdf5,
};

/// A voxel grid together with the names of the tissues its ids refer to.
#[derive(Debug, Clone)]
pub struct TissueModel {
    grid: VoxelGrid,
    /// Tissue id -> human-readable tissue name. Not allowed to be empty. Ids
    /// without an entry are background (free space).
    names: BTreeMap<u16, String>,
}

impl TissueModel {
    /// Read a tissue model from a voxelised tissue container.
    pub fn new<T: AsRef<Path>>(file: T) -> Result<Self, ClassificationError> {
        let path = file.as_ref();
        let file_str = path.display().to_string();
        // If the file doesn't exist, hdf5::File::open will handle it, but the
        // error message is horrendous.
        if !path.exists() {
            return Err(ClassificationError::FileDoesntExist(file_str));
        }
        let hdf5_err = |source| ClassificationError::Hdf5 {
            file: file_str.clone(),
            source,
        };

        let h5 = read_hdf5::open(path).map_err(hdf5_err)?;
        let mesh = read_hdf5::find_mesh(&h5, Some(VOXELS_DATASET))
            .map_err(hdf5_err)?
            .ok_or_else(|| ClassificationError::NoMesh(file_str.clone()))?;
        debug!("Using mesh '{}' of '{}'", mesh.name(), file_str);

        let axes = read_hdf5::read_axes(&mesh).map_err(hdf5_err)?;
        let tissue: Array3<u16> = mesh
            .dataset(VOXELS_DATASET)
            .and_then(|d| d.read())
            .map_err(hdf5_err)?;
        let grid = GridGeometry::new(axes)
            .and_then(|g| VoxelGrid::new(g, tissue))
            .map_err(|source| ClassificationError::Grid {
                file: file_str.clone(),
                source,
            })?;

        // An absent id map is the same as an empty one.
        let (ids, materials): (Vec<u16>, Vec<u32>) = if mesh.link_exists(ID_MAP_DATASET) {
            let ids = mesh
                .dataset(ID_MAP_DATASET)
                .and_then(|d| d.read_raw())
                .map_err(hdf5_err)?;
            let materials = mesh
                .dataset(MATERIAL_IDS_DATASET)
                .and_then(|d| d.read_raw())
                .map_err(hdf5_err)?;
            (ids, materials)
        } else {
            (vec![], vec![])
        };
        if ids.len() != materials.len() {
            return Err(ClassificationError::MapLengthMismatch {
                file: file_str,
                ids: ids.len(),
                materials: materials.len(),
            });
        }

        let mut names = BTreeMap::new();
        for (&id, &material) in ids.iter().zip(materials.iter()) {
            let name = h5
                .group(&format!("{MATERIALS_GROUP}/{material}"))
                .and_then(|g| g.attr(MATERIAL_NAME_ATTR))
                .and_then(|a| a.read_raw::<hdf5::types::VarLenUnicode>())
                .ok()
                .and_then(|v| v.into_iter().next())
                .ok_or_else(|| ClassificationError::UnnamedMaterial {
                    file: file_str.clone(),
                    id,
                    material,
                })?;
            names.insert(id, name.as_str().to_string());
        }

        Self::from_parts(grid, names).map_err(|e| match e {
            ClassificationError::EmptyTissueMap(_) => ClassificationError::EmptyTissueMap(file_str),
            e => e,
        })
    }

    /// Build a tissue model from an existing grid and id -> name mapping.
    pub fn from_parts(
        grid: VoxelGrid,
        names: BTreeMap<u16, String>,
    ) -> Result<Self, ClassificationError> {
        if names.is_empty() {
            return Err(ClassificationError::EmptyTissueMap("<memory>".to_string()));
        }
        Ok(Self { grid, names })
    }

    pub fn grid(&self) -> &VoxelGrid {
        &self.grid
    }

    pub fn geometry(&self) -> &GridGeometry {
        self.grid.geometry()
    }

    pub fn names(&self) -> &BTreeMap<u16, String> {
        &self.names
    }

    /// Derive the surface and air masks. Surface voxels are those whose
    /// tissue name (with any body-model suffix removed) contains `keyword`,
    /// ignoring case. Air voxels are those whose id has no name at all.
    pub fn classify(&self, keyword: &str) -> OccupancyMasks {
        let surface_ids: HashSet<u16> = self
            .names
            .iter()
            .filter(|(_, name)| is_surface_tissue(name, keyword))
            .map(|(&id, _)| id)
            .collect();
        debug!(
            "Tissue ids matching '{}': {:?}",
            keyword,
            surface_ids.iter().collect::<Vec<_>>()
        );

        let tissue = self.grid.tissue();
        let surface = tissue.map(|id| surface_ids.contains(id));
        let air = tissue.map(|id| !self.names.contains_key(id));
        let masks = OccupancyMasks { surface, air };
        info!(
            "Classified {} voxels: {} surface, {} air",
            tissue.len(),
            masks.num_surface(),
            masks.num_air()
        );
        masks
    }
}

/// Boolean masks over the voxel grid. Both have the grid's shape.
#[derive(Debug, Clone)]
pub struct OccupancyMasks {
    pub surface: Array3<bool>,
    pub air: Array3<bool>,
}

impl OccupancyMasks {
    pub fn shape(&self) -> [usize; 3] {
        let (sx, sy, sz) = self.surface.dim();
        [sx, sy, sz]
    }

    pub fn num_surface(&self) -> usize {
        self.surface.iter().filter(|&&s| s).count()
    }

    pub fn num_air(&self) -> usize {
        self.air.iter().filter(|&&a| a).count()
    }
}

/// Remove a body-model suffix such as " (Duke)" or "_by_Duke" from a tissue
/// name.
pub fn strip_model_suffix(name: &str) -> &str {
    let end = NAME_SUFFIX_MARKERS
        .iter()
        .filter_map(|m| name.find(m))
        .min()
        .unwrap_or(name.len());
    name[..end].trim()
}

/// Does this tissue name count as body surface?
pub fn is_surface_tissue(name: &str, keyword: &str) -> bool {
    strip_model_suffix(name)
        .to_lowercase()
        .contains(&keyword.to_lowercase())
}
