// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Synthetic grids, tissue models and field containers for tests.

use std::path::Path;

use hdf5::{types::VarLenUnicode, Group};
use ndarray::prelude::*;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    c32,
    constants::*,
    field::DirectionalField,
    grid::{GridGeometry, VoxelGrid},
    read_hdf5::complex_to_pairs,
    types::FieldKind,
    voxel::TissueModel,
};

pub(crate) const AIR: u16 = 0;
pub(crate) const SKIN: u16 = 1;
pub(crate) const MUSCLE: u16 = 2;

/// Node coordinates for `n` voxels of width `dx` metres along every axis.
pub(crate) fn uniform_axes(n: usize, dx: f64) -> [Array1<f64>; 3] {
    let axis = Array1::from_shape_fn(n + 1, |i| i as f64 * dx);
    [axis.clone(), axis.clone(), axis]
}

pub(crate) fn uniform_geometry(n: usize, dx: f64) -> GridGeometry {
    GridGeometry::new(uniform_axes(n, dx)).unwrap()
}

/// A ball of muscle wrapped in a one-voxel skin shell of the given radius (in
/// voxels, about the grid centre); everything else is air.
pub(crate) fn shell_tissue(n: usize, radius: f64) -> Array3<u16> {
    let c = (n as f64 - 1.0) / 2.0;
    Array3::from_shape_fn((n, n, n), |(i, j, k)| {
        let d = ((i as f64 - c).powi(2) + (j as f64 - c).powi(2) + (k as f64 - c).powi(2)).sqrt();
        if d < radius - 0.5 {
            MUSCLE
        } else if d < radius + 0.5 {
            SKIN
        } else {
            AIR
        }
    })
}

pub(crate) fn shell_model(n: usize, radius: f64, dx: f64) -> TissueModel {
    let grid = VoxelGrid::new(uniform_geometry(n, dx), shell_tissue(n, radius)).unwrap();
    let names = [(SKIN, "Skin (Duke)".to_string()), (MUSCLE, "Muscle (Duke)".to_string())];
    TissueModel::from_parts(grid, names.into_iter().collect()).unwrap()
}

/// Yee-staggered component shapes for a grid of `shape` voxels.
pub(crate) fn yee_shapes(shape: [usize; 3]) -> [[usize; 3]; 3] {
    [0, 1, 2].map(|c| [0, 1, 2].map(|a| if a == c { shape[a] } else { shape[a] + 1 }))
}

/// A field with the same value everywhere in every component.
pub(crate) fn uniform_field(shape: [usize; 3], value: c32) -> DirectionalField {
    DirectionalField::new(yee_shapes(shape).map(|s| Array3::from_elem(s, value))).unwrap()
}

/// A field filled with random values in the unit square of the complex plane.
pub(crate) fn random_field(shape: [usize; 3], rng: &mut StdRng) -> DirectionalField {
    DirectionalField::new(yee_shapes(shape).map(|s| {
        Array3::from_shape_simple_fn(s, || {
            c32::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0))
        })
    }))
    .unwrap()
}

pub(crate) fn seeded_fields(shape: [usize; 3], n: usize, seed: u64) -> Vec<DirectionalField> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| random_field(shape, &mut rng)).collect()
}

fn create_groups(root: &Group, path: &str) -> Group {
    let mut group = root.clone();
    for part in path.split('/') {
        group = match group.group(part) {
            Ok(g) => g,
            Err(_) => group.create_group(part).unwrap(),
        };
    }
    group
}

fn write_mesh(root: &Group, axes: &[Array1<f64>; 3], voxels: Option<&Array3<u16>>) -> Group {
    let mesh = create_groups(root, &format!("{MESHES_GROUP}/Body"));
    for (name, axis) in AXIS_NAMES.iter().zip(axes.iter()) {
        mesh.new_dataset_builder()
            .with_data(axis)
            .create(*name)
            .unwrap();
    }
    if let Some(voxels) = voxels {
        mesh.new_dataset_builder()
            .with_data(voxels)
            .create(VOXELS_DATASET)
            .unwrap();
    }
    mesh
}

/// Write a tissue container. `materials` is (tissue id, material id, name).
pub(crate) fn write_tissue_file(
    path: &Path,
    axes: &[Array1<f64>; 3],
    voxels: &Array3<u16>,
    materials: &[(u16, u32, &str)],
) {
    let h5 = hdf5::File::create(path).unwrap();
    let mesh = write_mesh(&h5, axes, Some(voxels));
    if materials.is_empty() {
        return;
    }
    let ids: Vec<u16> = materials.iter().map(|m| m.0).collect();
    let material_ids: Vec<u32> = materials.iter().map(|m| m.1).collect();
    mesh.new_dataset_builder()
        .with_data(&ids)
        .create(ID_MAP_DATASET)
        .unwrap();
    mesh.new_dataset_builder()
        .with_data(&material_ids)
        .create(MATERIAL_IDS_DATASET)
        .unwrap();
    for &(_, material, name) in materials {
        let group = create_groups(&h5, &format!("{MATERIALS_GROUP}/{material}"));
        let name: VarLenUnicode = name.parse().unwrap();
        group
            .new_attr_builder()
            .with_data(&[name][..])
            .create(MATERIAL_NAME_ATTR)
            .unwrap();
    }
}

/// Write the shell model of [`shell_model`] as a tissue container.
pub(crate) fn write_shell_tissue_file(path: &Path, n: usize, radius: f64, dx: f64) {
    write_tissue_file(
        path,
        &uniform_axes(n, dx),
        &shell_tissue(n, radius),
        &[(SKIN, 17, "Skin (Duke)"), (MUSCLE, 23, "Muscle (Duke)")],
    );
}

/// Write a per-direction field container.
pub(crate) fn write_field_file(
    path: &Path,
    axes: &[Array1<f64>; 3],
    e: &DirectionalField,
    h: Option<&DirectionalField>,
    voxels: Option<&Array3<u16>>,
) {
    let h5 = hdf5::File::create(path).unwrap();
    write_mesh(&h5, axes, voxels);
    // Something the combiner must carry over untouched.
    h5.new_dataset_builder()
        .with_data(&[1.5e9_f64][..])
        .create("frequency")
        .unwrap();
    for (kind, field) in [(FieldKind::E, Some(e)), (FieldKind::H, h)] {
        let Some(field) = field else { continue };
        let snapshot = create_groups(
            &h5,
            &format!("{FIELD_GROUPS}/Sensor/{}", kind.snapshot_path()),
        );
        for (c, name) in COMPONENT_NAMES.iter().enumerate() {
            snapshot
                .new_dataset_builder()
                .with_data(&complex_to_pairs(field.component(c).view()))
                .create(*name)
                .unwrap();
        }
    }
}
