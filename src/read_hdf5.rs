// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Helpers shared by the tissue and field readers for navigating the HDF5
containers.
 */

use hdf5::{Dataset, File, Group};
use ndarray::prelude::*;

use crate::{
    c32,
    constants::{AXIS_NAMES, COMPONENT_NAMES, FIELD_GROUPS, MESHES_GROUP},
    types::FieldKind,
};

/// Open a container read-only without libhdf5 printing to stderr.
pub(crate) fn open(path: &std::path::Path) -> Result<File, hdf5::Error> {
    // so that libhdf5 doesn't print errors to stdout
    hdf5::silence_errors(true);
    File::open(path)
}

/// Open a container for writing without libhdf5 printing to stderr.
pub(crate) fn open_rw(path: &std::path::Path) -> Result<File, hdf5::Error> {
    hdf5::silence_errors(true);
    File::open_rw(path)
}

/// Find the first mesh group. If `required` is given, only meshes that have
/// a member with that name are considered.
pub(crate) fn find_mesh(file: &File, required: Option<&str>) -> Result<Option<Group>, hdf5::Error> {
    let meshes = match file.group(MESHES_GROUP) {
        Ok(g) => g,
        Err(_) => return Ok(None),
    };
    let mut names = meshes.member_names()?;
    names.sort_unstable();
    for name in names {
        let mesh = match meshes.group(&name) {
            Ok(g) => g,
            // Not a group; skip it.
            Err(_) => continue,
        };
        match required {
            Some(member) if !mesh.link_exists(member) => continue,
            _ => return Ok(Some(mesh)),
        }
    }
    Ok(None)
}

/// Read the x, y and z node-coordinate arrays of a mesh.
pub(crate) fn read_axes(mesh: &Group) -> Result<[Array1<f64>; 3], hdf5::Error> {
    let x = mesh.dataset(AXIS_NAMES[0])?.read_1d()?;
    let y = mesh.dataset(AXIS_NAMES[1])?.read_1d()?;
    let z = mesh.dataset(AXIS_NAMES[2])?.read_1d()?;
    Ok([x, y, z])
}

/// Find the snapshot group of the given field type in the first field group
/// that has one.
pub(crate) fn find_snapshot(file: &File, kind: FieldKind) -> Result<Option<Group>, hdf5::Error> {
    let field_groups = match file.group(FIELD_GROUPS) {
        Ok(g) => g,
        Err(_) => return Ok(None),
    };
    let mut names = field_groups.member_names()?;
    names.sort_unstable();
    for name in names {
        if let Ok(snapshot) = field_groups.group(&format!("{}/{}", name, kind.snapshot_path())) {
            return Ok(Some(snapshot));
        }
    }
    Ok(None)
}

/// Unlink the snapshot group of the given field type from every field group.
/// Returns how many were removed.
pub(crate) fn remove_snapshots(file: &File, kind: FieldKind) -> Result<usize, hdf5::Error> {
    let field_groups = match file.group(FIELD_GROUPS) {
        Ok(g) => g,
        Err(_) => return Ok(0),
    };
    let mut removed = 0;
    for name in field_groups.member_names()? {
        let path = format!("{}/{}", name, kind.snapshot_path());
        if field_groups.group(&path).is_ok() {
            field_groups.unlink(&path)?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Get the three component datasets of a snapshot group.
pub(crate) fn component_datasets(snapshot: &Group) -> Result<[Dataset; 3], hdf5::Error> {
    Ok([
        snapshot.dataset(COMPONENT_NAMES[0])?,
        snapshot.dataset(COMPONENT_NAMES[1])?,
        snapshot.dataset(COMPONENT_NAMES[2])?,
    ])
}

/// Convert (re, im) pairs along the last axis into complex samples.
pub(crate) fn pairs_to_complex(pairs: ArrayView4<f32>) -> Array3<c32> {
    let (sx, sy, sz, _) = pairs.dim();
    Array3::from_shape_fn((sx, sy, sz), |(i, j, k)| {
        c32::new(pairs[[i, j, k, 0]], pairs[[i, j, k, 1]])
    })
}

/// Convert complex samples into (re, im) pairs along a new last axis.
pub(crate) fn complex_to_pairs(values: ArrayView3<c32>) -> Array4<f32> {
    let (sx, sy, sz) = values.dim();
    Array4::from_shape_fn((sx, sy, sz, 2), |(i, j, k, p)| {
        let v = values[[i, j, k]];
        if p == 0 {
            v.re
        } else {
            v.im
        }
    })
}

/// Replace a dataset of a group with new data, allowing a change of shape.
pub(crate) fn replace_dataset<'d, T, D>(
    group: &Group,
    name: &str,
    data: ArrayView<'d, T, D>,
) -> Result<(), hdf5::Error>
where
    T: hdf5::H5Type + 'd,
    D: Dimension,
{
    if group.link_exists(name) {
        group.unlink(name)?;
    }
    group.new_dataset_builder().with_data(data).create(name)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_conversion_keeps_layout() {
        let values = Array3::from_shape_fn((2, 3, 1), |(i, j, _)| {
            c32::new(i as f32, -(j as f32))
        });
        let pairs = complex_to_pairs(values.view());
        assert_eq!(pairs.dim(), (2, 3, 1, 2));
        assert_eq!(pairs[[1, 2, 0, 0]], 1.0);
        assert_eq!(pairs[[1, 2, 0, 1]], -2.0);
        assert_eq!(pairs_to_complex(pairs.view()), values);
    }
}
