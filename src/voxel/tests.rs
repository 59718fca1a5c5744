// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Tests for tissue classification.

use super::*;
use crate::test_utils::*;

#[test]
fn test_strip_model_suffix() {
    assert_eq!(strip_model_suffix("Skin (Duke)"), "Skin");
    assert_eq!(strip_model_suffix("Skin_by_Ella"), "Skin");
    assert_eq!(strip_model_suffix("SAT (Subcutaneous Fat) (Duke)"), "SAT");
    assert_eq!(strip_model_suffix("Muscle"), "Muscle");
}

#[test]
fn test_is_surface_tissue() {
    assert!(is_surface_tissue("Skin (Duke)", "skin"));
    assert!(is_surface_tissue("SKIN", "Skin"));
    assert!(!is_surface_tissue("Muscle (Duke)", "skin"));
    // A keyword that only appears in the suffix doesn't count.
    assert!(!is_surface_tissue("Fat_by_Skinny", "skin"));
}

#[test]
fn classify_shell_model() {
    let model = shell_model(10, 3.0, 0.001);
    let masks = model.classify(crate::DEFAULT_SURFACE_KEYWORD);
    let tissue = model.grid().tissue();
    assert_eq!(masks.shape(), [10, 10, 10]);
    for ((s, a), t) in masks.surface.iter().zip(masks.air.iter()).zip(tissue.iter()) {
        assert_eq!(*s, *t == SKIN);
        assert_eq!(*a, *t == AIR);
    }
    assert!(masks.num_surface() > 0);
    assert!(masks.num_air() > 0);
    // Corners are far from the shell.
    assert!(masks.air[[0, 0, 0]]);
    assert!(!masks.air[[4, 4, 4]]);
}

#[test]
fn empty_map_is_an_error() {
    let grid = shell_model(4, 1.0, 0.001).grid().clone();
    let result = TissueModel::from_parts(grid, BTreeMap::new());
    assert!(matches!(result, Err(ClassificationError::EmptyTissueMap(_))));
}

#[test]
fn read_tissue_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tissue.h5");
    write_shell_tissue_file(&path, 10, 3.0, 0.002);

    let model = TissueModel::new(&path).unwrap();
    assert_eq!(model.geometry().shape(), [10, 10, 10]);
    assert_eq!(model.names().len(), 2);
    assert_eq!(model.names()[&SKIN], "Skin (Duke)");
    assert_eq!(model.grid().tissue(), &shell_tissue(10, 3.0));

    let masks = model.classify("skin");
    let expected = shell_model(10, 3.0, 0.002).classify("skin");
    assert_eq!(masks.surface, expected.surface);
    assert_eq!(masks.air, expected.air);
}

#[test]
fn missing_file() {
    let result = TissueModel::new("/definitely/not/here.h5");
    assert!(matches!(result, Err(ClassificationError::FileDoesntExist(_))));
}

#[test]
fn file_without_voxels_has_no_mesh() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fields_only.h5");
    let axes = uniform_axes(4, 0.001);
    let field = uniform_field([4, 4, 4], crate::c32::new(1.0, 0.0));
    write_field_file(&path, &axes, &field, None, None);

    let result = TissueModel::new(&path);
    assert!(matches!(result, Err(ClassificationError::NoMesh(_))));
}

#[test]
fn file_with_empty_map() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty_map.h5");
    write_tissue_file(&path, &uniform_axes(4, 0.001), &Array3::zeros((4, 4, 4)), &[]);

    let result = TissueModel::new(&path);
    match result {
        Err(ClassificationError::EmptyTissueMap(f)) => assert!(f.ends_with("empty_map.h5")),
        other => panic!("expected an empty map error, got {other:?}"),
    }
}

#[test]
fn file_with_wrong_voxel_shape() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad_shape.h5");
    write_tissue_file(
        &path,
        &uniform_axes(4, 0.001),
        &Array3::zeros((4, 4, 3)),
        &[(SKIN, 1, "Skin")],
    );

    let result = TissueModel::new(&path);
    assert!(matches!(result, Err(ClassificationError::Grid { .. })));
}
