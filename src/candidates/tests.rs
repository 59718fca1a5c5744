// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Tests for locating and sampling focus candidates.

use rand::{rngs::StdRng, Rng, SeedableRng};

use super::*;
use crate::test_utils::*;

fn brute_force_count(mask: &Array3<bool>, cube: &Cube) -> usize {
    cube.voxels().filter(|&[i, j, k]| mask[[i, j, k]]).count()
}

fn random_mask(shape: (usize, usize, usize), seed: u64) -> Array3<bool> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array3::from_shape_simple_fn(shape, || rng.gen_bool(0.3))
}

#[test]
fn box_counts_match_brute_force() {
    let mask = random_mask((7, 9, 6), 3);
    let table = SurfaceCountTable::new(mask.view());
    let mut rng = StdRng::seed_from_u64(4);
    for _ in 0..200 {
        let centre = [rng.gen_range(0..7), rng.gen_range(0..9), rng.gen_range(0..6)];
        let half = [rng.gen_range(0..4), rng.gen_range(0..4), rng.gen_range(0..4)];
        let cube = Cube::around(centre, half, [7, 9, 6]);
        assert_eq!(table.count(&cube), brute_force_count(&mask, &cube));
    }
    let all = Cube::around([3, 4, 3], [10, 10, 10], [7, 9, 6]);
    assert_eq!(table.count(&all), mask.iter().filter(|&&m| m).count());
}

#[test]
fn counts_past_u32_are_exact() {
    // Prefix sums of a 2x2x2 grid where every voxel stands for 2^31 set
    // voxels, as on a grid far larger than u32 can count.
    let per_voxel = 1_u64 << 31;
    let table = Array3::from_shape_fn((3, 3, 3), |(i, j, k)| (i * j * k) as u64 * per_voxel);
    let counts = SurfaceCountTable { table };
    let whole = Cube::around([0, 0, 0], [2, 2, 2], [2, 2, 2]);
    assert_eq!(counts.count(&whole), 8 << 31);
    let corner = Cube::around([1, 1, 1], [0, 0, 0], [2, 2, 2]);
    assert_eq!(counts.count(&corner), 1 << 31);
}

#[test]
fn counts_at_the_grid_edge_cover_only_in_bounds_voxels() {
    let model = shell_model(10, 3.0, 0.001);
    let masks = OccupancyMasks {
        surface: Array3::from_elem((10, 10, 10), true),
        air: Array3::from_elem((10, 10, 10), true),
    };
    let locator = CandidateLocator::new(model.geometry(), &masks).unwrap();
    let (count, cube) = locator.surface_count([0, 0, 9], 2.0);
    assert_eq!(count, 3 * 3 * 3);
    assert_eq!(cube.nominal_volume, 125);
}

#[test]
fn shell_has_candidates() {
    let model = shell_model(10, 3.0, 0.001);
    let masks = model.classify("skin");
    let locator = CandidateLocator::new(model.geometry(), &masks).unwrap();
    let validated = locator.locate(2.0, 0.1).unwrap();
    assert!(!validated.is_empty());

    for (i, c) in validated.iter().enumerate() {
        assert!(masks.air[c.voxel]);
        assert_eq!(c.order, i);
        let cube = model.geometry().cube_around(c.voxel, 0.002);
        assert_eq!(c.surface_count, brute_force_count(&masks.surface, &cube));
        assert!(c.surface_count as f64 >= 0.1 * 125.0);
    }
    // Raster order.
    assert!(validated.windows(2).all(|w| w[0].voxel < w[1].voxel));
    // Nothing of the shell is within reach of the corner.
    assert!(validated.iter().all(|c| c.voxel != [0, 0, 0]));
    // Just outside the shell along z.
    assert!(validated.iter().any(|c| c.voxel == [4, 4, 8]));
}

#[test]
fn no_candidates_is_an_error() {
    let model = shell_model(10, 3.0, 0.001);
    let masks = model.classify("skin");
    let locator = CandidateLocator::new(model.geometry(), &masks).unwrap();
    match locator.locate(2.0, 0.9) {
        Err(CandidateError::NoValidFocusPoints { air_voxels, .. }) => {
            assert_eq!(air_voxels, masks.num_air());
        }
        other => panic!("expected no valid focus points, got {other:?}"),
    }

    // A keyword that matches nothing leaves no surface at all.
    let masks = model.classify("cortical bone");
    assert_eq!(masks.num_surface(), 0);
    let locator = CandidateLocator::new(model.geometry(), &masks).unwrap();
    assert!(locator.locate(2.0, 0.1).is_err());
}

#[test]
fn mask_shape_must_match_the_grid() {
    let geometry = uniform_geometry(4, 0.001);
    let masks = OccupancyMasks {
        surface: Array3::from_elem((4, 4, 3), false),
        air: Array3::from_elem((4, 4, 3), true),
    };
    assert!(matches!(
        CandidateLocator::new(&geometry, &masks),
        Err(CandidateError::MaskShape { .. })
    ));
}

#[test]
fn seeded_sampling_is_reproducible() {
    let model = shell_model(10, 3.0, 0.001);
    let masks = model.classify("skin");
    let validated = CandidateLocator::new(model.geometry(), &masks)
        .unwrap()
        .locate(2.0, 0.1)
        .unwrap();
    let n = validated.len() / 2;

    let a = sample(&validated, n, &mut StdRng::seed_from_u64(5));
    let b = sample(&validated, n, &mut StdRng::seed_from_u64(5));
    let c = sample(&validated, n, &mut StdRng::seed_from_u64(6));
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(a.len(), n);
    // Without replacement, in insertion order.
    assert!(a.windows(2).all(|w| w[0].order < w[1].order));
}

#[test]
fn small_sets_are_used_whole() {
    let model = shell_model(10, 3.0, 0.001);
    let masks = model.classify("skin");
    let validated = CandidateLocator::new(model.geometry(), &masks)
        .unwrap()
        .locate(2.0, 0.1)
        .unwrap();
    let all = sample(&validated, validated.len() + 10, &mut StdRng::seed_from_u64(0));
    assert_eq!(all, validated);
}
