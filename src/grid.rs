// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Voxel grid geometry shared by the tissue model and every directional
//! field.

use ndarray::prelude::*;
use thiserror::Error;

use crate::{constants::GRID_TOLERANCE, types::VoxelIndex};

#[derive(Error, Debug)]
pub enum GridError {
    #[error("Axis {axis} has {len} node coordinates; at least 2 are needed to make a voxel")]
    AxisTooShort { axis: usize, len: usize },

    #[error("Axis {axis} is not strictly increasing at node {index}")]
    NotIncreasing { axis: usize, index: usize },

    #[error("Tissue array has shape {got:?}, but the axes describe {expected:?} voxels")]
    TissueShape {
        expected: [usize; 3],
        got: [usize; 3],
    },
}

/// Node coordinates of a rectilinear grid [metres]. A grid with `n` voxels
/// along an axis has `n + 1` node coordinates along it; spacing may be
/// non-uniform.
#[derive(Clone, Debug, PartialEq)]
pub struct GridGeometry {
    axes: [Array1<f64>; 3],
}

impl GridGeometry {
    pub fn new(axes: [Array1<f64>; 3]) -> Result<Self, GridError> {
        for (a, axis) in axes.iter().enumerate() {
            if axis.len() < 2 {
                return Err(GridError::AxisTooShort {
                    axis: a,
                    len: axis.len(),
                });
            }
            if let Some(index) = axis
                .windows(2)
                .into_iter()
                .position(|w| !(w[1] > w[0]))
            {
                return Err(GridError::NotIncreasing {
                    axis: a,
                    index: index + 1,
                });
            }
        }
        Ok(Self { axes })
    }

    /// The number of voxels along each axis.
    pub fn shape(&self) -> [usize; 3] {
        [
            self.axes[0].len() - 1,
            self.axes[1].len() - 1,
            self.axes[2].len() - 1,
        ]
    }

    pub fn num_voxels(&self) -> usize {
        self.shape().iter().product()
    }

    pub fn axis(&self, axis: usize) -> &Array1<f64> {
        &self.axes[axis]
    }

    /// Width of voxel `index` along `axis` [metres].
    pub fn spacing(&self, axis: usize, index: usize) -> f64 {
        self.axes[axis][index + 1] - self.axes[axis][index]
    }

    /// Physical centre of a voxel [metres].
    pub fn centre(&self, voxel: VoxelIndex) -> [f64; 3] {
        let mut c = [0.0; 3];
        for (a, c) in c.iter_mut().enumerate() {
            *c = 0.5 * (self.axes[a][voxel[a]] + self.axes[a][voxel[a] + 1]);
        }
        c
    }

    pub fn contains(&self, voxel: VoxelIndex) -> bool {
        let shape = self.shape();
        voxel.iter().zip(shape.iter()).all(|(v, s)| v < s)
    }

    /// Per-axis cube half-widths in voxels for a physical half-width, using
    /// the voxel widths at `voxel`. Never less than one voxel.
    pub fn half_widths_at(&self, voxel: VoxelIndex, half_width_m: f64) -> [usize; 3] {
        let mut h = [1; 3];
        for (a, h) in h.iter_mut().enumerate() {
            let n = (half_width_m / self.spacing(a, voxel[a])).round();
            *h = if n >= 1.0 { n as usize } else { 1 };
        }
        h
    }

    /// The cube of the given physical half-width centred on `voxel`, clamped
    /// to the grid.
    pub fn cube_around(&self, voxel: VoxelIndex, half_width_m: f64) -> Cube {
        Cube::around(voxel, self.half_widths_at(voxel, half_width_m), self.shape())
    }

    /// The whole grid as a cube.
    pub fn full_cube(&self) -> Cube {
        Cube {
            lo: [0; 3],
            hi: self.shape(),
            nominal_volume: self.num_voxels(),
        }
    }

    /// The geometry of a sub-volume.
    pub fn slice(&self, cube: &Cube) -> GridGeometry {
        let axes = [0, 1, 2].map(|a| {
            self.axes[a]
                .slice(s![cube.lo[a]..cube.hi[a] + 1])
                .to_owned()
        });
        GridGeometry { axes }
    }

    /// Compare against another geometry. Returns the first axis that differs
    /// together with a description of the difference.
    pub fn first_difference(&self, other: &GridGeometry) -> Option<(usize, String)> {
        for a in 0..3 {
            let (mine, theirs) = (&self.axes[a], &other.axes[a]);
            if mine.len() != theirs.len() {
                return Some((
                    a,
                    format!("{} node coordinates vs. {}", mine.len(), theirs.len()),
                ));
            }
            for (i, (m, t)) in mine.iter().zip(theirs.iter()).enumerate() {
                let scale = m.abs().max(t.abs()).max(1.0);
                if (m - t).abs() > GRID_TOLERANCE * scale {
                    return Some((a, format!("node {i} is at {m} m vs. {t} m")));
                }
            }
        }
        None
    }
}

/// An axis-aligned box of voxels `[lo, hi)`, already clamped to a grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cube {
    pub lo: [usize; 3],
    pub hi: [usize; 3],
    /// The number of voxels the cube would have without clamping at the grid
    /// edges.
    pub nominal_volume: usize,
}

impl Cube {
    /// Build a cube of per-axis half-widths `half` around `centre`, clamped
    /// to a grid of `shape` voxels.
    pub fn around(centre: VoxelIndex, half: [usize; 3], shape: [usize; 3]) -> Cube {
        let mut lo = [0; 3];
        let mut hi = [0; 3];
        let mut nominal_volume = 1;
        for a in 0..3 {
            lo[a] = centre[a].saturating_sub(half[a]);
            hi[a] = (centre[a] + half[a] + 1).min(shape[a]);
            nominal_volume *= 2 * half[a] + 1;
        }
        Cube {
            lo,
            hi,
            nominal_volume,
        }
    }

    /// The (clamped) shape of the cube.
    pub fn dim(&self) -> [usize; 3] {
        [0, 1, 2].map(|a| self.hi[a] - self.lo[a])
    }

    /// The number of in-bounds voxels in the cube.
    pub fn volume(&self) -> usize {
        self.dim().iter().product()
    }

    pub fn contains(&self, voxel: VoxelIndex) -> bool {
        (0..3).all(|a| voxel[a] >= self.lo[a] && voxel[a] < self.hi[a])
    }

    /// Iterate over the voxels in the cube in raster order.
    pub fn voxels(&self) -> impl Iterator<Item = VoxelIndex> + '_ {
        (self.lo[0]..self.hi[0]).flat_map(move |i| {
            (self.lo[1]..self.hi[1])
                .flat_map(move |j| (self.lo[2]..self.hi[2]).map(move |k| [i, j, k]))
        })
    }
}

/// The voxelised body model: geometry plus a tissue id per voxel.
#[derive(Clone, Debug)]
pub struct VoxelGrid {
    geometry: GridGeometry,
    tissue: Array3<u16>,
}

impl VoxelGrid {
    pub fn new(geometry: GridGeometry, tissue: Array3<u16>) -> Result<Self, GridError> {
        let (sx, sy, sz) = tissue.dim();
        if [sx, sy, sz] != geometry.shape() {
            return Err(GridError::TissueShape {
                expected: geometry.shape(),
                got: [sx, sy, sz],
            });
        }
        Ok(Self { geometry, tissue })
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    pub fn tissue(&self) -> &Array3<u16> {
        &self.tissue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn geometry(n: usize, dx: f64) -> GridGeometry {
        let axis = Array1::from_shape_fn(n + 1, |i| i as f64 * dx);
        GridGeometry::new([axis.clone(), axis.clone(), axis]).unwrap()
    }

    #[test]
    fn shape_is_one_less_than_axes() {
        let g = geometry(10, 0.002);
        assert_eq!(g.shape(), [10, 10, 10]);
        assert_eq!(g.num_voxels(), 1000);
        let c = g.centre([0, 1, 9]);
        assert_abs_diff_eq!(c[0], 0.001, epsilon = 1e-15);
        assert_abs_diff_eq!(c[1], 0.003, epsilon = 1e-15);
        assert_abs_diff_eq!(c[2], 0.019, epsilon = 1e-15);
    }

    #[test]
    fn rejects_bad_axes() {
        let ok = Array1::from(vec![0.0, 1.0, 2.0]);
        let flat = Array1::from(vec![0.0, 1.0, 1.0]);
        assert!(matches!(
            GridGeometry::new([ok.clone(), flat, ok.clone()]),
            Err(GridError::NotIncreasing { axis: 1, index: 2 })
        ));
        let short = Array1::from(vec![0.0]);
        assert!(matches!(
            GridGeometry::new([ok.clone(), ok, short]),
            Err(GridError::AxisTooShort { axis: 2, len: 1 })
        ));
    }

    #[test]
    fn half_widths_follow_local_spacing() {
        // 1 mm voxels below x = 5 mm, 2 mm voxels above.
        let x = Array1::from(vec![0.0, 0.001, 0.002, 0.003, 0.004, 0.005, 0.007, 0.009, 0.011]);
        let yz = Array1::from_shape_fn(9, |i| i as f64 * 0.001);
        let g = GridGeometry::new([x, yz.clone(), yz]).unwrap();
        assert_eq!(g.half_widths_at([1, 1, 1], 0.004), [4, 4, 4]);
        assert_eq!(g.half_widths_at([6, 1, 1], 0.004), [2, 4, 4]);
        // Never zero.
        assert_eq!(g.half_widths_at([6, 1, 1], 0.0001), [1, 1, 1]);
    }

    #[test]
    fn cube_is_clamped_at_edges() {
        let cube = Cube::around([0, 5, 9], [2, 2, 2], [10, 10, 10]);
        assert_eq!(cube.lo, [0, 3, 7]);
        assert_eq!(cube.hi, [3, 8, 10]);
        assert_eq!(cube.dim(), [3, 5, 3]);
        assert_eq!(cube.volume(), 45);
        assert_eq!(cube.nominal_volume, 125);
        assert_eq!(cube.voxels().count(), 45);
        assert!(cube.voxels().all(|v| v.iter().all(|&i| i < 10)));
    }

    #[test]
    fn slice_keeps_node_coordinates() {
        let g = geometry(10, 0.001);
        let cube = Cube::around([5, 5, 5], [1, 1, 1], g.shape());
        let sub = g.slice(&cube);
        assert_eq!(sub.shape(), [3, 3, 3]);
        assert_abs_diff_eq!(sub.axis(0)[0], 0.004, epsilon = 1e-15);
        assert_abs_diff_eq!(sub.axis(0)[3], 0.007, epsilon = 1e-15);
    }

    #[test]
    fn detects_a_shifted_axis() {
        let a = geometry(10, 0.001);
        let mut axes = [a.axis(0).clone(), a.axis(1).clone(), a.axis(2).clone()];
        axes[1] += 0.001;
        let b = GridGeometry::new(axes).unwrap();
        let (axis, _) = a.first_difference(&b).unwrap();
        assert_eq!(axis, 1);
        assert!(a.first_difference(&a.clone()).is_none());
    }

    #[test]
    fn tissue_shape_must_match() {
        let g = geometry(4, 0.001);
        assert!(VoxelGrid::new(g.clone(), Array3::zeros((4, 4, 4))).is_ok());
        assert!(matches!(
            VoxelGrid::new(g, Array3::zeros((4, 4, 5))),
            Err(GridError::TissueShape { .. })
        ));
    }
}
