// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Generic types.

use serde::{Deserialize, Serialize};

use crate::{
    c32, c64,
    constants::{E_SNAPSHOT_PATH, H_SNAPSHOT_PATH},
};

/// A voxel (cell) index into the grid, in x, y, z order.
pub type VoxelIndex = [usize; 3];

/// Which simulated field a set of components belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    E,
    H,
}

impl FieldKind {
    /// The snapshot group of this field, relative to a field group.
    pub(crate) fn snapshot_path(self) -> &'static str {
        match self {
            FieldKind::E => E_SNAPSHOT_PATH,
            FieldKind::H => H_SNAPSHOT_PATH,
        }
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                FieldKind::E => "E",
                FieldKind::H => "H",
            }
        )
    }
}

/// Promote a stored sample for accumulation.
#[inline]
pub(crate) fn widen(v: c32) -> c64 {
    c64::new(f64::from(v.re), f64::from(v.im))
}

/// Narrow an accumulated sample for storage.
#[inline]
pub(crate) fn narrow(v: c64) -> c32 {
    c32::new(v.re as f32, v.im as f32)
}
