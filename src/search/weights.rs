// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Maximum Ratio Transmission weights.

use crate::c64;

/// The MRT weight of one direction, given its `E_z` at the focus voxel and
/// the total number of directions: `exp(-j arg(E_z)) / sqrt(N)`.
#[inline]
pub fn mrt_weight(focus_value: c64, num_directions: usize) -> c64 {
    c64::from_polar(1.0 / (num_directions as f64).sqrt(), -focus_value.arg())
}

/// Complex excitation weights, one per direction, with equal magnitudes and
/// unit total power.
#[derive(Clone, Debug, PartialEq)]
pub struct WeightVector {
    weights: Vec<c64>,
}

impl WeightVector {
    /// Phase-align every direction at a focus voxel, given each direction's
    /// `E_z` there.
    pub fn from_focus_values(focus_values: &[c64]) -> Self {
        let n = focus_values.len();
        Self {
            weights: focus_values.iter().map(|&v| mrt_weight(v, n)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn weights(&self) -> &[c64] {
        &self.weights
    }

    pub fn weight_for(&self, direction: usize) -> Option<c64> {
        self.weights.get(direction).copied()
    }

    /// The phase of each weight [radians].
    pub fn phases(&self) -> Vec<f64> {
        self.weights.iter().map(|w| w.arg()).collect()
    }

    /// `sum |w_i|^2`; 1 for weights built here.
    pub fn total_power(&self) -> f64 {
        self.weights.iter().map(|w| w.norm_sqr()).sum()
    }
}

impl From<Vec<c64>> for WeightVector {
    fn from(weights: Vec<c64>) -> Self {
        Self { weights }
    }
}
