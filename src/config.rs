// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Settings for a focus-point search, loaded from JSON.
//!
//! Every field has a default, so a config file only needs to name what it
//! changes:
//!
//! ```json
//! {
//!   "n_samples": 200,
//!   "top_n": 5,
//!   "cube_half_width_mm": 25.0,
//!   "seed": 42,
//!   "resource_mode": "streaming"
//! }
//! ```

use std::path::Path;

use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{combine::CombineMode, constants::DEFAULT_SURFACE_KEYWORD};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Couldn't read config '{file}': {source}")]
    Read {
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Couldn't parse config '{file}': {source}")]
    Parse {
        file: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// How directional fields are held while searching and combining.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceMode {
    /// Decide from the field sizes and the available memory.
    #[default]
    Auto,
    /// Load every direction once and keep it.
    InMemory,
    /// Keep at most one direction in memory.
    Streaming,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FocusConfig {
    /// When false, a run does nothing and says so in its summary.
    pub enabled: bool,
    /// How many validated candidates are drawn for scoring.
    pub n_samples: usize,
    /// How many of the best-scoring candidates are kept.
    pub top_n: usize,
    /// Half-width of the cube used for validity and for scoring [mm].
    pub cube_half_width_mm: f64,
    /// Fraction of the cube that must be surface for a candidate to be valid.
    pub min_surface_fraction: f64,
    /// `None` gives a different sample every run.
    pub seed: Option<u64>,
    pub resource_mode: ResourceMode,
    /// Memory available for fields [GiB]; replaces the memory probe when the
    /// mode is decided automatically.
    pub memory_budget_gb: Option<f64>,
    /// Score on roughly one in this many surface voxels (1 = all of them).
    pub surface_stride: usize,
    pub surface_keyword: String,
    pub combine_mode: CombineMode,
    /// Half-width of the cube written in sliced mode [mm]. Defaults to
    /// `cube_half_width_mm`.
    pub combine_half_width_mm: Option<f64>,
    /// Accept fewer than `top_n` results when fewer candidates were scored.
    pub allow_short_ranking: bool,
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            n_samples: 100,
            top_n: 3,
            cube_half_width_mm: 50.0,
            min_surface_fraction: 0.05,
            seed: None,
            resource_mode: ResourceMode::Auto,
            memory_budget_gb: None,
            surface_stride: 1,
            surface_keyword: DEFAULT_SURFACE_KEYWORD.to_string(),
            combine_mode: CombineMode::Sliced,
            combine_half_width_mm: None,
            allow_short_ranking: false,
        }
    }
}

impl FocusConfig {
    /// Check the values that can't be expressed by their types.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));
        if self.n_samples == 0 {
            return invalid("n_samples must be at least 1".to_string());
        }
        if self.top_n == 0 {
            return invalid("top_n must be at least 1".to_string());
        }
        if !(self.cube_half_width_mm > 0.0) {
            return invalid(format!(
                "cube_half_width_mm must be positive (got {})",
                self.cube_half_width_mm
            ));
        }
        if let Some(w) = self.combine_half_width_mm {
            if !(w > 0.0) {
                return invalid(format!("combine_half_width_mm must be positive (got {w})"));
            }
        }
        if !(0.0..=1.0).contains(&self.min_surface_fraction) {
            return invalid(format!(
                "min_surface_fraction must be within [0, 1] (got {})",
                self.min_surface_fraction
            ));
        }
        if self.surface_stride == 0 {
            return invalid("surface_stride must be at least 1".to_string());
        }
        if let Some(gb) = self.memory_budget_gb {
            if !(gb > 0.0) {
                return invalid(format!("memory_budget_gb must be positive (got {gb})"));
            }
        }
        if self.surface_keyword.trim().is_empty() {
            return invalid("surface_keyword must not be empty".to_string());
        }
        Ok(())
    }

    /// The random generator for this run: seeded if a seed is set, otherwise
    /// from entropy.
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    pub fn combine_half_width_mm(&self) -> f64 {
        self.combine_half_width_mm
            .unwrap_or(self.cube_half_width_mm)
    }
}

/// Read and validate a JSON config file.
pub fn load_config<T: AsRef<Path>>(path: T) -> Result<FocusConfig, ConfigError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        file: path.display().to_string(),
        source,
    })?;
    let config: FocusConfig =
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            file: path.display().to_string(),
            source,
        })?;
    config.validate()?;
    Ok(config)
}
