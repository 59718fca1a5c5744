// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! A whole focus-point search for one body model and frequency: classify the
//! tissue, locate and sample candidates, score them, then write a combined
//! field for each selected focus point.

use std::path::{Path, PathBuf};

use log::info;
use rand::Rng;
use serde::Serialize;

use crate::{
    candidates::{self, CandidateLocator},
    combine::FieldCombiner,
    config::{FocusConfig, ResourceMode},
    errors::FocusError,
    field::{check_grids, open_accessor, FieldFile},
    search::{FocusPoint, FocusSearchEngine, SearchError},
    types::VoxelIndex,
    voxel::TissueModel,
};

/// The files a run works on.
#[derive(Clone, Debug)]
pub struct RunInputs {
    pub tissue_file: PathBuf,
    /// One container per incident direction.
    pub field_files: Vec<PathBuf>,
    /// Where combined fields are written. Created if needed.
    pub output_dir: PathBuf,
}

/// What a run found.
#[derive(Clone, Debug, Serialize)]
pub struct RunSummary {
    pub enabled: bool,
    /// The field access strategy that was used.
    pub mode: Option<ResourceMode>,
    pub num_directions: usize,
    /// Air voxels that passed the surface-adjacency check.
    pub num_validated: usize,
    /// Candidates that were scored.
    pub num_sampled: usize,
    /// Set when fewer focus points than asked for were found.
    pub short_ranking: bool,
    /// Best first.
    pub points: Vec<FocusPointSummary>,
}

#[derive(Clone, Debug, Serialize)]
pub struct FocusPointSummary {
    pub rank: usize,
    pub voxel: VoxelIndex,
    /// [metres]
    pub centre_m: [f64; 3],
    pub hotspot_score: f64,
    pub surface_voxels: usize,
    /// One per direction [radians].
    pub phases_rad: Vec<f64>,
    /// One (re, im) pair per direction.
    pub weights: Vec<[f64; 2]>,
    /// The combined field written for this point.
    pub artifact: PathBuf,
}

impl FocusPointSummary {
    fn new(point: &FocusPoint, artifact: PathBuf) -> Self {
        Self {
            rank: point.rank,
            voxel: point.voxel,
            centre_m: point.centre,
            hotspot_score: point.score,
            surface_voxels: point.surface_voxels,
            phases_rad: point.weights.phases(),
            weights: point.weights.weights().iter().map(|w| [w.re, w.im]).collect(),
            artifact,
        }
    }
}

impl RunSummary {
    fn disabled() -> Self {
        Self {
            enabled: false,
            mode: None,
            num_directions: 0,
            num_validated: 0,
            num_sampled: 0,
            short_ranking: false,
            points: vec![],
        }
    }

    /// Write this summary as pretty JSON.
    pub fn write_json<T: AsRef<Path>>(&self, path: T) -> Result<(), FocusError> {
        let path = path.as_ref();
        let io = |source| FocusError::Io {
            file: path.display().to_string(),
            source,
        };
        let json = serde_json::to_string_pretty(self).map_err(|e| io(e.into()))?;
        std::fs::write(path, json).map_err(io)
    }
}

/// Run a search with the random generator described by `config`.
pub fn run(config: &FocusConfig, inputs: &RunInputs) -> Result<RunSummary, FocusError> {
    let mut rng = config.rng();
    run_with_rng(config, inputs, &mut rng)
}

/// Run a search, drawing all random numbers from `rng`.
pub fn run_with_rng<R: Rng + ?Sized>(
    config: &FocusConfig,
    inputs: &RunInputs,
    rng: &mut R,
) -> Result<RunSummary, FocusError> {
    config.validate()?;
    if !config.enabled {
        info!("Focus-point search is disabled; nothing to do");
        return Ok(RunSummary::disabled());
    }
    let num_directions = inputs.field_files.len();
    if num_directions < 2 {
        return Err(SearchError::InsufficientDirections {
            got: num_directions,
        }
        .into());
    }

    let model = TissueModel::new(&inputs.tissue_file)?;
    let masks = model.classify(&config.surface_keyword);
    let files = inputs
        .field_files
        .iter()
        .map(FieldFile::open)
        .collect::<Result<Vec<_>, _>>()?;
    check_grids(
        model.geometry(),
        &inputs.tissue_file.display().to_string(),
        &files,
    )?;
    let template = files[0].clone();
    let accessor = open_accessor(files, config.resource_mode, config.memory_budget_gb)?;

    let validated = CandidateLocator::new(model.geometry(), &masks)?
        .locate(config.cube_half_width_mm, config.min_surface_fraction)?;
    let sampled = candidates::sample(&validated, config.n_samples, rng);
    info!(
        "Scoring {} of {} valid candidates",
        sampled.len(),
        validated.len()
    );
    let outcome = FocusSearchEngine::new(accessor.as_ref(), &masks)?.search(&sampled, config, rng)?;

    std::fs::create_dir_all(&inputs.output_dir).map_err(|source| FocusError::Io {
        file: inputs.output_dir.display().to_string(),
        source,
    })?;
    let combiner = FieldCombiner::new(accessor.as_ref(), &template)?;
    let mut points = Vec::with_capacity(outcome.points.len());
    for point in &outcome.points {
        let artifact = combiner.combine_to_file(
            &point.weights,
            point.voxel,
            config.combine_mode,
            config.combine_half_width_mm(),
            &inputs.output_dir,
            point.rank,
        )?;
        points.push(FocusPointSummary::new(point, artifact));
    }

    Ok(RunSummary {
        enabled: true,
        mode: Some(accessor.mode()),
        num_directions,
        num_validated: validated.len(),
        num_sampled: sampled.len(),
        short_ranking: outcome.short_ranking,
        points,
    })
}
