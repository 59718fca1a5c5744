// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Useful constants.
 */

/// Tissue keyword used to decide which voxels belong to the body surface.
pub const DEFAULT_SURFACE_KEYWORD: &str = "skin";

/// Top-level group holding voxel meshes and their axis arrays.
pub(crate) const MESHES_GROUP: &str = "Meshes";
/// Top-level group holding one sub-group per material identifier.
pub(crate) const MATERIALS_GROUP: &str = "Materials";
/// Top-level group holding simulated field snapshots.
pub(crate) const FIELD_GROUPS: &str = "FieldGroups";

pub(crate) const VOXELS_DATASET: &str = "voxels";
pub(crate) const ID_MAP_DATASET: &str = "id_map";
pub(crate) const MATERIAL_IDS_DATASET: &str = "material_ids";
pub(crate) const MATERIAL_NAME_ATTR: &str = "material_name";

/// Node-coordinate datasets of a mesh, in x, y, z order [metres].
pub(crate) const AXIS_NAMES: [&str; 3] = ["axis_x", "axis_y", "axis_z"];
/// Datasets of the three field components inside a snapshot group.
pub(crate) const COMPONENT_NAMES: [&str; 3] = ["comp0", "comp1", "comp2"];
/// The component whose phase the focusing weights align (z).
pub(crate) const FOCUS_COMPONENT: usize = 2;

/// Snapshot group of the E field, relative to a field group.
pub(crate) const E_SNAPSHOT_PATH: &str = "AllFields/EM E(x,y,z,f0)/_Object/Snapshots/0";
/// Snapshot group of the H field, relative to a field group.
pub(crate) const H_SNAPSHOT_PATH: &str = "AllFields/EM H(x,y,z,f0)/_Object/Snapshots/0";

/// Markers that start a body-model suffix in a tissue name, e.g.
/// "Skin (Duke)" or "Skin_by_Duke".
pub(crate) const NAME_SUFFIX_MARKERS: [&str; 2] = [" (", "_by_"];

/// Relative tolerance when comparing axis coordinates of two grids.
pub(crate) const GRID_TOLERANCE: f64 = 1e-9;

/// Only this fraction of the available memory is considered usable when
/// deciding whether all fields can be held in memory.
pub(crate) const MEMORY_SAFETY_FACTOR: f64 = 0.5;

/// Bytes per stored complex sample (two f32s).
pub(crate) const BYTES_PER_SAMPLE: usize = 8;
