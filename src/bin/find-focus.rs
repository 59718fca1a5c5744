// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Find the worst-case focus points for one body model and frequency, write
//! a combined field for each and a JSON summary of what was found.
//!
//! Usage: find-focus <config.json> <tissue.h5> <output_dir> <field.h5>...
//!
//! Logging is controlled with RUST_LOG (default "info").

use std::path::PathBuf;

use mamimo_focus::{config::load_config, run, FocusError, RunInputs};

const SUMMARY_FILE: &str = "focus_summary.json";

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 4 {
        eprintln!("Usage: find-focus <config.json> <tissue.h5> <output_dir> <field.h5>...");
        std::process::exit(2);
    }
    if let Err(e) = find_focus(&args) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn find_focus(args: &[String]) -> Result<(), FocusError> {
    let config = load_config(&args[0])?;
    let inputs = RunInputs {
        tissue_file: PathBuf::from(&args[1]),
        output_dir: PathBuf::from(&args[2]),
        field_files: args[3..].iter().map(PathBuf::from).collect(),
    };
    let summary = run(&config, &inputs)?;

    if summary.enabled {
        for point in &summary.points {
            println!(
                "#{} voxel {:?} at ({:.4}, {:.4}, {:.4}) m: score {:.6e} -> {}",
                point.rank,
                point.voxel,
                point.centre_m[0],
                point.centre_m[1],
                point.centre_m[2],
                point.hotspot_score,
                point.artifact.display()
            );
        }
        if summary.short_ranking {
            println!(
                "Only {} focus point(s) were found (fewer than requested)",
                summary.points.len()
            );
        }
        summary.write_json(inputs.output_dir.join(SUMMARY_FILE))?;
    }
    Ok(())
}
