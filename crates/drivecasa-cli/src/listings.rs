//! Observation listings for the `image` command.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use anyhow::Context;
use serde::Deserialize;

/// One observation: a target and its calibrator, as UVFITS files.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Observation {
    pub obs_name: String,
    pub group_name: String,
    pub target_uvfits: PathBuf,
    pub cal_uvfits: PathBuf,
    /// Estimated noise, in Jy.
    pub est_noise: f64,
}

/// Observations grouped by `group_name`, both levels sorted.
pub type Groups = BTreeMap<String, Vec<Observation>>;

/// Load a JSON object mapping keys to observation records.
///
/// # Errors
/// Returns error if the file cannot be read or is not valid listings JSON.
pub fn load_listings(path: &Path) -> anyhow::Result<BTreeMap<String, Observation>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read listings {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("failed to parse listings {}", path.display()))
}

/// Group observations by group name, keeping listing-key order within each.
#[must_use]
pub fn group_listings(listings: BTreeMap<String, Observation>) -> Groups {
    let mut groups = Groups::new();
    for observation in listings.into_values() {
        groups
            .entry(observation.group_name.clone())
            .or_default()
            .push(observation);
    }
    groups
}

/// Log what is about to be processed.
pub fn log_preamble(groups: &Groups) {
    tracing::info!(groups = groups.len(), "Processing listings");
    for (group, observations) in groups {
        let names: Vec<&str> = observations.iter().map(|o| o.obs_name.as_str()).collect();
        tracing::info!(%group, observations = ?names, "Group");
    }
}
