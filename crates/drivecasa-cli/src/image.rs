//! The `image` command: dirty and masked clean maps per observation.

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use drivecasa_commands::{
    CleanParams, Literal, OutputTarget, Statement,
    format::{box_mask_string, circular_pixel_mask_string},
    reduction::{clean, export_fits, import_uvfits},
    save_script,
};
use drivecasa_core::AppContext;
use drivecasa_session::{RunOptions, Session, SessionError};
use serde_json::Value;

use crate::listings::{Groups, Observation};

/// Map centre in pixels.
const CENTRE: (f64, f64) = (256.0, 256.0);

/// Clean settings for one kind of source.
#[derive(Debug, Clone, PartialEq)]
pub struct Recipe {
    pub label: &'static str,
    pub niter: u32,
    /// Threshold as a multiple of the estimated noise.
    pub noise_multiple: f64,
    pub mask: String,
}

impl Recipe {
    /// Target field: a 256-pixel box about the centre.
    #[must_use]
    pub fn target() -> Self {
        Self {
            label: "target",
            niter: 200,
            noise_multiple: 2.5,
            mask: box_mask_string(Some(&[CENTRE]), 256.0),
        }
    }

    /// Calibrator: a 5-pixel circle about the centre.
    #[must_use]
    pub fn calibrator() -> Self {
        Self {
            label: "calibrator",
            niter: 400,
            noise_multiple: 3.0,
            mask: circular_pixel_mask_string(Some(&[CENTRE]), 5.0),
        }
    }
}

/// Clean keywords shared by every map.
fn imaging_defaults() -> Vec<(String, Literal)> {
    vec![
        ("spw".into(), "0:3~7".into()),
        ("imsize".into(), vec![512, 512].into()),
        ("cell".into(), vec!["5.0arcsec"].into()),
        ("pbcor".into(), false.into()),
        ("weighting".into(), "natural".into()),
        ("psfmode".into(), "clark".into()),
        ("imagermode".into(), "csclean".into()),
    ]
}

/// Output directories for one observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservationDirs {
    /// Measurement sets and CASA images.
    pub casa: PathBuf,
    /// Exported FITS maps, shared by the group.
    pub images: PathBuf,
}

impl ObservationDirs {
    #[must_use]
    pub fn new(output_dir: &Path, group: &str, obs_name: &str) -> Self {
        let group_dir = output_dir.join(group);
        Self {
            casa: group_dir.join("casa").join(obs_name),
            images: group_dir.join("images"),
        }
    }
}

/// Import, dirty map, masked clean map, both exported to FITS.
///
/// # Errors
/// Returns error if the UVFITS file is missing or outputs cannot be prepared.
pub fn imaging_script(
    uvfits: &Path,
    dirs: &ObservationDirs,
    recipe: &Recipe,
    est_noise: f64,
) -> anyhow::Result<Vec<Statement>> {
    if !uvfits.is_file() {
        bail!("could not find uvfits file {}", uvfits.display());
    }
    let casa = OutputTarget::Dir(dirs.casa.clone());
    let images = OutputTarget::Dir(dirs.images.clone());

    let mut script = Vec::new();
    let vis = import_uvfits(&mut script, uvfits, &casa, true)?;

    let dirty_params = CleanParams {
        niter: 0,
        threshold_jy: est_noise * recipe.noise_multiple,
        extra: imaging_defaults(),
        ..CleanParams::default()
    };
    let dirty = clean(&mut script, &[&vis], &dirty_params, &casa, true)?;
    export_fits(&mut script, &dirty.image, &images, true)?;

    let clean_params = CleanParams {
        niter: recipe.niter,
        mask: recipe.mask.clone(),
        ..dirty_params
    };
    let cleaned = clean(&mut script, &[&vis], &clean_params, &casa, true)?;
    export_fits(&mut script, &cleaned.image, &images, true)?;

    Ok(script)
}

/// Outcome of an imaging run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImagingSummary {
    pub imaged: Vec<String>,
    pub failed: Vec<String>,
}

/// Image every observation, continuing past observations that fail.
///
/// Failed observation names are also stored in the context metadata under
/// `failed_observations`.
///
/// # Errors
/// Timeouts, tool exits and I/O errors abort the run.
pub async fn image_groups(
    session: &mut Session,
    ctx: &mut AppContext,
    groups: &Groups,
    output_dir: &Path,
) -> anyhow::Result<ImagingSummary> {
    let mut summary = ImagingSummary::default();
    for (group, observations) in groups {
        for observation in observations {
            let dirs = ObservationDirs::new(output_dir, group, &observation.obs_name);
            match image_observation(session, observation, &dirs).await {
                Ok(()) => summary.imaged.push(observation.obs_name.clone()),
                Err(ObservationError::Skipped(e)) => {
                    tracing::warn!(obs = %observation.obs_name, error = %format!("{e:#}"), "Skipping observation");
                    summary.failed.push(observation.obs_name.clone());
                }
                Err(ObservationError::Fatal(e)) => return Err(e),
            }
        }
    }
    ctx.set_metadata(
        "failed_observations",
        Value::from(summary.failed.clone()),
    );
    Ok(summary)
}

enum ObservationError {
    /// This observation cannot be imaged; others may still be.
    Skipped(anyhow::Error),
    Fatal(anyhow::Error),
}

async fn image_observation(
    session: &mut Session,
    observation: &Observation,
    dirs: &ObservationDirs,
) -> Result<(), ObservationError> {
    let sources = [
        (&observation.target_uvfits, Recipe::target()),
        (&observation.cal_uvfits, Recipe::calibrator()),
    ];
    for (uvfits, recipe) in sources {
        let script = imaging_script(uvfits, dirs, &recipe, observation.est_noise)
            .map_err(ObservationError::Skipped)?;

        let stem = uvfits.file_stem().unwrap_or_default().to_string_lossy();
        let script_path = dirs.casa.join(format!("{stem}_casa_script.py"));
        save_script(&script, &script_path)
            .with_context(|| format!("failed to save {}", script_path.display()))
            .map_err(ObservationError::Fatal)?;

        tracing::info!(obs = %observation.obs_name, source = recipe.label, statements = script.len(), "Imaging");
        match session.run_statements(&script, RunOptions::strict()).await {
            Ok(_) => {}
            Err(e @ SessionError::SevereCommand(_)) => {
                return Err(ObservationError::Skipped(e.into()));
            }
            Err(e) => return Err(ObservationError::Fatal(e.into())),
        }
    }
    Ok(())
}
