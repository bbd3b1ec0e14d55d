//! Composers for simulated observations with the `sm` simulator tool.
//!
//! A typical run: [`make_componentlist`], [`open_sim`], [`setconfig`],
//! [`setspwindow`], [`setfeed`], [`setfield`], [`setlimits`], [`setauto`],
//! [`settimes`], [`observe`], [`predict`], [`set_simplenoise`], [`corrupt`]
//! and finally [`close_sim`]. Quantities are plain numbers in the unit their
//! parameter name carries.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::{
    format::{casa_direction, casa_epoch},
    paths::{PathError, ensure_dir, remove_existing},
    statement::{Literal, Statement},
    subroutines::LOAD_ANTENNALIST,
};

/// Field name used by [`setfield`] and [`observe`].
pub const FIELD_NAME: &str = "drivecasa_field0";
/// Spectral window name used by [`setspwindow`] and [`observe`].
pub const SPECTRAL_WINDOW_NAME: &str = "drivecasa_spw0";

/// Names the antenna-list columns are loaded into before `sm.setconfig`.
const ANTENNA_COLUMNS: [&str; 4] = ["_dc_ant_x", "_dc_ant_y", "_dc_ant_z", "_dc_ant_d"];

/// A point source for a component list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointSource {
    pub ra_deg: f64,
    pub dec_deg: f64,
    pub flux_jy: f64,
    pub freq_hz: f64,
}

fn prepare_output(path: &Path, overwrite: bool) -> Result<PathBuf, PathError> {
    let path = std::path::absolute(path)?;
    if path.is_dir() {
        if overwrite {
            remove_existing(&path)?;
        } else {
            tracing::warn!(path = %path.display(), "Output already exists and overwrite is off");
        }
    }
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    Ok(path)
}

/// Build a component list of point sources and save it at `out_path`.
///
/// Returns the absolute path of the list.
///
/// # Errors
/// Returns error if the output location cannot be prepared.
pub fn make_componentlist(
    script: &mut Vec<Statement>,
    sources: &[PointSource],
    out_path: &Path,
    overwrite: bool,
) -> Result<PathBuf, PathError> {
    let out_path = prepare_output(out_path, overwrite)?;
    script.push(Statement::call("cl.done"));
    for source in sources {
        script.push(
            Statement::call("cl.addcomponent")
                .kwarg(
                    "dir",
                    format!("J2000 {}deg {}deg", source.ra_deg, source.dec_deg),
                )
                .kwarg("flux", source.flux_jy)
                .kwarg("fluxunit", "Jy")
                .kwarg("freq", format!("{}Hz", source.freq_hz))
                .kwarg("shape", "point"),
        );
    }
    script.push(Statement::call("cl.rename").arg(&out_path));
    script.push(Statement::call("cl.close"));
    Ok(out_path)
}

/// Open a new measurement set for simulated data.
///
/// # Errors
/// Returns error if the output location cannot be prepared.
pub fn open_sim(
    script: &mut Vec<Statement>,
    ms_path: &Path,
    overwrite: bool,
) -> Result<PathBuf, PathError> {
    let ms_path = prepare_output(ms_path, overwrite)?;
    script.push(Statement::call("sm.open").arg(&ms_path));
    Ok(ms_path)
}

/// Configure the array from an XYZ antenna-list file.
///
/// The columns are read by the pre-loaded antenna-list subroutine into
/// `_dc_ant_*` variables, which `sm.setconfig` then uses.
///
/// # Errors
/// Returns error if the antenna list path cannot be made absolute.
pub fn setconfig(
    script: &mut Vec<Statement>,
    telescope_name: &str,
    antennalist_path: &Path,
) -> Result<(), PathError> {
    script.push(
        Statement::call(LOAD_ANTENNALIST)
            .arg(std::path::absolute(antennalist_path)?)
            .assign_to(ANTENNA_COLUMNS),
    );
    let [x, y, z, d] = ANTENNA_COLUMNS.map(|column| Literal::Raw(column.to_string()));
    script.push(
        Statement::call("sm.setconfig")
            .kwarg("telescopename", telescope_name)
            .kwarg("x", x)
            .kwarg("y", y)
            .kwarg("z", z)
            .kwarg("dishdiameter", d)
            .kwarg("mount", "alt-az")
            .kwarg("coordsystem", "local")
            .kwarg(
                "referencelocation",
                Statement::call("me.observatory").arg(telescope_name),
            ),
    );
    Ok(())
}

/// Use a Gaussian primary beam of the given half-width at half-maximum.
pub fn setpb(script: &mut Vec<Statement>, telescope_name: &str, hwhm_deg: f64, ref_freq_hz: f64) {
    script.push(
        Statement::call("vp.setpbgauss")
            .kwarg("telescope", telescope_name)
            .kwarg("dopb", true)
            .kwarg("halfwidth", format!("{hwhm_deg}deg"))
            .kwarg("reffreq", format!("{ref_freq_hz}Hz")),
    );
    script.push(Statement::call("sm.setvp").kwarg("dovp", true));
}

/// Spectral window parameters for [`setspwindow`].
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralWindow {
    pub freq_start_hz: f64,
    pub freq_resolution_hz: f64,
    pub freq_delta_hz: f64,
    pub n_channels: u32,
    pub stokes: String,
}

impl SpectralWindow {
    /// Default Stokes products for linear feeds.
    pub const DEFAULT_STOKES: &'static str = "XX XY YX YY";
}

/// Define the simulated spectral window.
pub fn setspwindow(script: &mut Vec<Statement>, spw: &SpectralWindow) {
    script.push(
        Statement::call("sm.setspwindow")
            .kwarg("spwname", SPECTRAL_WINDOW_NAME)
            .kwarg("freq", format!("{}Hz", spw.freq_start_hz))
            .kwarg("deltafreq", format!("{}Hz", spw.freq_delta_hz))
            .kwarg("freqresolution", format!("{}Hz", spw.freq_resolution_hz))
            .kwarg("nchannels", spw.n_channels)
            .kwarg("stokes", spw.stokes.as_str()),
    );
}

/// Default feed mode for [`setfeed`].
pub const DEFAULT_FEED_MODE: &str = "perfect X Y";

/// Set feed polarisation, e.g. `perfect X Y` or `perfect R L`.
pub fn setfeed(script: &mut Vec<Statement>, mode: &str) {
    script.push(
        Statement::call("sm.setfeed")
            .kwarg("mode", mode)
            .kwarg("pol", vec![""]),
    );
}

/// Point the simulated field at the given J2000 position.
pub fn setfield(script: &mut Vec<Statement>, ra_deg: f64, dec_deg: f64) {
    script.push(
        Statement::call("sm.setfield")
            .kwarg("sourcename", FIELD_NAME)
            .kwarg("sourcedirection", casa_direction(ra_deg, dec_deg)),
    );
}

/// Set shadowing and elevation limits beyond which data are flagged.
///
/// The usual values are a shadow fraction of `1e-3` and 15 degrees.
pub fn setlimits(script: &mut Vec<Statement>, shadow_limit: f64, elevation_limit_deg: f64) {
    script.push(
        Statement::call("sm.setlimits")
            .kwarg("shadowlimit", shadow_limit)
            .kwarg("elevationlimit", format!("{elevation_limit_deg}deg")),
    );
}

/// Set the weight given to autocorrelations.
pub fn setauto(script: &mut Vec<Statement>, autocorr_weight: f64) {
    script.push(Statement::call("sm.setauto").kwarg("autocorrwt", autocorr_weight));
}

/// Set the integration time and the reference epoch that [`observe`] offsets
/// are measured from.
pub fn settimes(
    script: &mut Vec<Statement>,
    integration_secs: f64,
    reference_time: DateTime<Utc>,
    use_hour_angle: bool,
) {
    script.push(
        Statement::call("sm.settimes")
            .kwarg("integrationtime", format!("{integration_secs}s"))
            .kwarg("usehourangle", use_hour_angle)
            .kwarg("referencetime", casa_epoch(reference_time)),
    );
}

/// Simulate the UVW data of an empty-field observation between the given
/// offsets from the reference time.
pub fn observe(script: &mut Vec<Statement>, start_delay_secs: f64, stop_delay_secs: f64) {
    script.push(
        Statement::call("sm.observe")
            .arg(FIELD_NAME)
            .arg(SPECTRAL_WINDOW_NAME)
            .kwarg("starttime", format!("{start_delay_secs}s"))
            .kwarg("stoptime", format!("{stop_delay_secs}s")),
    );
}

/// Add the visibilities of a component list to the open measurement set.
pub fn predict(script: &mut Vec<Statement>, componentlist_path: &Path) {
    script.push(Statement::call("sm.predict").kwarg("complist", componentlist_path));
}

/// Configure fixed-sigma visibility noise. Only applied by [`corrupt`].
pub fn set_simplenoise(script: &mut Vec<Statement>, noise_std_dev_jy: f64) {
    script.push(Statement::call("sm.setnoise").kwarg("simplenoise", format!("{noise_std_dev_jy}Jy")));
}

/// Apply the configured noise.
pub fn corrupt(script: &mut Vec<Statement>) {
    script.push(Statement::call("sm.corrupt"));
}

/// Flush simulated data to disk and close the simulator.
pub fn close_sim(script: &mut Vec<Statement>) {
    script.push(Statement::call("sm.close"));
}
