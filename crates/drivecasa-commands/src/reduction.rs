//! Composers for data-reduction statements.
//!
//! Each composer appends one statement to a script and returns the path(s)
//! the statement will produce once the tool has run it. Paths in the
//! statements are made absolute as seen from this process, since the tool
//! runs in its own working directory. Parent directories of outputs are
//! created up front; `overwrite` deletes pre-existing output directories.

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use serde::Serialize;

use crate::{
    paths::{Derivation, PathError, derive_out_path, ensure_dir, remove_existing},
    statement::{Literal, Statement},
};

/// Where a composer puts its output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OutputTarget {
    /// Derived name, in the same directory as the (first) input.
    #[default]
    Beside,
    /// Derived name, in this directory.
    Dir(PathBuf),
    /// Exactly this path.
    Path(PathBuf),
}

impl OutputTarget {
    fn resolve<P: AsRef<Path>>(
        &self,
        inputs: &[P],
        derivation: Derivation<'_>,
    ) -> Result<PathBuf, PathError> {
        match self {
            Self::Path(p) => Ok(p.clone()),
            Self::Dir(dir) => derive_out_path(
                inputs,
                &Derivation {
                    out_dir: Some(dir),
                    ..derivation
                },
            ),
            Self::Beside => derive_out_path(inputs, &derivation),
        }
    }
}

fn absolute(path: &Path) -> Result<PathBuf, PathError> {
    Ok(std::path::absolute(path)?)
}

fn ensure_parent(path: &Path) -> Result<(), PathError> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    Ok(())
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut s = OsString::from(path.as_os_str());
    s.push(suffix);
    PathBuf::from(s)
}

/// Import UVFITS data into a measurement set.
///
/// The derived name swaps the FITS extension for `.ms`.
///
/// # Errors
/// Returns error if the output path cannot be derived or prepared.
pub fn import_uvfits(
    script: &mut Vec<Statement>,
    uvfits_path: &Path,
    target: &OutputTarget,
    overwrite: bool,
) -> Result<PathBuf, PathError> {
    let ms_path = target.resolve(
        &[uvfits_path],
        Derivation {
            extension: ".ms",
            ..Derivation::default()
        },
    )?;
    ensure_parent(&ms_path)?;
    if overwrite {
        remove_existing(&ms_path)?;
    }
    script.push(
        Statement::call("importuvfits")
            .kwarg("fitsfile", absolute(uvfits_path)?)
            .kwarg("vis", absolute(&ms_path)?),
    );
    Ok(ms_path)
}

/// Concatenate several measurement sets into one.
///
/// Without an explicit path the output is `<basename>.ms` if a basename is
/// given, else `concat_<in1>_<in2>....ms`.
///
/// # Errors
/// Returns error if the output path cannot be derived or prepared.
pub fn concat<P: AsRef<Path>>(
    script: &mut Vec<Statement>,
    vis_paths: &[P],
    out_basename: Option<&str>,
    target: &OutputTarget,
    overwrite: bool,
) -> Result<PathBuf, PathError> {
    let concat_path = match (target, out_basename) {
        (OutputTarget::Path(p), _) => p.clone(),
        (OutputTarget::Dir(dir), Some(base)) => dir.join(format!("{base}.ms")),
        (OutputTarget::Beside, Some(base)) => {
            let first = vis_paths.first().ok_or(PathError::NoInputs)?.as_ref();
            first
                .parent()
                .unwrap_or(Path::new(""))
                .join(format!("{base}.ms"))
        }
        (_, None) => target.resolve(
            vis_paths,
            Derivation {
                extension: ".ms",
                prefix: Some("concat_"),
                ..Derivation::default()
            },
        )?,
    };
    ensure_parent(&concat_path)?;
    if overwrite {
        remove_existing(&concat_path)?;
    }
    let vis = vis_paths
        .iter()
        .map(|p| absolute(p.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;
    script.push(
        Statement::call("concat")
            .kwarg("vis", vis)
            .kwarg("concatvis", absolute(&concat_path)?),
    );
    Ok(concat_path)
}

/// Paths of the maps produced by one clean run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanMaps {
    pub image: PathBuf,
    pub model: PathBuf,
    pub residual: PathBuf,
    pub psf: PathBuf,
    pub mask: PathBuf,
    pub flux: PathBuf,
}

impl CleanMaps {
    fn from_basename(base: &Path) -> Self {
        Self {
            image: with_suffix(base, ".image"),
            model: with_suffix(base, ".model"),
            residual: with_suffix(base, ".residual"),
            psf: with_suffix(base, ".psf"),
            mask: with_suffix(base, ".mask"),
            flux: with_suffix(base, ".flux"),
        }
    }

    /// All map paths, image first.
    #[must_use]
    pub fn all(&self) -> [&Path; 6] {
        [
            &self.image,
            &self.model,
            &self.residual,
            &self.psf,
            &self.mask,
            &self.flux,
        ]
    }
}

/// Parameters for [`clean`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleanParams {
    /// Iterations; zero makes a dirty map.
    pub niter: u32,
    pub threshold_jy: f64,
    /// Region text, e.g. from [`crate::format::box_mask_string`].
    pub mask: String,
    pub modelimage: String,
    /// Further keyword arguments. The fixed ones above take precedence.
    pub extra: Vec<(String, Literal)>,
}

/// Run clean to produce an image.
///
/// Derived output basenames get a `.dirty` suffix when `niter` is zero,
/// `.clean` otherwise; the tool then suffixes each map (`.image`, `.psf`, ...).
/// Re-running with pre-existing outputs continues the previous clean unless
/// `overwrite` is set.
///
/// # Errors
/// Returns error if the output path cannot be derived or prepared.
pub fn clean<P: AsRef<Path>>(
    script: &mut Vec<Statement>,
    vis_paths: &[P],
    params: &CleanParams,
    target: &OutputTarget,
    overwrite: bool,
) -> Result<CleanMaps, PathError> {
    let vis = vis_paths
        .iter()
        .map(|p| absolute(p.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;
    let extension = if params.niter == 0 { ".dirty" } else { ".clean" };
    let cleaned_path = target.resolve(
        vis.as_slice(),
        Derivation {
            extension,
            ..Derivation::default()
        },
    )?;
    ensure_parent(&cleaned_path)?;

    let maps = CleanMaps::from_basename(&cleaned_path);
    if overwrite {
        for path in maps.all() {
            remove_existing(path)?;
        }
    }

    script.push(
        Statement::call("clean")
            .kwargs(params.extra.iter().cloned())
            .kwarg("vis", vis)
            .kwarg("imagename", absolute(&cleaned_path)?)
            .kwarg("niter", params.niter)
            .kwarg("threshold", format!("{}Jy", params.threshold_jy))
            .kwarg("mask", params.mask.as_str())
            .kwarg("modelimage", params.modelimage.as_str()),
    );
    Ok(maps)
}

/// Convert an image to FITS.
///
/// The derived name appends `.fits` to the full image name.
///
/// # Errors
/// Returns error if the output path cannot be derived or prepared.
pub fn export_fits(
    script: &mut Vec<Statement>,
    image_path: &Path,
    target: &OutputTarget,
    overwrite: bool,
) -> Result<PathBuf, PathError> {
    let fits_path = target.resolve(
        &[image_path],
        Derivation {
            extension: ".fits",
            keep_in_extension: true,
            ..Derivation::default()
        },
    )?;
    ensure_parent(&fits_path)?;
    script.push(
        Statement::call("exportfits")
            .kwarg("imagename", absolute(image_path)?)
            .kwarg("fitsimage", absolute(&fits_path)?)
            .kwarg("overwrite", overwrite),
    );
    Ok(fits_path)
}

/// Split / average / regrid a measurement set.
///
/// # Errors
/// Returns error if the output cannot be prepared.
pub fn mstransform(
    script: &mut Vec<Statement>,
    vis_path: &Path,
    out_path: &Path,
    extra: &[(String, Literal)],
    overwrite: bool,
) -> Result<PathBuf, PathError> {
    if overwrite {
        remove_existing(out_path)?;
    }
    script.push(
        Statement::call("mstransform")
            .kwargs(extra.iter().cloned())
            .kwarg("vis", absolute(vis_path)?)
            .kwarg("outputvis", absolute(out_path)?),
    );
    Ok(out_path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn import_uvfits_into_dir() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("casa");
        let mut script = Vec::new();

        let ms = import_uvfits(
            &mut script,
            Path::new("/data/obs1.fits"),
            &OutputTarget::Dir(out_dir.clone()),
            false,
        )
        .unwrap();

        assert_eq!(ms, out_dir.join("obs1.ms"));
        assert!(out_dir.is_dir());
        assert_eq!(
            script[0].to_string(),
            format!(
                "importuvfits(fitsfile='/data/obs1.fits', vis='{}')",
                ms.display()
            )
        );
    }

    #[test]
    fn import_overwrite_removes_existing_ms() {
        let dir = tempfile::tempdir().unwrap();
        let ms = dir.path().join("obs1.ms");
        std::fs::create_dir_all(ms.join("table")).unwrap();

        let mut script = Vec::new();
        import_uvfits(
            &mut script,
            &dir.path().join("obs1.fits"),
            &OutputTarget::Beside,
            true,
        )
        .unwrap();
        assert!(!ms.exists());
    }

    #[test]
    fn clean_dirty_map_naming_and_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let vis = dir.path().join("obs1.ms");
        let params = CleanParams {
            niter: 0,
            threshold_jy: 0.5,
            extra: vec![
                ("imsize".into(), Literal::from(vec![512, 512])),
                ("niter".into(), Literal::from(99)),
            ],
            ..CleanParams::default()
        };
        let mut script = Vec::new();

        let maps = clean(&mut script, &[&vis], &params, &OutputTarget::Beside, false).unwrap();

        assert_eq!(maps.image, dir.path().join("obs1.dirty.image"));
        assert_eq!(maps.flux, dir.path().join("obs1.dirty.flux"));
        let stmt = &script[0];
        assert_eq!(stmt.get_kwarg("niter"), Some(&Literal::Int(0)));
        assert_eq!(stmt.get_kwarg("threshold"), Some(&Literal::from("0.5Jy")));
        assert_eq!(
            stmt.get_kwarg("vis"),
            Some(&Literal::from(vec![vis.clone()]))
        );
        assert!(stmt.to_string().starts_with("clean(imsize=[512, 512], niter=0, vis=["));
    }

    #[test]
    fn clean_with_iterations_gets_clean_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let params = CleanParams {
            niter: 200,
            threshold_jy: 1.0,
            ..CleanParams::default()
        };
        let mut script = Vec::new();
        let maps = clean(
            &mut script,
            &[dir.path().join("obs1.ms")],
            &params,
            &OutputTarget::Dir(dir.path().join("maps")),
            false,
        )
        .unwrap();
        assert_eq!(maps.image, dir.path().join("maps/obs1.clean.image"));
    }

    #[test]
    fn concat_default_and_basename() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = [dir.path().join("a.ms"), dir.path().join("b.ms")];
        let mut script = Vec::new();

        let derived = concat(&mut script, &inputs, None, &OutputTarget::Beside, false).unwrap();
        assert_eq!(derived, dir.path().join("concat_a_b.ms"));

        let named = concat(
            &mut script,
            &inputs,
            Some("joined"),
            &OutputTarget::Dir(dir.path().join("out")),
            false,
        )
        .unwrap();
        assert_eq!(named, dir.path().join("out/joined.ms"));
        assert_eq!(script.len(), 2);
        assert_eq!(script[1].name, "concat");
    }

    #[test]
    fn export_fits_keeps_image_extension() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("obs1.clean.image");
        let mut script = Vec::new();
        let fits = export_fits(
            &mut script,
            &image,
            &OutputTarget::Dir(dir.path().join("images")),
            true,
        )
        .unwrap();
        assert_eq!(fits, dir.path().join("images/obs1.clean.image.fits"));
        assert!(script[0].to_string().ends_with("overwrite=True)"));
    }

    #[test]
    fn mstransform_fixed_args_win() {
        let dir = tempfile::tempdir().unwrap();
        let mut script = Vec::new();
        let extra = vec![
            ("timebin".to_string(), Literal::from("10s")),
            ("vis".to_string(), Literal::from("ignored.ms")),
        ];
        let out = dir.path().join("avg.ms");
        mstransform(&mut script, &dir.path().join("in.ms"), &out, &extra, false).unwrap();
        assert_eq!(
            script[0].get_kwarg("vis"),
            Some(&Literal::from(dir.path().join("in.ms")))
        );
        assert_eq!(script[0].get_kwarg("timebin"), Some(&Literal::from("10s")));
    }
}
