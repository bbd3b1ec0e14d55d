//! Output path derivation and small filesystem helpers.

use std::{
    io,
    path::{Path, PathBuf},
};

use thiserror::Error;

/// Path derivation error.
#[derive(Debug, Error)]
pub enum PathError {
    #[error("No input paths given")]
    NoInputs,
    #[error("Derived output path {0} would overwrite an input")]
    OverwritesInput(PathBuf),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Create a directory and its parents if missing (`mkdir -p`).
///
/// # Errors
/// Returns error if creation fails.
pub fn ensure_dir(dir: &Path) -> io::Result<()> {
    if dir.as_os_str().is_empty() || dir.is_dir() {
        return Ok(());
    }
    tracing::debug!(dir = %dir.display(), "Creating directory");
    std::fs::create_dir_all(dir)
}

/// Options for [`derive_out_path`].
#[derive(Debug, Clone, Default)]
pub struct Derivation<'a> {
    /// Directory for the output; `None` means beside the first input.
    pub out_dir: Option<&'a Path>,
    /// Extension including the leading dot, e.g. `".ms"`.
    pub extension: &'a str,
    /// Keep the inputs' own extensions in the derived basename.
    pub keep_in_extension: bool,
    /// Prepended to the derived basename.
    pub prefix: Option<&'a str>,
}

/// Derive an output path from one or more input paths.
///
/// `in/base.fits` becomes `out/base.ms`; several inputs have their basenames
/// joined with `_`.
///
/// # Errors
/// Returns error if there are no inputs, or if the result would overwrite an
/// input.
pub fn derive_out_path<P: AsRef<Path>>(
    inputs: &[P],
    opts: &Derivation<'_>,
) -> Result<PathBuf, PathError> {
    let first = inputs.first().ok_or(PathError::NoInputs)?.as_ref();
    let out_dir = opts
        .out_dir
        .map_or_else(|| first.parent().unwrap_or(Path::new("")).to_path_buf(), Path::to_path_buf);

    let basenames: Vec<String> = inputs
        .iter()
        .map(|p| {
            let p = p.as_ref();
            let name = if opts.keep_in_extension {
                p.file_name()
            } else {
                p.file_stem()
            };
            name.unwrap_or_default().to_string_lossy().into_owned()
        })
        .collect();

    let out_name = format!(
        "{}{}{}",
        opts.prefix.unwrap_or_default(),
        basenames.join("_"),
        opts.extension
    );
    let out_path = out_dir.join(out_name);

    let abs_out = std::path::absolute(&out_path)?;
    for input in inputs {
        if std::path::absolute(input.as_ref())? == abs_out {
            return Err(PathError::OverwritesInput(out_path));
        }
    }
    Ok(out_path)
}

/// Save statements to a text file, one per line.
///
/// # Errors
/// Returns error if the file cannot be written.
pub fn save_script<S: ToString>(script: &[S], path: &Path) -> io::Result<()> {
    let text = script
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n");
    std::fs::write(path, text)
}

/// Delete a directory tree if it exists.
pub(crate) fn remove_existing(path: &Path) -> io::Result<()> {
    if path.is_dir() {
        tracing::info!(path = %path.display(), "Removing pre-existing output");
        std::fs::remove_dir_all(path)?;
    }
    Ok(())
}
