//! Environment assembly and executable lookup for the tool.

use std::{
    collections::{BTreeMap, HashSet},
    env::{join_paths, split_paths},
    ffi::{OsStr, OsString},
    path::{Path, PathBuf},
};

/// Search-path variables and the install subdirectory each one gains.
const SEARCH_PATHS: [(&str, &str); 3] = [
    ("PATH", "bin"),
    ("LD_LIBRARY_PATH", "lib"),
    ("PYTHONPATH", "python-packages"),
];

/// Build the full child environment for a CASA install.
///
/// Starts from the current process environment. With an install directory,
/// its `bin`, `lib` and `python-packages` subdirectories are put in front of
/// `PATH`, `LD_LIBRARY_PATH` and `PYTHONPATH`. Without one, the inherited
/// environment is returned unchanged.
#[must_use]
pub fn tool_env(install_dir: Option<&Path>) -> BTreeMap<OsString, OsString> {
    let mut env: BTreeMap<OsString, OsString> = std::env::vars_os().collect();
    if let Some(dir) = install_dir {
        add_install_dir(&mut env, dir);
    }
    env
}

/// Prepend an install directory's subdirectories onto `env`'s search paths.
pub fn add_install_dir(env: &mut BTreeMap<OsString, OsString>, install_dir: &Path) {
    for (var, subdir) in SEARCH_PATHS {
        let key = OsString::from(var);
        let existing = env.get(&key).cloned().unwrap_or_default();
        let updated = prepend_search_path(&existing, &install_dir.join(subdir));
        tracing::trace!(var, value = ?updated, "Search path updated");
        env.insert(key, updated);
    }
}

/// Put `dir` at the front of a search path, dropping empties and duplicates.
#[must_use]
pub fn prepend_search_path(existing: impl AsRef<OsStr>, dir: &Path) -> OsString {
    let mut seen = HashSet::<PathBuf>::new();
    let mut merged = Vec::<PathBuf>::new();

    for p in std::iter::once(dir.to_path_buf()).chain(split_paths(existing.as_ref())) {
        if !p.as_os_str().is_empty() && seen.insert(p.clone()) {
            merged.push(p);
        }
    }

    join_paths(merged).unwrap_or_default()
}

/// The CASA launcher for an install directory, or the bare name for `$PATH`.
#[must_use]
pub fn tool_program(install_dir: Option<&Path>) -> PathBuf {
    install_dir.map_or_else(|| PathBuf::from("casa"), |dir| dir.join("bin").join("casa"))
}

/// Resolve an executable against the `PATH` found in `env`.
///
/// Explicit paths (absolute, or containing a separator) are accepted as-is
/// when they name a file.
#[must_use]
pub fn resolve_executable_path(
    executable: &Path,
    env: &BTreeMap<OsString, OsString>,
) -> Option<PathBuf> {
    if executable.as_os_str().is_empty() {
        return None;
    }

    if executable.components().count() > 1 || executable.is_absolute() {
        return executable.is_file().then(|| executable.to_path_buf());
    }

    let search = env.get(OsStr::new("PATH")).cloned().unwrap_or_default();
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
    which::which_in(executable, Some(search), cwd).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn prepend_puts_dir_first_and_dedups() {
        let merged =
            prepend_search_path("/usr/bin::/opt/casa/bin:/bin", Path::new("/opt/casa/bin"));
        assert_eq!(merged, OsString::from("/opt/casa/bin:/usr/bin:/bin"));
    }

    #[cfg(unix)]
    #[test]
    fn prepend_onto_empty_path() {
        let merged = prepend_search_path("", Path::new("/opt/casa/lib"));
        assert_eq!(merged, OsString::from("/opt/casa/lib"));
    }

    #[cfg(unix)]
    #[test]
    fn install_dir_extends_all_three_paths() {
        let mut env = BTreeMap::new();
        env.insert(OsString::from("PATH"), OsString::from("/usr/bin"));
        add_install_dir(&mut env, Path::new("/opt/casa"));

        assert_eq!(env[OsStr::new("PATH")], "/opt/casa/bin:/usr/bin");
        assert_eq!(env[OsStr::new("LD_LIBRARY_PATH")], "/opt/casa/lib");
        assert_eq!(env[OsStr::new("PYTHONPATH")], "/opt/casa/python-packages");
    }

    #[test]
    fn no_install_dir_keeps_inherited_env() {
        let inherited: BTreeMap<OsString, OsString> = std::env::vars_os().collect();
        assert_eq!(tool_env(None), inherited);
    }

    #[test]
    fn program_follows_install_dir() {
        assert_eq!(tool_program(None), PathBuf::from("casa"));
        assert_eq!(
            tool_program(Some(Path::new("/opt/casa"))),
            PathBuf::from("/opt/casa/bin/casa")
        );
    }

    #[cfg(unix)]
    #[test]
    fn resolves_against_given_path() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("casa");
        std::fs::write(&exe, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut env = BTreeMap::new();
        env.insert(OsString::from("PATH"), dir.path().as_os_str().to_owned());
        assert_eq!(resolve_executable_path(Path::new("casa"), &env), Some(exe));

        env.insert(OsString::from("PATH"), OsString::from("/nonexistent"));
        assert_eq!(resolve_executable_path(Path::new("casa"), &env), None);
    }
}
