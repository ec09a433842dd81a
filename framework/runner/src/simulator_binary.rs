use std::env;
use std::path::{Path, PathBuf};

use anyhow::bail;
use anyhow::Context;

use crate::types::SweepRunnerResult;

/// Environment variable to override the path to the simulator binary.
pub const SCHEDSIM_PATH_ENV: &str = "SCHEDSIM_PATH";

/// Name of the simulator binary looked up in `PATH` when no explicit path is given.
pub const SCHEDSIM_BINARY: &str = "schedsim";

/// Get the path to the simulator binary.
///
/// A path from the sweep plan wins. Otherwise the [`SCHEDSIM_PATH_ENV`] environment variable is
/// used, and if that is not set either the binary is looked up in the user's `PATH`.
pub fn simulator_path(configured: Option<&Path>) -> SweepRunnerResult<PathBuf> {
    if let Some(path) = configured {
        if !path.exists() {
            bail!(
                "Simulator path '{}' from the sweep plan doesn't exist",
                path.display()
            );
        }
        return Ok(path.to_path_buf());
    }

    match env::var(SCHEDSIM_PATH_ENV).ok().as_deref() {
        Some("") => {
            bail!("'{SCHEDSIM_PATH_ENV}' set to empty string");
        }
        Some(SCHEDSIM_BINARY) | None => {
            log::debug!("'{SCHEDSIM_PATH_ENV}' is not a path so looking in user's 'PATH'");
            which::which(SCHEDSIM_BINARY).with_context(|| {
                format!(
                    "Simulator binary '{SCHEDSIM_BINARY}' not found in PATH. Set '{SCHEDSIM_PATH_ENV}' or 'simulator' in the sweep plan."
                )
            })
        }
        Some(path) => {
            let simulator_path = PathBuf::from(path);
            if !simulator_path.exists() {
                bail!(
                    "Path to simulator overwritten with '{SCHEDSIM_PATH_ENV}={path}' but that path doesn't exist",
                    path = simulator_path.display()
                );
            }
            Ok(simulator_path)
        }
    }
}

#[cfg(test)]
mod tests {
    #[cfg(unix)]
    use std::os::unix::fs::PermissionsExt as _;

    use tempfile::{NamedTempFile, TempDir};

    use super::*;

    // The environment is process wide, so every case that touches it runs in one test.
    #[test]
    fn resolves_simulator_from_env_then_path() {
        env::set_var(SCHEDSIM_PATH_ENV, "/non/existent/path/to/schedsim");
        assert!(simulator_path(None).is_err());

        env::set_var(SCHEDSIM_PATH_ENV, "");
        assert!(simulator_path(None).is_err());

        let temp = NamedTempFile::new().expect("failed to create temp file");
        let test_path = temp.path().to_str().expect("failed to get temp file path");
        env::set_var(SCHEDSIM_PATH_ENV, test_path);
        let result = simulator_path(None).expect("failed to get simulator path");
        assert_eq!(result, PathBuf::from(test_path));

        #[cfg(unix)]
        {
            let dir = TempDir::new().expect("failed to create temp dir");
            let binary = dir.path().join(SCHEDSIM_BINARY);
            std::fs::write(&binary, "#!/bin/sh\n").expect("failed to create simulator file");
            let mut perms = std::fs::metadata(&binary).unwrap().permissions();
            perms.set_mode(0o755);
            std::fs::set_permissions(&binary, perms).unwrap();

            let old_path = env::var_os("PATH");
            env::set_var("PATH", dir.path());
            env::remove_var(SCHEDSIM_PATH_ENV);

            let result = simulator_path(None).expect("failed to get simulator path");
            assert_eq!(result, binary);

            env::set_var("PATH", "/non/existent/bin");
            assert!(simulator_path(None).is_err());

            match old_path {
                Some(old_path) => env::set_var("PATH", old_path),
                None => env::remove_var("PATH"),
            }
        }
    }

    #[test]
    fn configured_path_wins() {
        let temp = NamedTempFile::new().expect("failed to create temp file");
        let result = simulator_path(Some(temp.path())).expect("failed to get simulator path");
        assert_eq!(result, temp.path());

        assert!(simulator_path(Some(Path::new("/non/existent/schedsim"))).is_err());
    }
}
