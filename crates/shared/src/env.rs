use std::path::{Path, PathBuf};

use tracing::{debug, trace, warn};

/// Files loaded by `configure_env`, in order
pub const ENV_FILES: [&str; 2] = [".env", ".env.secrets"];

/// Look for `file_name` in `dir`, then two levels up (the workspace root when
/// running from a crate directory).
fn find_env_file(dir: &Path, file_name: &str) -> Option<PathBuf> {
    [dir.join(file_name), dir.join("../..").join(file_name)]
        .into_iter()
        .find(|candidate| candidate.is_file())
        .inspect(|path| trace!(path = %path.display(), "Found environment file"))
}

fn load_env_file(path: &Path) -> bool {
    match dotenv::from_path(path) {
        Ok(()) => {
            debug!(path = %path.display(), "Loaded environment variables");
            true
        }
        Err(e) => {
            warn!(
                path = %path.display(),
                error = %e,
                "Failed to load environment variables file"
            );
            false
        }
    }
}

/// Load every file of `ENV_FILES` found from `dir`, returning the ones loaded.
pub fn load_env_files_from(dir: &Path) -> Vec<PathBuf> {
    ENV_FILES
        .iter()
        .filter_map(|name| find_env_file(dir, name))
        .filter(|path| load_env_file(path))
        .collect()
}

/// Load `.env` and `.env.secrets` (if present) into the process environment.
///
/// Variables already set in the environment take precedence.
pub fn configure_env() -> Result<(), anyhow::Error> {
    let cwd = std::env::current_dir()?;
    let loaded = load_env_files_from(&cwd);
    if loaded.is_empty() {
        trace!("No environment files found");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    mod unit {
        use super::super::*;

        #[test]
        fn test_loads_env_and_secrets_files() {
            let dir = tempfile::tempdir().unwrap();
            std::fs::write(dir.path().join(".env"), "RELAY_TEST_ENV_A=from-env\n").unwrap();
            std::fs::write(
                dir.path().join(".env.secrets"),
                "RELAY_TEST_ENV_B=from-secrets\n",
            )
            .unwrap();

            let loaded = load_env_files_from(dir.path());

            assert_eq!(loaded.len(), 2);
            assert_eq!(std::env::var("RELAY_TEST_ENV_A").unwrap(), "from-env");
            assert_eq!(std::env::var("RELAY_TEST_ENV_B").unwrap(), "from-secrets");
        }

        #[test]
        fn test_missing_files_are_skipped() {
            let dir = tempfile::tempdir().unwrap();
            let nested = dir.path().join("a/b");
            std::fs::create_dir_all(&nested).unwrap();

            assert!(load_env_files_from(&nested).is_empty());
        }

        #[test]
        fn test_finds_file_two_levels_up() {
            let dir = tempfile::tempdir().unwrap();
            let nested = dir.path().join("crates/relay");
            std::fs::create_dir_all(&nested).unwrap();
            std::fs::write(dir.path().join(".env"), "RELAY_TEST_ENV_C=root\n").unwrap();

            let found = find_env_file(&nested, ".env").unwrap();
            assert!(found.ends_with(".env"));
        }
    }
}
