//! Settings loading and inspection.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use storesync_client::{Settings, DEFAULT_SETTINGS_FILE};

/// Resolve the effective settings.
///
/// An explicit path must exist. Without one, `storesync.toml` in the working
/// directory is used if present, else the defaults.
pub fn load(path: Option<&Path>) -> Result<(Settings, Option<PathBuf>)> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => {
            let fallback = PathBuf::from(DEFAULT_SETTINGS_FILE);
            if !fallback.exists() {
                return Ok((Settings::default(), None));
            }
            fallback
        }
    };

    let settings = Settings::load(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;
    Ok((settings, Some(path)))
}

/// Run the config command.
pub fn run(settings: &Settings, source: Option<&Path>) -> Result<()> {
    match source {
        Some(path) => println!("# Loaded from {}", path.display()),
        None => println!("# Defaults (no {} found)", DEFAULT_SETTINGS_FILE),
    }
    print!("{}", settings.to_toml_string()?);

    let policy = settings.handshake.policy();
    println!();
    println!(
        "# Handshake gives up after {} pings, {}ms of waiting",
        policy.max_attempts,
        policy.total_budget().as_millis()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn explicit_path_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[log]\nfilter = \"debug\"").unwrap();

        let (settings, source) = load(Some(file.path())).unwrap();
        assert_eq!(settings.log.filter, "debug");
        assert_eq!(source.as_deref(), Some(file.path()));
    }

    #[test]
    fn missing_explicit_path_fails() {
        let result = load(Some(Path::new("/nonexistent/storesync.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn invalid_settings_fail() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[handshake]\nmax_attempts = 0").unwrap();

        assert!(load(Some(file.path())).is_err());
    }

    #[test]
    fn run_prints_settings() {
        assert!(run(&Settings::default(), None).is_ok());
    }
}
