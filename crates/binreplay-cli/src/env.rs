use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

/// Find the closest .env file, searching from `start` up to the filesystem root.
pub fn find_dotenv(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(".env"))
        .find(|path| path.is_file())
}

/// Load the closest .env file above the current working directory, if any.
///
/// A missing file is not an error: every setting can also come from the
/// process environment.
pub fn load_dotenv_from_ancestors() -> Result<Option<PathBuf>> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;

    let Some(env_path) = find_dotenv(&cwd) else {
        debug!(cwd = %cwd.display(), "No .env file found");
        return Ok(None);
    };

    dotenvy::from_path(&env_path)
        .with_context(|| format!("Failed to load .env from {}", env_path.display()))?;
    info!("Loaded .env from {}", env_path.display());
    Ok(Some(env_path))
}
