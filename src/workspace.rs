//! Per-host working directory.
//!
//! ```text
//! <output>/<HOST>/
//!     Tools/       staged binaries, removed at the end of the run
//!     Artifacts/   everything collected
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub const TOOLS_DIR: &str = "Tools";
pub const ARTIFACTS_DIR: &str = "Artifacts";

#[derive(Debug, Clone)]
pub struct Workspace {
    pub host: String,
    pub root: PathBuf,
    pub tools_dir: PathBuf,
    pub artifacts_dir: PathBuf,
}

impl Workspace {
    /// Creates `<output>/<host>` with its staging and artifacts folders.
    ///
    /// All paths are absolute: tools run with `Artifacts/` as their working
    /// directory, so a relative root would resolve against the wrong place.
    pub fn create(output: &Path, host: &str) -> Result<Self> {
        let requested = output.join(host);
        let root = std::path::absolute(&requested).map_err(|source| Error::Workspace {
            path: requested.clone(),
            source,
        })?;
        let tools_dir = root.join(TOOLS_DIR);
        let artifacts_dir = root.join(ARTIFACTS_DIR);

        for dir in [&root, &tools_dir, &artifacts_dir] {
            fs::create_dir_all(dir).map_err(|source| Error::Workspace {
                path: dir.clone(),
                source,
            })?;
        }

        Ok(Self {
            host: host.to_string(),
            root,
            tools_dir,
            artifacts_dir,
        })
    }
}

/// Host identity from the override, then `COMPUTERNAME`, then `HOSTNAME`.
pub fn resolve_host(host_override: Option<&str>) -> Result<String> {
    resolve_host_with(host_override, |key| env::var(key).ok())
}

pub fn resolve_host_with<F>(host_override: Option<&str>, lookup: F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let candidate = host_override
        .map(str::to_string)
        .or_else(|| lookup("COMPUTERNAME"))
        .or_else(|| lookup("HOSTNAME"));

    match candidate.map(|h| sanitize_host(&h)) {
        Some(host) if !host.is_empty() => Ok(host),
        _ => Err(Error::HostIdentity),
    }
}

// The host name becomes a directory name, so it must stay a single component.
fn sanitize_host(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed == "." || trimmed == ".." {
        return String::new();
    }
    trimmed
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect()
}

/// `tools/` next to the running executable.
pub fn default_bundle_dir() -> Result<PathBuf> {
    let exe = env::current_exe().map_err(Error::SelfPath)?;
    let dir = exe.parent().ok_or_else(|| {
        Error::SelfPath(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} has no parent directory", exe.display()),
        ))
    })?;
    Ok(dir.join("tools"))
}
