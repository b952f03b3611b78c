//! System directories copied verbatim into the artifacts folder.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::ui;

/// A file or directory the run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactOutput {
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct CopySpec {
    pub name: String,
    /// `None` when the environment variable the path derives from is unset.
    pub source: Option<PathBuf>,
    /// Folder name under the artifacts directory.
    pub dest: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyStats {
    pub files: u64,
    pub bytes: u64,
    pub failed: u64,
}

/// Event logs, PowerShell history and the system temp folder.
pub fn default_sources() -> Vec<CopySpec> {
    default_sources_with(|key| std::env::var_os(key).map(PathBuf::from))
}

pub fn default_sources_with<F>(lookup: F) -> Vec<CopySpec>
where
    F: Fn(&str) -> Option<PathBuf>,
{
    vec![
        CopySpec {
            name: "EventLogs".into(),
            source: lookup("SystemRoot").map(|root| {
                root.join("System32").join("winevt").join("Logs")
            }),
            dest: "Events".into(),
        },
        CopySpec {
            name: "PowershellHistory".into(),
            source: lookup("USERPROFILE").map(|home| {
                home.join("AppData")
                    .join("Roaming")
                    .join("Microsoft")
                    .join("Windows")
                    .join("PowerShell")
                    .join("PSReadLine")
            }),
            dest: "Powershell".into(),
        },
        CopySpec {
            name: "TempFolder".into(),
            source: Some(PathBuf::from(r"C:\Windows\Temp")),
            dest: "Temp".into(),
        },
    ]
}

/// Copies `spec.source` into `<artifacts_dir>/<spec.dest>`.
///
/// The destination is always created. A missing source copies nothing and is
/// not an error; unreadable files are counted in `failed` and skipped.
pub fn collect(spec: &CopySpec, artifacts_dir: &Path) -> Result<(ArtifactOutput, CopyStats)> {
    let dest = artifacts_dir.join(&spec.dest);
    fs::create_dir_all(&dest).map_err(|source| Error::Copy {
        dest: dest.clone(),
        source,
    })?;

    let output = ArtifactOutput {
        name: spec.name.clone(),
        path: dest.clone(),
    };

    let stats = match &spec.source {
        Some(src) if src.is_dir() => copy_tree(src, &dest)?,
        Some(src) => {
            ui::warn(&format!("{}: {} not found, nothing to copy", spec.name, src.display()));
            CopyStats::default()
        }
        None => {
            ui::warn(&format!("{}: source location unknown on this host", spec.name));
            CopyStats::default()
        }
    };

    Ok((output, stats))
}

/// Recursive, additive copy. Existing files in `dest` are kept unless overwritten.
pub fn copy_tree(src: &Path, dest: &Path) -> Result<CopyStats> {
    let mut stats = CopyStats::default();

    for entry in WalkDir::new(src).min_depth(1) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                ui::error(&format!("Cannot read {}: {}", src.display(), e));
                stats.failed += 1;
                continue;
            }
        };

        // Entries always sit under `src`, so this cannot fail.
        let Ok(rel) = entry.path().strip_prefix(src) else {
            continue;
        };
        let target = dest.join(rel);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|source| Error::Copy {
                dest: target.clone(),
                source,
            })?;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|source| Error::Copy {
                dest: parent.to_path_buf(),
                source,
            })?;
        }

        match fs::copy(entry.path(), &target) {
            Ok(bytes) => {
                stats.files += 1;
                stats.bytes += bytes;
            }
            Err(e) => {
                ui::error(&format!("Could not copy {}: {}", entry.path().display(), e));
                stats.failed += 1;
            }
        }
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn spec(source: Option<PathBuf>, dest: &str) -> CopySpec {
        CopySpec {
            name: dest.to_string(),
            source,
            dest: dest.to_string(),
        }
    }

    #[test]
    fn copies_nested_tree() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("Logs");
        fs::create_dir_all(src.join("sub")).unwrap();
        fs::write(src.join("System.evtx"), b"evtx").unwrap();
        fs::write(src.join("sub").join("Security.evtx"), b"sec!").unwrap();

        let artifacts = tmp.path().join("Artifacts");
        let (output, stats) = collect(&spec(Some(src), "Events"), &artifacts).unwrap();

        assert_eq!(output.path, artifacts.join("Events"));
        assert_eq!(stats, CopyStats { files: 2, bytes: 8, failed: 0 });
        assert_eq!(
            fs::read(artifacts.join("Events").join("sub").join("Security.evtx")).unwrap(),
            b"sec!"
        );
    }

    #[test]
    fn missing_source_is_an_empty_no_op() {
        let tmp = TempDir::new().unwrap();
        let artifacts = tmp.path().join("Artifacts");

        let (output, stats) =
            collect(&spec(Some(tmp.path().join("nope")), "Powershell"), &artifacts).unwrap();
        assert_eq!(stats, CopyStats::default());
        assert!(output.path.is_dir());
        assert_eq!(fs::read_dir(&output.path).unwrap().count(), 0);

        let (_, stats) = collect(&spec(None, "Temp"), &artifacts).unwrap();
        assert_eq!(stats.files, 0);
        assert!(artifacts.join("Temp").is_dir());
    }

    #[test]
    fn existing_destination_content_survives() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir(&src).unwrap();
        fs::write(src.join("new.txt"), b"new").unwrap();

        let dest = tmp.path().join("dest");
        fs::create_dir(&dest).unwrap();
        fs::write(dest.join("old.txt"), b"old").unwrap();

        copy_tree(&src, &dest).unwrap();
        assert_eq!(fs::read(dest.join("old.txt")).unwrap(), b"old");
        assert_eq!(fs::read(dest.join("new.txt")).unwrap(), b"new");
    }

    #[test]
    fn sources_follow_environment() {
        let sources = default_sources_with(|key| match key {
            "SystemRoot" => Some(PathBuf::from("W")),
            _ => None,
        });

        assert_eq!(sources.len(), 3);
        assert_eq!(
            sources[0].source,
            Some(Path::new("W").join("System32").join("winevt").join("Logs"))
        );
        assert!(sources[1].source.is_none());
        let dests: Vec<_> = sources.iter().map(|s| s.dest.as_str()).collect();
        assert_eq!(dests, ["Events", "Powershell", "Temp"]);
    }
}
