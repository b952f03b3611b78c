//! Stages tool executables into the working directory before anything runs.
//!
//! Every failure here is per tool: the tool is left out and the run goes on.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};
use crate::tools::{ToolDef, ToolPayload};
use crate::ui;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedTool {
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    Written,
    AlreadyPresent,
}

/// Result of staging a whole tool table.
#[derive(Debug, Default)]
pub struct Staging {
    pub staged: Vec<StagedTool>,
    pub failures: Vec<Error>,
    pub written: usize,
}

impl Staging {
    pub fn path_for(&self, name: &str) -> Option<&Path> {
        self.staged
            .iter()
            .find(|t| t.name == name)
            .map(|t| t.path.as_path())
    }
}

/// Destination for `file_name` inside `tools_dir`, rejecting anything but a plain file name.
pub fn destination(tools_dir: &Path, file_name: &str) -> Result<PathBuf> {
    let mut components = Path::new(file_name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(tools_dir.join(file_name)),
        _ => Err(Error::UnsafeToolName(file_name.to_string())),
    }
}

/// Ensures one tool is on disk. Existing files are left untouched.
pub fn stage(tools_dir: &Path, tool: &ToolDef) -> Result<(StagedTool, StageOutcome)> {
    let dest = destination(tools_dir, &tool.file_name)?;
    let staged = StagedTool {
        name: tool.name.clone(),
        path: dest.clone(),
    };

    if dest.exists() {
        return Ok((staged, StageOutcome::AlreadyPresent));
    }

    let bytes = read_payload(tool)?;
    write_atomic(&dest, &bytes).map_err(|source| Error::Stage {
        tool: tool.name.clone(),
        path: dest.clone(),
        source,
    })?;

    Ok((staged, StageOutcome::Written))
}

/// Stages every tool, collecting failures instead of stopping at the first.
pub fn provision_all(tools_dir: &Path, tools: &[ToolDef]) -> Staging {
    let mut staging = Staging::default();

    for tool in tools {
        match stage(tools_dir, tool) {
            Ok((staged, outcome)) => {
                match outcome {
                    StageOutcome::Written => {
                        staging.written += 1;
                        ui::info(&format!("Staged {} -> {}", tool.name, staged.path.display()));
                    }
                    StageOutcome::AlreadyPresent => {
                        ui::info(&format!("{} already staged, skipping write", tool.name));
                    }
                }
                staging.staged.push(staged);
            }
            Err(e) => {
                ui::report(&e);
                staging.failures.push(e);
            }
        }
    }

    staging
}

fn read_payload(tool: &ToolDef) -> Result<Vec<u8>> {
    match &tool.payload {
        ToolPayload::Embedded(bytes) => Ok(bytes.to_vec()),
        ToolPayload::Archive { archive, member } => read_archive_member(tool, archive, member),
    }
}

fn read_archive_member(tool: &ToolDef, archive: &Path, member: &str) -> Result<Vec<u8>> {
    let file = match File::open(archive) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(Error::PayloadMissing {
                tool: tool.name.clone(),
                path: archive.to_path_buf(),
            })
        }
        Err(source) => {
            return Err(Error::Stage {
                tool: tool.name.clone(),
                path: archive.to_path_buf(),
                source,
            })
        }
    };

    let mut zip = zip::ZipArchive::new(file).map_err(|source| Error::Archive {
        tool: tool.name.clone(),
        source,
    })?;

    let mut entry = match zip.by_name(member) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => {
            return Err(Error::ArchiveMember {
                tool: tool.name.clone(),
                archive: archive.to_path_buf(),
                member: member.to_string(),
            })
        }
        Err(source) => {
            return Err(Error::Archive {
                tool: tool.name.clone(),
                source,
            })
        }
    };

    // The header's size field is not trusted for allocation.
    let mut bytes = Vec::new();
    entry
        .read_to_end(&mut bytes)
        .map_err(|source| Error::Stage {
            tool: tool.name.clone(),
            path: archive.to_path_buf(),
            source,
        })?;
    Ok(bytes)
}

// Write to a sibling `.partial` and rename, so a crash never leaves a truncated executable.
fn write_atomic(dest: &Path, bytes: &[u8]) -> io::Result<()> {
    let file_name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let partial = dest.with_file_name(format!("{file_name}.partial"));

    let result = (|| {
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o700);
        }
        let mut file = options.open(&partial)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&partial, dest)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&partial);
    }
    result
}
