use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;

use crate::error::{Error, Result};
use crate::workspace::Workspace;

/// Zips the artifacts folder to `<output>/<HOST>_artifacts.zip`, beside the host folder.
pub fn package(workspace: &Workspace) -> Result<PathBuf> {
    let parent = workspace.root.parent().unwrap_or(Path::new("."));
    let zip_path = parent.join(format!("{}_artifacts.zip", workspace.host));
    zip_dir(&workspace.artifacts_dir, &zip_path).map_err(|e| Error::Package(e.to_string()))?;
    Ok(zip_path)
}

fn zip_dir(src_dir: &Path, dst_file: &Path) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let file = File::create(dst_file)?;
    let mut zip = zip::ZipWriter::new(file);
    let options = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .large_file(true);

    let mut buffer = Vec::new();

    for entry in WalkDir::new(src_dir).into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();
        let name = path.strip_prefix(src_dir)?;
        // Archive names always use forward slashes.
        let name = name.to_string_lossy().replace('\\', "/");

        if entry.file_type().is_file() {
            zip.start_file(name, options)?;
            let mut f = File::open(path)?;
            f.read_to_end(&mut buffer)?;
            zip.write_all(&buffer)?;
            buffer.clear();
        } else if entry.file_type().is_dir() && !name.is_empty() {
            zip.add_directory(name, options)?;
        }
    }

    zip.finish()?;
    Ok(())
}
