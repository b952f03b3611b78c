use chrono::{DateTime, Local};
use serde_json::{json, Value};
use std::env;
use std::fs;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::orchestrator::{RunReport, StepOutcome};
use crate::workspace::Workspace;

const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const MANIFEST_FILE: &str = "collection_manifest.json";

pub fn build(workspace: &Workspace, report: &RunReport, started: DateTime<Local>) -> Value {
    let username = env::var("USERNAME")
        .or_else(|_| env::var("USER"))
        .unwrap_or_else(|_| "Unknown-User".to_string());
    let finished = Local::now();

    let steps: Vec<Value> = report
        .steps
        .iter()
        .map(|record| {
            let detail: Vec<String> = match &record.outcome {
                StepOutcome::Completed => vec![],
                StepOutcome::Skipped(reason) => vec![reason.clone()],
                StepOutcome::Failed(errors) => errors.iter().map(|e| e.to_string()).collect(),
            };
            json!({
                "step": record.label,
                "outcome": record.outcome.as_str(),
                "detail": detail,
            })
        })
        .collect();

    let outputs: Vec<Value> = report
        .outputs
        .iter()
        .map(|o| {
            json!({
                "name": o.name,
                "path": o.path.strip_prefix(&workspace.root).unwrap_or(&o.path).to_string_lossy(),
            })
        })
        .collect();

    json!({
        "system": {
            "hostname": workspace.host,
            "user": username,
        },
        "started_at": started.to_rfc3339(),
        "finished_at": finished.to_rfc3339(),
        "progress": {
            "completed": report.progress.completed(),
            "total": report.progress.total(),
        },
        "steps": steps,
        "outputs": outputs,
        "collector": {
            "name": "mantis",
            "version": APP_VERSION
        }
    })
}

/// Writes the manifest into the artifacts folder.
pub fn write(workspace: &Workspace, report: &RunReport, started: DateTime<Local>) -> Result<PathBuf> {
    let manifest = build(workspace, report, started);
    let path = workspace.artifacts_dir.join(MANIFEST_FILE);
    let text = serde_json::to_string_pretty(&manifest)
        .map_err(|e| Error::Manifest(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
    fs::write(&path, text).map_err(Error::Manifest)?;
    Ok(path)
}
