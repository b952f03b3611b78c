//! Fixed, forward-only collection sequence.
//!
//! provision -> run each tool -> copy each source -> cleanup
//!
//! Every step runs whatever happened before it. Failures are logged and kept
//! in the `RunReport`; none of them stops the chain.

use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use crate::artifacts::{self, ArtifactOutput, CopySpec};
use crate::error::Error;
use crate::progress::{ProgressSink, RunProgress};
use crate::provision::{self, StagedTool, Staging};
use crate::runner;
use crate::tools::ToolDef;
use crate::ui;
use crate::workspace::Workspace;

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub timeout: Option<Duration>,
    pub keep_tools: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Provision,
    RunTool(usize),
    Copy(usize),
    Cleanup,
}

/// The tool and copy tables plus the ordered step list built from them.
#[derive(Debug, Clone)]
pub struct Plan {
    pub tools: Vec<ToolDef>,
    pub copies: Vec<CopySpec>,
    pub steps: Vec<Step>,
}

impl Plan {
    pub fn new(tools: Vec<ToolDef>, copies: Vec<CopySpec>) -> Self {
        let mut steps = Vec::with_capacity(tools.len() + copies.len() + 2);
        steps.push(Step::Provision);
        steps.extend((0..tools.len()).map(Step::RunTool));
        steps.extend((0..copies.len()).map(Step::Copy));
        steps.push(Step::Cleanup);
        Self {
            tools,
            copies,
            steps,
        }
    }

    pub fn total_steps(&self) -> usize {
        self.steps.len()
    }

    pub fn label(&self, step: Step) -> String {
        match step {
            Step::Provision => "provision tools".to_string(),
            Step::RunTool(i) => format!("run {}", self.tools[i].name),
            Step::Copy(i) => format!("copy {}", self.copies[i].name),
            Step::Cleanup => "cleanup".to_string(),
        }
    }
}

#[derive(Debug)]
pub enum StepOutcome {
    Completed,
    Skipped(String),
    Failed(Vec<Error>),
}

impl StepOutcome {
    fn from_errors(errors: Vec<Error>) -> Self {
        if errors.is_empty() {
            StepOutcome::Completed
        } else {
            StepOutcome::Failed(errors)
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StepOutcome::Completed => "completed",
            StepOutcome::Skipped(_) => "skipped",
            StepOutcome::Failed(_) => "failed",
        }
    }
}

#[derive(Debug)]
pub struct StepRecord {
    pub label: String,
    pub outcome: StepOutcome,
}

#[derive(Debug)]
pub struct RunReport {
    pub steps: Vec<StepRecord>,
    pub outputs: Vec<ArtifactOutput>,
    pub progress: RunProgress,
}

impl RunReport {
    pub fn failed_steps(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s.outcome, StepOutcome::Failed(_)))
            .count()
    }

    pub fn skipped_steps(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s.outcome, StepOutcome::Skipped(_)))
            .count()
    }
}

pub struct Orchestrator<'a> {
    workspace: &'a Workspace,
    options: RunOptions,
}

impl<'a> Orchestrator<'a> {
    pub fn new(workspace: &'a Workspace, options: RunOptions) -> Self {
        Self { workspace, options }
    }

    pub fn run(&self, plan: &Plan, sink: &mut dyn ProgressSink) -> RunReport {
        let mut progress = RunProgress::new(plan.total_steps());
        let mut staging = Staging::default();
        let mut records = Vec::with_capacity(plan.total_steps());
        let mut outputs = Vec::new();

        for &step in &plan.steps {
            let label = plan.label(step);
            let outcome = match step {
                Step::Provision => {
                    ui::phase("STAGING TOOLS");
                    staging = provision::provision_all(&self.workspace.tools_dir, &plan.tools);
                    StepOutcome::from_errors(std::mem::take(&mut staging.failures))
                }
                Step::RunTool(i) => {
                    if i == 0 {
                        ui::phase("RUNNING DIAGNOSTICS");
                    }
                    self.run_tool(&plan.tools[i], &staging, &mut outputs)
                }
                Step::Copy(i) => {
                    if i == 0 {
                        ui::phase("COPYING ARTIFACTS");
                    }
                    self.copy(&plan.copies[i], &mut outputs)
                }
                Step::Cleanup => {
                    ui::phase("CLEANUP");
                    self.cleanup(&staging.staged)
                }
            };

            progress.advance();
            sink.report(progress, &label);
            records.push(StepRecord { label, outcome });
        }
        sink.finish();

        RunReport {
            steps: records,
            outputs,
            progress,
        }
    }

    fn run_tool(
        &self,
        tool: &ToolDef,
        staging: &Staging,
        outputs: &mut Vec<ArtifactOutput>,
    ) -> StepOutcome {
        let Some(exe) = staging.path_for(&tool.name) else {
            let err = Error::NotStaged(tool.name.clone());
            ui::report(&err);
            return StepOutcome::Skipped(err.to_string());
        };

        ui::info(&format!("Executing: {}", tool.name));
        match runner::run_tool(tool, exe, &self.workspace.artifacts_dir, self.options.timeout) {
            Ok(output) => {
                ui::success(&format!(
                    "{} finished -> {}",
                    tool.name,
                    output.path.display()
                ));
                outputs.push(output);
                StepOutcome::Completed
            }
            Err(e) => {
                ui::report(&e);
                // A tool that ran but failed may still have written useful output.
                if matches!(e, Error::ToolExit { .. } | Error::Timeout { .. }) {
                    let path = runner::artifact_path(tool, &self.workspace.artifacts_dir);
                    if path.exists() {
                        outputs.push(ArtifactOutput {
                            name: tool.name.clone(),
                            path,
                        });
                    }
                }
                StepOutcome::Failed(vec![e])
            }
        }
    }

    fn copy(&self, spec: &CopySpec, outputs: &mut Vec<ArtifactOutput>) -> StepOutcome {
        ui::info(&format!("Collecting {}", spec.name));
        match artifacts::collect(spec, &self.workspace.artifacts_dir) {
            Ok((output, stats)) => {
                ui::success(&format!(
                    "{}: {} files ({} bytes), {} unreadable",
                    spec.name, stats.files, stats.bytes, stats.failed
                ));
                outputs.push(output);
                StepOutcome::Completed
            }
            Err(e) => {
                ui::report(&e);
                StepOutcome::Failed(vec![e])
            }
        }
    }

    fn cleanup(&self, staged: &[StagedTool]) -> StepOutcome {
        if self.options.keep_tools {
            ui::warn(&format!(
                "Keeping staged tools in {}",
                self.workspace.tools_dir.display()
            ));
            return StepOutcome::Skipped("--keep-tools".to_string());
        }

        let errors = remove_staged(&self.workspace.tools_dir, staged);
        for e in &errors {
            ui::report(e);
        }
        if errors.is_empty() {
            ui::success("Staged tools removed");
        }
        StepOutcome::from_errors(errors)
    }
}

/// Deletes each staged file, then the staging directory itself.
pub fn remove_staged(tools_dir: &Path, staged: &[StagedTool]) -> Vec<Error> {
    let mut errors = Vec::new();

    for tool in staged {
        match fs::remove_file(&tool.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(source) => errors.push(Error::Cleanup {
                path: tool.path.clone(),
                source,
            }),
        }
    }

    match fs::remove_dir_all(tools_dir) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(source) => errors.push(Error::Cleanup {
            path: tools_dir.to_path_buf(),
            source,
        }),
    }

    errors
}
