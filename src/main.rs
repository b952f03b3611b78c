use chrono::Local;
use clap::Parser;
use cli::Cli;
use colored::*;
use std::time::Duration;

mod artifacts;
mod cli;
mod compressor;
mod error;
mod manifest;
mod orchestrator;
mod progress;
mod provision;
mod runner;
mod tools;
mod ui;
mod workspace;

use orchestrator::{Orchestrator, Plan, RunOptions};
use progress::ConsoleProgress;
use workspace::Workspace;

fn main() {
    println!("{}", ui::BANNER.bright_green().bold());
    println!("{}", " --- Host Triage Collector --- \n".bright_green().bold());

    // .env values feed the MANTIS_* fallbacks of the CLI
    dotenvy::dotenv().ok();
    let args = Cli::parse();

    // Per-step failures are absorbed by the orchestrator; only startup errors reach here.
    if let Err(e) = run(args) {
        ui::error(&e.to_string());
        if e.is_fatal() {
            std::process::exit(1);
        }
    }
}

fn run(args: Cli) -> error::Result<()> {
    let started = Local::now();

    let host = workspace::resolve_host(args.host.as_deref())?;
    let bundle_dir = match args.bundle_dir {
        Some(dir) => dir,
        None => workspace::default_bundle_dir()?,
    };
    let ws = Workspace::create(&args.output, &host)?;

    ui::info(&format!("Collecting from {} into {}", host, ws.root.display()));
    ui::info(&format!("Tool bundle: {}", bundle_dir.display()));

    let plan = Plan::new(
        tools::default_tools(&bundle_dir),
        artifacts::default_sources(),
    );
    let options = RunOptions {
        timeout: args.timeout_secs.map(Duration::from_secs),
        keep_tools: args.keep_tools,
    };

    let mut sink = if args.quiet {
        ConsoleProgress::hidden(plan.total_steps())
    } else {
        ConsoleProgress::new(plan.total_steps())
    };
    let report = Orchestrator::new(&ws, options).run(&plan, &mut sink);

    match manifest::write(&ws, &report, started) {
        Ok(path) => ui::info(&format!("Manifest written: {}", path.display())),
        Err(e) => ui::report(&e),
    }

    if args.zip {
        match compressor::package(&ws) {
            Ok(path) => ui::success(&format!("Created: {}", path.display())),
            Err(e) => ui::report(&e),
        }
    }

    let failed = report.failed_steps();
    let skipped = report.skipped_steps();
    if failed == 0 && skipped == 0 {
        ui::success(&format!(
            "Collection finished: {}/{} steps. Artifacts in {}",
            report.progress.completed(),
            report.progress.total(),
            ws.artifacts_dir.display()
        ));
    } else {
        ui::warn(&format!(
            "Collection finished with {} failed and {} skipped of {} steps. Artifacts in {}",
            failed,
            skipped,
            report.progress.total(),
            ws.artifacts_dir.display()
        ));
    }

    Ok(())
}
