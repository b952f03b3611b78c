use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "mantis")]
#[command(version)]
#[command(about = "Windows host triage collector", long_about = None)]
pub struct Cli {
    /// Directory the per-host folder is created in
    #[arg(long, env = "MANTIS_OUTPUT", default_value = ".")]
    pub output: PathBuf,

    /// Directory holding the bundled tool archives (default: `tools/` next to the executable)
    #[arg(long, env = "MANTIS_BUNDLE_DIR")]
    pub bundle_dir: Option<PathBuf>,

    /// Host name to use instead of the detected one
    #[arg(long, env = "MANTIS_HOST")]
    pub host: Option<String>,

    /// Kill a diagnostic tool that runs longer than this
    #[arg(long, env = "MANTIS_TIMEOUT_SECS")]
    pub timeout_secs: Option<u64>,

    /// Leave staged binaries in place after the run
    #[arg(long)]
    pub keep_tools: bool,

    /// Zip the artifacts folder when collection finishes
    #[arg(long)]
    pub zip: bool,

    /// Hide the progress bar
    #[arg(long, short)]
    pub quiet: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_current_directory() {
        let cli = Cli::try_parse_from(["mantis"]).unwrap();
        assert_eq!(cli.output, PathBuf::from("."));
        assert!(!cli.keep_tools);
        assert!(cli.timeout_secs.is_none());
    }

    #[test]
    fn parses_all_flags() {
        let cli = Cli::try_parse_from([
            "mantis",
            "--output",
            "C:\\cases",
            "--host",
            "HOST1",
            "--timeout-secs",
            "90",
            "--keep-tools",
            "--zip",
            "-q",
        ])
        .unwrap();
        assert_eq!(cli.host.as_deref(), Some("HOST1"));
        assert_eq!(cli.timeout_secs, Some(90));
        assert!(cli.keep_tools && cli.zip && cli.quiet);
    }
}
