use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// How a failure affects the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Abort before (or instead of) collecting anything.
    Fatal,
    /// Log, record in the report, continue with the next step.
    Recoverable,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Could not determine host name (set COMPUTERNAME or pass --host)")]
    HostIdentity,

    #[error("Could not resolve own executable path: {0}")]
    SelfPath(#[source] std::io::Error),

    #[error("Could not create working directory {path}: {source}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool}: payload {path} missing, skipping")]
    PayloadMissing { tool: String, path: PathBuf },

    #[error("{tool}: archive {archive} has no member {member}")]
    ArchiveMember {
        tool: String,
        archive: PathBuf,
        member: String,
    },

    #[error("{tool}: unreadable archive: {source}")]
    Archive {
        tool: String,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("{tool}: staging failed at {path}: {source}")]
    Stage {
        tool: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Tool file name {0:?} would escape the staging directory")]
    UnsafeToolName(String),

    #[error("{0} was not staged, skipping")]
    NotStaged(String),

    #[error("{tool}: could not open output {path}: {source}")]
    Output {
        tool: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not start {tool}: {source}")]
    Launch {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} exited with {}", describe_code(.code))]
    ToolExit { tool: String, code: Option<i32> },

    #[error("{tool} timed out after {after:?} and was killed")]
    Timeout { tool: String, after: Duration },

    #[error("Copy into {dest} failed: {source}")]
    Copy {
        dest: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not remove {path}: {source}")]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not write manifest: {0}")]
    Manifest(#[source] std::io::Error),

    #[error("Packaging failed: {0}")]
    Package(String),
}

impl Error {
    pub fn severity(&self) -> Severity {
        match self {
            Error::HostIdentity | Error::SelfPath(_) | Error::Workspace { .. } => Severity::Fatal,
            _ => Severity::Recoverable,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("code {c}"),
        None => "no exit code".to_string(),
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startup_failures_are_fatal() {
        assert!(Error::HostIdentity.is_fatal());
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(Error::SelfPath(io).is_fatal());
    }

    #[test]
    fn per_step_failures_are_recoverable() {
        let exit = Error::ToolExit {
            tool: "PsList".into(),
            code: Some(2),
        };
        assert_eq!(exit.severity(), Severity::Recoverable);
        assert_eq!(exit.to_string(), "PsList exited with code 2");

        let missing = Error::PayloadMissing {
            tool: "Autoruns".into(),
            path: PathBuf::from("tools/autorunsc64.zip"),
        };
        assert!(!missing.is_fatal());
        assert!(missing.to_string().ends_with("missing, skipping"));
    }
}
