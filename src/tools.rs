// src/tools.rs
use std::borrow::Cow;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Placeholder in an argument list, replaced by the artifact path.
pub const OUTPUT_ARG: &str = "{output}";

/// Where a tool's executable bytes come from.
#[derive(Debug, Clone)]
pub enum ToolPayload {
    /// Bytes compiled into (or loaded by) the process.
    Embedded(Cow<'static, [u8]>),
    /// A member of a zip archive shipped next to the collector.
    Archive { archive: PathBuf, member: String },
}

/// How the tool's results reach the artifacts folder. File names are relative to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capture {
    /// stdout and stderr both go to this file.
    Redirect(String),
    /// The tool writes this file itself (path passed via `OUTPUT_ARG`); console output goes to `logs/`.
    ToolWritten(String),
}

impl Capture {
    pub fn file_name(&self) -> &str {
        match self {
            Capture::Redirect(name) | Capture::ToolWritten(name) => name,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ToolDef {
    /// Logical name used in messages and logs.
    pub name: String,
    /// File name of the staged executable inside `Tools/`.
    pub file_name: String,
    pub args: Vec<String>,
    pub capture: Capture,
    pub payload: ToolPayload,
}

impl ToolDef {
    /// Argument list with `OUTPUT_ARG` replaced by `output`.
    pub fn resolved_args(&self, output: &Path) -> Vec<OsString> {
        self.args
            .iter()
            .map(|arg| {
                if arg == OUTPUT_ARG {
                    output.as_os_str().to_owned()
                } else {
                    OsString::from(arg)
                }
            })
            .collect()
    }
}

fn bundled(
    bundle_dir: &Path,
    name: &str,
    file_name: &str,
    args: &[&str],
    capture: Capture,
) -> ToolDef {
    let stem = Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string());

    ToolDef {
        name: name.to_string(),
        file_name: file_name.to_string(),
        args: args.iter().map(|a| a.to_string()).collect(),
        capture,
        payload: ToolPayload::Archive {
            archive: bundle_dir.join(format!("{stem}.zip")),
            member: file_name.to_string(),
        },
    }
}

/// The diagnostic tools, in the order they run.
pub fn default_tools(bundle_dir: &Path) -> Vec<ToolDef> {
    vec![
        // Login/run history (NirSoft), writes its own CSV
        bundled(
            bundle_dir,
            "LastActivityView",
            "LastActivityView.exe",
            &["/scomma", OUTPUT_ARG],
            Capture::ToolWritten("LastActivityView.csv".into()),
        ),
        // Process tree (Sysinternals)
        bundled(
            bundle_dir,
            "PsList",
            "pslist64.exe",
            &["-t", "/accepteula"],
            Capture::Redirect("ProcessList.txt".into()),
        ),
        // TCP/UDP endpoints as CSV
        bundled(
            bundle_dir,
            "TcpView",
            "tcpvcon64.exe",
            &["/accepteula", "-c"],
            Capture::Redirect("LogsTCPView.csv".into()),
        ),
        // All autostart locations, SHA hashes, CSV
        bundled(
            bundle_dir,
            "Autoruns",
            "autorunsc64.exe",
            &["/accepteula", "-a", "*", "-h", "s", "-ct"],
            Capture::Redirect("Autoruns.csv".into()),
        ),
    ]
}
