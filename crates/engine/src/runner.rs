//! Command runner – external commands with fail-fast binary resolution.
//!
//! Binary absence is detected before spawning so a missing tool surfaces as
//! a [`EngineError::MissingBinary`] with an install hint rather than a
//! spawn-time surprise. Child output is inherited (never swallowed) for
//! `run`, or captured for capability probing via `run_capture`.

use crate::error::{EngineError, EngineResult};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// Options bag for a single command invocation.
#[derive(Debug, Default, Clone)]
pub struct CommandOptions {
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

impl CommandOptions {
    pub fn in_dir(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: Some(cwd.into()),
            env: Vec::new(),
        }
    }
}

/// Output of a captured invocation; non-zero exits are not an error here
/// because capability probes inspect output regardless of status.
#[derive(Debug)]
pub struct CapturedOutput {
    pub code: i32,
    pub output: String,
}

/// Resolve a binary name to an executable path, checking PATH the same way
/// the OS would. Names containing a path separator are checked directly.
pub fn resolve_binary(name: &str) -> EngineResult<PathBuf> {
    let missing = || EngineError::MissingBinary {
        name: name.to_string(),
    };

    if name.contains(std::path::MAIN_SEPARATOR) || name.contains('/') {
        let path = Path::new(name);
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        return Err(missing());
    }

    let path_var = std::env::var_os("PATH").ok_or_else(missing)?;
    for dir in std::env::split_paths(&path_var) {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Ok(candidate);
        }
        #[cfg(windows)]
        for ext in ["exe", "cmd", "bat"] {
            let with_ext = candidate.with_extension(ext);
            if with_ext.is_file() {
                return Ok(with_ext);
            }
        }
    }
    Err(missing())
}

fn display_command(bin: &str, args: &[String]) -> String {
    if args.is_empty() {
        bin.to_string()
    } else {
        format!("{} {}", bin, args.join(" "))
    }
}

/// Run a command to completion with inherited stdio.
///
/// Resolves with `Ok(())` on exit code 0; non-zero exits map to
/// [`EngineError::Execution`], launch failures to [`EngineError::Spawn`].
pub async fn run(bin: &str, args: &[String], opts: &CommandOptions) -> EngineResult<()> {
    let bin_path = resolve_binary(bin)?;
    let shown = display_command(bin, args);
    tracing::debug!(command = %shown, "running");

    let mut cmd = Command::new(&bin_path);
    cmd.args(args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());
    if let Some(ref cwd) = opts.cwd {
        cmd.current_dir(cwd);
    }
    for (k, v) in &opts.env {
        cmd.env(k, v);
    }

    let status = cmd.status().await.map_err(|e| EngineError::Spawn {
        command: shown.clone(),
        source: e,
    })?;

    if status.success() {
        Ok(())
    } else {
        Err(EngineError::Execution {
            command: shown,
            code: status.code().unwrap_or(-1),
        })
    }
}

/// Run a command and capture its combined stdout+stderr.
pub async fn run_capture(
    bin: &str,
    args: &[String],
    opts: &CommandOptions,
) -> EngineResult<CapturedOutput> {
    let bin_path = resolve_binary(bin)?;
    let shown = display_command(bin, args);

    let mut cmd = Command::new(&bin_path);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(ref cwd) = opts.cwd {
        cmd.current_dir(cwd);
    }
    for (k, v) in &opts.env {
        cmd.env(k, v);
    }

    let out = cmd.output().await.map_err(|e| EngineError::Spawn {
        command: shown,
        source: e,
    })?;

    let mut output = String::from_utf8_lossy(&out.stdout).into_owned();
    output.push_str(&String::from_utf8_lossy(&out.stderr));
    Ok(CapturedOutput {
        code: out.status.code().unwrap_or(-1),
        output,
    })
}
