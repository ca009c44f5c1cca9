//! Subprocess-backed actions
//!
//! A manifest action with a `command` runs as a child process in the
//! extension directory. The child receives `{"profile": .., "entry": ..}`
//! on stdin, may report progress as JSON lines `{"progress": 0.5}` on stdout,
//! and signals success with exit code 0.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use clevert_core::types::{Action as ActionDecl, Entry};
use clevert_core::{Error, Result};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::execute::{Action, ExecuteController, ExecuteProbe};

/// Bytes of stderr kept for error messages
const STDERR_TAIL: usize = 2048;

/// Action that runs a program once per entry
#[derive(Debug, Clone)]
pub struct CommandAction {
    program: PathBuf,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    working_dir: PathBuf,
}

impl CommandAction {
    pub fn new(program: impl Into<PathBuf>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            working_dir: working_dir.into(),
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Build from a manifest action of the extension installed at `ext_dir`
    ///
    /// Bare program names are looked up on `PATH`; any other relative
    /// program is resolved against the extension directory.
    pub fn from_manifest(ext_dir: &Path, action: &ActionDecl) -> Result<Self> {
        let command = action.command.as_ref().ok_or_else(|| {
            Error::execution(format!("action {} declares no command", action.id))
        })?;

        let program = Path::new(&command.program);
        let is_bare = program.components().count() == 1 && !command.program.starts_with('.');
        let program = if program.is_absolute() || is_bare {
            program.to_path_buf()
        } else {
            ext_dir.join(program)
        };

        Ok(Self {
            program,
            args: command.args.clone(),
            env: command.env.clone(),
            working_dir: ext_dir.to_path_buf(),
        })
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl Action for CommandAction {
    fn execute(&self, profile: &Value, entry: &Entry) -> Result<ExecuteController> {
        let mut payload = serde_json::to_vec(&json!({ "profile": profile, "entry": entry }))?;
        payload.push(b'\n');

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .envs(&self.env)
            .current_dir(&self.working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| {
            Error::execution(format!(
                "failed to start {}: {}",
                self.program.display(),
                e
            ))
        })?;
        debug!("Started {} (pid {:?})", self.program.display(), child.id());

        let label = self
            .program
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.display().to_string());

        Ok(ExecuteController::spawn(move |probe| {
            supervise(child, payload, probe, label)
        }))
    }
}

async fn supervise(mut child: Child, payload: Vec<u8>, probe: ExecuteProbe, label: String) -> Result<()> {
    let stdin = child.stdin.take();
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let feed = async move {
        if let Some(mut stdin) = stdin {
            // A child that ignores stdin may close it early
            if let Err(e) = stdin.write_all(&payload).await {
                debug!("stdin closed early: {}", e);
            }
        }
    };

    let reporter = probe.clone();
    let read_progress = async move {
        if let Some(stdout) = stdout {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                match parse_progress(&line) {
                    Some(value) => reporter.set_progress(value),
                    None => debug!("{}", line),
                }
            }
        }
    };

    let read_stderr = async move {
        let mut tail = Vec::new();
        if let Some(mut stderr) = stderr {
            let mut buf = [0u8; 1024];
            while let Ok(n) = stderr.read(&mut buf).await {
                if n == 0 {
                    break;
                }
                tail.extend_from_slice(&buf[..n]);
                if tail.len() > STDERR_TAIL {
                    let excess = tail.len() - STDERR_TAIL;
                    tail.drain(..excess);
                }
            }
        }
        tail
    };

    let (tail, status) = tokio::select! {
        biased;
        _ = probe.stopped() => {
            if let Err(e) = child.kill().await {
                warn!("Failed to kill {}: {}", label, e);
            }
            return Err(Error::execution("stopped"));
        }
        (_, _, tail, status) = async { tokio::join!(feed, read_progress, read_stderr, child.wait()) } => {
            (tail, status)
        }
    };

    let status = status?;
    if !status.success() {
        let tail = String::from_utf8_lossy(&tail);
        let tail = tail.trim();
        return Err(if tail.is_empty() {
            Error::execution(format!("{} ended with {}", label, status))
        } else {
            Error::execution(format!("{} ended with {}: {}", label, status, tail))
        });
    }

    probe.set_progress(1.0);
    Ok(())
}

/// Read a `{"progress": f}` line
fn parse_progress(line: &str) -> Option<f64> {
    serde_json::from_str::<Value>(line.trim())
        .ok()?
        .get("progress")?
        .as_f64()
}
