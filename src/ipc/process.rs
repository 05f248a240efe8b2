//! Launching and reaping the sqinn child process.
//!
//! `launch()` spawns sqinn with all three standard streams piped and starts a
//! background task that forwards stderr to a `Logger`, line by line, until
//! the stream closes. The task has no other way to stop; it ends when sqinn
//! exits.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{Result, SqinnError};
use crate::logger::{Logger, NoLogger};

/// Executable used when no path is configured.
pub const DEFAULT_SQINN_PATH: &str = "sqinn";

/// Environment variable consulted by `Options::from_env`.
pub const SQINN_PATH_ENV: &str = "SQINN_PATH";

/// Options for launching a sqinn instance.
#[derive(Clone, Default)]
pub struct Options {
    /// Path to the sqinn executable, absolute or relative. `None` or an empty
    /// path means `sqinn`, looked up on `PATH`.
    pub sqinn_path: Option<PathBuf>,

    /// Receives sqinn's stderr lines. `None` discards them.
    pub logger: Option<Arc<dyn Logger>>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options with the executable path taken from `$SQINN_PATH`, if set.
    pub fn from_env() -> Self {
        let sqinn_path = std::env::var_os(SQINN_PATH_ENV)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);
        Self {
            sqinn_path,
            logger: None,
        }
    }

    pub fn sqinn_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.sqinn_path = Some(path.into());
        self
    }

    pub fn logger(mut self, logger: impl Logger) -> Self {
        let logger: Arc<dyn Logger> = Arc::new(logger);
        self.logger = Some(logger);
        self
    }

    /// The executable that will be launched.
    pub fn resolved_path(&self) -> &Path {
        match &self.sqinn_path {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new(DEFAULT_SQINN_PATH),
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("sqinn_path", &self.sqinn_path)
            .field("logger", &self.logger.as_ref().map(|_| "<logger>"))
            .finish()
    }
}

/// A running sqinn process with its protocol pipes.
///
/// stderr is owned by the drain task.
pub struct ChildProcess {
    pub child: Child,
    pub stdin: ChildStdin,
    pub stdout: ChildStdout,
    pub drain: JoinHandle<()>,
}

/// Spawn sqinn and start draining its stderr.
///
/// Must be called from within a tokio runtime.
///
/// # Errors
///
/// Returns `SqinnError::Launch` if the executable cannot be started or a pipe
/// could not be set up. A child that did start is killed in that case.
pub fn launch(options: &Options) -> Result<ChildProcess> {
    let path = options.resolved_path().to_path_buf();
    info!("Launching sqinn: {}", path.display());

    let launch_err = |source: io::Error| SqinnError::Launch {
        path: path.clone(),
        source,
    };
    let missing = |name: &str| {
        launch_err(io::Error::new(
            io::ErrorKind::Other,
            format!("{} was not captured", name),
        ))
    };

    let mut child = Command::new(&path)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(launch_err)?;

    // On early return `child` drops and kill_on_drop reaps it.
    let stdin = child.stdin.take().ok_or_else(|| missing("stdin"))?;
    let stdout = child.stdout.take().ok_or_else(|| missing("stdout"))?;
    let stderr = child.stderr.take().ok_or_else(|| missing("stderr"))?;

    let logger = options
        .logger
        .clone()
        .unwrap_or_else(|| Arc::new(NoLogger) as Arc<dyn Logger>);
    let drain = tokio::spawn(drain_stderr(stderr, logger));

    debug!("sqinn started, pid {:?}", child.id());

    Ok(ChildProcess {
        child,
        stdin,
        stdout,
        drain,
    })
}

/// Forward stderr lines to `logger` until the stream closes.
async fn drain_stderr(stderr: ChildStderr, logger: Arc<dyn Logger>) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => logger.log(&format!("[sqinn] {}", line)),
            Ok(None) => break,
            Err(e) => {
                logger.log(&format!("[sqinn] stderr: {}", e));
                break;
            }
        }
    }
    debug!("sqinn stderr closed");
}

/// Wait for sqinn to exit, then for the drain task to forward its last lines.
pub async fn wait(mut child: Child, drain: JoinHandle<()>) -> Result<()> {
    let status = child
        .wait()
        .await
        .map_err(|e| SqinnError::Exit(e.to_string()))?;

    if let Err(e) = drain.await {
        warn!("sqinn stderr drain task failed: {}", e);
    }

    if !status.success() {
        return Err(SqinnError::exit_status(status));
    }
    info!("sqinn exited cleanly");
    Ok(())
}
