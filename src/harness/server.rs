use crate::error::{HarnessError, Result};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tokio::time::sleep;
use tracing::{debug, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const CONNECT_ATTEMPT: Duration = Duration::from_millis(500);

/// How the controller decides the server is ready for the first trial.
#[derive(Debug, Clone, PartialEq)]
pub enum Readiness {
    /// Poll until a TCP connection to `address` succeeds.
    TcpConnect { address: String, timeout: Duration },
    /// Sleep for a fixed window and hope.
    Delay(Duration),
}

#[derive(Debug, Clone)]
pub struct ServerCommand {
    pub program: PathBuf,
    /// Passed before the configuration path.
    pub args: Vec<String>,
    /// Where server stdout/stderr go. Discarded when unset.
    pub log: Option<PathBuf>,
}

/// A running server under test.
///
/// The child is spawned with `kill_on_drop`, so dropping the guard on an
/// error path still kills the process. `shutdown` is the orderly path: it
/// kills, then waits for the exit status.
#[derive(Debug)]
pub struct ServerProcess {
    child: Child,
    program: String,
}

impl ServerProcess {
    pub fn spawn(command: &ServerCommand, config_path: &Path) -> Result<Self> {
        let program = command.program.display().to_string();

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .arg(config_path)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let spawn_error = |source| HarnessError::ProcessSpawn {
            program: program.clone(),
            source,
        };

        match &command.log {
            Some(log_path) => {
                let log = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(log_path)
                    .map_err(spawn_error)?;
                cmd.stdout(Stdio::from(log.try_clone().map_err(spawn_error)?))
                    .stderr(Stdio::from(log));
            }
            None => {
                cmd.stdout(Stdio::null()).stderr(Stdio::null());
            }
        }

        let child = cmd.spawn().map_err(spawn_error)?;

        info!(
            %program,
            pid = child.id().unwrap_or_default(),
            config = %config_path.display(),
            "server started"
        );

        Ok(Self { child, program })
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Fails if the server has already exited.
    pub fn ensure_running(&mut self) -> Result<()> {
        match self.child.try_wait()? {
            Some(status) => Err(HarnessError::ServerExited { status }),
            None => Ok(()),
        }
    }

    pub async fn wait_ready(&mut self, readiness: &Readiness) -> Result<()> {
        match readiness {
            Readiness::Delay(window) => {
                sleep(*window).await;
                self.ensure_running()
            }
            Readiness::TcpConnect { address, timeout } => {
                let started = Instant::now();
                loop {
                    self.ensure_running()?;
                    let remaining = timeout.saturating_sub(started.elapsed());
                    if accepts_connections(address, CONNECT_ATTEMPT.min(remaining)).await {
                        debug!(
                            %address,
                            elapsed = ?started.elapsed(),
                            "server accepting connections"
                        );
                        return Ok(());
                    }
                    if started.elapsed() >= *timeout {
                        return Err(HarnessError::ServerNotReady {
                            address: address.clone(),
                            waited: *timeout,
                        });
                    }
                    sleep(POLL_INTERVAL).await;
                }
            }
        }
    }

    /// Kills the server and waits at most `grace` for it to be reaped.
    pub async fn shutdown(mut self, grace: Duration) -> Result<ExitStatus> {
        if let Some(status) = self.child.try_wait()? {
            warn!(program = %self.program, %status, "server had already exited");
            return Ok(status);
        }

        if let Err(err) = self.child.start_kill() {
            // raced with a natural exit
            if let Some(status) = self.child.try_wait()? {
                return Ok(status);
            }
            return Err(err.into());
        }

        let status = tokio::time::timeout(grace, self.child.wait())
            .await
            .map_err(|_| HarnessError::ShutdownTimeout { waited: grace })??;

        info!(program = %self.program, %status, "server stopped");
        Ok(status)
    }
}

/// One connection attempt, bounded by `limit`. A peer that drops packets
/// counts as not accepting.
async fn accepts_connections(address: &str, limit: Duration) -> bool {
    matches!(
        tokio::time::timeout(limit, TcpStream::connect(address)).await,
        Ok(Ok(_))
    )
}

/// Waits until nothing accepts connections on `address` any more.
pub async fn wait_port_released(address: &str, timeout: Duration) -> Result<()> {
    let started = Instant::now();
    while accepts_connections(address, CONNECT_ATTEMPT).await {
        if started.elapsed() >= timeout {
            return Err(HarnessError::PortStillBound {
                address: address.to_string(),
            });
        }
        sleep(POLL_INTERVAL).await;
    }
    Ok(())
}
