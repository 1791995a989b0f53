use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, HarnessError>;

/// Fatal conditions of a sweep. None of them are retried; the first one
/// raised ends the whole run.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("failed to write server configuration to {}: {source}", .path.display())]
    ConfigWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not extract throughput from load generator output:\n{output}")]
    MetricNotFound { output: String },

    #[error("failed to spawn {program}: {source}")]
    ProcessSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server did not accept connections on {address} within {waited:?}")]
    ServerNotReady { address: String, waited: Duration },

    #[error("server exited unexpectedly ({status})")]
    ServerExited { status: ExitStatus },

    #[error("server did not exit within {waited:?} after being killed")]
    ShutdownTimeout { waited: Duration },

    #[error("{address} still accepts connections after the server exited")]
    PortStillBound { address: String },

    #[error("load generator did not finish within {waited:?}")]
    TrialTimedOut { waited: Duration },

    #[error("invalid sweep: {0}")]
    InvalidSweep(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
