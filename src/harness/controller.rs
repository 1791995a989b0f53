use crate::error::{HarnessError, Result};
use crate::harness::materialize::ConfigMaterializer;
use crate::harness::results::{ExperimentResult, Sample, SeriesResult};
use crate::harness::server::{wait_port_released, Readiness, ServerCommand, ServerProcess};
use crate::harness::trial::{LoadGenerator, LoadPlan, TrialRunner};
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Lifecycle of one outer sweep value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    ConfigWritten,
    ServerStarting,
    ServerRunning,
    Sweeping,
    ServerStopping,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::ConfigWritten => "config written",
            Phase::ServerStarting => "server starting",
            Phase::ServerRunning => "server running",
            Phase::Sweeping => "sweeping",
            Phase::ServerStopping => "server stopping",
            Phase::Done => "done",
        };
        f.write_str(name)
    }
}

/// The two sweep axes and the repeat count shared by every sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Sweep {
    pub parameters: Vec<u32>,
    pub concurrency: Vec<u32>,
    pub repeats: u32,
}

impl Sweep {
    pub fn validate(&self) -> Result<()> {
        if self.parameters.is_empty() {
            return Err(HarnessError::InvalidSweep(
                "no server configurations to sweep".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = self.parameters.iter().find(|p| !seen.insert(**p)) {
            return Err(HarnessError::InvalidSweep(format!(
                "server parameter {} listed twice",
                dup
            )));
        }
        if self.concurrency.is_empty() {
            return Err(HarnessError::InvalidSweep(
                "no concurrency levels to sweep".to_string(),
            ));
        }
        if self.concurrency.contains(&0) {
            return Err(HarnessError::InvalidSweep(
                "concurrency levels must be at least 1".to_string(),
            ));
        }
        if let Some(pair) = self.concurrency.windows(2).find(|w| w[0] >= w[1]) {
            return Err(HarnessError::InvalidSweep(format!(
                "concurrency levels must be strictly ascending ({} then {})",
                pair[0], pair[1]
            )));
        }
        if self.repeats == 0 {
            return Err(HarnessError::InvalidSweep(
                "repeat count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn total_trials(&self) -> u64 {
        self.parameters.len() as u64 * self.concurrency.len() as u64 * self.repeats as u64
    }
}

/// How to start, probe and stop the server under test.
#[derive(Debug, Clone)]
pub struct ServerLifecycle {
    pub command: ServerCommand,
    pub readiness: Readiness,
    pub shutdown_grace: Duration,
}

impl ServerLifecycle {
    fn release_address(&self) -> Option<&str> {
        match &self.readiness {
            Readiness::TcpConnect { address, .. } => Some(address),
            Readiness::Delay(_) => None,
        }
    }
}

pub struct ExperimentSetup {
    pub name: String,
    pub materializer: ConfigMaterializer,
    pub server: ServerLifecycle,
    pub load: LoadPlan,
    pub sweep: Sweep,
}

/// Hooks for progress reporting. All methods default to doing nothing.
pub trait SweepObserver {
    fn on_phase(&self, _parameter: u32, _phase: Phase) {}
    fn on_trial(&self, _parameter: u32, _concurrency: u32, _repeat: u32) {}
    fn on_sample(&self, _parameter: u32, _sample: &Sample) {}
}

impl SweepObserver for () {}

/// Runs the whole matrix strictly sequentially: one server, one trial at a
/// time.
pub struct ExperimentController<G> {
    setup: ExperimentSetup,
    runner: TrialRunner<G>,
}

impl<G: LoadGenerator> ExperimentController<G> {
    pub fn new(setup: ExperimentSetup, generator: G) -> Self {
        Self {
            setup,
            runner: TrialRunner::new(generator),
        }
    }

    pub fn sweep(&self) -> &Sweep {
        &self.setup.sweep
    }

    /// Any error aborts the run; no partial result is returned.
    pub async fn run(&self, observer: &impl SweepObserver) -> Result<ExperimentResult> {
        let sweep = &self.setup.sweep;
        sweep.validate()?;

        info!(
            experiment = %self.setup.name,
            configurations = sweep.parameters.len(),
            levels = sweep.concurrency.len(),
            repeats = sweep.repeats,
            "starting experiment"
        );

        let mut result = ExperimentResult::new(&self.setup.name, sweep.repeats);
        for &parameter in &sweep.parameters {
            let series = self.run_configuration(parameter, observer).await?;
            result.insert(series);
        }
        Ok(result)
    }

    async fn run_configuration(
        &self,
        parameter: u32,
        observer: &impl SweepObserver,
    ) -> Result<SeriesResult> {
        let enter = |phase: Phase| {
            debug!(parameter, %phase, "phase transition");
            observer.on_phase(parameter, phase);
        };
        enter(Phase::Idle);

        let handle = self.setup.materializer.materialize(parameter).await?;
        enter(Phase::ConfigWritten);

        enter(Phase::ServerStarting);
        let mut server = ServerProcess::spawn(&self.setup.server.command, &handle.path)?;

        let swept: Result<SeriesResult> = async {
            server.wait_ready(&self.setup.server.readiness).await?;
            enter(Phase::ServerRunning);
            enter(Phase::Sweeping);
            self.sweep_levels(parameter, &mut server, observer).await
        }
        .await;

        enter(Phase::ServerStopping);
        let stopped = server.shutdown(self.setup.server.shutdown_grace).await;

        let series = match (swept, stopped) {
            (Ok(series), Ok(_)) => series,
            (Err(err), stopped) => {
                if let Err(stop_err) = stopped {
                    warn!(parameter, error = %stop_err, "server teardown failed after sweep error");
                }
                return Err(err);
            }
            (Ok(_), Err(err)) => return Err(err),
        };

        if let Some(address) = self.setup.server.release_address() {
            wait_port_released(address, self.setup.server.shutdown_grace).await?;
        }
        enter(Phase::Done);

        Ok(series)
    }

    async fn sweep_levels(
        &self,
        parameter: u32,
        server: &mut ServerProcess,
        observer: &impl SweepObserver,
    ) -> Result<SeriesResult> {
        let sweep = &self.setup.sweep;
        let mut series = SeriesResult::new(parameter);

        for &concurrency in &sweep.concurrency {
            server.ensure_running()?;
            info!(
                num_threads = parameter,
                num_concurr = concurrency,
                "Running load"
            );

            let trial = self.setup.load.trial(concurrency);
            let mut measurements = Vec::with_capacity(sweep.repeats as usize);
            for repeat in 0..sweep.repeats {
                observer.on_trial(parameter, concurrency, repeat);
                measurements.push(self.runner.run_trial(&trial).await?);
            }

            let sample = Sample::from_measurements(concurrency, measurements).ok_or_else(|| {
                HarnessError::InvalidSweep("repeat count must be at least 1".to_string())
            })?;
            observer.on_sample(parameter, &sample);
            series.push(sample)?;
        }

        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sweep(parameters: &[u32], concurrency: &[u32], repeats: u32) -> Sweep {
        Sweep {
            parameters: parameters.to_vec(),
            concurrency: concurrency.to_vec(),
            repeats,
        }
    }

    #[test]
    fn test_valid_sweep() {
        let s = sweep(&[1, 10, 20, 50], &[1, 2, 3, 10, 20], 3);
        assert!(s.validate().is_ok());
        assert_eq!(s.total_trials(), 4 * 5 * 3);
    }

    #[test]
    fn test_invalid_sweeps() {
        let cases = [
            sweep(&[], &[1], 1),
            sweep(&[1, 1], &[1], 1),
            sweep(&[1], &[], 1),
            sweep(&[1], &[0, 5], 1),
            sweep(&[1], &[10, 5], 1),
            sweep(&[1], &[5, 5], 1),
            sweep(&[1], &[5], 0),
        ];
        for case in cases {
            assert!(
                matches!(case.validate(), Err(HarnessError::InvalidSweep(_))),
                "expected rejection: {:?}",
                case
            );
        }
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::ConfigWritten.to_string(), "config written");
        assert_eq!(Phase::Done.to_string(), "done");
    }
}
