pub mod controller;
pub mod materialize;
pub mod metric;
pub mod results;
pub mod server;
pub mod trial;

pub use controller::{
    ExperimentController, ExperimentSetup, Phase, ServerLifecycle, Sweep, SweepObserver,
};
pub use materialize::{ConfigHandle, ConfigMaterializer, ServerConfiguration, ServerTemplate};
pub use metric::extract_throughput;
pub use results::{ExperimentResult, Sample, SeriesResult};
pub use server::{Readiness, ServerCommand, ServerProcess};
pub use trial::{ApacheBench, HttpMethod, LoadGenerator, LoadPlan, RequestBody, Trial, TrialRunner};
