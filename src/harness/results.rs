use crate::error::{HarnessError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Mean throughput of the repeated trials at one concurrency level.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Sample {
    pub concurrency: u32,
    pub throughput: f64,
    pub measurements: Vec<f64>,
}

impl Sample {
    /// Returns `None` when there are no measurements to average.
    pub fn from_measurements(concurrency: u32, measurements: Vec<f64>) -> Option<Self> {
        let throughput = mean(&measurements)?;
        Some(Self {
            concurrency,
            throughput,
            measurements,
        })
    }
}

/// Arithmetic mean. Values are summed in sorted order so the result does not
/// depend on the order the trials finished in.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    Some(sorted.iter().sum::<f64>() / sorted.len() as f64)
}

/// Samples for one server configuration, ascending by concurrency.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeriesResult {
    pub parameter: u32,
    pub samples: Vec<Sample>,
}

impl SeriesResult {
    pub fn new(parameter: u32) -> Self {
        Self {
            parameter,
            samples: Vec::new(),
        }
    }

    pub fn push(&mut self, sample: Sample) -> Result<()> {
        if let Some(last) = self.samples.last() {
            if sample.concurrency <= last.concurrency {
                return Err(HarnessError::InvalidSweep(format!(
                    "concurrency {} recorded after {} for configuration {}",
                    sample.concurrency, last.concurrency, self.parameter
                )));
            }
        }
        self.samples.push(sample);
        Ok(())
    }

    pub fn label(&self) -> String {
        format!("Thread pool size: {}", self.parameter)
    }

    pub fn points(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.samples.iter().map(|s| (s.concurrency, s.throughput))
    }

    pub fn peak(&self) -> Option<&Sample> {
        self.samples
            .iter()
            .max_by(|a, b| a.throughput.total_cmp(&b.throughput))
    }
}

/// One row of the flat CSV export.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ResultRow {
    pub num_threads: u32,
    pub num_concurrency: u32,
    pub throughput: f64,
}

/// All series of one run, in the order the configurations were swept.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExperimentResult {
    pub name: String,
    pub repeats: u32,
    pub series: IndexMap<u32, SeriesResult>,
}

impl ExperimentResult {
    pub fn new(name: impl Into<String>, repeats: u32) -> Self {
        Self {
            name: name.into(),
            repeats,
            series: IndexMap::new(),
        }
    }

    pub fn insert(&mut self, series: SeriesResult) {
        self.series.insert(series.parameter, series);
    }

    pub fn get(&self, parameter: u32) -> Option<&SeriesResult> {
        self.series.get(&parameter)
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn rows(&self) -> Vec<ResultRow> {
        self.series
            .values()
            .flat_map(|series| {
                series.points().map(|(concurrency, throughput)| ResultRow {
                    num_threads: series.parameter,
                    num_concurrency: concurrency,
                    throughput,
                })
            })
            .collect()
    }

    pub fn max_throughput(&self) -> f64 {
        self.series
            .values()
            .flat_map(|s| s.points().map(|(_, t)| t))
            .fold(0.0, f64::max)
    }

    pub fn max_concurrency(&self) -> u32 {
        self.series
            .values()
            .filter_map(|s| s.samples.last().map(|sample| sample.concurrency))
            .max()
            .unwrap_or(0)
    }
}
