use crate::harness::{Phase, Sample, SweepObserver};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;

pub fn create_progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("▕{bar:25}▏ {percent:>3}% • {pos}/{len} trials • eta {eta} {wide_msg}")
            .expect("Invalid progress template")
            .progress_chars("█░ "),
    );
    pb
}

/// Terminal feedback for a running sweep. In CI mode the bar is hidden and
/// every event becomes a plain line instead.
pub struct SweepProgress {
    pb: ProgressBar,
    ci: bool,
}

impl SweepProgress {
    pub fn new(total_trials: u64, ci: bool) -> Self {
        let pb = if ci {
            ProgressBar::hidden()
        } else {
            create_progress_bar(total_trials)
        };
        Self { pb, ci }
    }

    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }

    fn line(&self, text: String) {
        if self.ci {
            println!("{}", text);
        } else {
            self.pb.println(text);
        }
    }
}

impl SweepObserver for SweepProgress {
    fn on_phase(&self, parameter: u32, phase: Phase) {
        match phase {
            Phase::ServerStarting => {
                if self.ci {
                    println!("START threads={}", parameter);
                } else {
                    self.line(format!(
                        "{} {}",
                        "START".cyan().bold(),
                        format!("threads={}", parameter).bright_white()
                    ));
                }
            }
            Phase::Done => {
                if self.ci {
                    println!("DONE threads={}", parameter);
                }
            }
            _ => self.pb.set_message(format!("threads={} {}", parameter, phase)),
        }
    }

    fn on_trial(&self, parameter: u32, concurrency: u32, repeat: u32) {
        self.pb.set_message(format!(
            "threads={} concurrency={} trial {}",
            parameter,
            concurrency,
            repeat + 1
        ));
    }

    fn on_sample(&self, parameter: u32, sample: &Sample) {
        self.pb.inc(sample.measurements.len() as u64);
        if self.ci {
            self.line(format!(
                "threads={} concurrency={} throughput={:.2}",
                parameter, sample.concurrency, sample.throughput
            ));
        } else {
            self.line(format!(
                "  {} concurrency {:>4} → {:>10.2} req/s",
                "✔".green(),
                sample.concurrency,
                sample.throughput
            ));
        }
    }
}
