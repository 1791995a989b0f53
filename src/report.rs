use crate::harness::{ExperimentResult, Sample};
use anyhow::Result;
use chrono::{DateTime, Utc};
use owo_colors::OwoColorize;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const CHART_WIDTH: f64 = 800.0;
const CHART_HEIGHT: f64 = 450.0;
const MARGIN_LEFT: f64 = 70.0;
const MARGIN_RIGHT: f64 = 20.0;
const MARGIN_TOP: f64 = 20.0;
const MARGIN_BOTTOM: f64 = 50.0;
const PALETTE: [&str; 8] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#17becf",
];

#[derive(Debug, Serialize, Deserialize)]
pub struct SweepReport {
    pub timestamp: DateTime<Utc>,
    pub name: String,
    pub repeats: u32,
    pub series: Vec<SeriesReport>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SeriesReport {
    pub parameter: u32,
    pub label: String,
    pub samples: Vec<Sample>,
    pub peak_concurrency: Option<u32>,
    pub peak_throughput: Option<f64>,
}

#[derive(Debug, Serialize)]
struct ChartSeries {
    label: String,
    color: &'static str,
    points: String,
    markers: Vec<ChartMarker>,
}

#[derive(Debug, Serialize)]
struct ChartMarker {
    x: f64,
    y: f64,
    concurrency: u32,
    throughput: String,
}

#[derive(Debug, Serialize)]
struct ChartTick {
    position: f64,
    label: String,
}

pub struct ReportGenerator;

impl ReportGenerator {
    pub fn generate_reports(
        result: &ExperimentResult,
        formats: &str,
        output_dir: &Path,
    ) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(output_dir)?;

        let report = Self::build_report(result);
        let mut generated_files = Vec::new();

        for format in formats.split(',') {
            let format = format.trim().to_lowercase();
            match format.as_str() {
                "json" => generated_files.push(Self::generate_json_report(&report, output_dir)?),
                "csv" => {
                    generated_files.push(Self::generate_csv_report(result, &report, output_dir)?)
                }
                "html" => generated_files.push(Self::generate_html_report(&report, output_dir)?),
                "" => {}
                _ => {
                    eprintln!("Warning: Unknown report format '{}'", format);
                }
            }
        }

        Ok(generated_files)
    }

    pub fn build_report(result: &ExperimentResult) -> SweepReport {
        let series = result
            .series
            .values()
            .map(|series| {
                let peak = series.peak();
                SeriesReport {
                    parameter: series.parameter,
                    label: series.label(),
                    samples: series.samples.clone(),
                    peak_concurrency: peak.map(|s| s.concurrency),
                    peak_throughput: peak.map(|s| s.throughput),
                }
            })
            .collect();

        SweepReport {
            timestamp: Utc::now(),
            name: result.name.clone(),
            repeats: result.repeats,
            series,
        }
    }

    /// Prints one row per concurrency level with a column per configuration.
    pub fn print_summary(result: &ExperimentResult, ci: bool) {
        let levels: Vec<u32> = result
            .series
            .values()
            .next()
            .map(|s| s.samples.iter().map(|sample| sample.concurrency).collect())
            .unwrap_or_default();

        let mut header = format!("{:>12}", "concurrency");
        for series in result.series.values() {
            header.push_str(&format!(" {:>14}", format!("threads={}", series.parameter)));
        }
        if ci {
            println!("{}", header);
        } else {
            println!("{}", header.bold());
        }

        for (row, concurrency) in levels.iter().enumerate() {
            let mut line = format!("{:>12}", concurrency);
            for series in result.series.values() {
                match series.samples.get(row) {
                    Some(sample) => line.push_str(&format!(" {:>14.2}", sample.throughput)),
                    None => line.push_str(&format!(" {:>14}", "-")),
                }
            }
            println!("{}", line);
        }

        for series in result.series.values() {
            if let Some(peak) = series.peak() {
                let summary = format!(
                    "{}: peak {:.2} req/s at concurrency {}",
                    series.label(),
                    peak.throughput,
                    peak.concurrency
                );
                if ci {
                    println!("{}", summary);
                } else {
                    println!("{} {}", "▲".cyan(), summary);
                }
            }
        }
    }

    fn file_stem(report: &SweepReport) -> String {
        let name: String = report
            .name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        format!("sweepbench_{}_{}", name, report.timestamp.format("%Y%m%d_%H%M%S"))
    }

    fn generate_json_report(report: &SweepReport, output_dir: &Path) -> Result<PathBuf> {
        let path = output_dir.join(format!("{}.json", Self::file_stem(report)));

        let json = serde_json::to_string_pretty(report)?;
        fs::write(&path, json)?;

        Ok(path)
    }

    fn generate_csv_report(
        result: &ExperimentResult,
        report: &SweepReport,
        output_dir: &Path,
    ) -> Result<PathBuf> {
        let path = output_dir.join(format!("{}.csv", Self::file_stem(report)));

        let mut writer = csv::Writer::from_path(&path)?;
        for row in result.rows() {
            writer.serialize(row)?;
        }
        writer.flush()?;

        Ok(path)
    }

    fn generate_html_report(report: &SweepReport, output_dir: &Path) -> Result<PathBuf> {
        use tera::{Context, Tera};

        let path = output_dir.join(format!("{}.html", Self::file_stem(report)));

        let mut tera = Tera::default();
        tera.add_raw_template("report.html", include_str!("../templates/report.html"))
            .map_err(|e| anyhow::anyhow!("Failed to add template: {}", e))?;

        let (chart_series, x_ticks, y_ticks) = Self::chart_geometry(report);

        let mut context = Context::new();
        context.insert("report", report);
        context.insert(
            "timestamp",
            &report.timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        );
        context.insert("width", &CHART_WIDTH);
        context.insert("height", &CHART_HEIGHT);
        context.insert("plot_left", &MARGIN_LEFT);
        context.insert("plot_right", &(CHART_WIDTH - MARGIN_RIGHT));
        context.insert("plot_top", &MARGIN_TOP);
        context.insert("plot_bottom", &(CHART_HEIGHT - MARGIN_BOTTOM));
        context.insert("plot_center_x", &((MARGIN_LEFT + CHART_WIDTH - MARGIN_RIGHT) / 2.0));
        context.insert("plot_center_y", &((MARGIN_TOP + CHART_HEIGHT - MARGIN_BOTTOM) / 2.0));
        context.insert("chart_series", &chart_series);
        context.insert("x_ticks", &x_ticks);
        context.insert("y_ticks", &y_ticks);

        let html = tera.render("report.html", &context)?;
        fs::write(&path, html)?;

        Ok(path)
    }

    fn chart_geometry(report: &SweepReport) -> (Vec<ChartSeries>, Vec<ChartTick>, Vec<ChartTick>) {
        let max_x = report
            .series
            .iter()
            .flat_map(|s| s.samples.iter().map(|sample| sample.concurrency))
            .max()
            .unwrap_or(1)
            .max(1) as f64;
        let max_y = report
            .series
            .iter()
            .flat_map(|s| s.samples.iter().map(|sample| sample.throughput))
            .fold(0.0, f64::max);
        let max_y = if max_y > 0.0 { max_y * 1.1 } else { 1.0 };

        let plot_width = CHART_WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
        let plot_height = CHART_HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;
        let sx = |x: f64| MARGIN_LEFT + x / max_x * plot_width;
        let sy = |y: f64| MARGIN_TOP + plot_height - y / max_y * plot_height;

        let series = report
            .series
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let markers: Vec<ChartMarker> = s
                    .samples
                    .iter()
                    .map(|sample| ChartMarker {
                        x: sx(sample.concurrency as f64),
                        y: sy(sample.throughput),
                        concurrency: sample.concurrency,
                        throughput: format!("{:.2}", sample.throughput),
                    })
                    .collect();
                ChartSeries {
                    label: s.label.clone(),
                    color: PALETTE[i % PALETTE.len()],
                    points: markers
                        .iter()
                        .map(|m| format!("{:.1},{:.1}", m.x, m.y))
                        .collect::<Vec<_>>()
                        .join(" "),
                    markers,
                }
            })
            .collect();

        let ticks = 5;
        let x_ticks = (0..=ticks)
            .map(|i| {
                let value = max_x * i as f64 / ticks as f64;
                ChartTick {
                    position: sx(value),
                    label: format!("{:.0}", value),
                }
            })
            .collect();
        let y_ticks = (0..=ticks)
            .map(|i| {
                let value = max_y * i as f64 / ticks as f64;
                ChartTick {
                    position: sy(value),
                    label: format!("{:.0}", value),
                }
            })
            .collect();

        (series, x_ticks, y_ticks)
    }
}
