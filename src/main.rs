use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell as CompShell};
use owo_colors::OwoColorize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sweepbench::commands::{dump_config, extract, init, run};

#[derive(Parser)]
#[command(name = "sweepbench")]
#[command(version = "0.1.0")]
#[command(about = "Throughput sweeps for servers under test")]
#[command(long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short = 'v', long = "verbose", global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an experiment file or a directory of *.sweep.yaml files
    Run {
        /// Experiment file or directory
        target: PathBuf,
        /// Server thread pool sizes (e.g. "1,10,20,50")
        #[arg(long = "threads")]
        threads: Option<String>,
        /// Client concurrency levels (e.g. "1-9,10-100:10")
        #[arg(long = "concurrency")]
        concurrency: Option<String>,
        /// Trials averaged per concurrency level
        #[arg(long = "repeats")]
        repeats: Option<u32>,
        /// Requests per trial
        #[arg(short = 'n', long = "requests")]
        requests: Option<u32>,
        /// Target URL for the load generator
        #[arg(long = "url")]
        url: Option<String>,
        /// Server binary to launch
        #[arg(long = "server")]
        server: Option<PathBuf>,
        /// Report formats (comma-separated: html, csv, json)
        #[arg(long = "report")]
        report: Option<String>,
        /// Directory for generated reports
        #[arg(long = "output")]
        output: Option<PathBuf>,
        /// CI mode (no animations)
        #[arg(long = "ci")]
        ci: bool,
    },
    /// Extract the throughput from a saved load generator report
    Extract {
        /// Report file, or "-" for stdin
        input: PathBuf,
    },
    /// Print the server configuration for one sweep value
    DumpConfig {
        /// Value of the swept parameter (max_concurrency)
        parameter: u32,
        /// Take the server template from this experiment file
        #[arg(long = "experiment")]
        experiment: Option<PathBuf>,
        /// Also write the file where a sweep would put it
        #[arg(long = "write")]
        write: bool,
    },
    /// Write a sample experiment file
    Init {
        /// Path of the new experiment file
        #[arg(default_value = "experiment.sweep.yaml")]
        path: PathBuf,
        /// Experiment name
        #[arg(long = "name", default_value = "gem-set")]
        name: String,
        /// Overwrite an existing file
        #[arg(long = "force")]
        force: bool,
    },
    /// Generate shell completions (internal)
    #[command(hide = true)]
    Completions {
        /// Shell: bash, zsh, fish
        shell: String,
    },
    /// Generate man page (internal)
    #[command(hide = true)]
    Man,
}

pub fn print_banner() {
    if atty::is(atty::Stream::Stdout) {
        println!(
            "{} {}",
            "sweepbench v0.1.0".cyan().bold(),
            "· throughput sweeps for servers under test".bright_black()
        );
    } else {
        println!("sweepbench v0.1.0 - throughput sweeps for servers under test");
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "sweepbench=debug" } else { "sweepbench=info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if matches!(cli.command, Commands::Run { .. } | Commands::Init { .. }) {
        print_banner();
    }

    match cli.command {
        Commands::Run {
            target,
            threads,
            concurrency,
            repeats,
            requests,
            url,
            server,
            report,
            output,
            ci,
        } => {
            run::handle_run(run::RunOptions {
                target,
                threads,
                concurrency,
                repeats,
                requests,
                url,
                server,
                report,
                output,
                ci,
            })
            .await?;
        }
        Commands::Extract { input } => {
            extract::handle_extract(input).await?;
        }
        Commands::DumpConfig {
            parameter,
            experiment,
            write,
        } => {
            dump_config::handle_dump_config(dump_config::DumpConfigOptions {
                parameter,
                experiment,
                write,
            })
            .await?;
        }
        Commands::Init { path, name, force } => {
            init::handle_init(path, name, force).await?;
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            let sh = match shell.as_str() {
                "bash" => CompShell::Bash,
                "zsh" => CompShell::Zsh,
                "fish" => CompShell::Fish,
                "powershell" | "pwsh" => CompShell::PowerShell,
                "elvish" => CompShell::Elvish,
                other => {
                    eprintln!(
                        "Unsupported shell: {} (use bash|zsh|fish|powershell|elvish)",
                        other
                    );
                    std::process::exit(2);
                }
            };
            generate(sh, &mut cmd, name, &mut std::io::stdout());
        }
        Commands::Man => {
            let man = clap_mangen::Man::new(Cli::command());
            man.render(&mut std::io::stdout())?;
        }
    }

    Ok(())
}
