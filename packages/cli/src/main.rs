use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use krepis_mc::adapters::script::scenarios::{self, SCENARIOS};
use krepis_mc::adapters::swarm::Swarm;
use krepis_mc::infrastructure::{load_config, time_seed};
use krepis_mc::{ExplorerBuilder, ExplorerConfig, Randomization};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Krepis model checker
///
/// Explores every interleaving and data choice of a built-in scenario.
#[derive(Parser)]
#[command(name = "krepis-mc", version)]
#[command(about = "Explicit-state model checker for small concurrent programs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search a scenario for violations
    Check {
        /// Scenario name (see `list`)
        scenario: String,
        /// Permute choices with this seed
        #[arg(long, conflicts_with = "time_seed")]
        seed: Option<u64>,
        /// Permute choices with a seed taken from the clock
        #[arg(long)]
        time_seed: bool,
        /// Do not expand states deeper than this
        #[arg(long)]
        depth: Option<usize>,
        /// Stop after this many distinct states
        #[arg(long)]
        max_states: Option<usize>,
        /// Keep searching after the first violation
        #[arg(long)]
        all: bool,
        /// JSON configuration file; flags override its values
        #[arg(long)]
        config: Option<PathBuf>,
        /// Run this many seeded searches in parallel
        #[arg(long)]
        swarm: Option<usize>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// List built-in scenarios
    List,
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::List => {
            for s in SCENARIOS {
                let verdict = if s.has_violation { "violation" } else { "clean" };
                println!("{:<20} {:<10} {}", s.name, verdict, s.description);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Check {
            scenario,
            seed,
            time_seed: use_time_seed,
            depth,
            max_states,
            all,
            config,
            swarm,
            json,
        } => {
            let scenario = scenarios::find(&scenario).ok_or_else(|| {
                let known: Vec<_> = scenarios::names().collect();
                anyhow!("unknown scenario '{scenario}' (known: {})", known.join(", "))
            })?;

            let mut config = match &config {
                Some(path) => load_config(path).with_context(|| format!("loading {}", path.display()))?,
                None => ExplorerConfig::default(),
            };
            if let Some(seed) = seed {
                config = config.with_seed(seed);
            }
            if use_time_seed {
                config = config.with_randomization(Randomization::TimeSeed);
            }
            if let Some(depth) = depth {
                config = config.with_depth_limit(depth);
            }
            if let Some(n) = max_states {
                config = config.with_max_states(n);
            }
            if all {
                config = config.with_stop_on_first_error(false);
            }

            info!(scenario = scenario.name, "checking");

            let found = if let Some(workers) = swarm {
                let base_seed = match config.core.randomization {
                    Randomization::FixedSeed(seed) => seed,
                    _ => time_seed(),
                };
                let report = Swarm::new(config, workers, base_seed)
                    .run(|| scenario.interpreter())
                    .context("swarm search failed")?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                } else {
                    for (worker, r) in report.reports.iter().enumerate() {
                        println!("── worker {worker} ──");
                        print!("{r}");
                    }
                    println!("visited states (all workers): {}", report.visited_states);
                }
                report.has_violations()
            } else {
                let report = ExplorerBuilder::new()
                    .config(config)
                    .run(scenario.interpreter())
                    .context("search failed")?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                } else {
                    print!("{report}");
                }
                report.has_violations()
            };

            Ok(if found { ExitCode::FAILURE } else { ExitCode::SUCCESS })
        }
    }
}
