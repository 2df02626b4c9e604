//! handsweep CLI - Joint-space sweep dataset generation.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use handsweep::models::EXAMPLE_CONFIG;
use handsweep::rig::JointManager;
use handsweep::{
    ClearanceCheck, Config, ConsolePanel, DatasetGenerator, Dof, GeneratorSettings,
    LogCompletion, Rig, RunSummary, SimulatedHand, StickFigureStream, SweepError,
};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "handsweep")]
#[command(version)]
#[command(about = "Joint-space sweep dataset generation for a simulated hand rig")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true, default_value = "config.toml")]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Sweep the configured space and write images plus CSV
    Generate {
        /// Output folder (overrides output.folder)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Resume from the checkpoint in the output folder
        #[arg(long)]
        resume: bool,
    },

    /// Count valid configurations without writing anything
    Search,

    /// Save one sample of a single joint configuration
    Single {
        /// Joint assignment, e.g. `--set beta=5` (repeatable); unset joints use their range min
        #[arg(long = "set", value_parser = parse_assignment)]
        assignments: Vec<(Dof, f64)>,

        /// Output folder (overrides output.folder)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate configuration file
    Validate,

    /// Show example configuration
    Example,
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set subscriber: {e}");
    }
}

fn parse_assignment(s: &str) -> Result<(Dof, f64), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected <dof>=<value>, got '{s}'"))?;
    let dof = Dof::ALL
        .into_iter()
        .find(|d| d.name() == name.trim())
        .ok_or_else(|| format!("unknown joint '{name}'"))?;
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|e| format!("invalid value for {dof}: {e}"))?;
    Ok((dof, value))
}

fn load_config(path: &Path) -> Result<Config> {
    Config::from_file(path).with_context(|| format!("Failed to load config from {path:?}"))
}

fn build_generator(config: &Config) -> DatasetGenerator {
    let panel = ConsolePanel::new(Some(config.space.clone()));
    let completion = LogCompletion::with_progress(panel.progress());

    let rig = Rig {
        joints: Box::new(SimulatedHand::new()),
        validity: Box::new(ClearanceCheck::from_config(&config.rig)),
        stream: Box::new(StickFigureStream::new(
            &config.rig,
            config.output.image_prefix.clone(),
        )),
        panel: Box::new(panel),
        completion: Box::new(completion),
    };
    DatasetGenerator::new(rig, GeneratorSettings::from_config(config))
}

/// Cancel the generator's run on Ctrl-C.
fn cancel_on_ctrl_c(generator: &DatasetGenerator) {
    let handle = generator.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl-C received, stopping after the current grid point");
            handle.cancel();
        }
    });
}

/// Tell the user what a failed run left in the output folder.
fn report_failure(err: &SweepError, folder: &Path) {
    if err.is_setup_failure() {
        error!("Run did not start, nothing was written to {folder:?}");
    } else {
        error!("Run aborted, samples already in {folder:?} are complete and kept");
    }
}

fn print_summary(title: &str, summary: &RunSummary, folder: &Path) {
    println!("\n=== {title} ===");
    println!("Outcome:     {:?}", summary.outcome);
    println!("Grid points: {}", summary.total);
    println!("Visited:     {}", summary.counters.current);
    println!("Valid:       {}", summary.counters.valid);
    println!("Acceptance:  {:.1}%", summary.acceptance_rate * 100.0);
    println!("Throughput:  {:.0} points/s", summary.points_per_sec);
    println!("Runtime:     {:.1}s", summary.runtime_secs);
    if summary.wrote_output {
        println!("Output:      {folder:?}");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Example => {
            println!("{EXAMPLE_CONFIG}");
            return Ok(());
        }

        Commands::Validate => {
            let config = load_config(&cli.config)?;

            info!("Configuration is valid");
            for (dof, range) in config.space.dimensions() {
                info!(
                    "  {dof}: {} .. {} step {} ({} points)",
                    range.min,
                    range.max,
                    range.step,
                    range.point_count()
                );
            }
            info!("  Grid points: {}", config.space.total_points());
            info!("  Output: {:?}", config.csv_path());
            return Ok(());
        }

        Commands::Generate { output, resume } => {
            let mut config = load_config(&cli.config)?;
            if let Some(folder) = output {
                config.output.folder = folder;
            }
            config.output.resume |= resume;

            let mut generator = build_generator(&config);
            cancel_on_ctrl_c(&generator);
            let folder = generator.settings().folder.clone();

            let summary = match generator.start_generating().await {
                Ok(Some(summary)) => summary,
                Ok(None) => return Ok(()),
                Err(e) => {
                    report_failure(&e, &folder);
                    return Err(e).context("Dataset generation failed");
                }
            };
            print_summary("Generation Complete", &summary, &folder);
        }

        Commands::Search => {
            let config = load_config(&cli.config)?;

            let mut generator = build_generator(&config);
            cancel_on_ctrl_c(&generator);

            let Some(summary) = generator
                .search_generating_dataset()
                .await
                .context("Search failed")?
            else {
                return Ok(());
            };
            print_summary("Search Complete", &summary, &generator.settings().folder);
        }

        Commands::Single {
            assignments,
            output,
        } => {
            let mut config = load_config(&cli.config)?;
            if let Some(folder) = output {
                config.output.folder = folder;
            }

            let mut generator = build_generator(&config);
            let joints = &mut generator.rig_mut().joints;
            for (dof, range) in config.space.dimensions() {
                joints.set(dof, range.min);
            }
            for (dof, value) in assignments {
                joints.set(dof, value);
            }

            let saved = match generator.save_single_image() {
                Ok(saved) => saved,
                Err(e) => {
                    report_failure(&e, &generator.settings().folder);
                    return Err(e).context("Failed to save sample");
                }
            };
            if saved {
                println!("Saved sample to {:?}", config.csv_path());
            } else {
                println!("Configuration is not valid, nothing saved");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_assignment() {
        assert_eq!(parse_assignment("beta=5").unwrap(), (Dof::Beta, 5.0));
        assert_eq!(parse_assignment(" alpha1 = -2.5").unwrap(), (Dof::Alpha1, -2.5));
        assert!(parse_assignment("beta").is_err());
        assert!(parse_assignment("pinky=1").is_err());
        assert!(parse_assignment("beta=x").is_err());
    }

    #[test]
    fn test_cli_parses_generate() {
        let cli = Cli::parse_from(["handsweep", "-c", "hand.toml", "generate", "--resume"]);
        assert_eq!(cli.config, PathBuf::from("hand.toml"));
        assert!(matches!(
            cli.command,
            Commands::Generate {
                resume: true,
                output: None
            }
        ));
    }
}
