use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, error, info, trace};
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

mod contiguity;
mod energy;
mod flip;
mod lattice;
mod output;
mod registry;
mod simulation;
mod spawn;
mod state;
mod stats;


use output::{save_run_config, write_lattice_snapshot, EnergyLog};
use potts_common::SimulationConfig;
use simulation::PottsSimulation;

/// Cellular Potts model Monte Carlo engine
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Run configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Output directory (overrides [output].directory)
    output_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    info!("Starting Potts Engine...");

    // --- Load Configuration ---
    let mut config = SimulationConfig::load(&args.config)?;
    if let Some(dir) = args.output_dir {
        config.output.directory = dir;
    }
    info!("Loaded configuration from {}", args.config.display());

    let out_dir = config.output.directory.clone();
    fs::create_dir_all(&out_dir)
        .with_context(|| format!("Failed to create output directory '{}'", out_dir.display()))?;

    // --- Initialize Simulation ---
    info!("Initializing lattice...");
    let mut sim = PottsSimulation::new(config)?;
    let saved = save_run_config(&out_dir, sim.config())?;
    info!("Resolved configuration saved to {}", saved.display());

    let params = sim.params().clone();
    let format = sim.config().output.format;
    let save_lattice = sim.config().output.save_lattice && params.snapshot_interval > 0;
    let verify_invariants = sim.config().output.verify_invariants;

    let mut energy_log = EnergyLog::create(&out_dir)?;
    energy_log.append(&sim.initial_record())?;

    let mut snapshot_index = 0u32;
    if save_lattice {
        info!("Recording snapshot every {} iterations.", params.snapshot_interval);
        write_lattice_snapshot(&out_dir, &sim.lattice_snapshot(snapshot_index), format)?;
        snapshot_index += 1;
    }

    // --- Simulation Loop ---
    info!(
        "Starting simulation loop: {} iterations of {} flips...",
        params.num_loops, params.num_flips
    );
    let start_time = Instant::now();
    let mut previous_print_time = start_time;
    let print_interval_secs = 5.0;
    let mut last_record = sim.initial_record();

    for loop_idx in 0..params.num_loops {
        let iter_start_time = Instant::now();
        let record = sim.run_iteration();
        let iter_duration = iter_start_time.elapsed();
        energy_log.append(&record)?;

        if verify_invariants {
            if let Err(e) = sim.verify() {
                error!("{:#}", e);
                anyhow::bail!("Lattice and registry diverged at iteration {}.", record.iteration);
            }
        }

        let iteration = loop_idx + 1;
        let is_snapshot_iter = save_lattice && iteration % params.snapshot_interval == 0;
        if is_snapshot_iter {
            write_lattice_snapshot(&out_dir, &sim.lattice_snapshot(snapshot_index), format)?;
            snapshot_index += 1;
        }

        // Print status periodically
        let current_time = Instant::now();
        let should_print_status =
            current_time.duration_since(previous_print_time).as_secs_f64() >= print_interval_secs;
        let is_last_iter = iteration == params.num_loops;

        if should_print_status || is_last_iter {
            info!(
                "Iteration [{}/{}] | Energy: {:.4} | Acceptance: {:.3} | Iter Time: {:6.2} ms | Elapsed: {:.2} s",
                iteration,
                params.num_loops,
                record.total_energy,
                record.acceptance_ratio,
                iter_duration.as_secs_f64() * 1000.0,
                start_time.elapsed().as_secs_f64()
            );
            previous_print_time = current_time;
        } else {
            trace!(
                "Iteration [{}/{}] completed in {:.2} ms",
                iteration,
                params.num_loops,
                iter_duration.as_secs_f64() * 1000.0
            );
        }
        last_record = record;
    }

    let total_duration = start_time.elapsed();
    info!(
        "Simulation finished in {:.3} seconds ({:.3} minutes).",
        total_duration.as_secs_f64(),
        total_duration.as_secs_f64() / 60.0
    );
    debug!(
        "Running energy {:.6}, recomputed {:.6}",
        sim.total_energy(),
        sim.recompute_energy()
    );

    // --- Final Statistics ---
    info!("Seed: {}", sim.seed());
    info!("Acceptance ratio: {:.4}", last_record.acceptance_ratio);
    info!("Volume: {:.3} ± {:.3}", last_record.volume_mean, last_record.volume_dev);
    info!("Perimeter: {:.3} ± {:.3}", last_record.perimeter_mean, last_record.perimeter_dev);
    info!("Anisotropy: {:.4} ± {:.4}", last_record.anisotropy_mean, last_record.anisotropy_dev);
    info!("Energy log saved to {}", energy_log.path().display());

    info!("Simulation Complete.");
    Ok(())
}
