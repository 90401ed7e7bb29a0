use crate::energy::EnergyModel;
use crate::flip::FlipEngine;
use crate::lattice::Lattice;
use crate::spawn::{import_lattice, spawn_lattice};
use crate::state::PottsState;
use crate::stats::CellStats;
use anyhow::{Context, Result};
use log::{debug, info};
use potts_common::{EnergyRecord, LatticeSnapshot, SimParams, SimulationConfig};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::{SystemTime, UNIX_EPOCH};

/// Owns the lattice state and drives it through outer iterations of
/// `num_flips` Metropolis steps each.
pub struct PottsSimulation {
    /// Run configuration, with the seed resolved to the value actually used.
    config: SimulationConfig,
    params: SimParams,
    pub state: PottsState,
    engine: FlipEngine,
    rng: StdRng,
    /// Running Hamiltonian, updated with every accepted delta.
    total_energy: f64,
    /// Outer iterations completed so far.
    iteration: u32,
}

impl PottsSimulation {
    /// Resolves the seed, builds or imports the initial lattice and scores it.
    pub fn new(mut config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        config.timing.seed = resolve_seed(config.timing.seed);
        info!("Using random seed {}.", config.timing.seed);

        let params = config.get_sim_params();
        debug!("Simulation Parameters: {:#?}", params);

        let mut rng = StdRng::seed_from_u64(config.timing.seed);
        let lattice = match &config.lattice.import_path {
            Some(path) => import_lattice(path, &params)?,
            None => spawn_lattice(&params, &mut rng)?,
        };
        let state = PottsState::new(lattice, params.num_cells)
            .context("Initial lattice is not a valid cell configuration")?;

        let engine = FlipEngine::from_params(&params);
        let total_energy = engine.energy.hamiltonian(&state.lattice, &state.registry);
        info!("Initial energy: {:.4}", total_energy);

        Ok(Self {
            config,
            params,
            state,
            engine,
            rng,
            total_energy,
            iteration: 0,
        })
    }

    /// Record describing the state before any flip.
    pub fn initial_record(&self) -> EnergyRecord {
        self.record(0.0)
    }

    /// Runs `num_flips` flip attempts and returns the resulting record.
    pub fn run_iteration(&mut self) -> EnergyRecord {
        let num_flips = self.params.num_flips;
        let mut accepted = 0u32;

        for _ in 0..num_flips {
            let outcome = self.engine.flip(&mut self.state, &mut self.rng);
            if outcome.accepted {
                self.total_energy += outcome.delta_energy;
                accepted += 1;
            }
        }

        self.iteration += 1;
        let record = self.record(accepted as f64 / num_flips as f64);
        debug!("{:?}", record);
        record
    }

    fn record(&self, acceptance_ratio: f64) -> EnergyRecord {
        let stats = CellStats::measure(&self.state.registry);
        EnergyRecord {
            iteration: self.iteration,
            total_energy: self.total_energy,
            acceptance_ratio,
            volume_mean: stats.volume.mean,
            volume_dev: stats.volume.deviation,
            perimeter_mean: stats.perimeter.mean,
            perimeter_dev: stats.perimeter.deviation,
            anisotropy_mean: stats.anisotropy.mean,
            anisotropy_dev: stats.anisotropy.deviation,
        }
    }

    /// Copies the current lattice into a serializable snapshot.
    pub fn lattice_snapshot(&self, index: u32) -> LatticeSnapshot {
        let lattice = self.lattice();
        LatticeSnapshot {
            index,
            iteration: self.iteration,
            size: lattice.size() as u32,
            cell_ids: lattice.cell_ids().to_vec(),
            collagen: lattice.collagen().to_vec(),
        }
    }

    /// Hamiltonian evaluated from scratch, independent of the running total.
    pub fn recompute_energy(&self) -> f64 {
        self.energy_model().hamiltonian(&self.state.lattice, &self.state.registry)
    }

    /// Full consistency check of the lattice and registry.
    pub fn verify(&self) -> Result<()> {
        self.state
            .verify()
            .with_context(|| format!("Invariant check failed after iteration {}", self.iteration))
    }

    pub fn total_energy(&self) -> f64 {
        self.total_energy
    }

    pub fn seed(&self) -> u64 {
        self.config.timing.seed
    }

    pub fn lattice(&self) -> &Lattice {
        &self.state.lattice
    }

    pub fn energy_model(&self) -> &EnergyModel {
        &self.engine.energy
    }

    /// Provides access to the simulation parameters.
    pub fn params(&self) -> &SimParams {
        &self.params
    }

    /// Provides access to the resolved simulation configuration.
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }
}

/// Seed 0 asks for a wall-clock derived seed.
fn resolve_seed(seed: u64) -> u64 {
    if seed != 0 {
        return seed;
    }
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs().max(1))
        .unwrap_or(1)
}
