use serde::{Deserialize, Serialize};

/// Simulation parameters derived from the configuration, used frequently during flips.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimParams {
    // Lattice & population
    pub size: usize,
    pub num_cells: u32,
    pub chunk_size: usize,
    pub cell_spawn_radius: f64,
    pub num_collagen: u32,
    pub collagen_width: usize,

    // Metropolis temperature
    pub beta: f64,

    // Couplings
    pub j_air: f64, // Cell site facing only air
    pub j_cel: f64, // Cell site facing another cell
    pub j_col: f64, // Cell site on collagen

    // Penalty weights
    pub l_vol: f64,
    pub l_ani: f64,
    pub l_blb: f64,
    pub target_volume: f64, // pi * cell_radius^2

    // Run length
    pub num_loops: u32,
    pub num_flips: u32,
    pub snapshot_interval: u32, // Outer iterations between snapshots, 0 = never
}
