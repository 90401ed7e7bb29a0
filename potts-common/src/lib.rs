pub mod config;
pub mod sim_params;
pub mod snapshot;

// Re-export key types for easier use by dependent crates
pub use config::{SimulationConfig, LatticeConfig, EnergyConfig, FlipConfig, TimingConfig, OutputConfig, OutputFormat};
pub use sim_params::SimParams;
pub use snapshot::{EnergyRecord, LatticeSnapshot, read_snapshot, write_snapshot};
