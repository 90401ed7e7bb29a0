use serde::{Deserialize, Serialize};
use anyhow::{Context, Result};
use crate::sim_params::SimParams;
use std::path::{Path, PathBuf};

// Lattice geometry and the initial population, loaded from config.toml
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct LatticeConfig {
    /// Side length N of the periodic N x N lattice.
    pub size: usize,
    pub num_cells: u32,
    /// Radius of the disk whose area is each cell's target volume.
    pub cell_radius: f64,
    /// Radius of the disk each cell is seeded with.
    pub cell_spawn_radius: f64,
    #[serde(default)]
    pub num_collagen: u32,
    #[serde(default = "default_collagen_width")]
    pub collagen_width: usize,
    /// Import the initial lattice from a snapshot file instead of spawning.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_path: Option<PathBuf>,
}

// Coupling constants and penalty weights of the Hamiltonian
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct EnergyConfig {
    pub beta: f64,
    pub j_air: f64,
    pub j_cel: f64,
    #[serde(default)]
    pub j_col: f64,
    pub l_vol: f64,
    #[serde(default)]
    pub l_ani: f64,
    #[serde(default)]
    pub l_blb: f64,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct FlipConfig {
    /// Half-width of the square block flipped per proposal (0 = single site).
    #[serde(default)]
    pub chunk_size: usize,
}

// Run length and randomness
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TimingConfig {
    pub num_loops: u32,
    pub num_flips: u32,
    /// Number of evenly spaced lattice snapshots over the run (0 disables).
    #[serde(default)]
    pub snapshot_count: u32,
    /// 0 derives the seed from the wall clock.
    #[serde(default)]
    pub seed: u64,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Json,
    Bincode,
    MessagePack,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Bincode => "bin",
            OutputFormat::MessagePack => "msgpack",
        }
    }

    /// Infers the format from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "json" => Some(OutputFormat::Json),
            "bin" => Some(OutputFormat::Bincode),
            "msgpack" => Some(OutputFormat::MessagePack),
            _ => None,
        }
    }
}

// Configuration for output settings, loaded from config.toml
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct OutputConfig {
    pub directory: PathBuf,
    #[serde(default = "default_format")]
    pub format: OutputFormat,
    #[serde(default = "default_save_lattice")]
    pub save_lattice: bool,
    /// Full lattice/registry consistency check after every outer iteration.
    #[serde(default)]
    pub verify_invariants: bool,
}

fn default_collagen_width() -> usize {
    1
}

fn default_format() -> OutputFormat {
    OutputFormat::Json
}

fn default_save_lattice() -> bool {
    true
}

// Main simulation configuration structure, loaded from config.toml.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SimulationConfig {
    pub lattice: LatticeConfig,
    pub energy: EnergyConfig,
    #[serde(default)]
    pub flip: FlipConfig,
    pub timing: TimingConfig,
    pub output: OutputConfig,
}

impl SimulationConfig {
    /// Loads the simulation configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .with_context(|| format!("Failed to read config file '{}'", path_ref.display()))?;
        Self::from_toml_str(&config_str)
            .with_context(|| format!("Invalid configuration in '{}'", path_ref.display()))
    }

    /// Parses and validates a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: SimulationConfig = toml::from_str(text).context("Failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Writes the configuration back out as TOML.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path_ref = path.as_ref();
        let text = toml::to_string_pretty(self).context("Failed to serialize configuration")?;
        std::fs::write(path_ref, text)
            .with_context(|| format!("Failed to write config file '{}'", path_ref.display()))
    }

    pub fn validate(&self) -> Result<()> {
        let lattice = &self.lattice;
        if lattice.size == 0 {
            anyhow::bail!("lattice.size must be greater than 0.");
        }
        if lattice.num_cells == 0 {
            anyhow::bail!("lattice.num_cells must be greater than 0.");
        }
        // The flipped block plus its border ring must not wrap onto itself.
        let ring_span = 2 * self.flip.chunk_size + 3;
        if lattice.size < ring_span {
            anyhow::bail!(
                "lattice.size ({}) must be at least 2 * chunk_size + 3 ({}).",
                lattice.size,
                ring_span
            );
        }
        if !(lattice.cell_radius > 0.0) {
            anyhow::bail!("lattice.cell_radius must be positive.");
        }
        if !(lattice.cell_spawn_radius >= 0.0) {
            anyhow::bail!("lattice.cell_spawn_radius must not be negative.");
        }
        if 2.0 * lattice.cell_spawn_radius + 1.0 > lattice.size as f64 {
            anyhow::bail!(
                "Seed disks of radius {} do not fit on a {}x{} lattice.",
                lattice.cell_spawn_radius,
                lattice.size,
                lattice.size
            );
        }
        if !self.energy.beta.is_finite() || self.energy.beta < 0.0 {
            anyhow::bail!("energy.beta must be finite and non-negative.");
        }
        if self.timing.num_flips == 0 {
            anyhow::bail!("timing.num_flips must be greater than 0.");
        }
        Ok(())
    }

    /// Converts the configuration into simulation parameters used at runtime.
    pub fn get_sim_params(&self) -> SimParams {
        let snapshot_interval = if self.timing.snapshot_count > 0 {
            (self.timing.num_loops / self.timing.snapshot_count).max(1)
        } else {
            0
        };

        SimParams {
            size: self.lattice.size,
            num_cells: self.lattice.num_cells,
            chunk_size: self.flip.chunk_size,
            cell_spawn_radius: self.lattice.cell_spawn_radius,
            num_collagen: self.lattice.num_collagen,
            collagen_width: self.lattice.collagen_width,
            beta: self.energy.beta,
            j_air: self.energy.j_air,
            j_cel: self.energy.j_cel,
            j_col: self.energy.j_col,
            l_vol: self.energy.l_vol,
            l_ani: self.energy.l_ani,
            l_blb: self.energy.l_blb,
            target_volume: std::f64::consts::PI * self.lattice.cell_radius * self.lattice.cell_radius,
            num_loops: self.timing.num_loops,
            num_flips: self.timing.num_flips,
            snapshot_interval,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[lattice]
size = 160
num_cells = 36
cell_radius = 10.0
cell_spawn_radius = 8.0
num_collagen = 8

[energy]
beta = 1.0
j_air = 2.0
j_cel = -0.5
l_vol = 0.05
l_blb = 2.0

[timing]
num_loops = 36000
num_flips = 256
snapshot_count = 200
seed = 1

[output]
directory = "output"
format = "messagepack"
"#;

    #[test]
    fn parses_sample_with_defaults() {
        let config = SimulationConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.lattice.size, 160);
        assert_eq!(config.lattice.collagen_width, 1);
        assert_eq!(config.flip.chunk_size, 0);
        assert_eq!(config.energy.j_col, 0.0);
        assert_eq!(config.output.format, OutputFormat::MessagePack);
        assert!(config.output.save_lattice);
        assert!(!config.output.verify_invariants);
    }

    #[test]
    fn derives_target_volume_and_snapshot_interval() {
        let params = SimulationConfig::from_toml_str(SAMPLE).unwrap().get_sim_params();
        assert!((params.target_volume - 314.159_265).abs() < 1e-3);
        assert_eq!(params.snapshot_interval, 180);
    }

    #[test]
    fn rejects_chunk_wider_than_lattice() {
        let text = SAMPLE.replace("[timing]", "[flip]\nchunk_size = 80\n\n[timing]");
        assert!(SimulationConfig::from_toml_str(&text).is_err());
    }

    #[test]
    fn rejects_zero_cells() {
        let text = SAMPLE.replace("num_cells = 36", "num_cells = 0");
        assert!(SimulationConfig::from_toml_str(&text).is_err());
    }

    #[test]
    fn rejects_negative_beta() {
        let text = SAMPLE.replace("beta = 1.0", "beta = -1.0");
        assert!(SimulationConfig::from_toml_str(&text).is_err());
    }

    #[test]
    fn save_then_load_preserves_values() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("run_config.toml");
        let config = SimulationConfig::from_toml_str(SAMPLE).unwrap();
        config.save(&path).unwrap();

        let loaded = SimulationConfig::load(&path).unwrap();
        assert_eq!(loaded.lattice.num_cells, 36);
        assert_eq!(loaded.energy.l_blb, 2.0);
        assert_eq!(loaded.timing.seed, 1);
    }
}
