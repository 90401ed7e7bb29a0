use crate::config::OutputFormat;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// The full lattice at one point of the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatticeSnapshot {
    /// Running snapshot number (0 = initial lattice).
    pub index: u32,
    /// Outer iteration at which the snapshot was taken.
    pub iteration: u32,
    /// Side length N of the lattice.
    pub size: u32,
    /// Row-major `N * N` owning cell ids, 0 = air.
    pub cell_ids: Vec<u32>,
    /// Row-major `N * N` collagen flags.
    pub collagen: Vec<bool>,
}

impl LatticeSnapshot {
    /// Highest cell id present, or 0 for an all-air lattice. Ids need not be dense.
    pub fn max_cell_id(&self) -> u32 {
        self.cell_ids.iter().copied().max().unwrap_or(0)
    }
}

/// One row of the per-iteration energy log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyRecord {
    pub iteration: u32,
    pub total_energy: f64,
    pub acceptance_ratio: f64,
    pub volume_mean: f64,
    pub volume_dev: f64,
    pub perimeter_mean: f64,
    pub perimeter_dev: f64,
    pub anisotropy_mean: f64,
    pub anisotropy_dev: f64,
}

/// Writes a snapshot to `path` in the given format.
pub fn write_snapshot<P: AsRef<Path>>(path: P, snapshot: &LatticeSnapshot, format: OutputFormat) -> Result<()> {
    let path_ref = path.as_ref();
    let file = File::create(path_ref)
        .with_context(|| format!("Failed to create snapshot file '{}'", path_ref.display()))?;
    let mut writer = BufWriter::new(file);

    match format {
        OutputFormat::Json => serde_json::to_writer(&mut writer, snapshot)
            .with_context(|| format!("Failed to serialize snapshot to JSON '{}'", path_ref.display()))?,
        OutputFormat::Bincode => bincode::serialize_into(&mut writer, snapshot)
            .with_context(|| format!("Failed to serialize snapshot to bincode '{}'", path_ref.display()))?,
        OutputFormat::MessagePack => rmp_serde::encode::write(&mut writer, snapshot)
            .with_context(|| format!("Failed to serialize snapshot to MessagePack '{}'", path_ref.display()))?,
    }

    writer.flush()
        .with_context(|| format!("Failed to flush snapshot file '{}'", path_ref.display()))?;
    Ok(())
}

/// Reads a snapshot, inferring the format from the file extension.
pub fn read_snapshot<P: AsRef<Path>>(path: P) -> Result<LatticeSnapshot> {
    let path_ref = path.as_ref();
    let ext = path_ref.extension().and_then(|e| e.to_str()).unwrap_or("");
    let format = OutputFormat::from_extension(ext)
        .with_context(|| format!("Unrecognized snapshot extension for '{}'", path_ref.display()))?;

    let file = File::open(path_ref)
        .with_context(|| format!("Failed to open snapshot file '{}'", path_ref.display()))?;
    let reader = BufReader::new(file);

    let snapshot: LatticeSnapshot = match format {
        OutputFormat::Json => serde_json::from_reader(reader)
            .with_context(|| format!("Failed to parse JSON snapshot '{}'", path_ref.display()))?,
        OutputFormat::Bincode => bincode::deserialize_from(reader)
            .with_context(|| format!("Failed to parse bincode snapshot '{}'", path_ref.display()))?,
        OutputFormat::MessagePack => rmp_serde::decode::from_read(reader)
            .with_context(|| format!("Failed to parse MessagePack snapshot '{}'", path_ref.display()))?,
    };

    let expected = snapshot.size as usize * snapshot.size as usize;
    if snapshot.cell_ids.len() != expected || snapshot.collagen.len() != expected {
        anyhow::bail!(
            "Snapshot '{}' declares size {} but holds {} ids and {} collagen flags.",
            path_ref.display(),
            snapshot.size,
            snapshot.cell_ids.len(),
            snapshot.collagen.len()
        );
    }
    Ok(snapshot)
}
