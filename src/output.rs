use anyhow::{Context, Result};
use csv::Writer;
use log::info;
use potts_common::{write_snapshot, EnergyRecord, LatticeSnapshot, OutputFormat, SimulationConfig};
use std::fs::File;
use std::path::{Path, PathBuf};

pub const ENERGY_LOG_FILE: &str = "energy.csv";
pub const RUN_CONFIG_FILE: &str = "run_config.toml";

/// Per-iteration energy and shape statistics, one CSV row per record.
pub struct EnergyLog {
    writer: Writer<File>,
    path: PathBuf,
}

impl EnergyLog {
    pub fn create<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let path = dir.as_ref().join(ENERGY_LOG_FILE);
        let writer = Writer::from_path(&path)
            .with_context(|| format!("Failed to create energy log '{}'", path.display()))?;
        Ok(Self { writer, path })
    }

    /// Appends a row and flushes so the log survives an interrupted run.
    pub fn append(&mut self, record: &EnergyRecord) -> Result<()> {
        self.writer
            .serialize(record)
            .with_context(|| format!("Failed to write record to '{}'", self.path.display()))?;
        self.writer
            .flush()
            .with_context(|| format!("Failed to flush '{}'", self.path.display()))?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub fn snapshot_path<P: AsRef<Path>>(dir: P, index: u32, format: OutputFormat) -> PathBuf {
    dir.as_ref().join(format!("lattice_{}.{}", index, format.extension()))
}

pub fn write_lattice_snapshot<P: AsRef<Path>>(dir: P, snapshot: &LatticeSnapshot, format: OutputFormat) -> Result<PathBuf> {
    let path = snapshot_path(dir, snapshot.index, format);
    write_snapshot(&path, snapshot, format)?;
    info!("Snapshot {} (iteration {}) saved to {}", snapshot.index, snapshot.iteration, path.display());
    Ok(path)
}

/// Saves the resolved configuration, seed included, next to the run's output.
pub fn save_run_config<P: AsRef<Path>>(dir: P, config: &SimulationConfig) -> Result<PathBuf> {
    let path = dir.as_ref().join(RUN_CONFIG_FILE);
    config.save(&path)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use potts_common::read_snapshot;

    fn record(iteration: u32) -> EnergyRecord {
        EnergyRecord {
            iteration,
            total_energy: -12.5,
            acceptance_ratio: 0.25,
            volume_mean: 30.0,
            volume_dev: 1.5,
            perimeter_mean: 20.0,
            perimeter_dev: 0.5,
            anisotropy_mean: 0.66,
            anisotropy_dev: 0.01,
        }
    }

    #[test]
    fn energy_log_has_header_and_rows() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let mut log = EnergyLog::create(dir.path()).unwrap();
        log.append(&record(0)).unwrap();
        log.append(&record(1)).unwrap();

        let mut reader = csv::Reader::from_path(dir.path().join(ENERGY_LOG_FILE)).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(&headers[0], "iteration");
        assert_eq!(&headers[1], "total_energy");
        let rows: Vec<EnergyRecord> = reader.deserialize().collect::<Result<_, _>>().unwrap();
        assert_eq!(rows, vec![record(0), record(1)]);
    }

    #[test]
    fn snapshot_is_named_by_index_and_format() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let snapshot = LatticeSnapshot {
            index: 3,
            iteration: 90,
            size: 2,
            cell_ids: vec![0, 1, 1, 0],
            collagen: vec![false, true, false, false],
        };
        let path = write_lattice_snapshot(dir.path(), &snapshot, OutputFormat::MessagePack).unwrap();
        assert!(path.ends_with("lattice_3.msgpack"));
        assert_eq!(read_snapshot(&path).unwrap(), snapshot);
    }
}
