use crate::lattice::{CellId, Lattice, Site};
use anyhow::{Context, Result};
use log::{debug, info};
use potts_common::{read_snapshot, SimParams};
use rand::distr::Uniform;
use rand::Rng;
use std::path::Path;

const MAX_PLACEMENT_ATTEMPTS: usize = 10_000;

/// Seeds every cell as a disk of radius `cell_spawn_radius` around a random
/// centre. Centres are resampled until they sit more than two radii from all
/// earlier ones, so seeds never overlap.
pub fn place_cells<R: Rng>(lattice: &mut Lattice, params: &SimParams, rng: &mut R) -> Result<()> {
    let radius = params.cell_spawn_radius;
    let min_separation_sq = 4.0 * radius * radius;
    let coord = Uniform::new(0, lattice.size())?;
    let mut centers: Vec<Site> = Vec::with_capacity(params.num_cells as usize);

    for cell in 1..=params.num_cells {
        let mut placed = None;
        for _attempt in 0..MAX_PLACEMENT_ATTEMPTS {
            let candidate = Site::new(rng.sample(&coord), rng.sample(&coord));
            let clear = centers
                .iter()
                .all(|&other| periodic_distance_sq(lattice, candidate, other) > min_separation_sq);
            if clear {
                placed = Some(candidate);
                break;
            }
        }

        let Some(center) = placed else {
            anyhow::bail!(
                "Could not place cell {} of {} without overlap after {} attempts; \
                 lower num_cells or cell_spawn_radius.",
                cell,
                params.num_cells,
                MAX_PLACEMENT_ATTEMPTS
            );
        };
        debug!("Cell {} seeded at ({}, {}).", cell, center.i, center.j);
        paint_disk(lattice, center, radius, cell);
        centers.push(center);
    }

    Ok(())
}

/// Lays `num_collagen` straight fibres across the lattice, each horizontal or
/// vertical with equal chance and `collagen_width` sites thick.
pub fn place_collagen<R: Rng>(lattice: &mut Lattice, params: &SimParams, rng: &mut R) -> Result<()> {
    let n = lattice.size();
    let coord = Uniform::new(0, n)?;

    for _ in 0..params.num_collagen {
        let horizontal = rng.random_bool(0.5);
        let offset = rng.sample(&coord) as isize;
        for w in 0..params.collagen_width as isize {
            for k in 0..n as isize {
                let site = if horizontal {
                    lattice.wrap(k, offset + w)
                } else {
                    lattice.wrap(offset + w, k)
                };
                lattice.set_collagen(site, true);
            }
        }
    }
    Ok(())
}

/// Builds a fresh lattice: collagen first, then cells.
pub fn spawn_lattice<R: Rng>(params: &SimParams, rng: &mut R) -> Result<Lattice> {
    let mut lattice = Lattice::new(params.size);
    place_collagen(&mut lattice, params, rng)?;
    place_cells(&mut lattice, params, rng)?;
    info!(
        "Spawned {} cells (radius {:.1}) and {} collagen fibres on a {}x{} lattice.",
        params.num_cells, params.cell_spawn_radius, params.num_collagen, params.size, params.size
    );
    Ok(lattice)
}

/// Reads the initial lattice from a snapshot file.
pub fn import_lattice<P: AsRef<Path>>(path: P, params: &SimParams) -> Result<Lattice> {
    let path_ref = path.as_ref();
    let snapshot = read_snapshot(path_ref)
        .with_context(|| format!("Failed to import lattice from '{}'", path_ref.display()))?;
    if snapshot.size as usize != params.size {
        anyhow::bail!(
            "Imported lattice is {}x{} but lattice.size is {}.",
            snapshot.size,
            snapshot.size,
            params.size
        );
    }
    if snapshot.max_cell_id() > params.num_cells {
        anyhow::bail!(
            "Imported lattice uses cell id {} but only {} cells are configured.",
            snapshot.max_cell_id(),
            params.num_cells
        );
    }
    info!("Imported {}x{} lattice from {}", snapshot.size, snapshot.size, path_ref.display());
    Lattice::from_snapshot(&snapshot)
}

fn paint_disk(lattice: &mut Lattice, center: Site, radius: f64, cell: CellId) {
    let reach = radius.floor() as isize;
    let radius_sq = radius * radius;
    for di in -reach..=reach {
        for dj in -reach..=reach {
            if ((di * di + dj * dj) as f64) <= radius_sq {
                let site = lattice.offset(center, di, dj);
                lattice.set_cell_id(site, cell);
            }
        }
    }
}

fn periodic_distance_sq(lattice: &Lattice, a: Site, b: Site) -> f64 {
    let dx = lattice.periodic_delta(a.i, b.i) as f64;
    let dy = lattice.periodic_delta(a.j, b.j) as f64;
    dx * dx + dy * dy
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::PottsState;
    use potts_common::{write_snapshot, LatticeSnapshot, OutputFormat};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn params(size: usize, num_cells: u32, radius: f64) -> SimParams {
        SimParams {
            size,
            num_cells,
            chunk_size: 0,
            cell_spawn_radius: radius,
            num_collagen: 3,
            collagen_width: 2,
            beta: 1.0,
            j_air: 0.0,
            j_cel: 0.0,
            j_col: 0.0,
            l_vol: 0.0,
            l_ani: 0.0,
            l_blb: 0.0,
            target_volume: 0.0,
            num_loops: 1,
            num_flips: 1,
            snapshot_interval: 0,
        }
    }

    #[test]
    fn spawned_cells_are_valid_disks() {
        let params = params(60, 6, 4.0);
        let mut rng = StdRng::seed_from_u64(42);
        let lattice = spawn_lattice(&params, &mut rng).unwrap();
        let state = PottsState::new(lattice, params.num_cells).unwrap();
        for cell in 1..=6 {
            // Lattice disk of radius 4 holds 49 sites
            assert_eq!(state.registry.volume_of(cell).len(), 49);
        }
    }

    #[test]
    fn collagen_fibres_span_the_lattice() {
        let params = params(20, 1, 1.0);
        let mut lattice = Lattice::new(20);
        let mut rng = StdRng::seed_from_u64(9);
        place_collagen(&mut lattice, &params, &mut rng).unwrap();
        let marked = lattice.collagen().iter().filter(|&&c| c).count();
        // 3 fibres of width 2; crossings and coincident fibres can only reduce the count
        assert!(marked > 0 && marked <= 3 * 2 * 20);
        assert!(lattice.cell_ids().iter().all(|&id| id == 0));
    }

    #[test]
    fn overcrowded_lattice_fails_to_spawn() {
        let params = params(12, 20, 3.0);
        let mut rng = StdRng::seed_from_u64(1);
        assert!(spawn_lattice(&params, &mut rng).is_err());
    }

    #[test]
    fn import_reads_a_snapshot() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("seed.json");
        let mut cell_ids = vec![0; 16];
        cell_ids[5] = 1;
        cell_ids[6] = 1;
        let snapshot = LatticeSnapshot {
            index: 0,
            iteration: 0,
            size: 4,
            cell_ids,
            collagen: vec![false; 16],
        };
        write_snapshot(&path, &snapshot, OutputFormat::Json).unwrap();

        let lattice = import_lattice(&path, &params(4, 1, 1.0)).unwrap();
        assert_eq!(lattice.cell_id(Site::new(1, 1)), 1);
        assert_eq!(lattice.cell_id(Site::new(1, 2)), 1);
        assert!(import_lattice(&path, &params(5, 1, 1.0)).is_err());
    }
}
