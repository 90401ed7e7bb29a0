use crate::lattice::{CellId, Lattice, Site};
use crate::registry::CellRegistry;
use anyhow::Result;
use std::collections::{BTreeSet, VecDeque};

/// The lattice together with its per-cell bookkeeping. Every component of the
/// engine reads and mutates the simulation through this one struct.
#[derive(Debug, Clone, PartialEq)]
pub struct PottsState {
    pub lattice: Lattice,
    pub registry: CellRegistry,
}

impl PottsState {
    /// Takes ownership of an initial lattice and builds the registry from it.
    pub fn new(lattice: Lattice, num_cells: u32) -> Result<Self> {
        let registry = CellRegistry::from_lattice(&lattice, num_cells)?;
        let state = Self { lattice, registry };
        state.verify()?;
        Ok(state)
    }

    /// Full consistency check of the registry against the lattice.
    ///
    /// O(N^2); meant for setup, tests and opt-in per-iteration checking.
    pub fn verify(&self) -> Result<()> {
        let num_cells = self.registry.num_cells();
        let mut counted = vec![0usize; num_cells as usize + 1];

        for site in self.lattice.sites() {
            let id = self.lattice.cell_id(site);
            if id > num_cells {
                anyhow::bail!("Site ({}, {}) has unknown cell id {}.", site.i, site.j, id);
            }
            counted[id as usize] += 1;
        }

        for cell in self.registry.cell_ids() {
            let volume = self.registry.volume_of(cell);
            if volume.is_empty() {
                anyhow::bail!("Cell {} has vanished.", cell);
            }
            if volume.len() != counted[cell as usize] {
                anyhow::bail!(
                    "Cell {} owns {} lattice sites but its volume set holds {}.",
                    cell,
                    counted[cell as usize],
                    volume.len()
                );
            }
            if let Some(site) = volume.iter().find(|&&s| self.lattice.cell_id(s) != cell) {
                anyhow::bail!("Volume set of cell {} lists foreign site ({}, {}).", cell, site.i, site.j);
            }

            let expected: BTreeSet<Site> = volume
                .iter()
                .copied()
                .filter(|&s| self.lattice.is_boundary(s))
                .collect();
            if &expected != self.registry.perimeter_of(cell) {
                anyhow::bail!("Perimeter set of cell {} is stale.", cell);
            }

            if !self.is_connected(cell) {
                anyhow::bail!("Cell {} is split into several pieces.", cell);
            }
        }
        Ok(())
    }

    /// Periodic 4-connectivity of a cell's volume set.
    pub fn is_connected(&self, cell: CellId) -> bool {
        let volume = self.registry.volume_of(cell);
        let Some(&start) = volume.iter().next() else {
            return false;
        };

        let mut seen = BTreeSet::from([start]);
        let mut queue = VecDeque::from([start]);
        while let Some(site) = queue.pop_front() {
            for nb in self.lattice.neighbors(site) {
                if self.lattice.cell_id(nb) == cell && seen.insert(nb) {
                    queue.push_back(nb);
                }
            }
        }
        seen.len() == volume.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_cell_fails_verification() {
        let mut lattice = Lattice::new(6);
        lattice.set_cell_id(Site::new(0, 0), 1);
        lattice.set_cell_id(Site::new(3, 3), 1);
        let err = PottsState::new(lattice, 1).unwrap_err();
        assert!(err.to_string().contains("split"));
    }

    #[test]
    fn cell_connected_across_the_seam() {
        let mut lattice = Lattice::new(6);
        lattice.set_cell_id(Site::new(0, 2), 1);
        lattice.set_cell_id(Site::new(5, 2), 1);
        let state = PottsState::new(lattice, 1).unwrap();
        assert!(state.is_connected(1));
    }

    #[test]
    fn stale_perimeter_is_detected() {
        let mut lattice = Lattice::new(6);
        lattice.set_cell_id(Site::new(2, 2), 1);
        let mut state = PottsState::new(lattice, 1).unwrap();
        state.lattice.set_cell_id(Site::new(2, 3), 1);
        state.registry.add_to_volume(1, Site::new(2, 3));
        assert!(state.verify().is_err());
        state.registry.recompute_perimeter(1, &state.lattice);
        assert!(state.verify().is_ok());
    }
}
