use crate::lattice::{CellId, Lattice, Site, AIR};
use anyhow::Result;
use std::collections::BTreeSet;

/// Per-cell volume and perimeter site sets, indexed by cell id.
///
/// Slot 0 is a permanently empty placeholder: air is never tracked, and the
/// mutating methods silently ignore it.
#[derive(Debug, Clone, PartialEq)]
pub struct CellRegistry {
    volumes: Vec<BTreeSet<Site>>,
    perimeters: Vec<BTreeSet<Site>>,
}

impl CellRegistry {
    /// Populates the registry with one full scan of the lattice.
    pub fn from_lattice(lattice: &Lattice, num_cells: u32) -> Result<Self> {
        let slots = num_cells as usize + 1;
        let mut registry = Self {
            volumes: vec![BTreeSet::new(); slots],
            perimeters: vec![BTreeSet::new(); slots],
        };

        for site in lattice.sites() {
            let id = lattice.cell_id(site);
            if id == AIR {
                continue;
            }
            if id > num_cells {
                anyhow::bail!(
                    "Site ({}, {}) carries cell id {} but only {} cells are configured.",
                    site.i,
                    site.j,
                    id,
                    num_cells
                );
            }
            registry.volumes[id as usize].insert(site);
        }

        for cell in 1..=num_cells {
            if registry.volumes[cell as usize].is_empty() {
                anyhow::bail!("Cell {} has no sites on the initial lattice.", cell);
            }
            registry.recompute_perimeter(cell, lattice);
        }

        Ok(registry)
    }

    pub fn num_cells(&self) -> u32 {
        (self.volumes.len() - 1) as u32
    }

    /// Iterates over all tracked cell ids.
    pub fn cell_ids(&self) -> impl Iterator<Item = CellId> {
        1..=self.num_cells()
    }

    pub fn volume_of(&self, cell: CellId) -> &BTreeSet<Site> {
        &self.volumes[cell as usize]
    }

    pub fn perimeter_of(&self, cell: CellId) -> &BTreeSet<Site> {
        &self.perimeters[cell as usize]
    }

    pub fn add_to_volume(&mut self, cell: CellId, site: Site) {
        if cell != AIR {
            self.volumes[cell as usize].insert(site);
        }
    }

    pub fn remove_from_volume(&mut self, cell: CellId, site: Site) {
        if cell != AIR {
            self.volumes[cell as usize].remove(&site);
        }
    }

    /// Clears the perimeter set of `cell` and rebuilds it from its volume set.
    pub fn recompute_perimeter(&mut self, cell: CellId, lattice: &Lattice) {
        if cell == AIR {
            return;
        }
        let perimeter: BTreeSet<Site> = self.volumes[cell as usize]
            .iter()
            .copied()
            .filter(|&site| lattice.is_boundary(site))
            .collect();
        self.perimeters[cell as usize] = perimeter;
    }

    /// Puts back a previously captured perimeter set. Air has none.
    pub fn restore_perimeter(&mut self, cell: CellId, perimeter: BTreeSet<Site>) {
        if cell != AIR {
            self.perimeters[cell as usize] = perimeter;
        }
    }
}
