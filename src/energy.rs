use crate::lattice::{CellId, Lattice, Site, AIR};
use crate::registry::CellRegistry;
use potts_common::SimParams;

/// The four terms of the Hamiltonian and the constants that weight them.
#[derive(Debug, Clone)]
pub struct EnergyModel {
    pub j_air: f64,
    pub j_cel: f64,
    pub j_col: f64,
    pub l_vol: f64,
    pub l_ani: f64,
    pub l_blb: f64,
    pub target_volume: f64,
}

impl EnergyModel {
    pub fn from_params(params: &SimParams) -> Self {
        Self {
            j_air: params.j_air,
            j_cel: params.j_cel,
            j_col: params.j_col,
            l_vol: params.l_vol,
            l_ani: params.l_ani,
            l_blb: params.l_blb,
            target_volume: params.target_volume,
        }
    }

    /// In-plane adhesion of one site.
    ///
    /// Neighbors are scanned in `DIRECTIONS` order; the first differently
    /// owned neighbor that is a cell returns `j_cel` at once. Differently owned
    /// air only records `j_air`, except in the last direction, which returns.
    pub fn inplane(&self, lattice: &Lattice, site: Site) -> f64 {
        let id = lattice.cell_id(site);
        if id == AIR {
            return 0.0;
        }

        let mut energy = 0.0;
        let neighbors = lattice.neighbors(site);
        let last = neighbors.len() - 1;
        for (k, &nb) in neighbors.iter().enumerate() {
            let other = lattice.cell_id(nb);
            if other == id {
                continue;
            }
            if other != AIR {
                return self.j_cel;
            }
            if k == last {
                return self.j_air;
            }
            energy = self.j_air;
        }
        energy
    }

    /// Out-of-plane adhesion: a cell site sitting on collagen.
    pub fn outplane(&self, lattice: &Lattice, site: Site) -> f64 {
        match lattice.get(site) {
            (id, true) if id != AIR => self.j_col,
            _ => 0.0,
        }
    }

    /// Both adhesion terms of one site.
    #[inline]
    pub fn site_energy(&self, lattice: &Lattice, site: Site) -> f64 {
        self.inplane(lattice, site) + self.outplane(lattice, site)
    }

    pub fn interaction(&self, lattice: &Lattice, registry: &CellRegistry, cell: CellId) -> f64 {
        let inplane: f64 = registry
            .perimeter_of(cell)
            .iter()
            .map(|&site| self.inplane(lattice, site))
            .sum();
        let outplane: f64 = registry
            .volume_of(cell)
            .iter()
            .map(|&site| self.outplane(lattice, site))
            .sum();
        inplane + outplane
    }

    pub fn volume(&self, registry: &CellRegistry, cell: CellId) -> f64 {
        let excess = registry.volume_of(cell).len() as f64 - self.target_volume;
        self.l_vol * excess * excess
    }

    pub fn anisotropy(&self, registry: &CellRegistry, cell: CellId) -> f64 {
        let volume = registry.volume_of(cell).len();
        if volume == 0 {
            return 0.0;
        }
        self.l_ani * registry.perimeter_of(cell).len() as f64 / volume as f64
    }

    /// Fraction of ordered perimeter-site pairs whose line of sight leaves
    /// the cell, weighted by `l_blb`.
    pub fn blobularity(&self, lattice: &Lattice, registry: &CellRegistry, cell: CellId) -> f64 {
        let perimeter = registry.perimeter_of(cell);
        if self.l_blb == 0.0 || perimeter.is_empty() {
            return 0.0;
        }

        let mut exits = 0usize;
        for &from in perimeter {
            for &to in perimeter {
                if ray_exits_cell(lattice, cell, from, to) {
                    exits += 1;
                }
            }
        }
        self.l_blb * exits as f64 / perimeter.len() as f64
    }

    /// Whole-cell terms: volume, anisotropy and blobularity.
    pub fn shape(&self, lattice: &Lattice, registry: &CellRegistry, cell: CellId) -> f64 {
        if cell == AIR {
            return 0.0;
        }
        self.volume(registry, cell)
            + self.anisotropy(registry, cell)
            + self.blobularity(lattice, registry, cell)
    }

    pub fn cell_energy(&self, lattice: &Lattice, registry: &CellRegistry, cell: CellId) -> f64 {
        self.interaction(lattice, registry, cell) + self.shape(lattice, registry, cell)
    }

    /// Total energy summed over every cell.
    pub fn hamiltonian(&self, lattice: &Lattice, registry: &CellRegistry) -> f64 {
        registry
            .cell_ids()
            .map(|cell| self.cell_energy(lattice, registry, cell))
            .sum()
    }
}

/// Steps a discrete line from `from` toward `to` along the shortest periodic
/// displacement and reports whether any sampled site is not owned by `cell`.
///
/// Columns are advanced one at a time, and rows are stepped while the
/// accumulated slope error exceeds one half. The target column itself is not
/// sampled. A ray with no x displacement takes the lattice size as its slope,
/// so it walks `N` rows toward the target and wraps through the whole column.
pub fn ray_exits_cell(lattice: &Lattice, cell: CellId, from: Site, to: Site) -> bool {
    let dx = lattice.periodic_delta(from.i, to.i);
    let dy = lattice.periodic_delta(from.j, to.j);
    let sx = dx.signum();
    let sy = dy.signum();

    if dx == 0 {
        let mut site = from;
        if lattice.cell_id(site) != cell {
            return true;
        }
        for _ in 0..lattice.size() {
            site = lattice.offset(site, 0, sy);
            if lattice.cell_id(site) != cell {
                return true;
            }
        }
        return false;
    }

    let slope = (dy as f64 / dx as f64).abs();
    let target_i = lattice.offset(from, dx, 0).i;
    let mut site = from;
    let mut error = slope;

    loop {
        if lattice.cell_id(site) != cell {
            return true;
        }
        while error > 0.5 {
            site = lattice.offset(site, 0, sy);
            if lattice.cell_id(site) != cell {
                return true;
            }
            error -= 1.0;
        }
        site = lattice.offset(site, sx, 0);
        error += slope;
        if site.i == target_i {
            return false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> EnergyModel {
        EnergyModel {
            j_air: 2.0,
            j_cel: -0.5,
            j_col: 0.75,
            l_vol: 0.1,
            l_ani: 1.5,
            l_blb: 2.0,
            target_volume: 4.0,
        }
    }

    fn registry(lattice: &Lattice, num_cells: u32) -> CellRegistry {
        CellRegistry::from_lattice(lattice, num_cells).unwrap()
    }

    #[test]
    fn inplane_prefers_cell_contact_over_air() {
        let mut lattice = Lattice::new(5);
        let site = Site::new(2, 2);
        lattice.set_cell_id(site, 1);
        assert_eq!(model().inplane(&lattice, site), 2.0);

        // A cell neighbor in the last direction still wins over air seen earlier
        lattice.set_cell_id(Site::new(2, 1), 2);
        assert_eq!(model().inplane(&lattice, site), -0.5);
    }

    #[test]
    fn inplane_is_zero_for_air_and_interior_sites() {
        let mut lattice = Lattice::new(5);
        for i in 1..4 {
            for j in 1..4 {
                lattice.set_cell_id(Site::new(i, j), 1);
            }
        }
        assert_eq!(model().inplane(&lattice, Site::new(2, 2)), 0.0);
        assert_eq!(model().inplane(&lattice, Site::new(0, 0)), 0.0);
    }

    #[test]
    fn inplane_is_unchanged_by_quarter_turns() {
        // L-shaped cell 1 touching cell 2 on one side only
        let shape = [(2, 2), (2, 3), (3, 2), (1, 2)];
        let mut base = Lattice::new(7);
        for (i, j) in shape {
            base.set_cell_id(Site::new(i, j), 1);
        }
        base.set_cell_id(Site::new(2, 4), 2);

        let mut rotated = Lattice::new(7);
        for site in base.sites() {
            // (i, j) -> (j, 6 - i)
            rotated.set_cell_id(Site::new(site.j, 6 - site.i), base.cell_id(site));
        }

        let m = model();
        for (i, j) in shape {
            let here = m.inplane(&base, Site::new(i, j));
            let there = m.inplane(&rotated, Site::new(j, 6 - i));
            assert_eq!(here, there, "site ({i}, {j})");
        }
    }

    #[test]
    fn outplane_needs_both_cell_and_collagen() {
        let mut lattice = Lattice::new(3);
        lattice.set_collagen(Site::new(0, 0), true);
        lattice.set_collagen(Site::new(1, 1), true);
        lattice.set_cell_id(Site::new(1, 1), 1);
        lattice.set_cell_id(Site::new(2, 2), 1);
        let m = model();
        assert_eq!(m.outplane(&lattice, Site::new(0, 0)), 0.0);
        assert_eq!(m.outplane(&lattice, Site::new(1, 1)), 0.75);
        assert_eq!(m.outplane(&lattice, Site::new(2, 2)), 0.0);
    }

    #[test]
    fn volume_and_anisotropy_of_a_square() {
        let mut lattice = Lattice::new(8);
        for i in 2..5 {
            for j in 2..5 {
                lattice.set_cell_id(Site::new(i, j), 1);
            }
        }
        let reg = registry(&lattice, 1);
        let m = model();
        // 9 sites, target 4
        assert!((m.volume(&reg, 1) - 2.5).abs() < 1e-12);
        // 8 perimeter sites out of 9
        assert!((m.anisotropy(&reg, 1) - 1.5 * 8.0 / 9.0).abs() < 1e-12);
    }

    #[test]
    fn square_cell_blobularity_counts_same_column_pairs() {
        // 4x4 block: only pairs sharing a column leave the cell, 28 of them
        let mut lattice = Lattice::new(10);
        for i in 2..6 {
            for j in 3..7 {
                lattice.set_cell_id(Site::new(i, j), 1);
            }
        }
        let reg = registry(&lattice, 1);
        assert_eq!(reg.perimeter_of(1).len(), 12);
        assert!(!ray_exits_cell(&lattice, 1, Site::new(2, 3), Site::new(5, 6)));
        assert!(!ray_exits_cell(&lattice, 1, Site::new(3, 3), Site::new(3, 3)));
        let expected = 2.0 * 28.0 / 12.0;
        assert!((model().blobularity(&lattice, &reg, 1) - expected).abs() < 1e-12);
    }

    #[test]
    fn u_shaped_cell_is_blobular() {
        // Two vertical arms joined by a bottom bar: rays between arm tips cross air
        let mut lattice = Lattice::new(10);
        for i in 2..7 {
            lattice.set_cell_id(Site::new(i, 2), 1);
            lattice.set_cell_id(Site::new(i, 6), 1);
        }
        for j in 2..7 {
            lattice.set_cell_id(Site::new(6, j), 1);
        }
        let reg = registry(&lattice, 1);
        assert!(ray_exits_cell(&lattice, 1, Site::new(2, 2), Site::new(2, 6)));
        assert!(model().blobularity(&lattice, &reg, 1) > 0.0);
    }

    #[test]
    fn vertical_ray_wraps_through_the_column() {
        let mut lattice = Lattice::new(10);
        for j in 0..4 {
            lattice.set_cell_id(Site::new(5, j), 1);
        }
        // Same column, short of a full wrap: the ray runs past its target
        assert!(ray_exits_cell(&lattice, 1, Site::new(5, 0), Site::new(5, 3)));
        assert!(ray_exits_cell(&lattice, 1, Site::new(5, 3), Site::new(5, 0)));
        let reg = registry(&lattice, 1);
        assert!((model().blobularity(&lattice, &reg, 1) - 2.0 * 12.0 / 4.0).abs() < 1e-12);

        // A column the cell owns end to end never exits
        for j in 4..10 {
            lattice.set_cell_id(Site::new(5, j), 1);
        }
        assert!(!ray_exits_cell(&lattice, 1, Site::new(5, 0), Site::new(5, 3)));
    }

    #[test]
    fn ray_follows_shortest_periodic_path() {
        // Horizontal bar straddling the seam at i = 0
        let mut lattice = Lattice::new(10);
        for i in [8, 9, 0, 1] {
            lattice.set_cell_id(Site::new(i, 4), 1);
        }
        assert!(!ray_exits_cell(&lattice, 1, Site::new(8, 4), Site::new(1, 4)));
        assert!(!ray_exits_cell(&lattice, 1, Site::new(1, 4), Site::new(8, 4)));
    }

    #[test]
    fn hamiltonian_sums_cell_energies() {
        let mut lattice = Lattice::new(8);
        lattice.set_cell_id(Site::new(1, 1), 1);
        lattice.set_cell_id(Site::new(1, 2), 1);
        lattice.set_cell_id(Site::new(2, 2), 2);
        lattice.set_collagen(Site::new(1, 1), true);
        let reg = registry(&lattice, 2);
        let m = model();
        let expected = m.cell_energy(&lattice, &reg, 1) + m.cell_energy(&lattice, &reg, 2);
        assert!((m.hamiltonian(&lattice, &reg) - expected).abs() < 1e-12);
        // Site (1,1) sits on collagen and touches only air; (1,2) touches cell 2
        assert!((m.interaction(&lattice, &reg, 1) - (2.0 - 0.5 + 0.75)).abs() < 1e-12);
    }
}
