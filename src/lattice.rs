use anyhow::Result;
use potts_common::LatticeSnapshot;

/// Owning label of a lattice site. 0 is air, 1..=num_cells are cells.
pub type CellId = u32;

pub const AIR: CellId = 0;

/// Unit offsets of the 4-neighborhood, in the order +x, -x, +y, -y.
pub const DIRECTIONS: [(isize, isize); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

/// A normalized lattice coordinate. Ordered row-major (`i`, then `j`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Site {
    pub i: usize,
    pub j: usize,
}

impl Site {
    #[inline(always)]
    pub fn new(i: usize, j: usize) -> Self {
        Self { i, j }
    }
}

/// The N x N periodic grid of cell ids and collagen flags.
#[derive(Debug, Clone, PartialEq)]
pub struct Lattice {
    size: usize,
    cell_ids: Vec<CellId>,
    collagen: Vec<bool>,
}

impl Lattice {
    /// Creates an all-air lattice without collagen.
    pub fn new(size: usize) -> Self {
        Self {
            size,
            cell_ids: vec![AIR; size * size],
            collagen: vec![false; size * size],
        }
    }

    /// Rebuilds a lattice from a snapshot's row-major arrays.
    pub fn from_snapshot(snapshot: &LatticeSnapshot) -> Result<Self> {
        let size = snapshot.size as usize;
        if snapshot.cell_ids.len() != size * size || snapshot.collagen.len() != size * size {
            anyhow::bail!(
                "Snapshot arrays do not match a {}x{} lattice.",
                size,
                size
            );
        }
        Ok(Self {
            size,
            cell_ids: snapshot.cell_ids.clone(),
            collagen: snapshot.collagen.clone(),
        })
    }

    #[inline(always)]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline(always)]
    fn index(&self, site: Site) -> usize {
        site.i * self.size + site.j
    }

    /// Returns `(cell_id, collagen_flag)` of a site.
    pub fn get(&self, site: Site) -> (CellId, bool) {
        let idx = self.index(site);
        (self.cell_ids[idx], self.collagen[idx])
    }

    #[inline(always)]
    pub fn cell_id(&self, site: Site) -> CellId {
        self.cell_ids[self.index(site)]
    }

    pub fn set_cell_id(&mut self, site: Site, id: CellId) {
        let idx = self.index(site);
        self.cell_ids[idx] = id;
    }

    /// Marks or clears collagen. Only initialization touches this.
    pub fn set_collagen(&mut self, site: Site, flag: bool) {
        let idx = self.index(site);
        self.collagen[idx] = flag;
    }

    /// Normalizes arbitrary signed coordinates onto the torus.
    #[inline(always)]
    pub fn wrap(&self, i: isize, j: isize) -> Site {
        let n = self.size as isize;
        Site::new(i.rem_euclid(n) as usize, j.rem_euclid(n) as usize)
    }

    #[inline(always)]
    pub fn offset(&self, site: Site, di: isize, dj: isize) -> Site {
        self.wrap(site.i as isize + di, site.j as isize + dj)
    }

    /// The four periodic neighbors in `DIRECTIONS` order.
    #[inline(always)]
    pub fn neighbors(&self, site: Site) -> [Site; 4] {
        DIRECTIONS.map(|(di, dj)| self.offset(site, di, dj))
    }

    /// True when at least one periodic neighbor has a different owner.
    pub fn is_boundary(&self, site: Site) -> bool {
        let id = self.cell_id(site);
        self.neighbors(site).iter().any(|&nb| self.cell_id(nb) != id)
    }

    /// Iterates over every site in row-major order.
    pub fn sites(&self) -> impl Iterator<Item = Site> + '_ {
        (0..self.size).flat_map(move |i| (0..self.size).map(move |j| Site::new(i, j)))
    }

    pub fn cell_ids(&self) -> &[CellId] {
        &self.cell_ids
    }

    pub fn collagen(&self) -> &[bool] {
        &self.collagen
    }

    /// Shortest signed displacement from `a` to `b` along one periodic axis,
    /// in `[-N/2, N/2)`.
    #[inline(always)]
    pub fn periodic_delta(&self, a: usize, b: usize) -> isize {
        let n = self.size as isize;
        let d = b as isize - a as isize;
        d - n * (2 * d + n).div_euclid(2 * n)
    }
}
