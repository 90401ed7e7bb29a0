use crate::lattice::{CellId, Lattice, Site};

/// Ids of the ring of sites at Chebyshev distance `chunk_size + 1` from
/// `origin`, traced clockwise so that consecutive entries are lattice
/// neighbors.
///
/// ```text
/// chunk_size = 1, o = flipped block, 0 = origin
///   x x x x x
///   x o o o x
///   x o 0 o x
///   x o o o x
///   x x x x x
/// ```
pub fn border_ring(lattice: &Lattice, origin: Site, chunk_size: usize) -> Vec<CellId> {
    let c = chunk_size as isize;
    let (oi, oj) = (origin.i as isize, origin.j as isize);
    let mut ring = Vec::with_capacity(8 * (chunk_size + 1));

    // top row, left to right
    for i in (oi - c - 1)..=(oi + c) {
        ring.push(lattice.cell_id(lattice.wrap(i, oj - c - 1)));
    }
    // right column, top to bottom
    for j in (oj - c - 1)..=(oj + c) {
        ring.push(lattice.cell_id(lattice.wrap(oi + c + 1, j)));
    }
    // bottom row, right to left
    for i in ((oi - c)..=(oi + c + 1)).rev() {
        ring.push(lattice.cell_id(lattice.wrap(i, oj + c + 1)));
    }
    // left column, bottom to top
    for j in ((oj - c)..=(oj + c + 1)).rev() {
        ring.push(lattice.cell_id(lattice.wrap(oi - c - 1, j)));
    }

    ring
}

/// True when the entries equal to `cell` form a single unbroken arc of the
/// circular `ring`. A ring with no such entry fails: the block would hold the
/// last of the cell. A ring made only of `cell` passes.
pub fn arc_is_contiguous(ring: &[CellId], cell: CellId) -> bool {
    let total = ring.iter().filter(|&&id| id == cell).count();
    if total == 0 {
        return false;
    }

    let len = ring.len();
    let Some(mut index) = ring.iter().position(|&id| id != cell) else {
        return true;
    };

    // Slide to the last outsider before the arc begins.
    while index < len - 1 && ring[index + 1] != cell {
        index += 1;
    }

    for _ in 0..total {
        index = (index + 1) % len;
        if ring[index] != cell {
            return false;
        }
    }
    true
}

/// Whether taking the `(2 * chunk_size + 1)^2` block around `origin` away
/// from `cell` leaves it in one piece.
pub fn maintains_contiguity(lattice: &Lattice, origin: Site, cell: CellId, chunk_size: usize) -> bool {
    arc_is_contiguous(&border_ring(lattice, origin, chunk_size), cell)
}
