use crate::contiguity::maintains_contiguity;
use crate::energy::EnergyModel;
use crate::lattice::{CellId, Site, AIR, DIRECTIONS};
use crate::state::PottsState;
use log::trace;
use potts_common::SimParams;
use rand::Rng;
use std::collections::BTreeSet;

/// A candidate invasion: the block around `origin` changes from `old_cell`
/// to `new_cell`. Either label may be air.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Proposal {
    pub origin: Site,
    pub old_cell: CellId,
    pub new_cell: CellId,
}

/// Everything needed to undo a tentatively applied proposal.
#[derive(Debug, Clone)]
pub struct Rollback {
    proposal: Proposal,
    /// Chunk sites and the ids they held before the flip.
    chunk: Vec<(Site, CellId)>,
    old_perimeter: BTreeSet<Site>,
    new_perimeter: BTreeSet<Site>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlipOutcome {
    pub proposal: Proposal,
    pub delta_energy: f64,
    pub accepted: bool,
}

/// Proposes, scores, and accepts or rolls back block flips.
#[derive(Debug, Clone)]
pub struct FlipEngine {
    pub energy: EnergyModel,
    pub beta: f64,
    pub chunk_size: usize,
}

impl FlipEngine {
    pub fn from_params(params: &SimParams) -> Self {
        Self {
            energy: EnergyModel::from_params(params),
            beta: params.beta,
            chunk_size: params.chunk_size,
        }
    }

    /// One full Metropolis step. On acceptance the state keeps the flip; on
    /// rejection it is restored exactly.
    ///
    /// Random draws, in order: cell, perimeter index, then (direction, sign)
    /// pairs until a different label is found, role-swap coin, repeating all
    /// of it until the proposal is valid; finally one acceptance draw when
    /// the energy does not decrease.
    pub fn flip<R: Rng>(&self, state: &mut PottsState, rng: &mut R) -> FlipOutcome {
        let proposal = self.choose(state, rng);
        let (delta_energy, rollback) = self.score(state, proposal);
        let accepted = self.accept(delta_energy, rng);

        if !accepted {
            self.rollback(state, rollback);
        }

        trace!(
            "flip {} -> {} at ({}, {}): dE = {:.4}, accepted = {}",
            proposal.old_cell,
            proposal.new_cell,
            proposal.origin.i,
            proposal.origin.j,
            delta_energy,
            accepted
        );

        FlipOutcome {
            proposal,
            delta_energy,
            accepted,
        }
    }

    /// Draws proposals until one passes `is_valid`.
    pub fn choose<R: Rng>(&self, state: &PottsState, rng: &mut R) -> Proposal {
        let lattice = &state.lattice;
        let num_cells = state.registry.num_cells();

        loop {
            let cell = rng.random_range(1..=num_cells);
            let perimeter = state.registry.perimeter_of(cell);
            if perimeter.is_empty() {
                continue;
            }
            let p = rng.random_range(0..perimeter.len());
            let Some(&site) = perimeter.iter().nth(p) else {
                continue;
            };

            // A perimeter site always has a differently owned neighbor.
            let (neighbor, neighbor_id) = loop {
                let which = rng.random_range(0..2usize);
                let sign = 2 * rng.random_range(0..2usize) as isize - 1;
                let nb = if which == 0 {
                    lattice.offset(site, sign, 0)
                } else {
                    lattice.offset(site, 0, sign)
                };
                let id = lattice.cell_id(nb);
                if id != cell {
                    break (nb, id);
                }
            };

            let proposal = if rng.random_range(0..2u32) == 0 {
                // The neighbor's owner gives ground to `cell`.
                Proposal {
                    origin: neighbor,
                    old_cell: neighbor_id,
                    new_cell: cell,
                }
            } else {
                Proposal {
                    origin: site,
                    old_cell: cell,
                    new_cell: neighbor_id,
                }
            };

            if self.is_valid(state, proposal) {
                return proposal;
            }
        }
    }

    /// A proposal is valid when the chunk holds no third cell and removing
    /// it leaves `old_cell` in one non-empty piece.
    pub fn is_valid(&self, state: &PottsState, proposal: Proposal) -> bool {
        let claimable = self.chunk_sites(state, proposal.origin).all(|site| {
            let id = state.lattice.cell_id(site);
            id == AIR || id == proposal.old_cell || id == proposal.new_cell
        });
        claimable
            && maintains_contiguity(&state.lattice, proposal.origin, proposal.old_cell, self.chunk_size)
    }

    /// Sites of the `(2 * chunk_size + 1)^2` block centered on `origin`.
    pub fn chunk_sites<'a>(&self, state: &'a PottsState, origin: Site) -> impl Iterator<Item = Site> + 'a {
        let c = self.chunk_size as isize;
        let lattice = &state.lattice;
        (-c..=c).flat_map(move |di| (-c..=c).map(move |dj| lattice.offset(origin, di, dj)))
    }

    /// Applies the proposal tentatively and returns the energy change along
    /// with the image needed to undo it.
    ///
    /// Only the chunk and its 4-neighborhood change their adhesion terms, and
    /// only the two participating cells change their shape terms, so the
    /// delta is the difference of those contributions before and after.
    pub fn score(&self, state: &mut PottsState, proposal: Proposal) -> (f64, Rollback) {
        let Proposal { old_cell, new_cell, .. } = proposal;

        let chunk: Vec<(Site, CellId)> = self
            .chunk_sites(state, proposal.origin)
            .map(|site| (site, state.lattice.cell_id(site)))
            .collect();

        let mut affected: BTreeSet<Site> = BTreeSet::new();
        for &(site, _) in &chunk {
            affected.insert(site);
            for (di, dj) in DIRECTIONS {
                affected.insert(state.lattice.offset(site, di, dj));
            }
        }

        let before = self.local_energy(state, &affected, old_cell, new_cell);

        let rollback = Rollback {
            proposal,
            old_perimeter: state.registry.perimeter_of(old_cell).clone(),
            new_perimeter: state.registry.perimeter_of(new_cell).clone(),
            chunk,
        };

        for &(site, prior) in &rollback.chunk {
            if prior != new_cell {
                state.lattice.set_cell_id(site, new_cell);
                state.registry.remove_from_volume(prior, site);
                state.registry.add_to_volume(new_cell, site);
            }
        }
        state.registry.recompute_perimeter(new_cell, &state.lattice);
        state.registry.recompute_perimeter(old_cell, &state.lattice);

        assert!(
            old_cell == AIR || !state.registry.volume_of(old_cell).is_empty(),
            "cell {} vanished during a flip",
            old_cell
        );

        let after = self.local_energy(state, &affected, old_cell, new_cell);
        (after - before, rollback)
    }

    fn local_energy(&self, state: &PottsState, sites: &BTreeSet<Site>, old_cell: CellId, new_cell: CellId) -> f64 {
        let lattice = &state.lattice;
        let registry = &state.registry;
        let adhesion: f64 = sites.iter().map(|&site| self.energy.site_energy(lattice, site)).sum();
        adhesion + self.energy.shape(lattice, registry, old_cell) + self.energy.shape(lattice, registry, new_cell)
    }

    /// Metropolis rule. Draws from `rng` only for non-negative deltas.
    pub fn accept<R: Rng>(&self, delta_energy: f64, rng: &mut R) -> bool {
        if delta_energy < 0.0 {
            return true;
        }
        (-self.beta * delta_energy).exp() > rng.random::<f64>()
    }

    /// Restores the chunk ids, volume sets and perimeter sets captured by `score`.
    pub fn rollback(&self, state: &mut PottsState, rollback: Rollback) {
        let Rollback {
            proposal,
            chunk,
            old_perimeter,
            new_perimeter,
        } = rollback;

        for (site, prior) in chunk {
            if prior != proposal.new_cell {
                state.lattice.set_cell_id(site, prior);
                state.registry.remove_from_volume(proposal.new_cell, site);
                state.registry.add_to_volume(prior, site);
            }
        }
        state.registry.restore_perimeter(proposal.old_cell, old_perimeter);
        state.registry.restore_perimeter(proposal.new_cell, new_perimeter);
    }
}
