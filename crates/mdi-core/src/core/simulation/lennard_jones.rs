use super::potentials::{
    R_MIN_OVER_SIGMA, lennard_jones_12_6, lennard_jones_12_6_fpair, mix_geometric,
};
use super::{MinStatus, MinimizeSettings, Simulation, SimulationError};
use crate::core::comm::Communicator;
use crate::core::io::SystemDefinition;
use crate::core::models::atom::{Atom, LocalAtoms};
use crate::core::models::cell::SimulationCell;
use crate::core::models::decomposition::SlabDecomposition;
use crate::core::units::UnitStyle;
use nalgebra::Vector3;
use tracing::{debug, trace};

/// Guards the relative energy criterion against energies near zero.
const EPS_ENERGY: f64 = 1.0e-8;

/// Lennard-Jones coefficients in the `(r_min, well_depth)` form the kernels use.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PairCoeff {
    pub r_min: f64,
    pub well_depth: f64,
}

impl PairCoeff {
    pub fn from_sigma(epsilon: f64, sigma: f64) -> Self {
        Self {
            r_min: sigma * R_MIN_OVER_SIGMA,
            well_depth: epsilon,
        }
    }
}

#[derive(Debug, Clone)]
struct MinimizerState {
    settings: MinimizeSettings,
    iterations: usize,
    evaluations_at_setup: usize,
    previous_energy: f64,
}

/// All-pairs Lennard-Jones system with velocity Verlet dynamics and a
/// steepest-descent minimizer.
///
/// Each worker stores only the atoms its slab owns; force evaluation gathers every
/// position so no neighbor lists or ghost atoms are needed.
#[derive(Debug, Clone)]
pub struct LennardJonesSimulation {
    units: UnitStyle,
    decomposition: SlabDecomposition,
    cell: SimulationCell,
    atoms: LocalAtoms,
    natoms: usize,
    masses: Vec<f64>,
    /// `(ntypes + 1)^2` row-major table indexed by type pair.
    pairs: Vec<PairCoeff>,
    cutoff: f64,
    dt: f64,
    step: u64,
    potential_energy: f64,
    evaluations: usize,
    minimizer: Option<MinimizerState>,
}

impl LennardJonesSimulation {
    /// Builds this worker's share of `system`: the atoms whose wrapped position
    /// falls in the worker's slab.
    pub fn new(
        system: &SystemDefinition,
        decomposition: SlabDecomposition,
    ) -> Result<Self, SimulationError> {
        let ntypes = system.ntypes();
        let pairs = build_pair_table(system, ntypes)?;

        let mut atoms = LocalAtoms::new();
        for atom in &system.atoms {
            let mut atom = atom.clone();
            atom.position = system.cell.wrap(&atom.position);
            if decomposition.owns(&system.cell, &atom.position) {
                atoms.push(atom);
            }
        }

        debug!(
            rank = decomposition.rank,
            owned = atoms.len(),
            natoms = system.natoms(),
            "Built Lennard-Jones partition"
        );

        Ok(Self {
            units: system.units,
            decomposition,
            cell: system.cell.clone(),
            atoms,
            natoms: system.natoms(),
            masses: system.masses.clone(),
            pairs,
            cutoff: system.cutoff,
            dt: system.timestep(),
            step: 0,
            potential_energy: 0.0,
            evaluations: 0,
            minimizer: None,
        })
    }

    /// Number of force evaluations performed so far.
    pub fn evaluations(&self) -> usize {
        self.evaluations
    }

    fn ntypes(&self) -> usize {
        self.masses.len().saturating_sub(1)
    }

    #[inline]
    fn pair(&self, ti: u32, tj: u32) -> PairCoeff {
        self.pairs[ti as usize * (self.ntypes() + 1) + tj as usize]
    }

    fn mass_of(&self, atom_type: u32) -> f64 {
        self.masses[atom_type as usize]
    }

    fn global_max(world: &dyn Communicator, local: f64) -> Result<f64, SimulationError> {
        let gathered = world.all_gather_f64(&[local])?;
        Ok(gathered
            .iter()
            .flatten()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max))
    }

    fn global_potential_energy(&self, world: &dyn Communicator) -> Result<f64, SimulationError> {
        Ok(world.all_reduce_sum_f64(&[self.potential_energy])?[0])
    }

    fn shrink_wrap(&mut self, world: &dyn Communicator) -> Result<(), SimulationError> {
        let mut extent = [
            f64::INFINITY,
            f64::INFINITY,
            f64::INFINITY,
            f64::NEG_INFINITY,
            f64::NEG_INFINITY,
            f64::NEG_INFINITY,
        ];
        for p in &self.atoms.positions {
            for d in 0..3 {
                extent[d] = extent[d].min(p[d]);
                extent[d + 3] = extent[d + 3].max(p[d]);
            }
        }

        let mut lo = Vector3::repeat(f64::INFINITY);
        let mut hi = Vector3::repeat(f64::NEG_INFINITY);
        for e in world.all_gather_f64(&extent)? {
            for d in 0..3 {
                lo[d] = lo[d].min(e[d]);
                hi[d] = hi[d].max(e[d + 3]);
            }
        }
        if self.cell.reset_bounds(&lo, &hi) {
            trace!(lo = ?lo, hi = ?hi, "Shrink-wrapped cell bounds");
        }
        Ok(())
    }

    fn migrate(&mut self, world: &dyn Communicator) -> Result<(), SimulationError> {
        let decomposition = self.decomposition;
        let cell = self.cell.clone();
        let leaving = self
            .atoms
            .drain_where(|p| !decomposition.owns(&cell, p));

        let mut packed = Vec::with_capacity(leaving.len() * Atom::PACKED_LEN);
        for atom in &leaving {
            atom.pack_into(&mut packed);
        }

        let mut arrived = 0usize;
        for (rank, contribution) in world.all_gather_f64(&packed)?.iter().enumerate() {
            if rank == decomposition.rank {
                continue;
            }
            for chunk in contribution.chunks(Atom::PACKED_LEN) {
                let atom = Atom::unpack(chunk).ok_or(SimulationError::CorruptMigration)?;
                if decomposition.owns(&cell, &atom.position) {
                    self.atoms.push(atom);
                    arrived += 1;
                }
            }
        }

        if !leaving.is_empty() || arrived > 0 {
            trace!(left = leaving.len(), arrived, "Migrated atoms");
        }
        Ok(())
    }
}

fn build_pair_table(
    system: &SystemDefinition,
    ntypes: usize,
) -> Result<Vec<PairCoeff>, SimulationError> {
    let width = ntypes + 1;
    let mut explicit: Vec<Option<(f64, f64)>> = vec![None; width * width];
    for entry in &system.pairs {
        let [i, j] = entry.types.map(|t| t as usize);
        explicit[i * width + j] = Some((entry.epsilon, entry.sigma));
        explicit[j * width + i] = Some((entry.epsilon, entry.sigma));
    }

    let mut table = vec![PairCoeff::default(); width * width];
    for i in 1..width {
        for j in 1..width {
            let (epsilon, sigma) = match explicit[i * width + j] {
                Some(coeff) => coeff,
                None => {
                    let self_i = explicit[i * width + i];
                    let self_j = explicit[j * width + j];
                    match (self_i, self_j) {
                        (Some(a), Some(b)) => mix_geometric(a, b),
                        _ => {
                            return Err(SimulationError::InvalidSystem(format!(
                                "no pair coefficients for types {}-{}",
                                i, j
                            )));
                        }
                    }
                }
            };
            table[i * width + j] = PairCoeff::from_sigma(epsilon, sigma);
        }
    }
    Ok(table)
}

impl Simulation for LennardJonesSimulation {
    fn units(&self) -> UnitStyle {
        self.units
    }

    fn atoms(&self) -> &LocalAtoms {
        &self.atoms
    }

    fn atoms_mut(&mut self) -> &mut LocalAtoms {
        &mut self.atoms
    }

    fn cell(&self) -> &SimulationCell {
        &self.cell
    }

    fn natoms(&self) -> usize {
        self.natoms
    }

    fn ntypes(&self) -> usize {
        LennardJonesSimulation::ntypes(self)
    }

    fn masses(&self) -> &[f64] {
        &self.masses
    }

    fn potential_energy(&self) -> f64 {
        self.potential_energy
    }

    fn kinetic_energy(&self) -> f64 {
        let mvv2e = self.units.mvv2e();
        self.atoms
            .velocities
            .iter()
            .zip(&self.atoms.types)
            .map(|(v, &t)| 0.5 * self.mass_of(t) * v.norm_squared() * mvv2e)
            .sum()
    }

    fn step(&self) -> u64 {
        self.step
    }

    fn init_md(&mut self) -> Result<(), SimulationError> {
        self.step = 0;
        self.minimizer = None;
        Ok(())
    }

    fn compute_forces(&mut self, world: &dyn Communicator) -> Result<(), SimulationError> {
        let mut local = Vec::with_capacity(self.atoms.len() * 5);
        for i in 0..self.atoms.len() {
            local.push(self.atoms.tags[i].0 as f64);
            local.push(self.atoms.types[i] as f64);
            local.extend_from_slice(self.atoms.positions[i].as_slice());
        }
        let everyone: Vec<f64> = world.all_gather_f64(&local)?.concat();

        let cutoff_sq = self.cutoff * self.cutoff;
        let mut energy = 0.0;
        let mut forces = vec![Vector3::zeros(); self.atoms.len()];

        for (i, force) in forces.iter_mut().enumerate() {
            let tag_i = self.atoms.tags[i].0 as f64;
            let type_i = self.atoms.types[i];
            let x_i = self.atoms.positions[i];
            for other in everyone.chunks_exact(5) {
                if other[0] == tag_i {
                    continue;
                }
                let x_j = Vector3::new(other[2], other[3], other[4]);
                let delta = self.cell.minimum_image(&(x_i - x_j));
                let r_sq = delta.norm_squared();
                if r_sq >= cutoff_sq {
                    continue;
                }
                let r = r_sq.sqrt();
                let coeff = self.pair(type_i, other[1] as u32);
                energy += 0.5 * lennard_jones_12_6(r, coeff.r_min, coeff.well_depth);
                *force += delta * lennard_jones_12_6_fpair(r, coeff.r_min, coeff.well_depth);
            }
        }

        self.atoms.forces = forces;
        self.potential_energy = energy;
        self.evaluations += 1;
        Ok(())
    }

    fn initial_integrate(&mut self) {
        let dtf = 0.5 * self.dt * self.units.ftm2v();
        for i in 0..self.atoms.len() {
            let dtfm = dtf / self.mass_of(self.atoms.types[i]);
            self.atoms.velocities[i] += self.atoms.forces[i] * dtfm;
            self.atoms.positions[i] += self.atoms.velocities[i] * self.dt;
        }
    }

    fn final_integrate(&mut self) {
        let dtf = 0.5 * self.dt * self.units.ftm2v();
        for i in 0..self.atoms.len() {
            let dtfm = dtf / self.mass_of(self.atoms.types[i]);
            self.atoms.velocities[i] += self.atoms.forces[i] * dtfm;
        }
    }

    fn end_step(&mut self) {
        self.step += 1;
    }

    fn min_setup(&mut self, settings: MinimizeSettings) -> Result<(), SimulationError> {
        self.minimizer = Some(MinimizerState {
            settings,
            iterations: 0,
            evaluations_at_setup: self.evaluations,
            previous_energy: 0.0,
        });
        Ok(())
    }

    fn min_line_step(&mut self, world: &dyn Communicator) -> Result<(), SimulationError> {
        let max_displacement = self
            .minimizer
            .as_ref()
            .ok_or(SimulationError::MinimizerNotInitialized)?
            .settings
            .max_displacement;

        let energy = self.global_potential_energy(world)?;
        let local_fmax = self
            .atoms
            .forces
            .iter()
            .map(|f| f.amax())
            .fold(0.0, f64::max);
        let fmax = Self::global_max(world, local_fmax)?;
        let alpha = if fmax > 0.0 { max_displacement / fmax } else { 0.0 };

        for (x, f) in self.atoms.positions.iter_mut().zip(&self.atoms.forces) {
            *x += f * alpha;
        }
        if let Some(state) = self.minimizer.as_mut() {
            state.previous_energy = energy;
        }
        self.remap(world)
    }

    fn min_check(&mut self, world: &dyn Communicator) -> Result<MinStatus, SimulationError> {
        let energy = self.global_potential_energy(world)?;
        let local_fsq: f64 = self.atoms.forces.iter().map(|f| f.norm_squared()).sum();
        let fnorm_sq = world.all_reduce_sum_f64(&[local_fsq])?[0];
        let evaluations = self.evaluations;

        let state = self
            .minimizer
            .as_mut()
            .ok_or(SimulationError::MinimizerNotInitialized)?;
        state.iterations += 1;
        let settings = state.settings;
        let previous = state.previous_energy;

        let status = if (energy - previous).abs()
            < settings.energy_tolerance * 0.5 * (energy.abs() + previous.abs() + EPS_ENERGY)
        {
            MinStatus::EnergyTolerance
        } else if fnorm_sq <= settings.force_tolerance * settings.force_tolerance {
            MinStatus::ForceTolerance
        } else if state.iterations >= settings.max_iterations {
            MinStatus::MaxIterations
        } else if evaluations - state.evaluations_at_setup >= settings.max_evaluations {
            MinStatus::MaxEvaluations
        } else {
            MinStatus::Continue
        };

        trace!(
            iteration = state.iterations,
            energy,
            fnorm = fnorm_sq.sqrt(),
            ?status,
            "Minimizer iteration"
        );
        Ok(status)
    }

    fn remap(&mut self, world: &dyn Communicator) -> Result<(), SimulationError> {
        let cell = &self.cell;
        for x in self.atoms.positions.iter_mut() {
            *x = cell.wrap(x);
        }
        if self.cell.periodic.iter().any(|&p| !p) {
            self.shrink_wrap(world)?;
        }
        if world.size() > 1 {
            self.migrate(world)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::comm::{SerialComm, ThreadComm};
    use crate::core::models::atom::AtomTag;
    use std::thread;

    const TOLERANCE: f64 = 1e-9;

    fn system(positions: &[[f64; 3]]) -> SystemDefinition {
        let mut content = String::from(
            r#"
            units = "lj"
            cutoff = 4.0
            masses = [1.0]
            [cell]
            lo = [0.0, 0.0, 0.0]
            hi = [9.0, 9.0, 9.0]
            [[pair]]
            types = [1, 1]
            epsilon = 1.0
            sigma = 1.0
            "#,
        );
        for p in positions {
            content.push_str(&format!(
                "[[atom]]\ntype = 1\nposition = [{}, {}, {}]\n",
                p[0], p[1], p[2]
            ));
        }
        SystemDefinition::from_toml_str(&content).unwrap()
    }

    fn serial(positions: &[[f64; 3]]) -> LennardJonesSimulation {
        LennardJonesSimulation::new(&system(positions), SlabDecomposition::serial()).unwrap()
    }

    #[test]
    fn dimer_at_potential_minimum_has_well_depth_energy_and_no_force() {
        let r_min = R_MIN_OVER_SIGMA;
        let mut sim = serial(&[[1.0, 1.0, 1.0], [1.0 + r_min, 1.0, 1.0]]);
        sim.compute_forces(&SerialComm).unwrap();
        assert!((sim.potential_energy() + 1.0).abs() < TOLERANCE);
        assert!(sim.atoms().forces.iter().all(|f| f.norm() < 1e-9));
    }

    #[test]
    fn forces_obey_newtons_third_law() {
        let mut sim = serial(&[[1.0, 1.0, 1.0], [2.0, 1.5, 1.0], [1.5, 2.2, 1.3]]);
        sim.compute_forces(&SerialComm).unwrap();
        let total: Vector3<f64> = sim.atoms().forces.iter().sum();
        assert!(total.norm() < 1e-9);
    }

    #[test]
    fn minimum_image_interactions_cross_the_boundary() {
        let mut sim = serial(&[[0.2, 1.0, 1.0], [8.8, 1.0, 1.0]]);
        sim.compute_forces(&SerialComm).unwrap();
        // Separated by 0.4 through the periodic boundary: strongly repulsive.
        let f0 = sim.atoms().forces[sim.atoms().index_of(AtomTag(1)).unwrap()];
        assert!(f0.x > 0.0);
    }

    #[test]
    fn velocity_verlet_conserves_energy_over_short_runs() {
        let mut sim = serial(&[[1.0, 1.0, 1.0], [2.2, 1.0, 1.0]]);
        sim.init_md().unwrap();
        sim.compute_forces(&SerialComm).unwrap();
        let e0 = sim.potential_energy() + sim.kinetic_energy();
        for _ in 0..100 {
            sim.initial_integrate();
            sim.remap(&SerialComm).unwrap();
            sim.compute_forces(&SerialComm).unwrap();
            sim.final_integrate();
            sim.end_step();
        }
        let e1 = sim.potential_energy() + sim.kinetic_energy();
        assert_eq!(sim.step(), 100);
        assert!((e1 - e0).abs() < 1e-3);
    }

    #[test]
    fn steepest_descent_lowers_the_energy() {
        let mut sim = serial(&[[1.0, 1.0, 1.0], [2.5, 1.0, 1.0], [1.7, 2.1, 1.0]]);
        sim.min_setup(MinimizeSettings::with_caps(50, 100)).unwrap();
        sim.compute_forces(&SerialComm).unwrap();
        let start = sim.potential_energy();
        for _ in 0..5 {
            sim.min_line_step(&SerialComm).unwrap();
            sim.compute_forces(&SerialComm).unwrap();
            sim.min_check(&SerialComm).unwrap();
        }
        assert!(sim.potential_energy() < start);
    }

    #[test]
    fn minimizer_requires_setup() {
        let mut sim = serial(&[[1.0, 1.0, 1.0], [2.0, 1.0, 1.0]]);
        assert!(matches!(
            sim.min_line_step(&SerialComm),
            Err(SimulationError::MinimizerNotInitialized)
        ));
    }

    #[test]
    fn iteration_cap_stops_the_minimizer() {
        let mut sim = serial(&[[1.0, 1.0, 1.0], [2.5, 1.0, 1.0]]);
        sim.min_setup(MinimizeSettings::with_caps(2, 100)).unwrap();
        sim.compute_forces(&SerialComm).unwrap();
        let mut statuses = Vec::new();
        for _ in 0..2 {
            sim.min_line_step(&SerialComm).unwrap();
            sim.compute_forces(&SerialComm).unwrap();
            statuses.push(sim.min_check(&SerialComm).unwrap());
        }
        assert_eq!(statuses, vec![MinStatus::Continue, MinStatus::MaxIterations]);
    }

    #[test]
    fn non_periodic_dimensions_are_shrink_wrapped_on_remap() {
        let mut definition = system(&[[1.0, 1.0, 1.0], [2.0, 3.0, 1.0]]);
        definition.cell.periodic = [true, false, true];
        let mut sim = LennardJonesSimulation::new(&definition, SlabDecomposition::serial()).unwrap();
        sim.remap(&SerialComm).unwrap();
        assert_eq!(sim.cell().lo.y, 1.0);
        assert_eq!(sim.cell().hi.y, 3.0);
    }

    #[test]
    fn atoms_migrate_to_the_worker_owning_their_new_position() {
        let definition = system(&[[1.0, 1.0, 1.0], [4.0, 1.0, 1.0], [7.0, 1.0, 1.0]]);
        let world = ThreadComm::world(3);

        let owned: Vec<Vec<u32>> = thread::scope(|scope| {
            let handles: Vec<_> = world
                .into_iter()
                .map(|comm| {
                    let definition = &definition;
                    scope.spawn(move || {
                        let decomposition = SlabDecomposition::new(comm.rank(), comm.size());
                        let mut sim = LennardJonesSimulation::new(definition, decomposition).unwrap();
                        assert_eq!(sim.atoms().len(), 1);
                        if let Some(i) = sim.atoms().index_of(AtomTag(1)) {
                            sim.atoms_mut().positions[i].x = 8.0;
                        }
                        sim.remap(&comm).unwrap();
                        let mut tags: Vec<u32> = sim.atoms().tags.iter().map(|t| t.0).collect();
                        tags.sort();
                        tags
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(owned, vec![vec![], vec![2], vec![1, 3]]);
    }

    #[test]
    fn missing_self_coefficients_are_reported() {
        let mut definition = system(&[[1.0, 1.0, 1.0]]);
        definition.masses.push(2.0);
        assert!(matches!(
            LennardJonesSimulation::new(&definition, SlabDecomposition::serial()),
            Err(SimulationError::InvalidSystem(_))
        ));
    }
}
