//! # Simulation Interface
//!
//! The integrator and minimizer the engine drives. The engine never integrates or
//! minimizes by itself: it calls the phases exposed by [`Simulation`] in a fixed
//! order and serves the driver between them.
//!
//! A molecular dynamics step is split as
//! `initial_integrate` → `remap` → `compute_forces` → `final_integrate` → `end_step`,
//! and a minimizer iteration as `min_line_step` → `compute_forces` → `min_check`.
//! All phases taking a [`Communicator`] are collective: every worker calls them in
//! the same order.
//!
//! [`LennardJonesSimulation`] is the reference backend.

mod lennard_jones;
pub mod potentials;

pub use lennard_jones::{LennardJonesSimulation, PairCoeff};

use crate::core::comm::{CommError, Communicator};
use crate::core::models::{atom::LocalAtoms, cell::SimulationCell};
use crate::core::units::UnitStyle;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("Minimizer used before setup")]
    MinimizerNotInitialized,

    #[error("Invalid system: {0}")]
    InvalidSystem(String),

    #[error("Corrupt atom record received during migration")]
    CorruptMigration,

    #[error("Worker communication failed: {0}")]
    Comm(#[from] CommError),
}

/// Termination criteria for a minimization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinimizeSettings {
    /// Relative energy change below which the minimizer stops.
    pub energy_tolerance: f64,
    /// Global force norm below which the minimizer stops.
    pub force_tolerance: f64,
    pub max_iterations: usize,
    pub max_evaluations: usize,
    /// Largest distance any atom moves in one line step, in engine length units.
    pub max_displacement: f64,
}

impl MinimizeSettings {
    /// A minimization only the driver can stop.
    pub fn unbounded() -> Self {
        Self {
            energy_tolerance: f64::MIN_POSITIVE,
            force_tolerance: f64::MIN_POSITIVE,
            max_iterations: usize::MAX,
            max_evaluations: usize::MAX,
            max_displacement: 0.1,
        }
    }

    /// Settings for a bounded run of near-zero tolerances.
    pub fn with_caps(max_iterations: usize, max_evaluations: usize) -> Self {
        Self {
            energy_tolerance: 1.0e-100,
            force_tolerance: 1.0e-100,
            max_iterations,
            max_evaluations,
            ..Self::unbounded()
        }
    }
}

impl Default for MinimizeSettings {
    fn default() -> Self {
        Self::unbounded()
    }
}

/// Outcome of a minimizer convergence check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinStatus {
    Continue,
    EnergyTolerance,
    ForceTolerance,
    MaxIterations,
    MaxEvaluations,
}

impl MinStatus {
    pub fn is_finished(self) -> bool {
        self != MinStatus::Continue
    }
}

pub trait Simulation {
    fn units(&self) -> UnitStyle;

    /// Atoms owned by this worker.
    fn atoms(&self) -> &LocalAtoms;

    fn atoms_mut(&mut self) -> &mut LocalAtoms;

    fn cell(&self) -> &SimulationCell;

    /// Global atom count.
    fn natoms(&self) -> usize;

    fn ntypes(&self) -> usize;

    /// Per-type masses, `ntypes + 1` entries with index 0 unused.
    fn masses(&self) -> &[f64];

    /// This worker's share of the potential energy from the last force evaluation.
    fn potential_energy(&self) -> f64;

    /// This worker's share of the kinetic energy.
    fn kinetic_energy(&self) -> f64;

    /// Completed integration steps since the last [`Simulation::init_md`].
    fn step(&self) -> u64;

    /// Prepares a dynamics run. Forces are not evaluated.
    fn init_md(&mut self) -> Result<(), SimulationError>;

    /// Recomputes forces and potential energy for the owned atoms.
    fn compute_forces(&mut self, world: &dyn Communicator) -> Result<(), SimulationError>;

    /// First velocity half-kick and position drift.
    fn initial_integrate(&mut self);

    /// Second velocity half-kick.
    fn final_integrate(&mut self);

    fn end_step(&mut self);

    /// Prepares a minimization. Forces are not evaluated.
    fn min_setup(&mut self, settings: MinimizeSettings) -> Result<(), SimulationError>;

    /// Moves the atoms along the current search direction and remaps them.
    fn min_line_step(&mut self, world: &dyn Communicator) -> Result<(), SimulationError>;

    /// Tests the termination criteria after the forces for the new positions are known.
    fn min_check(&mut self, world: &dyn Communicator) -> Result<MinStatus, SimulationError>;

    /// Wraps positions into the cell, shrink-wraps non-periodic bounds, and hands
    /// atoms to the worker owning their new position.
    fn remap(&mut self, world: &dyn Communicator) -> Result<(), SimulationError>;
}
