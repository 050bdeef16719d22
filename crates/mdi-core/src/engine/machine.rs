use super::config::EngineConfig;
use super::error::{EngineError, ProtocolError, UsageError};
use super::forces::ExternalForceBuffer;
use super::marshal::{self, DriverLink, PerAtomField};
use super::progress::{Progress, ProgressReporter};
use super::state::{EngineState, ExitReason, InitMode, Phase, Stepper};
use crate::core::channel::DriverChannel;
use crate::core::comm::Communicator;
use crate::core::protocol::{Command, Node, READY, SchemaPolicy, schema};
use crate::core::simulation::{MinStatus, MinimizeSettings, Simulation};
use crate::core::units::UnitConversion;
use tracing::{debug, info, trace, warn};

/// Iteration and evaluation caps of a minimization started by `OPTG_INIT`.
const OPTG_INIT_MAX_ITERATIONS: usize = 10_000_000;
const OPTG_INIT_MAX_EVALUATIONS: usize = 10_000_000;

/// The engine side of a driver session on one worker.
///
/// Every worker runs its own `MdiEngine` over the same command stream; the
/// authoritative worker additionally holds the driver channel. [`resume`](Self::resume)
/// is the single entry point: it is called at a node, serves driver commands until
/// control must move elsewhere, and reports why it returned.
///
/// After `MD_INIT` or `OPTG_INIT` the engine steps the simulation itself, calling
/// back into `resume` at `@COORDS` and `@PRE-FORCES` inside every step. After
/// `@INIT_MD` or `@INIT_OPTG` it yields instead and the session loop drives the
/// steps through [`md_step`](Self::md_step) and [`min_iteration`](Self::min_iteration).
pub struct MdiEngine<S, C, W> {
    simulation: S,
    link: DriverLink<C, W>,
    config: EngineConfig,
    conversion: UnitConversion,
    state: EngineState,
    external: ExternalForceBuffer,
    progress: ProgressReporter<'static>,
}

impl<S, C, W> MdiEngine<S, C, W>
where
    S: Simulation,
    C: DriverChannel,
    W: Communicator,
{
    /// `channel` is required on the authoritative worker and ignored elsewhere.
    pub fn new(
        simulation: S,
        channel: Option<C>,
        world: W,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        let natoms = simulation.natoms();
        config.validate(natoms)?;
        let link = DriverLink::new(channel, world)?;
        let conversion = UnitConversion::for_style(simulation.units());

        debug!(
            rank = link.world().rank(),
            natoms,
            units = %simulation.units(),
            policy = ?config.schema_policy,
            "Engine created"
        );

        Ok(Self {
            simulation,
            link,
            config,
            conversion,
            state: EngineState::new(),
            external: ExternalForceBuffer::new(natoms),
            progress: ProgressReporter::new(),
        })
    }

    pub fn with_progress(mut self, progress: ProgressReporter<'static>) -> Self {
        self.progress = progress;
        self
    }

    pub fn simulation(&self) -> &S {
        &self.simulation
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn conversion(&self) -> &UnitConversion {
        &self.conversion
    }

    pub fn external_forces(&self) -> &ExternalForceBuffer {
        &self.external
    }

    pub fn world(&self) -> &W {
        self.link.world()
    }

    pub fn into_simulation(self) -> S {
        self.simulation
    }

    pub(crate) fn report(&self, event: Progress) {
        self.progress.report(event);
    }

    /// Serves driver commands at `entry` until control has to leave it.
    pub fn resume(&mut self, entry: Node) -> Result<ExitReason, EngineError> {
        self.state.current_node = entry;
        if self.state.global_exit || self.state.run_exit {
            return Ok(self.state.exit_reason());
        }
        if self.state.target_pending() {
            trace!(node = %entry, target = ?self.state.target_node, "Passing through node");
            self.state.local_exit = true;
        }

        while !self.state.exit_requested() {
            let command = self.next_command()?;
            self.dispatch(command)?;
            if self.state.target_pending() {
                self.state.local_exit = true;
            }
        }

        self.state.local_exit = false;
        Ok(self.state.exit_reason())
    }

    fn next_command(&mut self) -> Result<Command, EngineError> {
        let token = self.link.recv_command()?;
        let command =
            Command::parse(&token).map_err(|e| ProtocolError::UnknownCommand(e.0))?;
        let node = self.state.current_node;

        if !schema::is_valid(node, command) {
            match self.config.schema_policy {
                SchemaPolicy::Strict => {
                    return Err(ProtocolError::CommandNotAllowedAtNode { command, node }.into());
                }
                SchemaPolicy::Permissive => {
                    warn!(%command, %node, "Command is not listed for this node; serving it anyway");
                }
            }
        }

        self.state.last_command = Some(command);
        self.state.commands_served += 1;
        debug!(%command, %node, depth = self.state.depth, "Serving driver command");
        self.progress.report(Progress::CommandServed { command, node });
        Ok(command)
    }

    fn dispatch(&mut self, command: Command) -> Result<(), EngineError> {
        let natoms = self.simulation.natoms();
        match command {
            Command::Status => self.link.send_command(READY)?,
            Command::Exit => self.state.global_exit = true,
            Command::ExitSim | Command::MdExit => {
                info!(%command, "Driver ended the run");
                self.state.end_run();
            }
            Command::MdInit => {
                self.ensure_uninitialized()?;
                self.simulation.init_md()?;
                self.state.begin_run(
                    InitMode::Md,
                    Stepper::Engine,
                    Phase::NotStarted,
                    Node::InitMd,
                );
                info!("Molecular dynamics initialized by the driver");
            }
            Command::OptgInit => {
                self.ensure_uninitialized()?;
                self.init_optg()?;
            }
            Command::AtomStep => {
                if self.needs_bootstrap() {
                    self.bootstrap()?;
                }
                self.state.target_node = Some(Node::Forces);
                self.advance(command)?;
            }
            Command::Goto(node) => self.goto(node, command)?,
            Command::GetNode => self.link.send_command(self.state.current_node.name())?,
            Command::GetNatoms => self.link.send_i32s(&[natoms as i32])?,
            Command::SetNatoms => {
                let received = self.link.recv_scalar_from_driver()?;
                if usize::try_from(received).ok() != Some(natoms) {
                    return Err(UsageError::AtomCountMismatch {
                        expected: natoms,
                        received,
                    }
                    .into());
                }
            }
            Command::GetNtypes => self.link.send_i32s(&[self.simulation.ntypes() as i32])?,
            Command::GetTypes => {
                let types =
                    marshal::gather_types(self.link.world(), self.simulation.atoms(), natoms)?;
                self.link.send_i32s(&types)?;
            }
            Command::GetMasses => self.link.send_f64s(self.simulation.masses())?,
            Command::GetCell => {
                let cell = self
                    .simulation
                    .cell()
                    .to_array()
                    .map(|v| self.conversion.length_to_driver(v));
                self.link.send_f64s(&cell)?;
            }
            Command::GetCoords => self.send_per_atom(PerAtomField::Positions)?,
            Command::SetCoords => {
                self.recv_per_atom(PerAtomField::Positions)?;
                self.simulation.remap(self.link.world())?;
            }
            Command::GetCharges => self.send_per_atom(PerAtomField::Charges)?,
            Command::GetEnergy | Command::GetPotentialEnergy => {
                self.send_energy(self.simulation.potential_energy())?;
            }
            Command::GetKineticEnergy => self.send_energy(self.simulation.kinetic_energy())?,
            Command::GetForces => self.send_per_atom(PerAtomField::Forces)?,
            Command::SetForces => self.recv_per_atom(PerAtomField::Forces)?,
            Command::AddPreForces => {
                let buffer = self.link.recv_f64s(3 * natoms)?;
                self.external.set_from_driver(&buffer, &self.conversion);
            }
        }
        Ok(())
    }

    fn goto(&mut self, node: Node, command: Command) -> Result<(), EngineError> {
        match node {
            Node::Default | Node::InitMd | Node::InitOptg => {
                self.ensure_uninitialized()?;
                self.state.local_exit = true;
            }
            Node::PreForces => {
                if self.needs_bootstrap() {
                    self.bootstrap()?;
                    self.state.current_node = Node::PreForces;
                    self.state.phase = Phase::Bootstrapped;
                } else {
                    self.state.target_node = Some(Node::PreForces);
                    self.advance(command)?;
                }
            }
            Node::Forces => {
                let md_first_step = self.state.mode == InitMode::Md && self.needs_bootstrap();
                if md_first_step || self.state.phase == Phase::Bootstrapped {
                    if md_first_step {
                        self.bootstrap()?;
                    }
                    self.state.current_node = Node::Forces;
                    self.state.phase = Phase::Running;
                } else {
                    self.state.target_node = Some(Node::Forces);
                    self.advance(command)?;
                }
            }
            Node::Coords => {
                if self.needs_bootstrap() {
                    self.bootstrap()?;
                }
                self.state.target_node = Some(Node::Coords);
                self.advance(command)?;
            }
        }
        Ok(())
    }

    fn ensure_uninitialized(&self) -> Result<(), UsageError> {
        match self.state.mode {
            InitMode::None => Ok(()),
            mode => Err(UsageError::AlreadyInitialized { mode }),
        }
    }

    /// True until the setup evaluation of an engine-initialized run has happened.
    fn needs_bootstrap(&self) -> bool {
        self.state.mode != InitMode::None && self.state.phase == Phase::NotStarted
    }

    fn send_per_atom(&mut self, field: PerAtomField) -> Result<(), EngineError> {
        let buffer = marshal::gather_per_atom(
            self.link.world(),
            self.simulation.atoms(),
            self.simulation.natoms(),
            field,
            &self.conversion,
        )?;
        self.link.send_f64s(&buffer)
    }

    fn recv_per_atom(&mut self, field: PerAtomField) -> Result<(), EngineError> {
        let count = field.components() * self.simulation.natoms();
        let buffer = self.link.recv_f64s(count)?;
        marshal::scatter_per_atom(
            &buffer,
            self.simulation.atoms_mut(),
            field,
            &self.conversion,
        );
        Ok(())
    }

    /// Sums a per-worker energy and sends it in driver units.
    fn send_energy(&mut self, local: f64) -> Result<(), EngineError> {
        let total = self
            .link
            .world()
            .reduce_sum_f64(&[local])?
            .and_then(|v| v.first().copied())
            .unwrap_or_default();
        self.link
            .send_scalar_to_driver(self.conversion.energy_to_driver(total))
    }

    fn evaluate_forces(&mut self) -> Result<(), EngineError> {
        self.simulation.compute_forces(self.link.world())?;
        self.external
            .apply(self.simulation.atoms_mut(), &self.config.group);
        Ok(())
    }

    fn init_optg(&mut self) -> Result<(), EngineError> {
        self.simulation.min_setup(MinimizeSettings::with_caps(
            OPTG_INIT_MAX_ITERATIONS,
            OPTG_INIT_MAX_EVALUATIONS,
        ))?;
        self.evaluate_forces()?;

        let iterations = self.config.optg_bootstrap_iterations;
        for iteration in 0..iterations {
            self.simulation.min_line_step(self.link.world())?;
            self.evaluate_forces()?;
            let status = self.simulation.min_check(self.link.world())?;
            if status.is_finished() {
                debug!(iteration, ?status, "Minimizer finished during bootstrap");
                break;
            }
        }

        self.state.begin_run(
            InitMode::Optg,
            Stepper::Engine,
            Phase::NotStarted,
            Node::InitOptg,
        );
        info!(iterations, "Geometry optimization initialized by the driver");
        Ok(())
    }

    /// Moves the simulation forward until control reaches the target node.
    ///
    /// Inside a step callback, or when the session loop owns stepping, this only
    /// yields; the step already on the stack carries control onward.
    fn advance(&mut self, command: Command) -> Result<(), EngineError> {
        if self.state.mode == InitMode::None {
            return Err(UsageError::NotInitialized(command).into());
        }
        if self.state.stepper == Stepper::Orchestrator || self.state.depth > 0 {
            self.state.local_exit = true;
            return Ok(());
        }

        self.state.phase = Phase::Running;
        loop {
            match self.state.mode {
                InitMode::Md => self.md_step()?,
                InitMode::Optg => {
                    let status = self.min_iteration()?;
                    if status.is_finished() {
                        info!(?status, "Minimizer criteria met; waiting for the driver");
                        self.progress.report(Progress::Message(format!(
                            "Minimizer criteria met ({:?}); waiting for the driver",
                            status
                        )));
                    }
                }
                InitMode::None => break,
            }
            if self.state.global_exit || self.state.run_exit {
                break;
            }
            match self.state.target_node {
                Some(target) if target != self.state.current_node => {}
                _ => break,
            }
        }
        Ok(())
    }

    /// Performs the setup force evaluation that precedes the first step.
    pub fn bootstrap(&mut self) -> Result<(), EngineError> {
        trace!("Evaluating setup forces");
        self.evaluate_forces()
    }

    /// Advances dynamics by one step, serving `@COORDS` and `@PRE-FORCES` on the way.
    pub fn md_step(&mut self) -> Result<(), EngineError> {
        self.state.depth += 1;
        let result = self.md_step_phases();
        self.state.depth -= 1;
        result
    }

    fn md_step_phases(&mut self) -> Result<(), EngineError> {
        self.simulation.initial_integrate();
        self.simulation.remap(self.link.world())?;
        self.resume(Node::Coords)?;

        self.evaluate_forces()?;
        self.resume(Node::PreForces)?;

        self.simulation.final_integrate();
        self.simulation.end_step();
        self.state.current_node = Node::Forces;

        let step = self.simulation.step();
        trace!(step, "Dynamics step completed");
        self.progress.report(Progress::StepCompleted { step });
        Ok(())
    }

    /// Runs one minimizer iteration, serving `@COORDS` and `@PRE-FORCES` on the way.
    pub fn min_iteration(&mut self) -> Result<MinStatus, EngineError> {
        self.state.depth += 1;
        let result = self.min_iteration_phases();
        self.state.depth -= 1;
        result
    }

    fn min_iteration_phases(&mut self) -> Result<MinStatus, EngineError> {
        self.simulation.min_line_step(self.link.world())?;
        self.resume(Node::Coords)?;

        self.evaluate_forces()?;
        self.resume(Node::PreForces)?;

        let status = self.simulation.min_check(self.link.world())?;
        self.state.current_node = Node::Forces;
        Ok(status)
    }

    /// Starts a dynamics run stepped by the session loop.
    pub fn begin_md_run(&mut self) -> Result<(), EngineError> {
        self.ensure_uninitialized()?;
        self.simulation.init_md()?;
        self.state.begin_run(
            InitMode::Md,
            Stepper::Orchestrator,
            Phase::Running,
            Node::InitMd,
        );
        self.progress.report(Progress::PhaseStart {
            name: "Molecular dynamics",
        });
        Ok(())
    }

    /// Starts a geometry optimization stepped by the session loop.
    pub fn begin_optg_run(&mut self) -> Result<(), EngineError> {
        self.ensure_uninitialized()?;
        self.state.begin_run(
            InitMode::Optg,
            Stepper::Orchestrator,
            Phase::Running,
            Node::InitOptg,
        );
        self.progress.report(Progress::PhaseStart {
            name: "Geometry optimization",
        });
        Ok(())
    }

    /// Configures a minimization only the driver can stop, then evaluates setup forces.
    pub fn setup_minimizer(&mut self) -> Result<(), EngineError> {
        self.simulation.min_setup(MinimizeSettings::unbounded())?;
        self.bootstrap()
    }

    /// Acknowledges the end of a run so the session can wait for the next one.
    pub fn finish_run(&mut self) {
        self.state.clear_run_exit();
        self.state.mode = InitMode::None;
        self.state.phase = Phase::NotStarted;
        self.state.target_node = None;
        self.progress.report(Progress::PhaseFinish);
    }

    /// Collective check that every atom tag is owned by exactly one worker.
    pub fn verify_atom_tags(&self) -> Result<(), EngineError> {
        marshal::verify_ownership(
            self.link.world(),
            self.simulation.atoms(),
            self.simulation.natoms(),
        )
    }
}
