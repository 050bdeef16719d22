use crate::core::channel::DriverChannel;
use crate::core::comm::Communicator;
use crate::core::protocol::{Command, Node};
use crate::core::simulation::Simulation;
use crate::engine::error::{EngineError, ProtocolError};
use crate::engine::machine::MdiEngine;
use crate::engine::progress::Progress;
use crate::engine::state::ExitReason;
use tracing::{debug, info, instrument};

/// Summary of a finished driver session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionOutcome {
    /// Dynamics runs started with `@INIT_MD`.
    pub md_runs: usize,
    /// Optimizations started with `@INIT_OPTG`.
    pub optg_runs: usize,
    pub commands: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Exit,
}

/// Serves a driver from `@DEFAULT` until it sends `EXIT`.
///
/// Runs requested with `MD_INIT` or `OPTG_INIT` are stepped inside the engine. Runs
/// requested with `@INIT_MD` or `@INIT_OPTG` are stepped here, resuming the engine at
/// `@FORCES` after every step until the driver ends the run.
#[instrument(skip_all, name = "driver_session")]
pub fn run<S, C, W>(engine: &mut MdiEngine<S, C, W>) -> Result<SessionOutcome, EngineError>
where
    S: Simulation,
    C: DriverChannel,
    W: Communicator,
{
    engine.verify_atom_tags()?;
    info!(
        natoms = engine.simulation().natoms(),
        workers = engine.world().size(),
        "Atom ownership verified. Waiting for driver commands."
    );

    let mut outcome = SessionOutcome::default();
    loop {
        match engine.resume(Node::Default)? {
            ExitReason::Exit => break,
            ExitReason::EndRun => {
                engine.finish_run();
                continue;
            }
            ExitReason::Yield => {}
        }

        let flow = match engine.state().last_command {
            Some(Command::Goto(Node::InitMd)) => {
                outcome.md_runs += 1;
                run_md(engine)?
            }
            Some(Command::Goto(Node::InitOptg)) => {
                outcome.optg_runs += 1;
                run_optg(engine)?
            }
            Some(command) => {
                return Err(ProtocolError::UnsupportedCommand {
                    command,
                    node: Node::Default,
                }
                .into());
            }
            None => break,
        };
        if flow == Flow::Exit {
            break;
        }
    }

    outcome.commands = engine.state().commands_served;
    info!(
        md_runs = outcome.md_runs,
        optg_runs = outcome.optg_runs,
        commands = outcome.commands,
        "Driver session complete."
    );
    Ok(outcome)
}

/// Maps an engine return to the end of the current run, if it ended.
fn run_ended<S, C, W>(engine: &mut MdiEngine<S, C, W>, reason: ExitReason) -> Option<Flow>
where
    S: Simulation,
    C: DriverChannel,
    W: Communicator,
{
    match reason {
        ExitReason::Exit => {
            engine.report(Progress::PhaseFinish);
            Some(Flow::Exit)
        }
        ExitReason::EndRun => {
            engine.finish_run();
            Some(Flow::Continue)
        }
        ExitReason::Yield => None,
    }
}

fn run_md<S, C, W>(engine: &mut MdiEngine<S, C, W>) -> Result<Flow, EngineError>
where
    S: Simulation,
    C: DriverChannel,
    W: Communicator,
{
    // === Phase 1: Initialization ===
    engine.begin_md_run()?;
    info!("Driver requested molecular dynamics.");
    let reason = engine.resume(Node::InitMd)?;
    if let Some(flow) = run_ended(engine, reason) {
        return Ok(flow);
    }

    // === Phase 2: Setup forces ===
    engine.bootstrap()?;
    let reason = engine.resume(Node::Forces)?;
    if let Some(flow) = run_ended(engine, reason) {
        return Ok(flow);
    }

    // === Phase 3: One step per driver request ===
    loop {
        engine.md_step()?;
        let reason = engine.resume(Node::Forces)?;
        if let Some(flow) = run_ended(engine, reason) {
            debug!(step = engine.simulation().step(), "Dynamics run ended.");
            return Ok(flow);
        }
    }
}

fn run_optg<S, C, W>(engine: &mut MdiEngine<S, C, W>) -> Result<Flow, EngineError>
where
    S: Simulation,
    C: DriverChannel,
    W: Communicator,
{
    // === Phase 1: Initialization ===
    engine.begin_optg_run()?;
    info!("Driver requested geometry optimization.");
    let reason = engine.resume(Node::InitOptg)?;
    if let Some(flow) = run_ended(engine, reason) {
        return Ok(flow);
    }

    // === Phase 2: Minimizer setup ===
    engine.setup_minimizer()?;
    let reason = engine.resume(Node::Forces)?;
    if let Some(flow) = run_ended(engine, reason) {
        return Ok(flow);
    }

    // === Phase 3: One iteration per driver request ===
    loop {
        let status = engine.min_iteration()?;
        let reason = engine.resume(Node::Forces)?;
        if let Some(flow) = run_ended(engine, reason) {
            return Ok(flow);
        }
        if status.is_finished() {
            return Err(ProtocolError::OptimizationEnded { status }.into());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::channel::{MemoryChannel, memory_pair};
    use crate::core::comm::SerialComm;
    use crate::core::io::SystemDefinition;
    use crate::core::models::decomposition::SlabDecomposition;
    use crate::core::simulation::MinStatus;
    use crate::core::simulation::LennardJonesSimulation;
    use crate::engine::config::EngineConfig;
    use crate::engine::error::UsageError;

    const HEADER: &str = r#"
        units = "real"
        cutoff = 4.0
        masses = [12.0]
        [cell]
        lo = [0.0, 0.0, 0.0]
        hi = [12.0, 12.0, 12.0]
        [[pair]]
        types = [1, 1]
        epsilon = 0.2
        sigma = 1.0
    "#;

    const DIMER: &str = r#"
        [[atom]]
        type = 1
        position = [2.0, 2.0, 2.0]
        [[atom]]
        type = 1
        position = [3.3, 2.0, 2.0]
    "#;

    fn engine(
        atoms: &str,
    ) -> (
        MdiEngine<LennardJonesSimulation, MemoryChannel, SerialComm>,
        MemoryChannel,
    ) {
        let system = SystemDefinition::from_toml_str(&format!("{HEADER}{atoms}")).unwrap();
        let sim = LennardJonesSimulation::new(&system, SlabDecomposition::serial()).unwrap();
        let (engine_end, driver) = memory_pair();
        let engine =
            MdiEngine::new(sim, Some(engine_end), SerialComm, EngineConfig::default()).unwrap();
        (engine, driver)
    }

    fn script(driver: &mut MemoryChannel, commands: &[&str]) {
        for command in commands {
            driver.send_command(command).unwrap();
        }
    }

    #[test]
    fn exit_at_default_ends_an_empty_session() {
        let (mut engine, mut driver) = engine(DIMER);
        script(&mut driver, &["STATUS", "EXIT"]);
        let outcome = run(&mut engine).unwrap();
        assert_eq!(
            outcome,
            SessionOutcome {
                md_runs: 0,
                optg_runs: 0,
                commands: 2
            }
        );
        assert_eq!(driver.recv_command().unwrap(), "READY");
    }

    #[test]
    fn orchestrated_dynamics_steps_once_per_forces_request() {
        let (mut engine, mut driver) = engine(DIMER);
        script(
            &mut driver,
            &[
                "@INIT_MD", "@FORCES", "<FORCES", "@FORCES", "<FORCES", "@FORCES", "<@",
                "EXIT_SIM", "EXIT",
            ],
        );

        let outcome = run(&mut engine).unwrap();
        assert_eq!(outcome.md_runs, 1);
        assert_eq!(outcome.commands, 9);
        assert_eq!(engine.simulation().step(), 2);
        assert_eq!(engine.simulation().evaluations(), 3);

        let before = driver.recv_f64s(6).unwrap();
        let after = driver.recv_f64s(6).unwrap();
        assert_ne!(before, after);
        assert_eq!(driver.recv_command().unwrap(), "@FORCES");
    }

    #[test]
    fn coords_node_is_reachable_in_an_orchestrated_run() {
        let (mut engine, mut driver) = engine(DIMER);
        script(
            &mut driver,
            &["@INIT_MD", "@COORDS", "<@", "@FORCES", "<@", "MD_EXIT", "EXIT"],
        );

        run(&mut engine).unwrap();
        assert_eq!(driver.recv_command().unwrap(), "@COORDS");
        assert_eq!(driver.recv_command().unwrap(), "@FORCES");
        assert_eq!(engine.simulation().step(), 1);
    }

    #[test]
    fn orchestrated_optimization_lowers_energy() {
        let (mut engine, mut driver) = engine(DIMER);
        script(
            &mut driver,
            &["@INIT_OPTG", "@FORCES", "<PE", "@FORCES", "<PE", "EXIT"],
        );

        let outcome = run(&mut engine).unwrap();
        assert_eq!(outcome.optg_runs, 1);
        let first = driver.recv_f64s(1).unwrap()[0];
        let second = driver.recv_f64s(1).unwrap()[0];
        assert!(second < first, "{second} >= {first}");
    }

    #[test]
    fn engine_stepped_and_orchestrated_runs_share_a_session() {
        let (mut engine, mut driver) = engine(DIMER);
        script(
            &mut driver,
            &["MD_INIT", "ATOM_STEP", "EXIT_SIM", "@INIT_MD", "MD_EXIT", "EXIT"],
        );

        let outcome = run(&mut engine).unwrap();
        assert_eq!(outcome.md_runs, 1);
        assert_eq!(outcome.commands, 6);
        assert_eq!(engine.simulation().step(), 0);
    }

    #[test]
    fn optimizer_that_stops_on_its_own_is_a_protocol_error() {
        let single = r#"
            [[atom]]
            type = 1
            position = [5.0, 5.0, 5.0]
        "#;
        let (mut engine, mut driver) = engine(single);
        script(&mut driver, &["@INIT_OPTG", "@FORCES", "@FORCES", "@FORCES"]);

        assert!(matches!(
            run(&mut engine),
            Err(EngineError::Protocol(ProtocolError::OptimizationEnded {
                status: MinStatus::EnergyTolerance
            }))
        ));
    }

    #[test]
    fn gaps_in_atom_tags_are_rejected_before_serving() {
        let gapped = r#"
            [[atom]]
            tag = 1
            type = 1
            position = [2.0, 2.0, 2.0]
            [[atom]]
            tag = 3
            type = 1
            position = [5.0, 2.0, 2.0]
        "#;
        let (mut engine, mut driver) = engine(gapped);
        script(&mut driver, &["EXIT"]);

        assert!(matches!(
            run(&mut engine),
            Err(EngineError::Usage(UsageError::NonConsecutiveTags { natoms: 2 }))
        ));
        assert_eq!(engine.state().commands_served, 0);
    }
}
