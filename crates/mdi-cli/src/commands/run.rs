use crate::cli::RunArgs;
use crate::config::build_config;
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use mdi_engine::core::channel::{DriverChannel, TcpChannel};
use mdi_engine::core::comm::{Communicator, ThreadComm};
use mdi_engine::core::io::SystemDefinition;
use mdi_engine::core::models::decomposition::SlabDecomposition;
use mdi_engine::core::simulation::LennardJonesSimulation;
use mdi_engine::engine::config::EngineConfig;
use mdi_engine::engine::error::EngineError;
use mdi_engine::engine::machine::MdiEngine;
use mdi_engine::engine::progress::ProgressReporter;
use mdi_engine::workflows::session::{self, SessionOutcome};
use std::thread;
use tracing::{debug, error, info, warn};

pub fn run(args: RunArgs) -> Result<()> {
    let config = build_config(&args)?;

    info!("Loading system definition from {:?}", &config.system_path);
    let mut system = SystemDefinition::load(&config.system_path)?;
    if let Some(units) = config.units {
        if units != system.units {
            info!(from = %system.units, to = %units, "Overriding unit style of the system file.");
        }
        system.units = units;
    }
    info!(
        natoms = system.natoms(),
        ntypes = system.ntypes(),
        units = %system.units,
        ranks = config.ranks,
        "System loaded."
    );

    println!(
        "Connecting to driver at {}:{}...",
        config.hostname, config.port
    );
    let channel = TcpChannel::connect(&config.hostname, config.port)?;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    let outcome = serve(&system, &config.engine, config.ranks, channel, reporter)?;

    println!(
        "✓ Driver session complete: {} command(s) served, {} dynamics run(s), {} optimization(s).",
        outcome.commands, outcome.md_runs, outcome.optg_runs
    );
    Ok(())
}

/// Serves `channel` with a world of `ranks` worker threads sharing `system`.
///
/// Rank 0 owns the driver channel and the progress reporter. When several workers
/// fail, the authoritative worker's error is the one returned.
pub fn serve<C>(
    system: &SystemDefinition,
    engine_config: &EngineConfig,
    ranks: usize,
    channel: C,
    reporter: ProgressReporter<'static>,
) -> Result<SessionOutcome>
where
    C: DriverChannel + Send,
{
    let mut channel = Some(channel);
    let mut reporter = Some(reporter);

    thread::scope(|scope| -> Result<SessionOutcome> {
        let mut handles = Vec::with_capacity(ranks);
        for world in ThreadComm::world(ranks) {
            let rank = world.rank();
            let (channel, reporter) = if world.is_root() {
                (channel.take(), reporter.take())
            } else {
                (None, None)
            };
            let config = engine_config.clone();

            let handle = thread::Builder::new()
                .name(format!("rank-{rank}"))
                .spawn_scoped(scope, move || {
                    serve_rank(system, config, world, channel, reporter)
                })?;
            handles.push((rank, handle));
        }

        let mut root_outcome = None;
        let mut root_error = None;
        let mut worker_error = None;
        for (rank, handle) in handles {
            match handle.join() {
                Ok(Ok(outcome)) if rank == 0 => root_outcome = Some(outcome),
                Ok(Ok(_)) => {}
                Ok(Err(e)) if rank == 0 => root_error = Some(CliError::from(e)),
                Ok(Err(EngineError::PeerAborted)) => {
                    debug!(rank, "Worker stopped after the authoritative worker aborted.");
                }
                Ok(Err(e)) => {
                    warn!(rank, "Worker failed: {}", e);
                    worker_error.get_or_insert(CliError::from(e));
                }
                Err(_) => {
                    error!(rank, "Worker thread panicked.");
                    worker_error.get_or_insert(CliError::WorkerPanicked { rank });
                }
            }
        }

        if let Some(e) = root_error.or(worker_error) {
            return Err(e);
        }
        root_outcome.ok_or(CliError::WorkerPanicked { rank: 0 })
    })
}

fn serve_rank<C: DriverChannel>(
    system: &SystemDefinition,
    config: EngineConfig,
    world: ThreadComm,
    channel: Option<C>,
    reporter: Option<ProgressReporter<'static>>,
) -> std::result::Result<SessionOutcome, EngineError> {
    let decomposition = SlabDecomposition::new(world.rank(), world.size());
    let simulation = LennardJonesSimulation::new(system, decomposition)?;
    let mut engine = MdiEngine::new(simulation, channel, world, config)?;
    if let Some(reporter) = reporter {
        engine = engine.with_progress(reporter);
    }
    session::run(&mut engine)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdi_engine::core::channel::{ChannelError, MemoryChannel, memory_pair};

    const SYSTEM: &str = r#"
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
        [[atom]]
        type = 1
        position = [2.0, 2.0, 2.0]
        [[atom]]
        type = 1
        position = [3.3, 2.0, 2.0]
        [[atom]]
        type = 1
        position = [8.0, 6.0, 6.0]
        [[atom]]
        type = 1
        position = [9.2, 6.0, 6.0]
    "#;

    fn system() -> SystemDefinition {
        SystemDefinition::from_toml_str(SYSTEM).unwrap()
    }

    fn scripted(commands: &[&str]) -> (MemoryChannel, MemoryChannel) {
        let (engine_end, mut driver) = memory_pair();
        for command in commands {
            driver.send_command(command).unwrap();
        }
        (engine_end, driver)
    }

    #[test]
    fn split_world_serves_the_same_answers_as_one_worker() {
        let script = ["@INIT_MD", "@FORCES", "<FORCES", "<PE", "MD_EXIT", "EXIT"];

        let (engine_end, mut driver) = scripted(&script);
        let serial = serve(
            &system(),
            &EngineConfig::default(),
            1,
            engine_end,
            ProgressReporter::new(),
        )
        .unwrap();
        let serial_forces = driver.recv_f64s(12).unwrap();
        let serial_pe = driver.recv_f64s(1).unwrap();

        let (engine_end, mut driver) = scripted(&script);
        let split = serve(
            &system(),
            &EngineConfig::default(),
            2,
            engine_end,
            ProgressReporter::new(),
        )
        .unwrap();
        let split_forces = driver.recv_f64s(12).unwrap();
        let split_pe = driver.recv_f64s(1).unwrap();

        assert_eq!(serial, split);
        assert_eq!(split.md_runs, 1);
        for (a, b) in serial_forces.iter().zip(&split_forces) {
            assert!((a - b).abs() < 1e-12, "{a} != {b}");
        }
        assert!((serial_pe[0] - split_pe[0]).abs() < 1e-12);
    }

    #[test]
    fn lost_driver_reports_the_authoritative_error() {
        let (engine_end, driver) = memory_pair();
        drop(driver);

        let result = serve(
            &system(),
            &EngineConfig::default(),
            3,
            engine_end,
            ProgressReporter::new(),
        );
        assert!(matches!(
            result,
            Err(CliError::Engine(EngineError::Channel(ChannelError::Closed)))
        ));
    }
}
