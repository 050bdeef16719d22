use crate::core::protocol::{Command, Node};
use std::fmt;

/// How far the current run has progressed through its first force evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Initialized, no forces evaluated yet.
    #[default]
    NotStarted,
    /// Forces evaluated on an `@PRE-FORCES` request; the next `@FORCES` moves to
    /// the forces node without stepping.
    Bootstrapped,
    Running,
}

/// The propagation method of the current run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InitMode {
    #[default]
    None,
    Md,
    Optg,
}

impl fmt::Display for InitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InitMode::None => "none",
            InitMode::Md => "molecular dynamics",
            InitMode::Optg => "geometry optimization",
        })
    }
}

/// Who advances the simulation between nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stepper {
    /// The engine steps on its own, after `MD_INIT` or `OPTG_INIT`.
    #[default]
    Engine,
    /// The session loop steps, after `@INIT_MD` or `@INIT_OPTG`.
    Orchestrator,
}

/// Why [`MdiEngine::resume`](super::machine::MdiEngine::resume) returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The driver ended the session.
    Exit,
    /// The driver ended the current run.
    EndRun,
    /// Control must move to another node before commands are served again.
    Yield,
}

/// Control state shared by every re-entrant call into the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineState {
    pub current_node: Node,
    /// Node a driver request is waiting for; persists across calls until reached.
    pub target_node: Option<Node>,
    pub phase: Phase,
    pub mode: InitMode,
    pub stepper: Stepper,
    pub global_exit: bool,
    pub local_exit: bool,
    pub run_exit: bool,
    pub last_command: Option<Command>,
    /// Nesting of step callbacks currently on the stack.
    pub depth: usize,
    pub commands_served: u64,
}

impl Default for EngineState {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineState {
    pub fn new() -> Self {
        Self {
            current_node: Node::Default,
            target_node: None,
            phase: Phase::NotStarted,
            mode: InitMode::None,
            stepper: Stepper::Engine,
            global_exit: false,
            local_exit: false,
            run_exit: false,
            last_command: None,
            depth: 0,
            commands_served: 0,
        }
    }

    #[inline]
    pub fn exit_requested(&self) -> bool {
        self.global_exit || self.run_exit || self.local_exit
    }

    pub fn exit_reason(&self) -> ExitReason {
        if self.global_exit {
            ExitReason::Exit
        } else if self.run_exit {
            ExitReason::EndRun
        } else {
            ExitReason::Yield
        }
    }

    /// Whether control has not yet reached a pending target.
    #[inline]
    pub fn target_pending(&self) -> bool {
        self.target_node.is_some_and(|t| t != self.current_node)
    }

    pub fn begin_run(&mut self, mode: InitMode, stepper: Stepper, phase: Phase, node: Node) {
        self.mode = mode;
        self.stepper = stepper;
        self.phase = phase;
        self.current_node = node;
        self.target_node = None;
        self.run_exit = false;
    }

    /// Marks the current run as ended by the driver.
    pub fn end_run(&mut self) {
        self.mode = InitMode::None;
        self.phase = Phase::NotStarted;
        self.target_node = None;
        self.run_exit = true;
    }

    /// Acknowledges a run end so the session can start another run.
    pub fn clear_run_exit(&mut self) {
        self.run_exit = false;
        self.stepper = Stepper::Engine;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_waits_at_default_without_target() {
        let state = EngineState::new();
        assert_eq!(state.current_node, Node::Default);
        assert_eq!(state.target_node, None);
        assert!(!state.exit_requested());
        assert_eq!(state.exit_reason(), ExitReason::Yield);
    }

    #[test]
    fn global_exit_outranks_run_exit() {
        let mut state = EngineState::new();
        state.run_exit = true;
        assert_eq!(state.exit_reason(), ExitReason::EndRun);
        state.global_exit = true;
        assert_eq!(state.exit_reason(), ExitReason::Exit);
    }

    #[test]
    fn end_run_clears_mode_and_target() {
        let mut state = EngineState::new();
        state.begin_run(InitMode::Md, Stepper::Engine, Phase::Running, Node::InitMd);
        state.target_node = Some(Node::Forces);
        state.end_run();
        assert_eq!(state.mode, InitMode::None);
        assert_eq!(state.target_node, None);
        assert!(state.run_exit);
        state.clear_run_exit();
        assert!(!state.exit_requested());
    }

    #[test]
    fn target_is_pending_until_reached() {
        let mut state = EngineState::new();
        assert!(!state.target_pending());
        state.target_node = Some(Node::Forces);
        assert!(state.target_pending());
        state.current_node = Node::Forces;
        assert!(!state.target_pending());
    }
}
