use super::node::Node;
use std::fmt;
use thiserror::Error;

/// The closed vocabulary of driver commands.
///
/// Data commands are named from the driver's side: `Get*` for `<` tokens (the
/// engine sends), `Set*` for `>` tokens (the engine receives).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Status,
    Exit,
    ExitSim,
    MdExit,
    MdInit,
    OptgInit,
    AtomStep,
    /// `@`-prefixed request to move to a node. `@DEFAULT` is never requested.
    Goto(Node),
    GetNode,
    GetNatoms,
    SetNatoms,
    GetNtypes,
    GetTypes,
    GetMasses,
    GetCell,
    GetCoords,
    SetCoords,
    GetCharges,
    GetEnergy,
    GetPotentialEnergy,
    GetKineticEnergy,
    GetForces,
    SetForces,
    AddPreForces,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Unrecognized command '{0}'")]
pub struct UnknownCommand(pub String);

impl Command {
    pub const ALL: [Command; 28] = [
        Command::Status,
        Command::Exit,
        Command::ExitSim,
        Command::MdExit,
        Command::MdInit,
        Command::OptgInit,
        Command::AtomStep,
        Command::Goto(Node::InitMd),
        Command::Goto(Node::InitOptg),
        Command::Goto(Node::PreForces),
        Command::Goto(Node::Forces),
        Command::Goto(Node::Coords),
        Command::GetNode,
        Command::GetNatoms,
        Command::SetNatoms,
        Command::GetNtypes,
        Command::GetTypes,
        Command::GetMasses,
        Command::GetCell,
        Command::GetCoords,
        Command::SetCoords,
        Command::GetCharges,
        Command::GetEnergy,
        Command::GetPotentialEnergy,
        Command::GetKineticEnergy,
        Command::GetForces,
        Command::SetForces,
        Command::AddPreForces,
    ];

    pub fn token(self) -> &'static str {
        match self {
            Command::Status => "STATUS",
            Command::Exit => "EXIT",
            Command::ExitSim => "EXIT_SIM",
            Command::MdExit => "MD_EXIT",
            Command::MdInit => "MD_INIT",
            Command::OptgInit => "OPTG_INIT",
            Command::AtomStep => "ATOM_STEP",
            Command::Goto(node) => node.name(),
            Command::GetNode => "<@",
            Command::GetNatoms => "<NATOMS",
            Command::SetNatoms => ">NATOMS",
            Command::GetNtypes => "<NTYPES",
            Command::GetTypes => "<TYPES",
            Command::GetMasses => "<MASSES",
            Command::GetCell => "<CELL",
            Command::GetCoords => "<COORDS",
            Command::SetCoords => ">COORDS",
            Command::GetCharges => "<CHARGES",
            Command::GetEnergy => "<ENERGY",
            Command::GetPotentialEnergy => "<PE",
            Command::GetKineticEnergy => "<KE",
            Command::GetForces => "<FORCES",
            Command::SetForces => ">FORCES",
            Command::AddPreForces => "+PRE-FORCES",
        }
    }

    /// Parses a decoded token. Matching is exact and case-sensitive.
    pub fn parse(token: &str) -> Result<Command, UnknownCommand> {
        Command::ALL
            .into_iter()
            .find(|command| command.token() == token)
            .ok_or_else(|| UnknownCommand(token.to_string()))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}
