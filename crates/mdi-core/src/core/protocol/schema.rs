use super::{command::Command, node::Node};
use phf::{Map, Set, phf_map, phf_set};
use serde::Deserialize;

/// Commands accepted at every node.
static COMMON_COMMANDS: Set<&'static str> = phf_set! {
    "STATUS", "EXIT", "<@", "<CELL", "<CHARGES", "<COORDS", "<MASSES", "<NATOMS",
    "<NTYPES", "<TYPES", ">COORDS", ">NATOMS", "+PRE-FORCES",
};

const DEFAULT_COMMANDS: &[&str] = &["@INIT_MD", "@INIT_OPTG", "MD_INIT", "OPTG_INIT"];

const MD_COMMANDS: &[&str] = &[
    "<ENERGY", "<PE", "<KE", "<FORCES", ">FORCES", "@COORDS", "@FORCES", "@PRE-FORCES",
    "ATOM_STEP", "MD_EXIT", "EXIT_SIM",
];

const OPTG_COMMANDS: &[&str] = &[
    "<ENERGY", "<PE", "<KE", "<FORCES", ">FORCES", "@COORDS", "@FORCES", "ATOM_STEP",
    "MD_EXIT", "EXIT_SIM",
];

/// Node-specific additions, keyed by node name.
static NODE_COMMANDS: Map<&'static str, &'static [&'static str]> = phf_map! {
    "@DEFAULT" => DEFAULT_COMMANDS,
    "@INIT_MD" => MD_COMMANDS,
    "@INIT_OPTG" => OPTG_COMMANDS,
    "@PRE-FORCES" => MD_COMMANDS,
    "@FORCES" => MD_COMMANDS,
    "@COORDS" => MD_COMMANDS,
};

/// How the engine treats a known command received at a node that does not list it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaPolicy {
    /// Reject the command with a protocol error.
    #[default]
    Strict,
    /// Log a warning and dispatch it anyway.
    Permissive,
}

pub fn is_valid(node: Node, command: Command) -> bool {
    let token = command.token();
    COMMON_COMMANDS.contains(token)
        || NODE_COMMANDS
            .get(node.name())
            .is_some_and(|commands| commands.contains(&token))
}

/// All commands accepted at `node`, in vocabulary order.
pub fn commands_at(node: Node) -> Vec<Command> {
    Command::ALL
        .into_iter()
        .filter(|&command| is_valid(node, command))
        .collect()
}
