use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A named synchronization point at which the engine pauses and serves commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Node {
    Default,
    InitMd,
    InitOptg,
    PreForces,
    Forces,
    Coords,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Unknown node name '{0}'")]
pub struct ParseNodeError(pub String);

impl Node {
    pub const ALL: [Node; 6] = [
        Node::Default,
        Node::InitMd,
        Node::InitOptg,
        Node::PreForces,
        Node::Forces,
        Node::Coords,
    ];

    /// The node name as exchanged with the driver.
    pub fn name(self) -> &'static str {
        match self {
            Node::Default => "@DEFAULT",
            Node::InitMd => "@INIT_MD",
            Node::InitOptg => "@INIT_OPTG",
            Node::PreForces => "@PRE-FORCES",
            Node::Forces => "@FORCES",
            Node::Coords => "@COORDS",
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Node {
    type Err = ParseNodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Node::ALL
            .into_iter()
            .find(|node| node.name() == s)
            .ok_or_else(|| ParseNodeError(s.to_string()))
    }
}
