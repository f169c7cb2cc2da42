use std::fmt;

use serde::Serialize;

/// Protocol phase of a consensus node.
///
/// `Preparing` is part of the protocol vocabulary but no transition enters
/// or leaves it yet; it is reserved for ballot-counter escalation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeState {
    #[default]
    Idle,
    Nominating,
    Preparing,
    Committing,
    Externalizing,
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NodeState::Idle => "IDLE",
            NodeState::Nominating => "NOMINATING",
            NodeState::Preparing => "PREPARING",
            NodeState::Committing => "COMMITTING",
            NodeState::Externalizing => "EXTERNALIZING",
        })
    }
}
