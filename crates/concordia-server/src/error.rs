//! Error taxonomy.
//!
//! Only configuration errors and resource exhaustion ever reach the operator
//! as fatal. Hook failures are absorbed per player, treaty and input
//! refusals are reported back to the sender.

use concordia_protocol::PlayerId;

/// Configuration rejected before the game may run.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("fixed-length turns need a timeout")]
    FixedLengthWithoutTimeout,
    #[error("cease-fire must last at least one turn")]
    ZeroCeasefire,
    #[error("turn-limit victory is enabled but end_turn is 0")]
    NoEndTurn,
    #[error("spaceship victory is enabled but the space race is disabled")]
    SpaceRaceDisabled,
    #[error("culture victory is enabled with a culture floor of {0}")]
    CultureFloor(i32),
    #[error("teams-alternate phase mode needs at least one team")]
    NoTeams,
}

/// Configuration file could not be read.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("yaml parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure reported by a collaborator hook.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum HookError {
    /// The hook produced no effect; logged and absorbed.
    #[error("{0}")]
    Failed(String),
    /// An identifier space ran out; the game cannot continue.
    #[error("identifier space exhausted: {0}")]
    Exhausted(String),
}

impl HookError {
    pub fn failed(msg: impl Into<String>) -> Self {
        HookError::Failed(msg.into())
    }
}

/// Errors that terminate the control loop.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum FatalError {
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Player registry errors.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("no player slot left")]
    SlotsExhausted,
    #[error("unknown player {0}")]
    UnknownPlayer(PlayerId),
}

/// Why the game could not leave the lobby.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum StartError {
    #[error("game is {0}, not initial")]
    WrongState(concordia_protocol::GameState),
    #[error("need {min} players, have {have}")]
    NotEnoughPlayers { min: usize, have: usize },
    #[error("not all players are ready")]
    NotReady,
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Why a treaty action was refused.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TreatyError {
    #[error("a player cannot make treaties with itself")]
    SamePlayer,
    #[error("unknown player {0}")]
    UnknownPlayer(PlayerId),
    #[error("{0} is not alive")]
    Dead(PlayerId),
    #[error("team relations cannot be changed")]
    TeamPact,
    #[error("cannot go from {from} to {to}")]
    IllegalTransition {
        from: concordia_protocol::DiplState,
        to: concordia_protocol::DiplState,
    },
    #[error("{ally} is allied with one side and at war with the other")]
    AllianceConflict { ally: PlayerId },
}
