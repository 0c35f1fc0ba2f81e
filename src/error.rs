use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::map::{PunterId, SiteId};

/// Malformed length prefix, oversized or truncated frame. Fatal to the
/// connection it happened on.
#[derive(Debug, Error)]
pub enum FramingError {
    #[error("connection closed")]
    Closed,

    #[error("length prefix missing")]
    MissingLength,

    #[error("received bad size {0:?}")]
    BadLength(String),

    #[error("no ':' within the first {0} bytes of the length prefix")]
    PrefixTooLong(usize),

    #[error("stream closed inside the length prefix {0:?}")]
    UnterminatedLength(String),

    #[error("message of {len} bytes exceeds the {max} byte limit")]
    TooLarge { len: usize, max: usize },

    #[error("stream closed after {got} of {expected} bytes")]
    Truncated { expected: usize, got: usize },

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

/// A payload that does not match any known message shape.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("move carries none of claim, pass, splurge or option")]
    EmptyMove,

    #[error("move carries {0} variants, expected exactly one")]
    AmbiguousMove(usize),

    #[error("unrecognised message")]
    UnknownMessage,
}

/// Failure to receive a reply from a participant.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error(transparent)]
    Framing(#[from] FramingError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("no reply within {0:?}")]
    Timeout(Duration),
}

/// A move that breaks the rules. Never fatal: the move becomes a pass.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuleViolation {
    #[error("move is signed by punter {claimed}, but punter {actual} is moving")]
    WrongPunter { claimed: PunterId, actual: PunterId },

    #[error("no river between {0} and {1}")]
    NoSuchRiver(SiteId, SiteId),

    #[error("river {0}-{1} is already claimed by punter {2}")]
    AlreadyOwned(SiteId, SiteId, PunterId),

    #[error("river {0}-{1} already carries an option")]
    AlreadyOptioned(SiteId, SiteId),

    #[error("{0} are disabled")]
    Disabled(&'static str),

    #[error("needs {needed} options, has {available}")]
    InsufficientOptions { needed: usize, available: usize },

    #[error("route of {0} sites is too short")]
    RouteTooShort(usize),

    #[error("needs {needed} lethargy, has {available}")]
    InsufficientLethargy { needed: usize, available: usize },

    #[error("route uses river {0}-{1} more than once")]
    RepeatedRiver(SiteId, SiteId),
}

/// A participant that answered, but not the way it was asked to. Logged only.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolMismatch {
    #[error("punter {expected} answered ready as {got}")]
    ReadyId { expected: PunterId, got: PunterId },

    #[error("punter {punter} sent futures, but futures are disabled")]
    FuturesDisabled { punter: PunterId },

    // Not named source/target: thiserror would take `source` for the cause.
    #[error("punter {punter} bet on {mine}-{site}, which is not a mine to a plain site")]
    InvalidFuture {
        punter: PunterId,
        mine: SiteId,
        site: SiteId,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("no river between {0} and {1}")]
    NotFound(SiteId, SiteId),
}

impl From<GraphError> for RuleViolation {
    fn from(err: GraphError) -> RuleViolation {
        match err {
            GraphError::NotFound(a, b) => RuleViolation::NoSuchRiver(a, b),
        }
    }
}

#[derive(Debug, Error)]
pub enum MapError {
    #[error("could not read map: {0}")]
    Io(#[from] io::Error),

    #[error("could not parse map: {0}")]
    Json(#[from] serde_json::Error),

    #[error("site {0} is listed twice")]
    DuplicateSite(SiteId),

    #[error("mine {0} is not a site")]
    UnknownMine(SiteId),

    #[error("mine {0} is listed twice")]
    DuplicateMine(SiteId),

    #[error("river {0}-{1} references an unknown site")]
    UnknownSite(SiteId, SiteId),

    #[error("river {0}-{1} is listed twice")]
    DuplicateRiver(SiteId, SiteId),

    #[error("river {0}-{0} loops onto itself")]
    SelfLoop(SiteId),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Options(#[from] getopts::Fail),

    #[error("invalid value {value:?} for --{flag}")]
    InvalidValue { flag: &'static str, value: String },
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Framing(#[from] FramingError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("unexpected message: {0}")]
    Unexpected(&'static str),
}
