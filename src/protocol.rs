//! Message shapes exchanged with punters. Names ending in `P` are sent by a
//! punter, names ending in `S` by the server.

use std::convert::TryFrom;

use serde::Serialize;
use serde_json::Value;

use crate::error::DecodeError;
use crate::map::{Map, PunterId, Settings, SiteId};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HandshakeP {
    pub me: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HandshakeS {
    pub you: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SetupS {
    pub punter: PunterId,
    pub punters: usize,
    pub map: Map,
    #[serde(default)]
    pub settings: Settings,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ReadyP {
    pub ready: PunterId,

    // Offline punters carry their state along; we never look inside it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub futures: Vec<Future>,
}

impl ReadyP {
    pub fn new(ready: PunterId) -> ReadyP {
        ReadyP {
            ready,
            state: None,
            futures: Vec::new(),
        }
    }
}

/// A bet that `source` (a mine) will be connected to `target` by the end of
/// the game.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Future {
    pub source: SiteId,
    pub target: SiteId,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TurnS {
    // move is a reserved keyword
    #[serde(rename = "move")]
    pub turn: Moves,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Moves {
    pub moves: Vec<Move>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StopS {
    pub stop: MovesScores,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MovesScores {
    pub moves: Vec<Move>,
    pub scores: Vec<Score>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TimeoutS {
    pub timeout: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Score {
    pub punter: PunterId,
    pub score: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    pub punter: PunterId,
    pub source: SiteId,
    pub target: SiteId,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Pass {
    pub punter: PunterId,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Splurge {
    pub punter: PunterId,
    pub route: Vec<SiteId>,
}

/// One punter's move. On the wire it is an object with exactly one of the
/// keys `claim`, `pass`, `splurge` or `option`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase", try_from = "MoveFields")]
pub enum Move {
    Claim(Claim),
    Pass(Pass),
    Splurge(Splurge),
    Option(Claim),
}

impl Move {
    pub fn pass(punter: PunterId) -> Move {
        Move::Pass(Pass { punter })
    }

    pub fn claim(punter: PunterId, source: SiteId, target: SiteId) -> Move {
        Move::Claim(Claim {
            punter,
            source,
            target,
        })
    }

    pub fn option(punter: PunterId, source: SiteId, target: SiteId) -> Move {
        Move::Option(Claim {
            punter,
            source,
            target,
        })
    }

    pub fn splurge(punter: PunterId, route: Vec<SiteId>) -> Move {
        Move::Splurge(Splurge { punter, route })
    }

    pub fn punter(&self) -> PunterId {
        match self {
            Move::Claim(c) | Move::Option(c) => c.punter,
            Move::Pass(p) => p.punter,
            Move::Splurge(s) => s.punter,
        }
    }

    pub fn is_pass(&self) -> bool {
        match self {
            Move::Pass(_) => true,
            _ => false,
        }
    }
}

/// Every key a move object may carry. Replies from offline punters also
/// carry `state`, which serde skips as an unknown field.
#[derive(Deserialize, Debug, Default)]
pub struct MoveFields {
    claim: Option<Claim>,
    pass: Option<Pass>,
    splurge: Option<Splurge>,
    option: Option<Claim>,
}

impl TryFrom<MoveFields> for Move {
    type Error = DecodeError;

    fn try_from(fields: MoveFields) -> Result<Move, DecodeError> {
        let present = fields.claim.is_some() as usize
            + fields.pass.is_some() as usize
            + fields.splurge.is_some() as usize
            + fields.option.is_some() as usize;
        if present > 1 {
            return Err(DecodeError::AmbiguousMove(present));
        }
        if let Some(claim) = fields.claim {
            Ok(Move::Claim(claim))
        } else if let Some(pass) = fields.pass {
            Ok(Move::Pass(pass))
        } else if let Some(splurge) = fields.splurge {
            Ok(Move::Splurge(splurge))
        } else if let Some(option) = fields.option {
            Ok(Move::Option(option))
        } else {
            Err(DecodeError::EmptyMove)
        }
    }
}

/// Decode a punter's reply to a turn.
pub fn decode_move(payload: &[u8]) -> Result<Move, DecodeError> {
    let fields: MoveFields = serde_json::from_slice(payload)?;
    Move::try_from(fields)
}

pub fn encode<T: Serialize + ?Sized>(msg: &T) -> Result<Vec<u8>, DecodeError> {
    Ok(serde_json::to_vec(msg)?)
}

pub fn decode<T: serde::de::DeserializeOwned>(payload: &[u8]) -> Result<T, DecodeError> {
    Ok(serde_json::from_slice(payload)?)
}

/// Anything the server may send to a punter.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    Handshake(HandshakeS),
    Setup(SetupS),
    Turn(Vec<Move>),
    Timeout(f64),
    Stop(MovesScores),
}

// The union of all server message fields. A message is classified by which
// of these are present after a single parse.
#[derive(Deserialize)]
struct ServerFields {
    you: Option<String>,
    punter: Option<PunterId>,
    punters: Option<usize>,
    map: Option<Map>,
    settings: Option<Settings>,
    #[serde(rename = "move")]
    turn: Option<Moves>,
    stop: Option<MovesScores>,
    timeout: Option<f64>,
}

impl ServerMessage {
    /// Classify a server message by field presence. A stop also carries
    /// moves, so it wins over a turn; setup wins over everything but stop.
    pub fn decode(payload: &[u8]) -> Result<ServerMessage, DecodeError> {
        let fields: ServerFields = serde_json::from_slice(payload)?;
        if let Some(stop) = fields.stop {
            return Ok(ServerMessage::Stop(stop));
        }
        if let Some(map) = fields.map {
            return match (fields.punter, fields.punters) {
                (Some(punter), Some(punters)) => Ok(ServerMessage::Setup(SetupS {
                    punter,
                    punters,
                    map,
                    settings: fields.settings.unwrap_or_default(),
                })),
                _ => Err(DecodeError::UnknownMessage),
            };
        }
        if let Some(timeout) = fields.timeout {
            return Ok(ServerMessage::Timeout(timeout));
        }
        if let Some(turn) = fields.turn {
            return Ok(ServerMessage::Turn(turn.moves));
        }
        if let Some(you) = fields.you {
            return Ok(ServerMessage::Handshake(HandshakeS { you }));
        }
        Err(DecodeError::UnknownMessage)
    }
}
