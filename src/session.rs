//! One game: the roster, the turn loop and the move rules.
//!
//! `Game` holds everything that decides the outcome (graph, budgets, the move
//! buffer) and knows nothing about sockets. `Session` drives a `Game` through
//! the protocol phases, talking to each punter over a `Link`.

use std::collections::HashSet;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{FramingError, LinkError, ProtocolMismatch, RuleViolation};
use crate::graph::GameGraph;
use crate::map::{Map, PunterId, Settings, SiteId};
use crate::protocol::{
    self, Claim, Future, HandshakeP, HandshakeS, Move, Moves, MovesScores, ReadyP, Score, SetupS,
    Splurge, StopS, TimeoutS, TurnS,
};
use crate::scoring;

/// A framed, bidirectional channel to one punter.
pub trait Link {
    fn send(&mut self, payload: &[u8]) -> Result<(), FramingError>;

    /// Wait up to `timeout` for the next message.
    fn recv(&mut self, timeout: Duration) -> Result<Vec<u8>, LinkError>;

    /// Throw away messages that arrived unasked, e.g. a reply that came in
    /// after its turn had timed out. Returns how many were dropped.
    fn discard_pending(&mut self) -> usize;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub setup: Duration,
    pub turn: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Timeouts {
            setup: Duration::from_secs(10),
            turn: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Handshaking,
    AwaitingSetupAck,
    Playing,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PunterState {
    pub id: PunterId,

    /// `None` until the punter has introduced itself.
    pub name: Option<String>,

    /// Lethargy: one per pass, spent one per river on splurges.
    pub splurge_budget: usize,
    pub option_budget: usize,
    pub futures: Vec<Future>,
}

/// The rules of the game, independent of how moves arrive.
#[derive(Debug, Clone)]
pub struct Game {
    graph: GameGraph,
    mines: Vec<SiteId>,
    settings: Settings,
    punters: Vec<PunterState>,

    // Most recent move of every punter, as sent with each turn.
    moves: Vec<Move>,
    turn: usize,
}

impl Game {
    pub fn new(map: &Map, punters: usize, settings: Settings) -> Game {
        Game {
            graph: GameGraph::new(map),
            mines: map.mines.clone(),
            settings,
            punters: (0..punters)
                .map(|id| PunterState {
                    id,
                    name: None,
                    splurge_budget: 0,
                    option_budget: map.mines.len(),
                    futures: Vec::new(),
                })
                .collect(),
            moves: (0..punters).map(Move::pass).collect(),
            turn: 0,
        }
    }

    pub fn graph(&self) -> &GameGraph {
        &self.graph
    }

    pub fn settings(&self) -> Settings {
        self.settings
    }

    pub fn punters(&self) -> &[PunterState] {
        &self.punters
    }

    pub fn punter(&self, id: PunterId) -> &PunterState {
        &self.punters[id]
    }

    pub fn set_name(&mut self, id: PunterId, name: String) {
        self.punters[id].name = Some(name);
    }

    pub fn moves(&self) -> &[Move] {
        &self.moves
    }

    pub fn turn(&self) -> usize {
        self.turn
    }

    /// One turn per river, whatever the punters do with them.
    pub fn total_turns(&self) -> usize {
        self.graph.river_count()
    }

    pub fn is_over(&self) -> bool {
        self.punters.is_empty() || self.turn >= self.total_turns()
    }

    pub fn current_punter(&self) -> PunterId {
        self.turn % self.punters.len()
    }

    /// Record the futures a punter bet on during setup, dropping any that are
    /// not allowed. A later bet on the same mine replaces an earlier one.
    pub fn set_futures(
        &mut self,
        punter: PunterId,
        futures: &[Future],
    ) -> Result<(), ProtocolMismatch> {
        if futures.is_empty() {
            return Ok(());
        }
        if !self.settings.futures {
            return Err(ProtocolMismatch::FuturesDisabled { punter });
        }
        let mut accepted: Vec<Future> = Vec::new();
        let mut result = Ok(());
        for future in futures {
            let valid = self.mines.contains(&future.source)
                && !self.mines.contains(&future.target)
                && self.graph.sites().contains(&future.target);
            if !valid {
                result = Err(ProtocolMismatch::InvalidFuture {
                    punter,
                    mine: future.source,
                    site: future.target,
                });
                continue;
            }
            accepted.retain(|f| f.source != future.source);
            accepted.push(*future);
        }
        self.punters[punter].futures = accepted;
        result
    }

    /// Check `mv` against the rules without changing anything.
    pub fn validate(&self, punter: PunterId, mv: &Move) -> Result<(), RuleViolation> {
        if mv.punter() != punter {
            return Err(RuleViolation::WrongPunter {
                claimed: mv.punter(),
                actual: punter,
            });
        }
        match mv {
            Move::Pass(_) => Ok(()),
            Move::Claim(claim) => self.validate_claim(claim),
            Move::Option(option) => self.validate_option(punter, option),
            Move::Splurge(splurge) => self.validate_splurge(punter, splurge),
        }
    }

    fn validate_claim(&self, claim: &Claim) -> Result<(), RuleViolation> {
        let river = self.graph.edge_between(claim.source, claim.target)?;
        match river.owner {
            Some(owner) => Err(RuleViolation::AlreadyOwned(claim.source, claim.target, owner)),
            None => Ok(()),
        }
    }

    fn validate_option(&self, punter: PunterId, option: &Claim) -> Result<(), RuleViolation> {
        if !self.settings.options {
            return Err(RuleViolation::Disabled("options"));
        }
        let available = self.punters[punter].option_budget;
        if available < 1 {
            return Err(RuleViolation::InsufficientOptions {
                needed: 1,
                available,
            });
        }
        let river = self.graph.edge_between(option.source, option.target)?;
        if river.is_optioned() {
            return Err(RuleViolation::AlreadyOptioned(option.source, option.target));
        }
        Ok(())
    }

    fn validate_splurge(&self, punter: PunterId, splurge: &Splurge) -> Result<(), RuleViolation> {
        if !self.settings.splurges {
            return Err(RuleViolation::Disabled("splurges"));
        }
        let route = &splurge.route;
        if route.len() < 2 {
            return Err(RuleViolation::RouteTooShort(route.len()));
        }
        let state = &self.punters[punter];
        let needed = route.len() - 1;
        if needed > state.splurge_budget {
            return Err(RuleViolation::InsufficientLethargy {
                needed,
                available: state.splurge_budget,
            });
        }

        let mut seen = HashSet::with_capacity(needed);
        let mut options_needed = 0;
        for step in route.windows(2) {
            let (source, target) = (step[0], step[1]);
            let id = self.graph.river_id(source, target)?;
            if !seen.insert(id) {
                return Err(RuleViolation::RepeatedRiver(source, target));
            }
            let river = self.graph.river(id);
            match river.owner {
                Some(owner) if owner != punter => {
                    if !self.settings.options {
                        return Err(RuleViolation::AlreadyOwned(source, target, owner));
                    }
                    if river.is_optioned() {
                        return Err(RuleViolation::AlreadyOptioned(source, target));
                    }
                    options_needed += 1;
                }
                _ => {}
            }
        }

        if options_needed > state.option_budget {
            return Err(RuleViolation::InsufficientOptions {
                needed: options_needed,
                available: state.option_budget,
            });
        }
        Ok(())
    }

    /// Validate and carry out `mv` for `punter`. On error nothing has changed.
    pub fn apply(&mut self, punter: PunterId, mv: &Move) -> Result<(), RuleViolation> {
        self.validate(punter, mv)?;
        match mv {
            Move::Pass(_) => {
                self.punters[punter].splurge_budget += 1;
            }
            Move::Claim(claim) => {
                self.graph.mark_owned(claim.source, claim.target, punter)?;
            }
            Move::Option(option) => {
                self.graph.mark_optioned(option.source, option.target, punter)?;
                self.punters[punter].option_budget -= 1;
            }
            Move::Splurge(splurge) => {
                for step in splurge.route.windows(2) {
                    let (source, target) = (step[0], step[1]);
                    let owner = self.graph.edge_between(source, target)?.owner;
                    match owner {
                        None => self.graph.mark_owned(source, target, punter)?,
                        Some(owner) if owner != punter => {
                            self.graph.mark_optioned(source, target, punter)?;
                            self.punters[punter].option_budget -= 1;
                        }
                        Some(_) => {}
                    }
                }
                self.punters[punter].splurge_budget -= splurge.route.len() - 1;
            }
        }
        Ok(())
    }

    /// Play the current turn with the punter's reply, if any. Anything that
    /// breaks the rules becomes a pass. Returns the move that was recorded.
    pub fn play_turn(&mut self, reply: Option<Move>) -> Move {
        let punter = self.current_punter();
        let recorded = match reply {
            Some(mv) => match self.apply(punter, &mv) {
                Ok(()) => mv,
                Err(violation) => {
                    warn!(punter, attempted = ?mv, "{}; passing instead", violation);
                    self.pass(punter)
                }
            },
            None => self.pass(punter),
        };
        self.moves[punter] = recorded.clone();
        self.turn += 1;
        recorded
    }

    fn pass(&mut self, punter: PunterId) -> Move {
        self.punters[punter].splurge_budget += 1;
        Move::pass(punter)
    }

    pub fn scores(&self) -> Vec<Score> {
        let futures: Vec<Vec<Future>> = self.punters.iter().map(|p| p.futures.clone()).collect();
        scoring::score(&self.graph, &self.mines, self.punters.len(), &futures)
    }
}

/// Outcome of a finished session.
#[derive(Debug, Clone, PartialEq)]
pub struct GameResult {
    pub names: Vec<String>,
    pub scores: Vec<Score>,
    pub moves: Vec<Move>,
    pub turns: usize,
}

const DISCONNECTED: &str = "<disconnected>";

pub struct Session<L> {
    map: Map,
    game: Game,
    links: Vec<Option<L>>,
    timeouts: Timeouts,
    phase: Phase,
}

impl<L: Link> Session<L> {
    /// `links[i]` becomes punter `i`.
    pub fn new(map: Map, settings: Settings, links: Vec<L>, timeouts: Timeouts) -> Session<L> {
        Session {
            game: Game::new(&map, links.len(), settings),
            map,
            links: links.into_iter().map(Some).collect(),
            timeouts,
            phase: Phase::Handshaking,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn game(&self) -> &Game {
        &self.game
    }

    pub fn is_connected(&self, punter: PunterId) -> bool {
        self.links[punter].is_some()
    }

    /// Run the game to completion. Misbehaving punters are dropped or made to
    /// pass; the session itself always finishes.
    pub fn play(mut self) -> GameResult {
        self.handshake();
        self.setup();
        self.run_turns();
        self.stop()
    }

    fn handshake(&mut self) {
        self.phase = Phase::Handshaking;
        for id in 0..self.links.len() {
            let hello: HandshakeP = match self.recv(id, self.timeouts.setup) {
                Ok(hello) => hello,
                Err(err) => {
                    self.disconnect(id, &err);
                    continue;
                }
            };
            info!(punter = id, "Welcome, {}!", hello.me);
            self.game.set_name(id, hello.me.clone());
            self.send(id, &HandshakeS { you: hello.me });
        }
    }

    fn setup(&mut self) {
        self.phase = Phase::AwaitingSetupAck;
        let punters = self.links.len();
        for id in 0..punters {
            if !self.is_connected(id) {
                continue;
            }
            let setup = SetupS {
                punter: id,
                punters,
                map: self.map.clone(),
                settings: self.game.settings(),
            };
            if !self.send(id, &setup) {
                continue;
            }
            let ready: ReadyP = match self.recv(id, self.timeouts.setup) {
                Ok(ready) => ready,
                Err(err) => {
                    self.disconnect(id, &err);
                    continue;
                }
            };
            if ready.ready != id {
                let mismatch = ProtocolMismatch::ReadyId {
                    expected: id,
                    got: ready.ready,
                };
                warn!(punter = id, "{}", mismatch);
            }
            if let Err(mismatch) = self.game.set_futures(id, &ready.futures) {
                warn!(punter = id, "{}", mismatch);
            }
        }
    }

    fn run_turns(&mut self) {
        self.phase = Phase::Playing;
        info!(
            punters = self.links.len(),
            turns = self.game.total_turns(),
            "starting game"
        );
        while !self.game.is_over() {
            let id = self.game.current_punter();
            let reply = self.request_move(id);
            let recorded = self.game.play_turn(reply);
            debug!(turn = self.game.turn(), punter = id, "{:?}", recorded);
        }
    }

    fn request_move(&mut self, id: PunterId) -> Option<Move> {
        let stale = self.links[id].as_mut()?.discard_pending();
        if stale > 0 {
            warn!(punter = id, stale, "dropped late replies");
        }

        let turn = TurnS {
            turn: Moves {
                moves: self.game.moves().to_vec(),
            },
        };
        if !self.send(id, &turn) {
            return None;
        }

        match self.recv_move(id) {
            Ok(mv) => Some(mv),
            Err(LinkError::Timeout(limit)) => {
                warn!(punter = id, "no move within {:?}; passing instead", limit);
                self.send(
                    id,
                    &TimeoutS {
                        timeout: limit.as_secs_f64(),
                    },
                );
                None
            }
            Err(err) => {
                self.disconnect(id, &err);
                None
            }
        }
    }

    fn stop(mut self) -> GameResult {
        let scores = self.game.scores();
        let stop = StopS {
            stop: MovesScores {
                moves: self.game.moves().to_vec(),
                scores: scores.clone(),
            },
        };
        for id in 0..self.links.len() {
            if self.is_connected(id) {
                self.send(id, &stop);
            }
        }
        self.phase = Phase::Stopped;
        info!("game over, scores: {:?}", scores);

        GameResult {
            names: self
                .game
                .punters()
                .iter()
                .map(|p| p.name.clone().unwrap_or_else(|| DISCONNECTED.to_string()))
                .collect(),
            moves: self.game.moves().to_vec(),
            turns: self.game.turn(),
            scores,
        }
    }

    /// Returns whether the message went out; a failed send disconnects.
    fn send<T: Serialize + ?Sized>(&mut self, id: PunterId, msg: &T) -> bool {
        let payload = match protocol::encode(msg) {
            Ok(payload) => payload,
            Err(err) => {
                self.disconnect(id, &LinkError::Decode(err));
                return false;
            }
        };
        let result = match self.links[id].as_mut() {
            Some(link) => link.send(&payload),
            None => return false,
        };
        match result {
            Ok(()) => {
                debug!(punter = id, "sent {}", String::from_utf8_lossy(&payload));
                true
            }
            Err(err) => {
                self.disconnect(id, &LinkError::Framing(err));
                false
            }
        }
    }

    fn recv_payload(&mut self, id: PunterId, timeout: Duration) -> Result<Vec<u8>, LinkError> {
        let link = self.links[id]
            .as_mut()
            .ok_or(LinkError::Framing(FramingError::Closed))?;
        let payload = link.recv(timeout)?;
        debug!(punter = id, "received {}", String::from_utf8_lossy(&payload));
        Ok(payload)
    }

    fn recv<T: DeserializeOwned>(&mut self, id: PunterId, timeout: Duration) -> Result<T, LinkError> {
        let payload = self.recv_payload(id, timeout)?;
        Ok(protocol::decode(&payload)?)
    }

    fn recv_move(&mut self, id: PunterId) -> Result<Move, LinkError> {
        let payload = self.recv_payload(id, self.timeouts.turn)?;
        Ok(protocol::decode_move(&payload)?)
    }

    /// Drop the connection; the punter passes for the rest of the game.
    fn disconnect(&mut self, id: PunterId, err: &LinkError) {
        if self.links[id].take().is_some() {
            warn!(punter = id, phase = ?self.phase, "dropping punter: {}", err);
        }
    }
}
