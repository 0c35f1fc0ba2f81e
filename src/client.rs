//! The punter side of the protocol.
//!
//! A strategy implements `Participant`; `play_online` handles the handshake,
//! framing and message dispatch for it.

use std::io::{Read, Write};
use std::time::{Duration, Instant};

use bufstream::BufStream;
use serde::Serialize;

use crate::error::ClientError;
use crate::framing::{read_message, write_message};
use crate::protocol::{self, HandshakeP, Move, MovesScores, ReadyP, Score, ServerMessage, SetupS};

/// Everything the server needs from a punter.
pub trait Participant {
    fn name(&self) -> String;

    fn setup(&mut self, setup: &SetupS) -> ReadyP;

    /// `moves` holds every punter's latest move. The reply must be ready
    /// before `deadline`.
    fn play(&mut self, moves: &[Move], deadline: Instant) -> Move;

    fn stop(&mut self, _stop: &MovesScores) {}

    /// The server gave up waiting for our last move.
    fn timeout(&mut self, _secs: f64) {}
}

fn send_message<S, T>(stream: &mut BufStream<S>, msg: &T) -> Result<(), ClientError>
where
    S: Read + Write,
    T: Serialize + ?Sized,
{
    let payload = protocol::encode(msg)?;
    write_message(stream, &payload)?;
    Ok(())
}

fn recv_message<S: Read + Write>(stream: &mut BufStream<S>) -> Result<ServerMessage, ClientError> {
    let payload = read_message(stream)?;
    Ok(ServerMessage::decode(&payload)?)
}

/// Play one game over `stream` and return the final scores. `move_time` is
/// how long the server allows per move; the participant is handed a deadline
/// a little before that runs out.
pub fn play_online<S, P>(
    stream: &mut BufStream<S>,
    participant: &mut P,
    move_time: Duration,
) -> Result<Vec<Score>, ClientError>
where
    S: Read + Write,
    P: Participant,
{
    send_message(stream, &HandshakeP { me: participant.name() })?;
    match recv_message(stream)? {
        ServerMessage::Handshake(handshake) => info!("Registered as: {}", handshake.you),
        _ => return Err(ClientError::Unexpected("expected handshake response")),
    }

    let mut id = None;
    loop {
        let received = Instant::now();
        match recv_message(stream)? {
            ServerMessage::Setup(setup) => {
                info!("We are player {} of {}", setup.punter, setup.punters);
                id = Some(setup.punter);
                let ready = participant.setup(&setup);
                send_message(stream, &ready)?;
            }
            ServerMessage::Turn(moves) => {
                if id.is_none() {
                    return Err(ClientError::Unexpected("turn before setup"));
                }
                let deadline = received + move_time * 9 / 10;
                let next_move = participant.play(&moves, deadline);
                debug!("{:?}", next_move);
                send_message(stream, &next_move)?;
            }
            ServerMessage::Timeout(secs) => {
                warn!("Timeout! ({}s)", secs);
                participant.timeout(secs);
            }
            ServerMessage::Stop(stop) => {
                info!("Done with game. Scores: {:?}", stop.scores);
                participant.stop(&stop);
                return Ok(stop.scores);
            }
            ServerMessage::Handshake(_) => {
                return Err(ClientError::Unexpected("second handshake"));
            }
        }
    }
}
