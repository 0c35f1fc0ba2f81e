//! A punter's TCP connection, as seen by the server.
//!
//! Every connection gets a reader thread that pulls frames off the socket and
//! pushes them into a channel. The session only ever waits on the channel, so
//! giving up on a slow punter never leaves half a frame behind, and whatever
//! it sends late can be told apart from the next reply. Writes carry a socket
//! timeout so a punter that stops reading cannot hold the game up either.

use std::io::{BufReader, BufWriter};
use std::net::{Shutdown, TcpStream};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::{FramingError, LinkError};
use crate::framing::{read_message, write_message};
use crate::session::Link;

type Frame = Result<Vec<u8>, FramingError>;

pub struct Connection {
    writer: BufWriter<TcpStream>,
    inbox: Receiver<Frame>,
    // Set when discard_pending runs into the reader's final error.
    failure: Option<FramingError>,
    _reader_thread: JoinHandle<()>,
}

impl Connection {
    /// A send that cannot complete within `write_timeout` fails with an
    /// i/o error.
    pub fn new(stream: TcpStream, write_timeout: Duration) -> std::io::Result<Connection> {
        let peer = stream.peer_addr()?;
        stream.set_nodelay(true)?;
        stream.set_write_timeout(Some(write_timeout))?;
        let reader = BufReader::new(stream.try_clone()?);
        let (tx, rx) = mpsc::channel();
        let reader_thread = thread::Builder::new()
            .name(format!("reader-{}", peer))
            .spawn(move || reader_loop(reader, tx))?;

        Ok(Connection {
            writer: BufWriter::new(stream),
            inbox: rx,
            failure: None,
            _reader_thread: reader_thread,
        })
    }
}

fn reader_loop(mut reader: BufReader<TcpStream>, tx: Sender<Frame>) {
    loop {
        let frame = read_message(&mut reader);
        let done = frame.is_err();
        if tx.send(frame).is_err() || done {
            break;
        }
    }
}

impl Link for Connection {
    fn send(&mut self, payload: &[u8]) -> Result<(), FramingError> {
        write_message(&mut self.writer, payload)
    }

    fn recv(&mut self, timeout: Duration) -> Result<Vec<u8>, LinkError> {
        if let Some(err) = self.failure.take() {
            return Err(err.into());
        }
        match self.inbox.recv_timeout(timeout) {
            Ok(Ok(payload)) => Ok(payload),
            Ok(Err(err)) => Err(err.into()),
            Err(RecvTimeoutError::Timeout) => Err(LinkError::Timeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(FramingError::Closed.into()),
        }
    }

    fn discard_pending(&mut self) -> usize {
        let mut dropped = 0;
        while self.failure.is_none() {
            match self.inbox.try_recv() {
                Ok(Ok(_)) => dropped += 1,
                Ok(Err(err)) => self.failure = Some(err),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => self.failure = Some(FramingError::Closed),
            }
        }
        dropped
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        // Wakes the reader thread up so it can exit.
        let _ = self.writer.get_ref().shutdown(Shutdown::Both);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::TcpListener;

    fn pair() -> (Connection, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (server, _) = listener.accept().unwrap();
        (Connection::new(server, Duration::from_millis(200)).unwrap(), client)
    }

    #[test]
    fn sends_and_receives_frames() {
        let (mut conn, mut client) = pair();
        client.write_all(b"12:{\"me\":\"eve\"}").unwrap();
        let payload = conn.recv(Duration::from_secs(5)).unwrap();
        assert_eq!(payload, b"{\"me\":\"eve\"}".to_vec());

        conn.send(b"{\"you\":\"eve\"}").unwrap();
        let mut reader = BufReader::new(client.try_clone().unwrap());
        assert_eq!(read_message(&mut reader).unwrap(), b"{\"you\":\"eve\"}".to_vec());
    }

    #[test]
    fn times_out_without_losing_the_frame() {
        let (mut conn, mut client) = pair();
        client.write_all(b"5:{\"pa").unwrap();
        match conn.recv(Duration::from_millis(50)) {
            Err(LinkError::Timeout(_)) => {}
            other => panic!("expected Timeout, got {:?}", other),
        }
        client.write_all(b"ss").unwrap();
        // Five bytes, the trailing "s" belongs to whatever comes next.
        assert_eq!(conn.recv(Duration::from_secs(5)).unwrap(), b"{\"pas".to_vec());
    }

    #[test]
    fn discards_late_replies() {
        let (mut conn, mut client) = pair();
        client.write_all(b"2:{}2:[]").unwrap();
        thread::sleep(Duration::from_millis(100));
        assert_eq!(conn.discard_pending(), 2);
        assert_eq!(conn.discard_pending(), 0);
    }

    #[test]
    fn reports_closed_peer() {
        let (mut conn, client) = pair();
        drop(client);
        match conn.recv(Duration::from_secs(5)) {
            Err(LinkError::Framing(FramingError::Closed)) => {}
            other => panic!("expected Closed, got {:?}", other),
        }
    }

    #[test]
    fn send_gives_up_on_a_peer_that_stops_reading() {
        let (mut conn, _client) = pair();
        let chunk = vec![b' '; 1024 * 1024];
        let started = std::time::Instant::now();
        let failed = (0..256).any(|_| conn.send(&chunk).is_err());
        assert!(failed, "socket buffers absorbed 256 MiB");
        assert!(started.elapsed() < Duration::from_secs(30));
    }
}
