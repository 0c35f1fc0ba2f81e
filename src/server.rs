//! Accepts punters in groups and plays one game per group.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::net::{SocketAddr, TcpListener};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crate::config::ServerConfig;
use crate::connection::Connection;
use crate::error::ServerError;
use crate::map::Map;
use crate::session::{GameResult, Session};

/// Appends a `name` line and a `score` line per punter after every game.
#[derive(Debug)]
pub struct ResultsLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ResultsLog {
    /// The log lives at `<dir>/<map file name>.log`.
    pub fn open(dir: &Path, map: &Path) -> io::Result<ResultsLog> {
        fs::create_dir_all(dir)?;
        let name = map
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "game".to_string());
        Ok(ResultsLog {
            path: dir.join(format!("{}.log", name)),
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, result: &GameResult) -> io::Result<()> {
        let mut out = Vec::new();
        for score in &result.scores {
            let name = result
                .names
                .get(score.punter)
                .map(String::as_str)
                .unwrap_or("");
            writeln!(out, "{}", name)?;
            writeln!(out, "{}", score.score)?;
        }

        // Games finishing on different threads must not interleave.
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(&out)?;
        file.flush()
    }
}

pub struct Server {
    listener: TcpListener,
    config: ServerConfig,
    map: Map,
    results: Option<Arc<ResultsLog>>,
}

impl Server {
    pub fn bind(config: ServerConfig, map: Map) -> Result<Server, ServerError> {
        let listener = TcpListener::bind(("0.0.0.0", config.port))?;
        let results = match config.results {
            Some(ref dir) => Some(Arc::new(ResultsLog::open(dir, &config.map)?)),
            None => None,
        };
        Ok(Server {
            listener,
            config,
            map,
            results,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn results(&self) -> Option<&ResultsLog> {
        self.results.as_deref()
    }

    /// Serve games until an accept fails, or after one game in run-once mode.
    pub fn run(&self) -> Result<(), ServerError> {
        info!("Listening at {}", self.local_addr()?);
        let mut games: Vec<JoinHandle<()>> = Vec::new();
        loop {
            let links = self.accept_group()?;
            if self.config.parallel {
                games.retain(|game| !game.is_finished());
                games.push(self.spawn_game(links)?);
            } else {
                let result = self.session(links).play();
                record(self.results.as_deref(), &result);
            }
            if self.config.run_once {
                break;
            }
        }
        for game in games {
            if game.join().is_err() {
                error!("a game thread panicked");
            }
        }
        Ok(())
    }

    /// Accept one group of punters and play a single game with them on the
    /// calling thread.
    pub fn play_game(&self) -> Result<GameResult, ServerError> {
        let links = self.accept_group()?;
        let result = self.session(links).play();
        record(self.results.as_deref(), &result);
        Ok(result)
    }

    fn accept_group(&self) -> Result<Vec<Connection>, ServerError> {
        info!("Waiting on {} clients...", self.config.punters);
        let mut links = Vec::with_capacity(self.config.punters);
        while links.len() < self.config.punters {
            let (stream, addr) = self.listener.accept()?;
            match Connection::new(stream, self.config.timeouts.setup) {
                Ok(conn) => {
                    links.push(conn);
                    info!(
                        "  [{}/{}] Client connected from {}.",
                        links.len(),
                        self.config.punters,
                        addr
                    );
                }
                // The peer is gone already; wait for someone else.
                Err(err) => warn!("could not set up connection from {}: {}", addr, err),
            }
        }
        Ok(links)
    }

    fn session(&self, links: Vec<Connection>) -> Session<Connection> {
        Session::new(
            self.map.clone(),
            self.config.settings,
            links,
            self.config.timeouts,
        )
    }

    fn spawn_game(&self, links: Vec<Connection>) -> Result<JoinHandle<()>, ServerError> {
        let session = self.session(links);
        let results = self.results.clone();
        let handle = thread::Builder::new()
            .name("game".to_string())
            .spawn(move || {
                let result = session.play();
                record(results.as_deref(), &result);
            })?;
        Ok(handle)
    }
}

fn record(results: Option<&ResultsLog>, result: &GameResult) {
    for (name, score) in result.names.iter().zip(&result.scores) {
        info!("  {}: {}", name, score.score);
    }
    if let Some(log) = results {
        if let Err(err) = log.append(result) {
            error!("could not write results to {}: {}", log.path().display(), err);
        }
    }
}
