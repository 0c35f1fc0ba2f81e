//! A punter that claims random free rivers. Useful as a sparring partner for
//! the server.

use std::env;
use std::net::TcpStream;
use std::process;
use std::time::{Duration, Instant};

use bufstream::BufStream;
use getopts::Options;
use rand::Rng;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use punter_referee::client::{play_online, Participant};
use punter_referee::graph::GameGraph;
use punter_referee::protocol::{Move, ReadyP, SetupS};
use punter_referee::PunterId;

const DEFAULT_SERVER: &str = "localhost";
const DEFAULT_PORT: u16 = 9001;
const DEFAULT_NAME: &str = "random hackers";
const DEFAULT_TIMEOUT: f64 = 1.0;

struct RandomPunter {
    name: String,
    id: PunterId,
    graph: Option<GameGraph>,
}

impl RandomPunter {
    fn new(name: String) -> RandomPunter {
        RandomPunter {
            name,
            id: 0,
            graph: None,
        }
    }

    fn process_turn(&mut self, moves: &[Move]) {
        let graph = match self.graph.as_mut() {
            Some(graph) => graph,
            None => return,
        };
        for mv in moves {
            let applied = match mv {
                Move::Pass(_) => Ok(()),
                Move::Claim(claim) => graph.mark_owned(claim.source, claim.target, claim.punter),
                Move::Option(option) => {
                    graph.mark_optioned(option.source, option.target, option.punter)
                }
                Move::Splurge(splurge) => splurge.route.windows(2).try_for_each(|step| {
                    let owned = graph.edge_between(step[0], step[1])?.is_owned();
                    if owned {
                        graph.mark_optioned(step[0], step[1], splurge.punter)
                    } else {
                        graph.mark_owned(step[0], step[1], splurge.punter)
                    }
                }),
            };
            if let Err(err) = applied {
                debug!("ignoring {:?}: {}", mv, err);
            }
        }
    }
}

impl Participant for RandomPunter {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn setup(&mut self, setup: &SetupS) -> ReadyP {
        self.id = setup.punter;
        self.graph = Some(GameGraph::new(&setup.map));
        ReadyP::new(setup.punter)
    }

    fn play(&mut self, moves: &[Move], _deadline: Instant) -> Move {
        self.process_turn(moves);
        let free: Vec<(usize, usize)> = match self.graph {
            Some(ref graph) => graph
                .rivers()
                .iter()
                .filter(|river| !river.is_owned())
                .map(|river| (river.source, river.target))
                .collect(),
            None => Vec::new(),
        };
        match rand::thread_rng().choose(&free) {
            Some(&(source, target)) => Move::claim(self.id, source, target),
            None => Move::pass(self.id),
        }
    }
}

fn print_usage(program: &str, opts: Options) {
    let brief = format!("Usage: {} [options]", program);
    println!("{}", opts.usage(&brief));
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();
    let program = args.first().cloned().unwrap_or_else(|| "punter".to_string());

    let mut opts = Options::new();
    opts.optopt("s", "server", "server address", "ADDRESS");
    opts.optopt("p", "port", "port", "PORT");
    opts.optopt("n", "name", "AI name", "NAME");
    opts.optopt("t", "timeout", "seconds allowed per move", "SECS");
    opts.optflag("h", "help", "print this help menu");
    let matches = match opts.parse(args.get(1..).unwrap_or(&[])) {
        Ok(matches) => matches,
        Err(err) => {
            eprintln!("{}", err);
            print_usage(&program, opts);
            process::exit(2);
        }
    };
    if matches.opt_present("h") {
        print_usage(&program, opts);
        return;
    }

    let server = matches.opt_str("server").unwrap_or_else(|| DEFAULT_SERVER.to_string());
    let name = matches.opt_str("name").unwrap_or_else(|| DEFAULT_NAME.to_string());
    let port = match matches.opt_str("port").map(|p| p.parse::<u16>()) {
        None => DEFAULT_PORT,
        Some(Ok(port)) => port,
        Some(Err(err)) => {
            eprintln!("bad port: {}", err);
            process::exit(2);
        }
    };
    let move_time = match matches.opt_str("timeout").map(|t| t.parse::<f64>()) {
        None => Duration::from_secs_f64(DEFAULT_TIMEOUT),
        Some(Ok(secs)) if secs > 0.0 => match Duration::try_from_secs_f64(secs) {
            Ok(move_time) => move_time,
            Err(err) => {
                eprintln!("bad timeout: {}", err);
                process::exit(2);
            }
        },
        _ => {
            eprintln!("bad timeout");
            process::exit(2);
        }
    };

    let connection = match TcpStream::connect((&server[..], port)) {
        Ok(connection) => connection,
        Err(err) => {
            error!("could not connect to {}:{}: {}", server, port, err);
            process::exit(1);
        }
    };
    let mut stream = BufStream::new(connection);
    let mut punter = RandomPunter::new(name);

    match play_online(&mut stream, &mut punter, move_time) {
        Ok(scores) => {
            if let Some(ours) = scores.iter().find(|s| s.punter == punter.id) {
                info!("Our score: {}", ours.score);
            }
        }
        Err(err) => {
            error!("{}", err);
            process::exit(1);
        }
    }
}
