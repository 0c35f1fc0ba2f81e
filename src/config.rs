use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use getopts::{Matches, Options};

use crate::error::ConfigError;
use crate::map::Settings;
use crate::session::Timeouts;

const DEFAULT_PORT: u16 = 9001;
const DEFAULT_MAP: &str = "maps/sample.json";
const DEFAULT_PUNTERS: usize = 2;
const DEFAULT_RESULTS: &str = "results";

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub port: u16,
    pub map: PathBuf,
    pub punters: usize,
    pub settings: Settings,
    pub run_once: bool,

    /// Play every game on its own thread instead of one after the other.
    pub parallel: bool,

    /// Where results are appended; `None` disables the results log.
    pub results: Option<PathBuf>,
    pub timeouts: Timeouts,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            port: DEFAULT_PORT,
            map: PathBuf::from(DEFAULT_MAP),
            punters: DEFAULT_PUNTERS,
            settings: Settings {
                futures: false,
                splurges: true,
                options: true,
            },
            run_once: false,
            parallel: false,
            results: Some(PathBuf::from(DEFAULT_RESULTS)),
            timeouts: Timeouts::default(),
        }
    }
}

pub fn options() -> Options {
    let mut opts = Options::new();
    opts.optopt("p", "port", "port to listen on (default 9001)", "PORT");
    opts.optopt("m", "map", "JSON map file", "FILE");
    opts.optopt("n", "punters", "number of players per game (default 2)", "N");
    opts.optopt("", "splurges", "enable splurges (default true)", "BOOL");
    opts.optopt("", "options", "enable options (default true)", "BOOL");
    opts.optopt("", "futures", "enable futures (default false)", "BOOL");
    opts.optflag("", "runonce", "play a single game and exit");
    opts.optflag("", "parallel", "play each game on its own thread");
    opts.optopt("r", "results", "directory for result logs (default results)", "DIR");
    opts.optflag("", "no-results", "do not write result logs");
    opts.optopt("t", "turn-timeout", "seconds a punter has per move (default 1)", "SECS");
    opts.optopt("", "setup-timeout", "seconds a punter has for setup (default 10)", "SECS");
    opts.optflag("h", "help", "print this help menu");
    opts
}

pub fn print_usage(program: &str, opts: &Options) {
    let brief = format!("Usage: {} [options]", program);
    println!("{}", opts.usage(&brief));
}

impl ServerConfig {
    /// Parse command line arguments (without the program name). Returns
    /// `None` when help was requested.
    pub fn from_args(args: &[String]) -> Result<Option<ServerConfig>, ConfigError> {
        let matches = options().parse(args)?;
        if matches.opt_present("h") {
            return Ok(None);
        }

        let defaults = ServerConfig::default();
        let results = if matches.opt_present("no-results") {
            None
        } else {
            Some(PathBuf::from(
                matches.opt_str("results").unwrap_or_else(|| DEFAULT_RESULTS.to_string()),
            ))
        };

        let punters = parse_opt(&matches, "punters", defaults.punters)?;
        if punters == 0 {
            return Err(ConfigError::InvalidValue {
                flag: "punters",
                value: "0".to_string(),
            });
        }

        Ok(Some(ServerConfig {
            port: parse_opt(&matches, "port", defaults.port)?,
            map: matches.opt_str("map").map(PathBuf::from).unwrap_or(defaults.map),
            punters,
            settings: Settings {
                futures: parse_opt(&matches, "futures", defaults.settings.futures)?,
                splurges: parse_opt(&matches, "splurges", defaults.settings.splurges)?,
                options: parse_opt(&matches, "options", defaults.settings.options)?,
            },
            run_once: matches.opt_present("runonce"),
            parallel: matches.opt_present("parallel"),
            results,
            timeouts: Timeouts {
                setup: parse_secs(&matches, "setup-timeout", defaults.timeouts.setup)?,
                turn: parse_secs(&matches, "turn-timeout", defaults.timeouts.turn)?,
            },
        }))
    }
}

fn parse_opt<T: FromStr>(
    matches: &Matches,
    flag: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match matches.opt_str(flag) {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidValue { flag, value }),
        None => Ok(default),
    }
}

fn parse_secs(
    matches: &Matches,
    flag: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    let secs: f64 = parse_opt(matches, flag, default.as_secs_f64())?;
    let invalid = || ConfigError::InvalidValue {
        flag,
        value: secs.to_string(),
    };
    if secs <= 0.0 {
        return Err(invalid());
    }
    Duration::try_from_secs_f64(secs).map_err(|_| invalid())
}
