use std::env;
use std::process;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use punter_referee::config::{self, ServerConfig};
use punter_referee::map::Map;
use punter_referee::server::Server;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("punter-server");

    let config = match ServerConfig::from_args(args.get(1..).unwrap_or(&[])) {
        Ok(Some(config)) => config,
        Ok(None) => {
            config::print_usage(program, &config::options());
            return;
        }
        Err(err) => {
            eprintln!("{}", err);
            config::print_usage(program, &config::options());
            process::exit(2);
        }
    };

    let map = match Map::load(&config.map) {
        Ok(map) => map,
        Err(err) => {
            error!("{}: {}", config.map.display(), err);
            process::exit(1);
        }
    };
    info!(
        "Loaded {}: {} sites, {} rivers, {} mines",
        config.map.display(),
        map.sites.len(),
        map.rivers.len(),
        map.mines.len()
    );
    info!("Settings: {:?}", config.settings);

    let server = match Server::bind(config, map) {
        Ok(server) => server,
        Err(err) => {
            error!("could not start server: {}", err);
            process::exit(1);
        }
    };
    if let Err(err) = server.run() {
        error!("{}", err);
        process::exit(1);
    }
}
