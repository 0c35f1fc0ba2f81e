#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate tracing;

extern crate bufstream;
extern crate getopts;
extern crate serde;
extern crate serde_json;
extern crate thiserror;

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod framing;
pub mod graph;
pub mod map;
pub mod protocol;
pub mod scoring;
pub mod server;
pub mod session;

pub use map::{PunterId, RiverId, SiteId};
