pub mod severity;
pub mod record;
pub mod stacktrace;
pub mod event;
pub mod transport;
pub mod noop;

#[cfg(feature = "http")]
pub mod http;

pub mod dsn;
pub mod client;
pub mod hook;
pub mod layer;
pub mod panic;
pub mod server;
pub mod init;
pub mod env;

#[cfg(test)]
mod testing;
