pub mod config;
pub mod error;
pub mod hub;
pub mod model;
pub mod monitor;
pub mod notify;
pub mod pool;
pub mod probe;
pub mod scheduler;
pub mod server;
pub mod signals;
pub mod store;

#[cfg(test)]
mod testing;
