//! Loads ranked TFT match data from the Riot API into PostgreSQL.

pub mod config;
pub mod error;
pub mod flatten;
pub mod loader;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod riot_api;
pub mod schema;
pub mod store;
