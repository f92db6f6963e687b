pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod identity;
pub mod models;
pub mod profiles;
pub mod review;
pub mod routes;
pub mod schema;
pub mod seed;
pub mod state;
pub mod store;

pub use engine::{ReviewEngine, StatusScope};
pub use state::AppState;
