//! Operational HTTP surface for the DEX harvester.

pub mod response;
pub mod routes;
pub mod state;

pub use routes::router;
pub use state::AppState;
