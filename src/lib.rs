// src/lib.rs

pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod placement;
pub mod routes;
pub mod state;
pub mod store;
pub mod utils;

pub use placement::service::PlacementService;
pub use routes::create_router;
