pub mod auth;
pub mod config;
pub mod handlers;
pub mod lifecycle;
pub mod models;
pub mod routes;
pub mod seed;
pub mod state;
pub mod store;
pub mod utils;

pub use routes::create_routes;
pub use state::AppState;
