pub mod config;
pub mod error;
pub mod logging;
pub mod server;
pub mod state;
pub mod upload;

pub use server::{DetectResponse, create_app, run_server};
pub use state::AppState;
