//! SketchRoom HTTP and WebSocket server.
//!
//! Exposes the room registry over REST and the realtime canvas, presence
//! and chat channels over a single WebSocket endpoint at `/ws`.

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod expiry;
pub mod identity;
pub mod state;
pub mod ws;

pub use app::build_app;
pub use config::ServerConfig;
pub use state::AppState;
