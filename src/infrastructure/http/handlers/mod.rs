//! HTTP Handlers

mod generation;
mod models;
mod ping;
mod progress;
mod websocket;

pub use generation::*;
pub use models::*;
pub use ping::*;
pub use progress::*;
pub use websocket::*;
