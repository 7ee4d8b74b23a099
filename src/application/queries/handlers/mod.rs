//! Query Handlers 实现
//!
//! 所有 QueryHandler 的具体实现

mod model_handlers;
mod progress_handlers;

pub use model_handlers::*;
pub use progress_handlers::*;
