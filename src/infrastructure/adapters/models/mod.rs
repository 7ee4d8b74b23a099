//! Model Adapters - ModelHandle 与生成后端实现

mod pipeline_handle;
mod placeholder_backend;

pub use pipeline_handle::{PipelineHandleFactory, PipelineModelHandle};
pub use placeholder_backend::PlaceholderBackend;
