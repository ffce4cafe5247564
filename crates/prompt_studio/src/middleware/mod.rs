pub mod tracing_middleware;
pub mod user_context;

pub use tracing_middleware::{extract_trace_id, TraceId, TracingMiddleware};
pub use user_context::UserContext;
