pub mod audio;
pub mod config;
pub mod error;
pub mod relay;
pub mod stream;

mod logging;
mod telemetry;

pub use error::PipelineError;
pub use logging::{
    crash_log_path, init_logging, log_debug, log_debug_content, log_file_path, log_panic,
    log_timing,
};
pub use telemetry::init_tracing;
