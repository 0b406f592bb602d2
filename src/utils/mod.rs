pub mod error_tracking;

pub use error_tracking::get_or_generate_trace_id;
