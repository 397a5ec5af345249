//! Shared helpers for the visitnote crates.

pub mod http;
pub mod interpolation;
pub mod path_processing;
pub mod text_processing;

pub use interpolation::{InterpolationError, interpolate_string};
pub use path_processing::expand_tilde;
pub use text_processing::{describe_text, escape_summary_markup, redact_json, redact_sensitive, redact_sensitive_with};
