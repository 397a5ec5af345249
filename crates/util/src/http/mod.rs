//! HTTP helpers shared by the capability clients and the gateway client.

mod parser;

pub use parser::{JsonParseError, parse_response_json_strict, status_error_message};
