//! Environment interpolation for configuration values.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tracing::debug;

static ENV_PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\{env:([\w+_-]*)}").expect("static env placeholder pattern"));

/// Interpolate a string value, replacing every `${env:NAME}` with the value of `NAME`.
///
/// Values without placeholders are returned unchanged.
pub fn interpolate_string(value: &str) -> Result<String, InterpolationError> {
    let mut resolved = Vec::new();
    for capture in ENV_PLACEHOLDER.captures_iter(value) {
        let variable_name = capture[1].to_string();
        let variable_value = std::env::var(&variable_name).map_err(|_| InterpolationError::MissingEnvVar {
            name: variable_name.clone(),
        })?;
        debug!("Interpolated env var: {} -> [REDACTED]", variable_name);
        resolved.push((capture[0].to_string(), variable_value));
    }

    let mut result = value.to_string();
    for (placeholder, variable_value) in resolved {
        result = result.replace(&placeholder, &variable_value);
    }
    Ok(result)
}

/// Errors that can occur during interpolation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InterpolationError {
    #[error("Missing environment variable: {name}")]
    MissingEnvVar { name: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_env_placeholders() {
        temp_env::with_var("VISITNOTE_TEST_TOKEN", Some("abc"), || {
            let value = interpolate_string("Bearer ${env:VISITNOTE_TEST_TOKEN}").expect("interpolate");
            assert_eq!(value, "Bearer abc");
        });
    }

    #[test]
    fn missing_variables_are_reported_by_name() {
        temp_env::with_var("VISITNOTE_TEST_MISSING", None::<&str>, || {
            let error = interpolate_string("${env:VISITNOTE_TEST_MISSING}").unwrap_err();
            assert_eq!(
                error,
                InterpolationError::MissingEnvVar {
                    name: "VISITNOTE_TEST_MISSING".into()
                }
            );
        });
    }

    #[test]
    fn plain_values_pass_through() {
        assert_eq!(interpolate_string("http://127.0.0.1:9000").expect("interpolate"), "http://127.0.0.1:9000");
    }
}
