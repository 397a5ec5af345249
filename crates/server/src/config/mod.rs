//! Configuration management for the visitnote service.
//! This module handles parsing, interpolation, and validation of the
//! ~/.config/visitnote/config.json file (JSON or YAML).

mod interpolation;
mod io;
mod model;
mod validation;

pub use interpolation::interpolate_config;
pub use io::{CONFIG_PATH_ENV, default_config_path, load_config, load_config_from_path};
pub use model::{
    ArtifactsConfig, CapabilitiesConfig, ConfigError, DEFAULT_SUMMARY_MODEL, EndpointConfig, HttpServerConfig, ObserverConfig,
    SummarizationEndpointConfig, VisitnoteConfig,
};
pub use validation::{ValidationError, validate_bind_address, validate_config};
