//! Configuration layer and HTTP front door of the visitnote service.
//!
//! [`config`] loads the JSON/YAML configuration document; [`services`] turns
//! it into capability clients and a [`LocalExecutor`]; [`http`] exposes that
//! executor over axum.
//!
//! [`LocalExecutor`]: visitnote_engine::LocalExecutor

pub mod config;
pub mod http;
pub mod services;

pub use config::{ConfigError, VisitnoteConfig, load_config, load_config_from_path};
pub use http::{GatewayServer, RunningGatewayServer, resolve_bind_address, router};
pub use services::{build_executor, build_stage_services};
