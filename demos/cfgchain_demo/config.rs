//! Field declarations for the cfgchain demo application.
//!
//! | Field         | Chain (highest priority first)                                              |
//! |---------------|-----------------------------------------------------------------------------|
//! | `config_path` | `--config`, `CFGCHAIN_DEMO_CONFIG`, `~/.cfgchain-demo.json`                 |
//! | `debug`       | `--debug`, `DEBUG` (as bool), `false`                                        |
//! | `host`        | `--host`, `CFGCHAIN_DEMO_HOST`, `server.host` in the config file, `127.0.0.1` |
//! | `port`        | `--port` (as integer), `server.port` in the config file, `8080`              |
//! | `api_token`   | `CFGCHAIN_DEMO_TOKEN` (sensitive)                                           |
//!
//! `host` and `port` read the file named by `config_path`, so `config_path`
//! is registered first.

use cfgchain::{Cast, CliArg, ConfigError, ConfigSchema, Environment};
use serde::Deserialize;

/// Typed view of a loaded config.
#[derive(Debug, Deserialize)]
pub struct DemoConfig {
    pub config_path: String,
    pub debug: bool,
    pub host: String,
    pub port: u16,
    pub api_token: Option<String>,
}

pub fn schema(env: &Environment) -> Result<ConfigSchema, ConfigError> {
    let config_path = env
        .field()
        .from_cli(CliArg::new("--config").help("Path to a JSON config file. Otherwise "))
        .from_env_var("CFGCHAIN_DEMO_CONFIG")
        .from_constant("~/.cfgchain-demo.json");

    let debug = env
        .field()
        .from_cli(CliArg::flag("--debug").short('d'))
        .from_env_var_as("DEBUG", Cast::Bool)
        .from_constant(false);

    let host = env
        .field()
        .from_cli("--host")
        .from_env_var("CFGCHAIN_DEMO_HOST")
        .from_json_file(&config_path, "server.host")
        .from_constant("127.0.0.1");

    let port = env
        .field()
        .from_cli(CliArg::new("--port").cast(Cast::Integer))
        .from_json_file(&config_path, "server.port")
        .from_constant(8080);

    let api_token = env.sensitive_field().from_env_var("CFGCHAIN_DEMO_TOKEN");

    ConfigSchema::builder()
        .field("config_path", &config_path)
        .field("debug", &debug)
        .field("host", &host)
        .field("port", &port)
        .field("api_token", &api_token)
        .build()
}
