//! # cfgchain demo application
//!
//! A sample CLI tool showing how fallback chains, a bound clap command and
//! typed loading fit together. It exists purely to demonstrate and manually
//! verify cfgchain's features.
//!
//! ## Running
//!
//! ```sh
//! cargo run --example cfgchain_demo -- --help
//! cargo run --example cfgchain_demo -- show
//! ```
//!
//! ## Features demonstrated
//!
//! | Feature                   | How to exercise it                                                      |
//! |---------------------------|-------------------------------------------------------------------------|
//! | Constant fallback         | `cargo run --example cfgchain_demo -- show`                             |
//! | Env var with bool cast    | `DEBUG=1 cargo run --example cfgchain_demo -- show`                     |
//! | Falsy env value           | `DEBUG= cargo run --example cfgchain_demo -- show` (debug stays false)   |
//! | Flag beats env            | `DEBUG= cargo run --example cfgchain_demo -- --debug show`              |
//! | Path from another field   | `cargo run --example cfgchain_demo -- --config demo.json show`          |
//! | Auto-generated help       | `cargo run --example cfgchain_demo -- --help`                           |
//! | Redacted rendering        | `CFGCHAIN_DEMO_TOKEN=s3cret cargo run --example cfgchain_demo -- show`  |
//! | Reload from one source    | `cargo run --example cfgchain_demo -- sources constant`                 |

mod config;

use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};

use cfgchain::{CommandLinePlugin, ConfigError, Environment};

use config::DemoConfig;

/// cfgchain demo: a sample CLI app for showcasing fallback chains.
#[derive(Parser, Debug)]
#[command(name = "cfgchain-demo")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print every resolved value (sensitive ones redacted).
    Show,
    /// Print the values produced by the given provider kinds only.
    Sources {
        /// Provider kinds, e.g. `constant env_var file cli_arg`.
        kinds: Vec<String>,
    },
}

fn run() -> Result<(), ConfigError> {
    let env = Environment::default();
    let schema = config::schema(&env)?;

    let cli_plugin = env
        .get_plugin::<CommandLinePlugin>()
        .ok_or(ConfigError::PluginNotEnabled {
            kind: CommandLinePlugin::KIND,
        })?;
    cli_plugin.bind_parser(Cli::command());
    let matches = cli_plugin.parse()?;
    let cli = Cli::from_arg_matches(&matches)?;

    match cli.command {
        Commands::Show => {
            let config = schema.load()?;
            print!("{config}");
            let typed: DemoConfig = config.deserialize()?;
            if typed.debug {
                println!();
                println!("[debug] listening on {}:{}", typed.host, typed.port);
            }
        }
        Commands::Sources { kinds } => {
            let kinds: Vec<&str> = kinds.iter().map(String::as_str).collect();
            println!("fields with these sources: {:?}", schema.keys(&kinds));
            print!("{}", schema.from_providers(&kinds)?);
        }
    }
    Ok(())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
