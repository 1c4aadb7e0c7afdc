use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use passforge::cli::{self, CacheAction, GenerateOptions, KeyAction, OutputFormat};
use passforge::generator::GeneratorType;

#[derive(Debug, Parser)]
#[command(name = "passforge")]
#[command(about = "Generate, analyze and track credentials with a PassForge server")]
struct App {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Generate a credential with the given (or configured) generator
    Generate {
        /// Generator type (random, pin, passphrase, ...); see `controls`
        generator: Option<GeneratorType>,
        /// Set a field before generating, e.g. --set length=24
        #[arg(long = "set", value_name = "FIELD=VALUE")]
        sets: Vec<String>,
        /// Apply a server preset first
        #[arg(long)]
        preset: Option<String>,
        /// Ask the server not to record this generation
        #[arg(long)]
        no_log: bool,
        /// Copy the result to the clipboard
        #[arg(long)]
        copy: bool,
        /// Write the QR code PNG (wifi only) to this file
        #[arg(long, value_name = "FILE")]
        qr_out: Option<PathBuf>,
        /// Output format: text (default), json, html
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Estimate the strength of a password
    Analyze {
        password: String,
        /// Output format: text (default), json, html
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Show the option controls of a generator
    Controls {
        generator: Option<GeneratorType>,
        /// Output format: text (default), json, html
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// List the server's security presets
    Presets {
        /// Output format: text (default), json, html
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Show the generation history stored on the server
    History {
        /// Only entries whose password or type contains this text
        #[arg(long)]
        search: Option<String>,
        /// Maximum number of entries to fetch
        #[arg(long)]
        limit: Option<usize>,
        /// Copy the entry with this index to the clipboard
        #[arg(long, value_name = "INDEX")]
        copy: Option<usize>,
        /// Output format: text (default), json, html
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Delete the whole server history
    HistoryClear {
        /// Do not ask for confirmation
        #[arg(long, short)]
        yes: bool,
    },
    /// Manage the API key used for history requests
    Key {
        #[command(subcommand)]
        action: KeyCommand,
    },
    /// Show or change the colour theme (dark, light, toggle)
    Theme { choice: Option<String> },
    /// Interactive session with debounced history search
    Shell,
    /// Run the offline caching proxy
    Serve {
        /// Listen address (default from config: 127.0.0.1:8094)
        #[arg(long)]
        addr: Option<String>,
    },
    /// Drive the offline cache by hand
    Cache {
        #[command(subcommand)]
        action: CacheCommand,
    },
    /// Check config, server reachability, key and cache
    Status,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

#[derive(Debug, Subcommand)]
enum KeyCommand {
    /// Store a key (an empty value removes it)
    Set { value: String },
    /// Remove the stored key
    Clear,
    /// Probe whether the key unlocks history
    Status,
    /// Ask the server for a key (local clients only)
    Bootstrap,
}

#[derive(Debug, Subcommand)]
enum CacheCommand {
    /// Fetch and store the current asset set
    Install,
    /// Delete caches other than the current version
    Activate,
    /// List caches and their entries
    List,
    /// Delete every cache
    Clear,
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    /// Show the effective configuration
    Show,
    /// Write the default global config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Set a dotted key in the global config, e.g. server.base_url
    Set { key: String, value: String },
    /// Restore the default global config
    Reset,
}

fn main() -> Result<()> {
    let app = App::parse();

    match app.command {
        Commands::Generate {
            generator,
            sets,
            preset,
            no_log,
            copy,
            qr_out,
            format,
        } => {
            let fmt = OutputFormat::from_str_opt(Some(&format));
            cli::run_generate(
                GenerateOptions {
                    generator,
                    sets,
                    preset,
                    no_log,
                    copy,
                    qr_out,
                },
                fmt,
            )
        }
        Commands::Analyze { password, format } => {
            let fmt = OutputFormat::from_str_opt(Some(&format));
            cli::run_analyze(&password, fmt)
        }
        Commands::Controls { generator, format } => {
            let fmt = OutputFormat::from_str_opt(Some(&format));
            cli::run_controls(generator, fmt)
        }
        Commands::Presets { format } => cli::run_presets(OutputFormat::from_str_opt(Some(&format))),
        Commands::History {
            search,
            limit,
            copy,
            format,
        } => {
            let fmt = OutputFormat::from_str_opt(Some(&format));
            cli::run_history(search, limit, copy, fmt)
        }
        Commands::HistoryClear { yes } => cli::run_history_clear(yes),
        Commands::Key { action } => cli::run_key(match action {
            KeyCommand::Set { value } => KeyAction::Set(value),
            KeyCommand::Clear => KeyAction::Clear,
            KeyCommand::Status => KeyAction::Status,
            KeyCommand::Bootstrap => KeyAction::Bootstrap,
        }),
        Commands::Theme { choice } => cli::run_theme(choice.as_deref()),
        Commands::Shell => cli::shell::run(),
        Commands::Serve { addr } => cli::run_serve(addr.as_deref()),
        Commands::Cache { action } => cli::run_cache(match action {
            CacheCommand::Install => CacheAction::Install,
            CacheCommand::Activate => CacheAction::Activate,
            CacheCommand::List => CacheAction::List,
            CacheCommand::Clear => CacheAction::Clear,
        }),
        Commands::Status => cli::run_status(),
        Commands::Config { action } => match action {
            ConfigCommand::Show => cli::run_config_show(),
            ConfigCommand::Init { force } => cli::run_config_init(force),
            ConfigCommand::Set { key, value } => cli::run_config_set(&key, &value),
            ConfigCommand::Reset => cli::run_config_reset(),
        },
    }
}
