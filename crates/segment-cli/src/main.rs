mod commands;
mod declaration;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::import::ImportKind;
use commands::{Globals, EXIT_DECLARATION_ERROR, EXIT_FAILURE, EXIT_STATE_ERROR};
use segment_core::install_signal_handler;
use segment_remote::CancelToken;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "segment-provider",
    version,
    about = "Manage Segment tracking plans and sources from a declaration file"
)]
struct Cli {
    /// Path to the state file.
    #[arg(long, default_value = "segment.state.json", global = true)]
    state: PathBuf,

    /// Provider config file (defaults to ~/.config/segment-provider/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Config API access token (overrides config file and SEGMENT_ACCESS_TOKEN).
    #[arg(long, global = true)]
    token: Option<String>,

    /// Workspace slug (overrides config file and SEGMENT_WORKSPACE).
    #[arg(long, global = true)]
    workspace: Option<String>,

    /// Config API base URL.
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create, update and delete resources to match a declaration file.
    Apply {
        /// Path to the declaration TOML file.
        #[arg(default_value = "segment.toml")]
        declaration: PathBuf,
        /// Only show what would change.
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Re-read every resource in state from the workspace.
    Refresh,
    /// Adopt an existing tracking plan or source into state.
    Import {
        /// Kind of resource to import.
        #[arg(value_enum)]
        kind: ImportKind,
        /// Tracking plan id (rs_...) or source name.
        id: String,
        /// Declaration key to record the resource under (defaults to the id).
        #[arg(long)]
        key: Option<String>,
    },
    /// Delete every resource recorded in state.
    Destroy {
        /// Skip the confirmation prompt.
        #[arg(long, default_value_t = false)]
        yes: bool,
    },
    /// Upgrade resources in the state file to the current schema versions.
    UpgradeState,
    /// Normalize an event library file and print its content id.
    EventLibrary {
        /// Path to a rules JSON document.
        file: PathBuf,
    },
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("SEGMENT_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let cancel = CancelToken::new();
    install_signal_handler(cancel.clone());

    let globals = Globals {
        state: cli.state,
        config: cli.config,
        token: cli.token,
        workspace: cli.workspace,
        api_url: cli.api_url,
        json: cli.json,
    };

    let result = match cli.command {
        Commands::Apply {
            declaration,
            dry_run,
        } => commands::make_provider(&globals, cancel)
            .and_then(|p| commands::apply::run(&p, &globals, &declaration, dry_run)),
        Commands::Refresh => commands::make_provider(&globals, cancel)
            .and_then(|p| commands::refresh::run(&p, &globals)),
        Commands::Import { kind, id, key } => commands::make_provider(&globals, cancel)
            .and_then(|p| commands::import::run(&p, &globals, kind, &id, key.as_deref())),
        Commands::Destroy { yes } => commands::make_provider(&globals, cancel)
            .and_then(|p| commands::destroy::run(&p, &globals, yes)),
        Commands::UpgradeState => commands::upgrade_state::run(&globals.state, globals.json),
        Commands::EventLibrary { file } => commands::event_library::run(&file, globals.json),
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            let code = if msg.starts_with("declaration error:") {
                EXIT_DECLARATION_ERROR
            } else if msg.starts_with("state error:") || msg.starts_with("state lock:") {
                EXIT_STATE_ERROR
            } else {
                EXIT_FAILURE
            };
            ExitCode::from(code)
        }
    }
}
