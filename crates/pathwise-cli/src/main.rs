//! pathwise CLI — validate and replay courseware definitions.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "pathwise", version, about = "Adaptive courseware runtime")]
struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create starter config and example courseware
    Init,

    /// Validate courseware TOML files
    Validate {
        /// Path to courseware file or directory
        #[arg(long)]
        courseware: PathBuf,
    },

    /// Replay a script of submissions against in-memory stores
    Simulate {
        /// Path to courseware file
        #[arg(long)]
        courseware: PathBuf,

        /// Path to submission script
        #[arg(long)]
        script: PathBuf,

        /// Student id (random if omitted)
        #[arg(long)]
        student: Option<String>,

        /// Output format: table, json
        #[arg(long, default_value = "table")]
        format: String,
    },
}

fn init_tracing(verbose: bool, filter: Option<&str>) {
    let directive = match (verbose, filter) {
        (true, _) => "pathwise=debug",
        (false, Some(f)) => f,
        (false, None) => "pathwise=info",
    };
    let env_filter = match directive.parse() {
        Ok(d) => EnvFilter::from_default_env().add_directive(d),
        Err(e) => {
            eprintln!("Warning: ignoring log filter '{directive}': {e}");
            EnvFilter::from_default_env()
        }
    };
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match pathwise_store::load_config_from(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e:#}");
            process::exit(1);
        }
    };
    init_tracing(cli.verbose, config.log_filter.as_deref());

    let result = match cli.command {
        Commands::Init => commands::init::execute(),
        Commands::Validate { courseware } => commands::validate::execute(courseware),
        Commands::Simulate {
            courseware,
            script,
            student,
            format,
        } => commands::simulate::execute(courseware, script, student, format, &config).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
