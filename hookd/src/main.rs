use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, info};

use hookd::backend::BackendResolver;
use hookd::backend::manifest::ManifestLoader;
use hookd::error;
use hookd::io::config::{DEFAULT_CONFIG_FILE, debug_from_env, load_config};
use hookd::io::signals::spawn_termination_watcher;
use hookd::io::transport::Transport;
use hookd::logging;
use hookd::session::{Session, report_fatal};

#[derive(Parser)]
#[command(
    name = "hookd",
    version,
    about = "Serve build-backend hooks over a line protocol on stdin/stdout"
)]
struct Cli {
    /// Path to the daemon config file.
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Serve a single request and include traces in FATAL records.
    /// Also enabled by setting DAEMON_DEBUG.
    #[arg(long)]
    debug: bool,
}

fn main() {
    logging::init();
    if let Err(err) = run() {
        eprintln!("{err:#}");
        std::process::exit(error::exit_code(&err));
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let debug_mode = cli.debug || debug_from_env();

    spawn_termination_watcher(debug_mode)?;

    // stdout is locked per record so the signal watcher can still report.
    let stdin = io::stdin();
    let mut transport = Transport::new(stdin.lock(), io::stdout());

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            report_fatal(&mut transport, &err, debug_mode)?;
            return Err(err);
        }
    };
    debug!(
        config = %cli.config.display(),
        backends = config.backends.len(),
        debug_mode,
        "starting"
    );

    let resolver = BackendResolver::new(ManifestLoader::new(&config));
    let end = Session::new(transport, resolver, debug_mode).run()?;
    info!(?end, "session finished");
    Ok(())
}
