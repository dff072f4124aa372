use anyhow::Context as _;
use clap::{Parser, ValueEnum};
use routeport::logging::{init_logging, LogConfig};
use routeport::server::{MiniHttpAdapter, ReactiveAdapter, ServerPort, ThreadedAdapter};
use routeport::static_files::ResourceRoot;
use routeport::{Router, Server, ServerSettings};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "routeport", version)]
#[command(about = "Serve a directory over HTTP with a routeport engine", long_about = None)]
struct Cli {
    /// Directory to serve
    #[arg(short, long)]
    dir: PathBuf,

    /// URL prefix the directory is mounted under
    #[arg(long, default_value = "/")]
    prefix: String,

    #[arg(short, long, value_enum, default_value_t = Engine::Minihttp)]
    engine: Engine,

    /// Listening port, overriding settings and environment (0 = ephemeral)
    #[arg(short, long)]
    port: Option<u16>,

    /// YAML settings file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Engine {
    Minihttp,
    Threaded,
    Reactive,
}

impl Engine {
    fn adapter(self) -> Box<dyn ServerPort> {
        match self {
            Self::Minihttp => Box::new(MiniHttpAdapter::new()),
            Self::Threaded => Box::new(ThreadedAdapter::new()),
            Self::Reactive => Box::new(ReactiveAdapter::new()),
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _logging = init_logging(&LogConfig::from_env())?;

    let mut settings = match &cli.config {
        Some(path) => ServerSettings::from_yaml_file(path)?,
        None => ServerSettings::default(),
    }
    .with_env_overrides();
    if let Some(port) = cli.port {
        settings = settings.with_port(port);
    }

    anyhow::ensure!(cli.dir.is_dir(), "{} is not a directory", cli.dir.display());
    let router = Router::builder()
        .static_files(&cli.prefix, ResourceRoot::directory(&cli.dir))
        .build()
        .with_context(|| format!("Invalid prefix {}", cli.prefix))?;

    let mut server = Server::with_port(cli.engine.adapter(), router, settings);
    server.start()?;
    info!(
        adapter = server.adapter(),
        port = server.runtime_port().unwrap_or_default(),
        dir = %cli.dir.display(),
        prefix = %cli.prefix,
        "Serving directory"
    );

    wait_for_shutdown()?;
    server.stop();
    Ok(())
}

#[cfg(unix)]
fn wait_for_shutdown() -> anyhow::Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM]).context("Failed to install signal handlers")?;
    if let Some(signal) = signals.forever().next() {
        info!(signal, "Shutdown signal received");
    }
    Ok(())
}

#[cfg(not(unix))]
fn wait_for_shutdown() -> anyhow::Result<()> {
    info!("Press Enter to stop");
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .context("Failed to read stdin")?;
    Ok(())
}
