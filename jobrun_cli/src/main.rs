use std::{
    path::{Path, PathBuf},
    process,
};

use anyhow::Context;
use jobrun_lib::{Configuration, Handler};
use structopt::StructOpt;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Run a batch of commands on a fixed pool of workers
#[derive(StructOpt, Debug)]
#[structopt(name = "jobrun")]
struct Opt {
    /// path to config file
    #[structopt(
        short,
        long = "config",
        default_value = "config.toml",
        parse(from_os_str)
    )]
    config: PathBuf,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn read_config(path: &Path) -> anyhow::Result<Configuration> {
    info!(path = %path.display(), "reading config");
    Configuration::load(path)
        .with_context(|| format!("error reading config file {}", path.display()))
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_logging();
    let opt = Opt::from_args();

    let config = match read_config(&opt.config) {
        Ok(config) => config,
        Err(err) => {
            error!("{:#}", err);
            process::exit(1);
        }
    };
    debug!(?config, "loaded config");

    match Handler::new(config).run().await {
        Ok(report) => {
            for failed in report.failed() {
                warn!(worker = failed.id, exit = ?failed.exit, "worker failed during run");
            }
        }
        Err(err) => {
            error!(%err, "run aborted");
            process::exit(1);
        }
    }
}
