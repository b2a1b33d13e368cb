use clap::Parser;
use color_eyre::{Report, Result};
use device_controller::config::{
    Config, DEFAULT_CORE_COMMAND_ADDR, DEFAULT_CORE_METADATA_ADDR, DEFAULT_PROBE_ADDR,
};
use device_controller::controller::Controller;
use tracing::Level;
use tracing_subscriber::{filter, prelude::*};

#[derive(Parser)]
#[clap(about = "Keeps OpenYurt devices in sync with an EdgeX Foundry edge platform")]
struct Args {
    /// Node pool whose devices this controller manages
    #[clap(long, env = "NODEPOOL")]
    nodepool: String,
    /// Namespace to watch, all namespaces when unset
    #[clap(long, env = "NAMESPACE")]
    namespace: Option<String>,
    #[clap(long, env = "CORE_METADATA_ADDR", default_value = DEFAULT_CORE_METADATA_ADDR)]
    core_metadata_addr: String,
    #[clap(long, env = "CORE_COMMAND_ADDR", default_value = DEFAULT_CORE_COMMAND_ADDR)]
    core_command_addr: String,
    /// Address of the health, readiness and debug endpoints
    #[clap(long, env = "PROBE_ADDR", default_value = DEFAULT_PROBE_ADDR)]
    probe_addr: String,
    /// Maximum number of concurrent reconciliations per kind
    #[clap(long, env = "WORKERS", default_value_t = 4)]
    workers: usize,
    #[clap(long, env = "ERROR_BACKOFF_SECS", default_value_t = 10)]
    error_backoff_secs: u64,
    #[clap(long, env = "EDGE_TIMEOUT_SECS", default_value_t = 10)]
    edge_timeout_secs: u64,
    /// Log level of the controller crates
    #[clap(long, env = "LOG_LEVEL", default_value = "debug")]
    log_level: Level,
}

fn main() -> Result<()> {
    let opt = Args::parse();
    color_eyre::install()?;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .pretty()
                .with_thread_names(true),
        )
        .with(
            filter::Targets::new()
                .with_default(Level::INFO)
                .with_target("device_controller", opt.log_level)
                .with_target("yurt_device_controller", opt.log_level),
        )
        .init();
    let config = Config {
        node_pool: opt.nodepool,
        namespace: opt.namespace,
        core_metadata_addr: opt.core_metadata_addr,
        core_command_addr: opt.core_command_addr,
        probe_addr: opt.probe_addr.parse()?,
        workers: opt.workers,
        error_backoff_secs: opt.error_backoff_secs,
        edge_timeout_secs: opt.edge_timeout_secs,
    };

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    rt.block_on(async move {
        let mut ctl = Controller::new(config)?;
        let client = kube::Client::try_default().await?;
        ctl.spawn_device_controller(client.clone())?;
        ctl.spawn_deviceprofile_controller(client)?;
        ctl.spawn_probe_server();
        ctl.run().await?;
        Ok::<_, Report>(())
    })?;
    Ok(())
}
