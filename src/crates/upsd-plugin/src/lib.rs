//! Netdata external plugin collecting UPS metrics from a NUT `upsd` daemon.
//!
//! The plugin enumerates the devices known to `upsd`, declares one chart per
//! supported variable the first time a device is seen, and then samples those
//! charts every `update_every` seconds, writing the external plugin protocol to
//! stdout. The aggregate `ups.status` variable is decoded into one 0/1
//! dimension per status flag.
//!
//! The daemon is reached through the [`DataSource`] trait; [`NutClient`]
//! implements it over the NUT network protocol.

use std::io::{self, Write};

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub mod catalog;
pub mod emission;
pub mod error;
pub mod netdata_env;
pub mod nut;
pub mod plugin_config;
pub mod poll;
pub mod registry;
pub mod source;
pub mod status;
pub mod writer;

mod tracing_setup;

pub use catalog::{lookup, ChartType, MetricDescriptor, CATALOG, STATUS_VARIABLE};
pub use emission::{clean_device_name, DeviceLabels, Emitter};
pub use error::{Result, UpsdError};
pub use netdata_env::NetdataEnv;
pub use nut::NutClient;
pub use plugin_config::PluginConfig;
pub use poll::{CycleStats, PollLoop};
pub use registry::ChartRegistry;
pub use source::{DataSource, ListRow};
pub use status::UpsStatusFlags;
pub use tracing_setup::init_tracing;

/// Exit code asking the agent to restart the plugin later.
// https://learn.netdata.cloud/docs/developer-and-contributor-corner/external-plugins#operation
pub const EXIT_AND_RESTART: i32 = 0;

/// Exit code asking the agent to never start the plugin again.
// https://learn.netdata.cloud/docs/developer-and-contributor-corner/external-plugins#disable
pub const EXIT_AND_DISABLE: i32 = 1;

/// Entry point for upsd.plugin - can be called from multi-call binaries or standalone
///
/// # Arguments
/// * `args` - Command-line arguments (should include argv[0])
///
/// # Returns
/// Exit code for the agent, see [`EXIT_AND_RESTART`] and [`EXIT_AND_DISABLE`]
pub fn run(args: Vec<String>) -> i32 {
    let netdata_env = NetdataEnv::from_environment();
    init_tracing(&netdata_env);

    let cli = match PluginConfig::try_parse_from(&args) {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                disable()
            } else {
                EXIT_AND_RESTART
            };
        }
    };

    let config = match PluginConfig::resolve(cli, netdata_env) {
        Ok(config) => config,
        Err(e) => {
            error!("invalid configuration: {:#}", e);
            return disable();
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("failed to start tokio runtime: {}", e);
            return disable();
        }
    };

    runtime.block_on(async_run(config))
}

async fn async_run(config: PluginConfig) -> i32 {
    // Without a daemon to talk to there is nothing this plugin can ever offer.
    let client = match NutClient::connect(&config.address, config.timeout).await {
        Ok(client) => client,
        Err(e) => {
            error!("{:#}", anyhow::Error::from(e));
            return disable();
        }
    };
    info!(
        "connected to upsd at {}, update_every={}s, timeout={}",
        client.address(),
        config.interval().as_secs(),
        humantime::format_duration(config.timeout)
    );

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    let mut poll = PollLoop::new(client, config.interval(), config.job_name.clone());
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match poll.run(&mut out, &cancel, config.once).await {
        Ok(()) => info!("collection stopped"),
        Err(e) => warn!("cannot write to the agent, stopping: {}", e),
    }

    EXIT_AND_RESTART
}

/// Tell the agent to stop scheduling this plugin.
fn disable() -> i32 {
    let mut stdout = io::stdout().lock();
    let _ = stdout.write_all(b"DISABLE\n");
    let _ = stdout.flush();
    EXIT_AND_DISABLE
}

async fn shutdown_signal(cancel: CancellationToken) {
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate => {}
    }

    info!("shutdown requested, stopping after the current cycle");
    cancel.cancel();
}
