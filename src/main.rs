use std::future::pending;
use std::sync::Arc;

use smoothie_net::command::{BuiltinCommands, CommandExecutor, queue};
use smoothie_net::config::Config;
use smoothie_net::output::SinkCollector;
use smoothie_net::server::{self, Services};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let cfg = Config::load()?;

    let (commands, receiver) = queue::channel(cfg.commands.queue_depth);
    let _executor = CommandExecutor::spawn(BuiltinCommands, receiver)?;

    let collector = Arc::new(SinkCollector::new());
    let gc = collector.spawn(cfg.commands.gc_interval());

    let services = Services {
        queue: commands,
        collector,
    };

    let http = async {
        if cfg.http.enabled {
            server::listener::run(&cfg.http, services.clone()).await
        } else {
            pending().await
        }
    };

    let shell = async {
        if cfg.shell.enabled {
            server::shell::run(&cfg.shell, services.clone()).await
        } else {
            pending().await
        }
    };

    tokio::select! {
        res = http => {
            res?;
        }

        res = shell => {
            res?;
        }

        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    gc.abort();
    Ok(())
}
