use colored::Colorize;
use tokio::sync::watch;

use pathstore_codec::Codec;
use pathstore_links::ShortLinkRegistry;
use pathstore_mqtt::MqttBridge;
use pathstore_server::{export_tree, AppState, PathstoreServer};
use pathstore_store::Backends;

use crate::cli::*;
use crate::config::AppConfig;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = AppConfig::load(&cli.config)?;
    match cli.command {
        Command::Serve(args) => cmd_serve(config, args).await,
        Command::Export(args) => cmd_export(config, args).await,
        Command::Encode(args) => cmd_encode(args),
        Command::Decode(args) => cmd_decode(args),
    }
}

async fn cmd_serve(mut config: AppConfig, args: ServeArgs) -> anyhow::Result<()> {
    config.apply_serve_args(&args)?;

    let backends = Backends::open(&config.store).await?;
    let store = backends.document_store(&config.store);
    let links = ShortLinkRegistry::new(backends.links.clone(), Codec::default())
        .with_timeout(config.store.operation_timeout());
    let state = AppState::new(store.clone(), links, config.server.export_root.clone());

    println!(
        "{} pathstore on {} (storage: {})",
        "✓".green().bold(),
        config.server.bind_addr.to_string().bold(),
        if config.store.database_url.is_some() { "postgres".cyan() } else { "memory".yellow() },
    );

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "cannot listen for ctrl-c");
            // Dropping the sender would read as a shutdown request.
            std::future::pending::<()>().await;
        }
        tracing::info!("shutdown requested");
        let _ = stop_tx.send(true);
    });

    let server = PathstoreServer::new(config.server.clone(), state);
    let http = async {
        server
            .serve_with_shutdown(stopped(stop_rx.clone()))
            .await
            .map_err(anyhow::Error::from)
    };

    if config.mqtt.enabled {
        println!(
            "  MQTT: {}:{}",
            config.mqtt.host.bold(),
            config.mqtt.port,
        );
        let bridge = MqttBridge::new(config.mqtt.clone(), store);
        let mqtt = async {
            bridge
                .run_until(stopped(stop_rx.clone()))
                .await
                .map_err(anyhow::Error::from)
        };
        tokio::try_join!(http, mqtt)?;
    } else {
        http.await?;
    }

    println!("{} stopped.", "✓".green());
    Ok(())
}

/// Resolves once the shutdown flag is raised or its sender is gone.
async fn stopped(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

async fn cmd_export(mut config: AppConfig, args: ExportArgs) -> anyhow::Result<()> {
    if let Some(url) = args.database_url {
        config.store.database_url = Some(url);
    }
    let root = args.root.unwrap_or(config.server.export_root);

    let backends = Backends::open(&config.store).await?;
    let store = backends.document_store(&config.store);
    let report = export_tree(&store, &root).await?;

    println!(
        "{} Wrote {} documents under {}",
        "✓".green().bold(),
        report.written.to_string().bold(),
        root.display(),
    );
    for failure in &report.failures {
        println!("  {} {}: {}", "failed:".red(), failure.path, failure.reason);
    }
    if !report.is_complete() {
        anyhow::bail!("{} documents could not be written", report.failures.len());
    }
    Ok(())
}

fn cmd_encode(args: EncodeArgs) -> anyhow::Result<()> {
    let code = Codec::default().encode(args.id)?;
    println!("{}", code.yellow());
    Ok(())
}

fn cmd_decode(args: DecodeArgs) -> anyhow::Result<()> {
    let id = Codec::default().decode(&args.code)?;
    println!("{}", id.to_string().yellow());
    Ok(())
}
