use clap::Parser;
use log::{error, info, warn};
use port_listener::configuration::{CommandLine, Config};
use port_listener::data_capture::CaptureSession;
use port_listener::output_path::resolve_output_path;
use std::path::Path;
use std::time::Duration;

#[tokio::main]
async fn main() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .parse_default_env()
        .init();

    let args = CommandLine::parse();

    let config = Config::from_args(&args).unwrap_or_else(|e| {
        error!("Unable to build configuration: {}", e);
        std::process::exit(1);
    });

    let output_path = resolve_output_path(
        config.output_path.as_deref(),
        Path::new("."),
        chrono::Local::now(),
    );
    let session_config = config.session_config(output_path).unwrap_or_else(|e| {
        error!("Unable to build session configuration: {}", e);
        std::process::exit(1);
    });

    info!("Connecting to {}", session_config.endpoint);
    let session = CaptureSession::connect(session_config)
        .await
        .unwrap_or_else(|e| {
            error!("{}, exiting...", e);
            std::process::exit(1);
        });

    for command in &config.commands {
        if let Err(e) = session.send_command(command).await {
            error!("{}, exiting...", e);
            std::process::exit(1);
        }
    }
    if let Some(delay) = config.settle_delay() {
        info!("Waiting {:?} for the device to settle", delay);
        tokio::time::sleep(delay).await;
    }

    if let Err(e) = session.start_listening().await {
        error!("Unable to start listening: {}", e);
        std::process::exit(1);
    }

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Interrupted, stopping"),
        _ = session.wait_for_capture_end() => info!("Capture ended"),
        _ = sleep_or_forever(config.capture_duration()) => info!("Capture duration elapsed"),
    }

    match session.stop_listening().await {
        Ok(Some(summary)) => {
            if args.summary_json {
                match serde_json::to_string_pretty(&summary) {
                    Ok(json) => println!("{}", json),
                    Err(e) => warn!("Unable to serialize summary: {}", e),
                }
            } else {
                info!(
                    "Captured {} bytes in {} chunks to {}",
                    summary.bytes_captured,
                    summary.chunks,
                    summary.output_path.display()
                );
            }
        }
        Ok(None) => {}
        Err(e) => {
            error!("Capture failed: {}", e);
            std::process::exit(1);
        }
    }
}

async fn sleep_or_forever(duration: Option<Duration>) {
    match duration {
        Some(duration) => tokio::time::sleep(duration).await,
        None => std::future::pending().await,
    }
}
