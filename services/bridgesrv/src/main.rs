//! OPC-UA Data Bridge
//!
//! Reads process values from a source endpoint, filters them through
//! per-measurement deadbands, and forwards accepted changes to a destination
//! endpoint. Both pumps run under supervisors that restart them after a
//! fixed failover delay, until ctrl-c.

use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

use bridgesrv::bootstrap::{self, Args};
use bridgesrv::{
    points, BridgeConfig, BridgeError, ReadPump, Supervisor, WritePump,
};

#[tokio::main]
async fn main() -> Result<(), BridgeError> {
    let args = Args::parse();
    let config = BridgeConfig::from_file(&args.config)?;
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(&config.service.log_level);
    bootstrap::init_logging(level)?;

    info!(
        service = %config.service.name,
        config = %args.config.display(),
        "starting OPC-UA data bridge"
    );
    info!(input = %config.input.url, output = %config.output.url, "endpoints configured");

    let measurements = config.build_measurements();
    if args.validate {
        let (polled, monitored) = points::classify(&measurements);
        info!(
            measurements = measurements.len(),
            polled = polled.len(),
            monitored = monitored.len(),
            "configuration valid"
        );
        for point in &polled {
            info!(
                measurement = %point.measurement.name,
                node = %point.node,
                interval_s = point.poll_interval,
                data_type = point.measurement.data_type.map(|k| k.as_str()).unwrap_or("unspecified"),
                "polled point"
            );
        }
        for point in &monitored {
            info!(
                measurement = %point.measurement.name,
                node = %point.node,
                resolution_ms = point.resolution_ms,
                data_type = point.measurement.data_type.map(|k| k.as_str()).unwrap_or("unspecified"),
                "monitored point"
            );
        }
        return Ok(());
    }

    let read_pump = Arc::new(ReadPump::new(
        config.input.url.clone(),
        bridge_session::client_for(&config.input.url)?,
        measurements.clone(),
    ));
    let write_pump = Arc::new(WritePump::new(
        config.output.url.clone(),
        bridge_session::client_for(&config.output.url)?,
        measurements,
    ));

    let shutdown = CancellationToken::new();
    let failover_delay = config.failover_delay();

    let read_task = {
        let shutdown = shutdown.clone();
        let pump = Arc::clone(&read_pump);
        tokio::spawn(async move {
            let supervisor = Supervisor::new("readpump", failover_delay);
            supervisor
                .supervise(shutdown.clone(), move || {
                    let pump = Arc::clone(&pump);
                    let shutdown = shutdown.clone();
                    async move { pump.run(&shutdown).await }
                })
                .await;
        })
    };

    let write_task = {
        let shutdown = shutdown.clone();
        let pump = Arc::clone(&write_pump);
        tokio::spawn(async move {
            let supervisor = Supervisor::new("writepump", failover_delay);
            supervisor
                .supervise(shutdown.clone(), move || {
                    let pump = Arc::clone(&pump);
                    let shutdown = shutdown.clone();
                    async move { pump.run(&shutdown).await }
                })
                .await;
        })
    };

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| BridgeError::internal(format!("failed to listen for ctrl-c: {e}")))?;
    info!("shutdown signal received");
    shutdown.cancel();

    let _ = read_task.await;
    let _ = write_task.await;
    info!("bridge stopped");
    Ok(())
}
