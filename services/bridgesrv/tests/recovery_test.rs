//! Failure and recovery tests
//!
//! Fault-inject the simulated endpoints and assert the supervisor/pump
//! contract: fatal errors end a run cycle with the session released, the
//! supervisor restarts after its delay, and service recovers once the
//! endpoint does.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use bridge_model::{Deadband, Measurement, NodeRef, Value};
use bridge_session::sim::SimServer;
use bridgesrv::{ReadPump, Supervisor, WritePump};

fn polled_measurement(tag: &str) -> Arc<Measurement> {
    Arc::new(
        Measurement::build(
            format!("{tag}.temperature"),
            NodeRef::new(format!("ns=2;s={tag}.In")),
            NodeRef::new(format!("ns=4;s={tag}.Out")),
        )
        .polled(60)
        .deadband(Deadband::new(0.5, 0.0))
        .finish(),
    )
}

fn supervised_read_pump(
    source: &SimServer,
    measurements: Vec<Arc<Measurement>>,
    delay: Duration,
    shutdown: &CancellationToken,
) -> tokio::task::JoinHandle<()> {
    let pump = Arc::new(ReadPump::new(
        source.url(),
        Arc::new(source.client()),
        measurements,
    ));
    let shutdown = shutdown.clone();
    tokio::spawn(async move {
        let supervisor = Supervisor::new("readpump", delay);
        supervisor
            .supervise(shutdown.clone(), move || {
                let pump = Arc::clone(&pump);
                let shutdown = shutdown.clone();
                async move { pump.run(&shutdown).await }
            })
            .await;
    })
}

fn supervised_write_pump(
    destination: &SimServer,
    measurements: Vec<Arc<Measurement>>,
    delay: Duration,
    shutdown: &CancellationToken,
) -> tokio::task::JoinHandle<()> {
    let pump = Arc::new(WritePump::new(
        destination.url(),
        Arc::new(destination.client()),
        measurements,
    ));
    let shutdown = shutdown.clone();
    tokio::spawn(async move {
        let supervisor = Supervisor::new("writepump", delay);
        supervisor
            .supervise(shutdown.clone(), move || {
                let pump = Arc::clone(&pump);
                let shutdown = shutdown.clone();
                async move { pump.run(&shutdown).await }
            })
            .await;
    })
}

async fn wait_until(deadline: Duration, mut check: impl FnMut() -> bool) -> bool {
    timeout(deadline, async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .is_ok()
}

#[tokio::test]
async fn bridge_recovers_once_the_source_accepts_connections() {
    let source = SimServer::new("sim://rec-conn-src");
    let destination = SimServer::new("sim://rec-conn-dst");
    let measurement = polled_measurement("recconn");
    source.set_value(&measurement.node_in, 10.0);
    source.set_fail_connect(true);

    let shutdown = CancellationToken::new();
    let write_task = supervised_write_pump(
        &destination,
        vec![Arc::clone(&measurement)],
        Duration::from_millis(50),
        &shutdown,
    );
    let read_task = supervised_read_pump(
        &source,
        vec![Arc::clone(&measurement)],
        Duration::from_millis(50),
        &shutdown,
    );

    // A few failed cycles go by without a single successful connect.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(source.connect_count(), 0);
    assert!(destination.written().is_empty());

    // Endpoint comes back; the supervisor's next attempt succeeds and the
    // value crosses the bridge.
    source.set_fail_connect(false);
    assert!(
        wait_until(Duration::from_secs(5), || !destination.written().is_empty()).await,
        "bridge did not recover after the endpoint came back"
    );
    assert_eq!(
        destination.written()[0].value.value,
        Some(Value::Number(10.0))
    );

    shutdown.cancel();
    let _ = read_task.await;
    let _ = write_task.await;
}

#[tokio::test]
async fn read_failures_cycle_the_pump_until_reads_succeed() {
    let source = SimServer::new("sim://rec-read-src");
    let destination = SimServer::new("sim://rec-read-dst");
    let measurement = polled_measurement("recread");
    source.set_value(&measurement.node_in, 20.0);
    source.set_fail_reads(true);

    let shutdown = CancellationToken::new();
    let write_task = supervised_write_pump(
        &destination,
        vec![Arc::clone(&measurement)],
        Duration::from_millis(50),
        &shutdown,
    );
    let read_task = supervised_read_pump(
        &source,
        vec![Arc::clone(&measurement)],
        Duration::from_millis(50),
        &shutdown,
    );

    // Each cycle connects, fails its first batched read, and is restarted.
    assert!(
        wait_until(Duration::from_secs(5), || source.connect_count() >= 2).await,
        "read failures should cycle the pump"
    );
    assert!(destination.written().is_empty());

    source.set_fail_reads(false);
    assert!(
        wait_until(Duration::from_secs(5), || !destination.written().is_empty()).await,
        "bridge did not recover after reads came back"
    );

    shutdown.cancel();
    let _ = read_task.await;
    let _ = write_task.await;

    // Guaranteed release: every successful connect was matched by a
    // disconnect once the pumps wound down.
    assert_eq!(source.connect_count(), source.disconnect_count());
}

#[tokio::test]
async fn subscription_loss_is_survived_by_restart() {
    let source = SimServer::new("sim://rec-sub-src");
    let destination = SimServer::new("sim://rec-sub-dst");
    let measurement = Arc::new(
        Measurement::build(
            "recsub.valve",
            NodeRef::new("ns=2;s=RecSub.In"),
            NodeRef::new("ns=4;s=RecSub.Out"),
        )
        .monitored(100)
        .finish(),
    );

    let shutdown = CancellationToken::new();
    let write_task = supervised_write_pump(
        &destination,
        vec![Arc::clone(&measurement)],
        Duration::from_millis(50),
        &shutdown,
    );
    let read_task = supervised_read_pump(
        &source,
        vec![Arc::clone(&measurement)],
        Duration::from_millis(50),
        &shutdown,
    );

    assert!(
        wait_until(Duration::from_secs(2), || source.active_subscriptions() == 1).await,
        "subscription should be installed"
    );
    source.terminate_subscriptions("simulated network loss");

    // A fresh run cycle installs a fresh subscription.
    assert!(
        wait_until(Duration::from_secs(5), || source.active_subscriptions() == 1).await,
        "subscription should be reinstalled after restart"
    );
    source.set_value(&measurement.node_in, true);
    assert!(
        wait_until(Duration::from_secs(2), || !destination.written().is_empty()).await,
        "value should flow after recovery"
    );

    shutdown.cancel();
    let _ = read_task.await;
    let _ = write_task.await;
    assert_eq!(source.connect_count(), source.disconnect_count());
}
