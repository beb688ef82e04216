use prometheus::Registry;
use roborock_exporter::{
    error::ExporterError,
    metrics::{Poller, RoborockMetrics, DEFINITIONS},
    CleaningSummary, ConsumableStatus, ExporterConfig, Result, VacuumClient, VacuumStatus,
    WebConfig,
};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Serves the same readings every cycle. `battery` and `fail_history` can be
/// changed between cycles through the shared handles.
#[derive(Clone, Default)]
struct ScriptedClient {
    cycles: Arc<AtomicUsize>,
    battery: Arc<AtomicU32>,
    fail_history: Arc<AtomicBool>,
}

impl ScriptedClient {
    fn new() -> Self {
        let client = Self::default();
        client.battery.store(80, Ordering::SeqCst);
        client
    }
}

impl VacuumClient for ScriptedClient {
    async fn status(&mut self) -> Result<VacuumStatus> {
        self.cycles.fetch_add(1, Ordering::SeqCst);
        Ok(VacuumStatus {
            battery: self.battery.load(Ordering::SeqCst),
            clean_area: 45.2,
            clean_time: Duration::from_secs(3600),
            error_code: 0,
            fanspeed: 60,
            in_segment_cleaning: false,
            in_zone_cleaning: false,
            is_on: true,
            is_paused: false,
            is_water_box_attached: false,
            is_water_box_carriage_attached: false,
            is_water_shortage: false,
            state: 5,
        })
    }

    async fn clean_history(&mut self) -> Result<CleaningSummary> {
        if self.fail_history.load(Ordering::SeqCst) {
            return Err(ExporterError::Timeout(Duration::from_secs(5)));
        }
        Ok(CleaningSummary {
            count: 120,
            dust_collection_count: 10,
            total_area: 5000.0,
            total_duration: Duration::from_secs(720_000),
        })
    }

    async fn consumable_status(&mut self) -> Result<ConsumableStatus> {
        Ok(ConsumableStatus {
            filter_left: Duration::from_secs(54_000),
            main_brush_left: Duration::from_secs(36_000),
            side_brush_left: Duration::from_secs(54_000),
            sensor_dirty_left: Duration::from_secs(18_000),
        })
    }
}

fn setup(interval_secs: u64) -> (Registry, ScriptedClient, Poller<ScriptedClient>) {
    let registry = Registry::new();
    let metrics = RoborockMetrics::new(&registry).expect("Should register metrics");
    let client = ScriptedClient::new();
    let poller = Poller::new(client.clone(), metrics, Duration::from_secs(interval_secs));
    (registry, client, poller)
}

fn gauge(registry: &Registry, name: &str) -> f64 {
    registry
        .gather()
        .iter()
        .find(|family| family.get_name() == name)
        .unwrap_or_else(|| panic!("{} is not registered", name))
        .get_metric()[0]
        .get_gauge()
        .get_value()
}

fn all_gauges(registry: &Registry) -> Vec<(String, f64)> {
    DEFINITIONS
        .iter()
        .map(|d| (d.name.to_string(), gauge(registry, d.name)))
        .collect()
}

/// Test the reference scenario end to end through the registry
#[tokio::test]
async fn test_one_cycle_publishes_every_field() {
    let (registry, _client, mut poller) = setup(30);
    poller.run_cycle().await.expect("Cycle should succeed");

    let expected = [
        ("roborock_battery", 80.0),
        ("roborock_clean_area", 45.2),
        ("roborock_clean_time", 3600.0),
        ("roborock_error_code", 0.0),
        ("roborock_fanspeed", 60.0),
        ("roborock_in_segment_cleaning", 0.0),
        ("roborock_in_zone_cleaning", 0.0),
        ("roborock_is_on", 1.0),
        ("roborock_is_pause", 0.0),
        ("roborock_is_water_box_attached", 0.0),
        ("roborock_is_water_box_carriage_attached", 0.0),
        ("roborock_water_shortage_status", 0.0),
        ("roborock_state", 5.0),
        ("roborock_clean_count", 120.0),
        ("roborock_dust_collection_count", 10.0),
        ("roborock_total_area", 5000.0),
        ("roborock_total_duration", 720_000.0),
        ("roborock_filter_left", 54_000.0),
        ("roborock_main_brush_left", 36_000.0),
        ("roborock_sensor_dirty_left", 18_000.0),
        ("roborock_side_brush_left", 54_000.0),
    ];
    assert_eq!(expected.len(), DEFINITIONS.len());
    for (name, value) in expected {
        assert_eq!(gauge(&registry, name), value, "{}", name);
    }
}

/// Test that publishing the same readings twice does not accumulate
#[tokio::test]
async fn test_publishing_is_idempotent() {
    let (registry, _client, mut poller) = setup(30);

    poller.run_cycle().await.unwrap();
    let first = all_gauges(&registry);
    poller.run_cycle().await.unwrap();
    assert_eq!(all_gauges(&registry), first);
}

/// Test that a failed cycle leaves every gauge at its previous value
#[tokio::test]
async fn test_failed_cycle_keeps_previous_values() {
    let (registry, client, mut poller) = setup(30);
    poller.run_cycle().await.unwrap();
    let before = all_gauges(&registry);

    // status succeeds with a new battery level, then history fails
    client.battery.store(10, Ordering::SeqCst);
    client.fail_history.store(true, Ordering::SeqCst);
    tokio_test::assert_err!(poller.run_cycle().await);

    assert_eq!(all_gauges(&registry), before);
    assert_eq!(gauge(&registry, "roborock_battery"), 80.0);
}

/// Test that the loop runs exactly one cycle per interval
#[tokio::test(start_paused = true)]
async fn test_one_cycle_per_interval() {
    let (_registry, client, mut poller) = setup(5);
    let cancel = CancellationToken::new();

    let handle = tokio::spawn({
        let cancel = cancel.clone();
        async move { poller.run(cancel).await }
    });

    tokio::time::sleep(Duration::from_secs(12)).await;
    cancel.cancel();
    handle.await.expect("Poller task should not panic");

    // cycles at t = 0, 5 and 10
    assert_eq!(client.cycles.load(Ordering::SeqCst), 3);
}

/// Test that the loop survives a failure and retries after one interval
#[tokio::test(start_paused = true)]
async fn test_loop_recovers_after_failure() {
    let (registry, client, mut poller) = setup(5);
    client.fail_history.store(true, Ordering::SeqCst);
    let cancel = CancellationToken::new();

    let handle = tokio::spawn({
        let cancel = cancel.clone();
        async move { poller.run(cancel).await }
    });

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(client.cycles.load(Ordering::SeqCst), 1);
    assert_eq!(gauge(&registry, "roborock_battery"), 0.0);

    client.fail_history.store(false, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(client.cycles.load(Ordering::SeqCst), 2);
    assert_eq!(gauge(&registry, "roborock_battery"), 80.0);

    cancel.cancel();
    handle.await.unwrap();
}

/// Test that cancellation stops the loop during its sleep
#[tokio::test(start_paused = true)]
async fn test_cancel_stops_loop() {
    let (_registry, client, mut poller) = setup(30);
    let cancel = CancellationToken::new();
    cancel.cancel();

    poller.run(cancel).await;
    assert_eq!(client.cycles.load(Ordering::SeqCst), 1);
}

/// Test that missing address or token is a configuration error
#[test]
fn test_missing_address_or_token() {
    let token = Some("476e6b70343055483230644c53707a12");
    for (ip, tok) in [(None, token), (Some(""), token), (Some("10.0.0.2"), None), (Some("10.0.0.2"), Some(""))] {
        let result = ExporterConfig::new(ip, tok, 30, 5, WebConfig::default());
        assert!(matches!(result, Err(ExporterError::Config(_))));
    }
}

/// Test the documented defaults
#[test]
fn test_defaults() {
    assert_eq!(roborock_exporter::DEFAULT_EXPORTER_PORT, 9877);
    assert_eq!(roborock_exporter::DEFAULT_POLLING_INTERVAL_SECS, 30);
    assert_eq!(WebConfig::default().port, 9877);
}
