use collector_devkit::device_stub::REPLY_MEASUREMENT;
use collector_devkit::{InventoryFixture, ScriptedFleet, TestHarness};
use metric_collector::models::{FieldValue, RUN_STATS_MEASUREMENT};
use std::collections::BTreeSet;

fn fleet_fixture(hosts: &[&str]) -> InventoryFixture {
    let mut fixture = InventoryFixture::new()
        .unwrap()
        .commands("base", &["all"], &["show version", "show interfaces", "show route summary"]);
    for host in hosts {
        fixture = fixture.host(host, "juniper", &["lab"]);
    }
    fixture
}

#[tokio::test]
async fn shards_cover_the_fleet_exactly_once() {
    let hosts: Vec<String> = (1..=11).map(|i| format!("edge-{i:02}")).collect();
    let refs: Vec<&str> = hosts.iter().map(String::as_str).collect();
    let harness = TestHarness::new(fleet_fixture(&refs));

    let mut seen = Vec::new();
    for index in 0..3 {
        let descriptor = format!("{index}/3");
        let outcome = harness.run(&["--sharding", descriptor.as_str()]).await.unwrap();
        let run_stats = outcome.run_stats().unwrap();
        assert_eq!(run_stats.tag("sharding"), Some(descriptor.as_str()));
        seen.extend(outcome.collected_hosts());
    }

    assert_eq!(seen.len(), hosts.len(), "a host was collected twice or skipped");
    let unique: BTreeSet<String> = seen.into_iter().collect();
    assert_eq!(unique, hosts.into_iter().collect::<BTreeSet<_>>());
}

#[tokio::test]
async fn failing_command_is_counted_and_skipped() {
    let fleet = ScriptedFleet::new().failing("r1", "show interfaces");
    let harness = TestHarness::new(fleet_fixture(&["r1"])).with_fleet(fleet);

    let outcome = harness.run(&[]).await.unwrap();

    assert_eq!(
        harness.fleet.calls_for("r1"),
        vec!["show version", "show interfaces", "show route summary"]
    );
    let stats = outcome.host_stats("r1").unwrap();
    assert_eq!(stats.field("nbr_commands"), Some(&FieldValue::Int(3)));
    assert_eq!(stats.field("nbr_successful_commands"), Some(&FieldValue::Int(2)));
    assert_eq!(stats.field("nbr_error_commands"), Some(&FieldValue::Int(1)));
    assert_eq!(outcome.sink.measurement(REPLY_MEASUREMENT).len(), 2);
}

#[tokio::test]
async fn unreachable_host_only_reports_stats() {
    let fleet = ScriptedFleet::new().unreachable("r2");
    let harness = TestHarness::new(fleet_fixture(&["r1", "r2"])).with_fleet(fleet);

    let outcome = harness.run(&[]).await.unwrap();

    assert!(harness.fleet.calls_for("r2").is_empty());
    let stats = outcome.host_stats("r2").unwrap();
    assert_eq!(stats.field("reachable"), Some(&FieldValue::Int(0)));
    assert_eq!(stats.field("unreachable"), Some(&FieldValue::Int(1)));
    assert_eq!(stats.field("nbr_commands"), Some(&FieldValue::Int(0)));

    let r1 = outcome.host_stats("r1").unwrap();
    assert_eq!(r1.field("nbr_successful_commands"), Some(&FieldValue::Int(3)));
}

#[tokio::test]
async fn run_stats_are_emitted_last() {
    let harness = TestHarness::new(fleet_fixture(&["a", "b", "c", "d", "e"]));

    let outcome = harness.run(&["--nbr-thread", "2"]).await.unwrap();
    assert_eq!(outcome.summary.devices_selected, 5);
    assert_eq!(outcome.summary.units, 2);

    let points = outcome.sink.points();
    let last = points.last().unwrap();
    assert_eq!(last.measurement(), RUN_STATS_MEASUREMENT);
    assert_eq!(last.field("nbr_devices"), Some(&FieldValue::Int(5)));
    assert_eq!(last.field("nbr_threads"), Some(&FieldValue::Int(2)));
    assert_eq!(points.iter().filter(|p| p.measurement() == RUN_STATS_MEASUREMENT).count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_and_sequential_runs_collect_the_same_hosts() {
    let hosts: Vec<String> = (0..17).map(|i| format!("core-{i:02}")).collect();
    let refs: Vec<&str> = hosts.iter().map(String::as_str).collect();
    let harness = TestHarness::new(fleet_fixture(&refs));

    let concurrent = harness.run(&["--nbr-thread", "5"]).await.unwrap();
    let sequential = harness.run(&["--use-thread", "false"]).await.unwrap();

    assert_eq!(sequential.collected_hosts(), hosts);
    let concurrent_hosts: BTreeSet<String> = concurrent.collected_hosts().into_iter().collect();
    assert_eq!(concurrent_hosts, hosts.iter().cloned().collect::<BTreeSet<_>>());
    assert_eq!(concurrent.summary.units, 5);
    assert_eq!(sequential.run_stats().unwrap().field("nbr_threads"), None);
}

#[tokio::test]
async fn host_and_command_tags_narrow_the_run() {
    let fixture = InventoryFixture::new()
        .unwrap()
        .host("mx-1", "juniper", &["core", "par1"])
        .host("mx-2", "juniper", &["edge", "par1"])
        .host("lb-1", "f5", &["lb"])
        .commands("system", &["system"], &["show version"])
        .commands("bgp", &["routing", "core"], &["show bgp summary"]);
    let harness = TestHarness::new(fixture);

    let outcome = harness
        .run(&["--use-thread", "false", "--tag", "core", "lb", "--cmd-tag", "rout.*"])
        .await
        .unwrap();

    assert_eq!(outcome.collected_hosts(), vec!["lb-1", "mx-1"]);
    assert_eq!(harness.fleet.calls_for("mx-1"), vec!["show bgp summary"]);
    assert_eq!(harness.fleet.calls_for("lb-1"), vec!["show bgp summary"]);
    assert!(harness.fleet.calls_for("mx-2").is_empty());
}

#[tokio::test]
async fn context_tags_do_not_override_point_tags() {
    let fixture = InventoryFixture::new()
        .unwrap()
        .host_with_context("r1", "juniper", &["lab"], &[("site", "par1"), ("device", "alias")])
        .commands("base", &[], &["show version"]);
    let harness = TestHarness::new(fixture);

    let outcome = harness.run(&[]).await.unwrap();
    let lines = outcome.sink.lines();
    assert!(lines.contains(&"scripted_reply,command=show_version,device=r1,site=par1 value=1".to_string()));
    assert!(outcome
        .sink
        .points()
        .iter()
        .filter(|p| p.measurement() != RUN_STATS_MEASUREMENT)
        .all(|p| p.tag("device") == Some("r1") && p.tag("site") == Some("par1")));
}

#[tokio::test]
async fn panicking_driver_does_not_stop_other_hosts() {
    let fleet = ScriptedFleet::new().panicking("b", "show version");
    let harness = TestHarness::new(fleet_fixture(&["a", "b", "c"])).with_fleet(fleet);

    let outcome = harness.run(&["--nbr-thread", "1"]).await.unwrap();

    assert_eq!(outcome.collected_hosts(), vec!["a", "c"]);
    assert_eq!(outcome.summary.devices_selected, 3);
}

#[tokio::test]
async fn invalid_shard_aborts_before_collection() {
    let harness = TestHarness::new(fleet_fixture(&["r1"]));

    let err = harness.run(&["--sharding", "3/3"]).await.err().unwrap();
    assert!(err.to_string().contains("shard"), "{err}");
    assert!(harness.fleet.calls().is_empty());
}
