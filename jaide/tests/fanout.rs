mod common;

use std::collections::HashMap;
use std::pin::pin;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::time::Instant;

use common::{Call, MockConnector, Script, Unreachable};
use jaide::{
    CommandBatch, Coordinator, DeviceResult, DiffMode, ErrorKind, Operation, OutputFormat,
    OutputSink, ResultStatus, SinkMode,
};

fn quiet(mock: &MockConnector) -> Coordinator {
    Coordinator::new(mock.builder(""))
        .concurrency(2)
        .sink(OutputSink::new(SinkMode::Quiet))
}

fn by_target(mut results: Vec<DeviceResult>) -> Vec<DeviceResult> {
    results.sort_by(|a, b| a.target.cmp(&b.target));
    results
}

#[tokio::test]
async fn test_failures_are_isolated_per_target() {
    let mock = MockConnector::new(Script {
        unreachable: HashMap::from([
            ("r1".to_string(), Unreachable::Refused),
            ("r3".to_string(), Unreachable::BadPassword),
        ]),
        ..Default::default()
    });
    let operation = Operation::OpCommand {
        commands: CommandBatch::from_text("show version"),
        format: OutputFormat::Text,
        xpath: None,
    };

    let results = quiet(&mock)
        .run(&CommandBatch::from_text("r1, r2, r3"), &operation)
        .await
        .unwrap();
    let results = by_target(results);
    assert_eq!(results.len(), 3);

    assert_eq!(results[0].target, "r1");
    assert_eq!(results[0].status, ResultStatus::Fatal);
    assert_eq!(results[0].error, Some(ErrorKind::Connection));
    assert_eq!(
        results[0].body,
        "> show version\nThe device refused the connection on port 22, or no route to host.\n"
    );

    assert_eq!(results[1].target, "r2");
    assert!(results[1].is_success());
    assert_eq!(results[1].body, "> show version\nr2 says hello\n\n");

    assert_eq!(results[2].target, "r3");
    assert_eq!(results[2].error, Some(ErrorKind::Authentication));
    assert!(results[2].body.ends_with("Authentication failed for device: r3\n"));

    // only the reachable device was opened, and it was closed again
    assert_eq!(mock.calls(), vec![
        Call::Open("r2".to_string(), "exec"),
        Call::Exec("r2".to_string(), "show version | no-more".to_string()),
        Call::Close("r2".to_string(), "exec"),
    ]);
}

#[tokio::test(start_paused = true)]
async fn test_slow_device_does_not_hold_back_the_others() {
    let mock = MockConnector::new(Script {
        slow: HashMap::from([("r1".to_string(), Duration::from_secs(2))]),
        ..Default::default()
    });
    let operation = Operation::OpCommand {
        commands: CommandBatch::from_text("show version"),
        format: OutputFormat::Text,
        xpath: None,
    };
    let coordinator = quiet(&mock);
    let targets = CommandBatch::from_text("r1, r2");

    let start = Instant::now();
    let mut results = pin!(coordinator.stream(&targets, &operation).unwrap());

    let first = results.next().await.unwrap();
    assert_eq!(first.target, "r2");
    assert!(first.is_success());
    assert!(start.elapsed() < Duration::from_secs(1));

    let second = results.next().await.unwrap();
    assert_eq!(second.target, "r1");
    assert!(second.is_success());
    assert!(start.elapsed() >= Duration::from_secs(2));

    assert!(results.next().await.is_none());
}

#[tokio::test]
async fn test_multi_target_diff_is_rejected_up_front() {
    let mock = MockConnector::default();
    let operation = Operation::DiffConfig {
        second_host: "r9".to_string(),
        mode: DiffMode::Set,
    };

    let err = quiet(&mock)
        .run(&CommandBatch::from_text("r1,r2"), &operation)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Usage);
    assert!(mock.calls().is_empty());

    let err = quiet(&mock)
        .run(&CommandBatch::default(), &Operation::DeviceInfo)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Usage);
}

#[tokio::test]
async fn test_diff_against_second_device() {
    let mock = MockConnector::new(Script {
        configs: HashMap::from([
            (
                "r1".to_string(),
                "set system host-name r1\nset system ntp server 10.0.0.1\n".to_string(),
            ),
            (
                "r2".to_string(),
                "set system host-name r2\nset system ntp server 10.0.0.1\n".to_string(),
            ),
        ]),
        ..Default::default()
    });
    let operation = Operation::DiffConfig {
        second_host: "r2".to_string(),
        mode: DiffMode::Set,
    };

    let results = quiet(&mock)
        .run(&CommandBatch::from_text("r1"), &operation)
        .await
        .unwrap();
    let body = &results[0].body;
    assert!(results[0].is_success());
    assert!(body.starts_with("--- r1\n+++ r2\n"));
    assert!(body.contains("-set system host-name r1\n+set system host-name r2\n"));

    let calls = mock.calls();
    assert!(calls.contains(&Call::Command(
        "r2".to_string(),
        "show configuration | display set".to_string()
    )));
    assert!(calls.contains(&Call::Close("r1".to_string(), "rpc")));
    assert!(calls.contains(&Call::Close("r2".to_string(), "rpc")));
}

#[tokio::test]
async fn test_identical_configs_and_unreachable_peer() {
    let mock = MockConnector::new(Script {
        unreachable: HashMap::from([("r3".to_string(), Unreachable::BadPassword)]),
        ..Default::default()
    });
    let coordinator = quiet(&mock);
    let targets = CommandBatch::from_text("r1");

    let same = Operation::DiffConfig {
        second_host: "r2".to_string(),
        mode: DiffMode::Stanza,
    };
    let results = coordinator.run(&targets, &same).await.unwrap();
    assert_eq!(
        results[0].body,
        "There were no config differences between r1 and r2\n"
    );

    let unreachable = Operation::DiffConfig {
        second_host: "r3".to_string(),
        mode: DiffMode::Set,
    };
    let results = coordinator.run(&targets, &unreachable).await.unwrap();
    assert_eq!(results[0].target, "r1");
    assert_eq!(results[0].error, Some(ErrorKind::Authentication));
    assert_eq!(results[0].body, "Authentication failed for device: r3\n");
}

#[tokio::test]
async fn test_pull_from_several_devices_prefixes_local_names() {
    let mock = MockConnector::default();
    let operation = Operation::ScpPull {
        source: "/var/log/messages".to_string(),
        destination: "/tmp/logs".to_string(),
        progress: true,
        multi: true,
    };

    let results = quiet(&mock)
        .run(&CommandBatch::from_text("r1,r2"), &operation)
        .await
        .unwrap();
    let results = by_target(results);
    assert!(results.iter().all(DeviceResult::is_success));
    assert!(results[0]
        .body
        .ends_with("Received r1:/var/log/messages and stored it in /tmp/logs/r1_messages.\n"));

    let calls = mock.calls();
    for host in ["r1", "r2"] {
        assert!(calls.contains(&Call::Pull(
            "/var/log/messages".to_string(),
            format!("/tmp/logs/{host}_messages")
        )));
    }
    // progress lines are not drawn while several devices run
    assert_eq!(mock.count(|c| matches!(c, Call::Progress(_))), 0);
}

#[tokio::test]
async fn test_single_target_pull_draws_progress() {
    let mock = MockConnector::default();
    let operation = Operation::ScpPull {
        source: "/var/log/messages".to_string(),
        destination: "/tmp/logs".to_string(),
        progress: true,
        multi: false,
    };

    let results = quiet(&mock)
        .run(&CommandBatch::from_text("r1"), &operation)
        .await
        .unwrap();
    assert!(results[0].is_success());
    assert_eq!(mock.count(|c| *c == Call::Progress("r1".to_string())), 1);
}

#[tokio::test]
async fn test_per_target_files() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockConnector::default();
    let coordinator = Coordinator::new(mock.builder("")).sink(
        OutputSink::new(SinkMode::PerTarget(dir.path().join("report.txt"))).announce(false),
    );
    let operation = Operation::OpCommand {
        commands: CommandBatch::from_text("show version, show chassis alarms"),
        format: OutputFormat::Text,
        xpath: None,
    };

    coordinator
        .run(&CommandBatch::from_text("r1,r2"), &operation)
        .await
        .unwrap();

    let r1 = std::fs::read_to_string(dir.path().join("r1_report.txt")).unwrap();
    assert!(r1.contains("Results from device: r1 [OK]\n"));
    assert!(r1.contains("> show version\nr1 says hello\n"));
    assert!(r1.contains("> show chassis alarms\n"));
    assert!(!r1.contains("r2"));
    assert!(dir.path().join("r2_report.txt").exists());
}

#[test]
fn test_result_json() {
    let failed = DeviceResult::failure(
        "r1",
        "The device refused the connection on port 22, or no route to host.\n",
        ErrorKind::Connection,
    );
    let json = serde_json::to_value(&failed).unwrap();
    assert_eq!(json["target"], "r1");
    assert_eq!(json["status"], "fatal");
    assert_eq!(json["error"], "connection");

    let ok = serde_json::to_value(DeviceResult::success("r2", "ok\n")).unwrap();
    assert_eq!(ok["status"], "success");
    assert!(ok.get("error").is_none());

    let back: DeviceResult = serde_json::from_value(json).unwrap();
    assert_eq!(back, failed);
}
