mod common;

use common::{Call, MockConnector, Script};
use jaide::{OutputFormat, SessionKind, ShellMode};

fn opens(mock: &MockConnector) -> usize {
    mock.count(|c| matches!(c, Call::Open(..)))
}

#[tokio::test]
async fn test_matching_session_is_reused() {
    let mock = MockConnector::default();
    let mut device = mock.builder("r1").build().unwrap();

    device.rpc_session().await.unwrap();
    device.rpc_session().await.unwrap();
    device.ensure_session(SessionKind::StructuredRpc).await.unwrap();

    assert_eq!(opens(&mock), 1);
    assert_eq!(device.session_kind(), Some(SessionKind::StructuredRpc));

    device.disconnect().await;
    assert_eq!(device.session_kind(), None);
    assert_eq!(mock.calls(), vec![
        Call::Open("r1".to_string(), "rpc"),
        Call::Close("r1".to_string(), "rpc"),
    ]);
}

#[tokio::test]
async fn test_kind_change_closes_previous_session() {
    let mock = MockConnector::default();
    let mut device = mock.builder("r1").build().unwrap();

    device.rpc_session().await.unwrap();
    device.exec_session().await.unwrap();
    device.transfer_session().await.unwrap();
    device.disconnect().await;

    assert_eq!(mock.calls(), vec![
        Call::Open("r1".to_string(), "rpc"),
        Call::Close("r1".to_string(), "rpc"),
        Call::Open("r1".to_string(), "exec"),
        Call::Close("r1".to_string(), "exec"),
        Call::Open("r1".to_string(), "transfer"),
        Call::Close("r1".to_string(), "transfer"),
    ]);
}

#[tokio::test]
async fn test_shell_moves_between_cli_and_shell_without_reconnecting() {
    let mock = MockConnector::new(Script {
        landed_at: Some(ShellMode::Cli),
        ..Default::default()
    });
    let mut device = mock.builder("r1").build().unwrap();

    let output = device.shell_cmd("uptime").await.unwrap();
    assert_eq!(output, "line one\nline two\n");
    assert_eq!(
        device.session_kind(),
        Some(SessionKind::InteractiveShell(ShellMode::Shell))
    );

    device.shell_session(ShellMode::Cli).await.unwrap();
    device.shell_session(ShellMode::Cli).await.unwrap();
    assert!(!device.shell_to_cli().await.unwrap());
    device.disconnect().await;

    assert_eq!(opens(&mock), 1);
    let sent: Vec<String> = mock
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            Call::Send(_, text) => Some(text),
            _ => None,
        })
        .collect();
    assert_eq!(sent, ["start shell\n", "uptime\n", "cli\n"]);
}

#[tokio::test]
async fn test_root_login_runs_operational_commands_from_cli() {
    let mock = MockConnector::default();
    let mut device = mock.builder("r1").username("root").build().unwrap();
    assert!(device.is_root_login());

    let output = device
        .op_cmd("show version", OutputFormat::Text, None)
        .await
        .unwrap();
    assert_eq!(output, "line one\nline two");
    device.disconnect().await;

    assert_eq!(mock.calls(), vec![
        Call::Open("r1".to_string(), "shell"),
        Call::Send("r1".to_string(), "cli\n".to_string()),
        Call::Send("r1".to_string(), "show version | no-more\n".to_string()),
        Call::Close("r1".to_string(), "shell"),
    ]);
}

#[tokio::test]
async fn test_operational_commands_use_exec_channel() {
    let mock = MockConnector::default();
    let mut device = mock.builder("r1").build().unwrap();

    let output = device
        .op_cmd("show chassis alarms", OutputFormat::Xml, None)
        .await
        .unwrap();
    assert_eq!(output, "r1 says hello\n");

    let err = device.op_cmd("   ", OutputFormat::Text, None).await.unwrap_err();
    assert_eq!(err.kind(), jaide::ErrorKind::InvalidCommand);
    device.disconnect().await;

    assert!(mock.calls().contains(&Call::Exec(
        "r1".to_string(),
        "show chassis alarms | display xml | no-more".to_string()
    )));
    assert_eq!(opens(&mock), 1);
}
