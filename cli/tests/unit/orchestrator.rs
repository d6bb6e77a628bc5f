//! Tests for `TunnelOrchestrator` and the on-start hooks.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use burrow_common::{TunnelPhase, TunnelStatus};
use burrow_cli::application::ports::{
    CompanionServer, CredentialSource, StartObserver, StatusSink, TunnelStarted,
};
use burrow_cli::application::services::tunnel::{StartHooks, TunnelOrchestrator};
use burrow_cli::domain::{Credential, CredentialError, TunnelError};
use parking_lot::Mutex;

use crate::helpers::{
    FakeProvider, LONG_RUNNING, ShellLauncher, TestSupervisor, fast_options, supervisor,
};

/// Credential source that issues a fixed token or a fixed failure.
struct FakeCredentials {
    token: Option<&'static str>,
    calls: Arc<AtomicUsize>,
}

impl FakeCredentials {
    fn issuing(token: &'static str) -> Self {
        Self {
            token: Some(token),
            calls: Arc::default(),
        }
    }

    fn unavailable() -> Self {
        Self {
            token: None,
            calls: Arc::default(),
        }
    }
}

impl CredentialSource for FakeCredentials {
    async fn fetch_credential(&self) -> Result<Credential, CredentialError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.token {
            Some(token) => Ok(Credential::new(token, None)),
            None => Err(CredentialError::Status {
                status: 503,
                body: "maintenance".into(),
            }),
        }
    }
}

fn orchestrator(
    credentials: FakeCredentials,
    provider: FakeProvider,
) -> (
    TunnelOrchestrator<FakeCredentials, FakeProvider, ShellLauncher>,
    TestSupervisor,
    ShellLauncher,
) {
    let launcher = ShellLauncher::new(LONG_RUNNING);
    let (sup, _) = supervisor(provider, launcher.clone(), fast_options());
    (
        TunnelOrchestrator::new(credentials, sup.clone()),
        sup,
        launcher,
    )
}

#[tokio::test]
async fn test_manual_token_skips_credential_source() {
    let credentials = FakeCredentials::issuing("backend-token");
    let calls = credentials.calls.clone();
    let (orch, sup, launcher) = orchestrator(credentials, FakeProvider::ok());

    orch.start_tunnel("  manual-token  ").await.expect("start");

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(launcher.last_args()[3], "manual-token");
    assert!(orch.status().running);
    orch.stop_tunnel().await.expect("stop");
    assert_eq!(sup.phase(), TunnelPhase::Idle);
}

#[tokio::test]
async fn test_blank_token_fetches_from_backend() {
    let credentials = FakeCredentials::issuing("backend-token");
    let calls = credentials.calls.clone();
    let (orch, _, launcher) = orchestrator(credentials, FakeProvider::ok());

    orch.start_tunnel("   ").await.expect("start");

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(launcher.last_args()[3], "backend-token");
    orch.stop_tunnel().await.expect("stop");
}

#[tokio::test]
async fn test_credential_failure_is_distinct_and_launches_nothing() {
    let (orch, sup, launcher) = orchestrator(FakeCredentials::unavailable(), FakeProvider::ok());

    let err = orch.start_tunnel("").await.unwrap_err();

    assert!(
        matches!(err, TunnelError::Credential(CredentialError::Status { status: 503, .. })),
        "got {err:?}"
    );
    assert!(err.to_string().starts_with("failed to get token"));
    assert_eq!(launcher.launch_count(), 0);
    assert_eq!(sup.phase(), TunnelPhase::Idle);
}

#[tokio::test]
async fn test_provision_failure_is_distinct() {
    let (orch, sup, _) = orchestrator(FakeCredentials::issuing("t"), FakeProvider::failing());

    let err = orch.start_tunnel("").await.unwrap_err();

    assert!(matches!(err, TunnelError::Provision(_)), "got {err:?}");
    assert!(err.to_string().contains("failed to prepare agent binary"));
    assert_eq!(sup.phase(), TunnelPhase::Idle);
}

#[tokio::test]
async fn test_start_while_running_is_already_running() {
    let credentials = FakeCredentials::issuing("backend-token");
    let calls = credentials.calls.clone();
    let (orch, _, launcher) = orchestrator(credentials, FakeProvider::ok());
    orch.start_tunnel("").await.expect("start");

    let err = orch.start_tunnel("").await.unwrap_err();

    assert!(matches!(err, TunnelError::AlreadyRunning), "got {err:?}");
    assert_eq!(calls.load(Ordering::SeqCst), 1, "no second fetch");
    assert_eq!(launcher.launch_count(), 1);
    orch.stop_tunnel().await.expect("stop");
}

// ── StartHooks ───────────────────────────────────────────────────────────────

#[derive(Default)]
struct FakeCompanion {
    running: AtomicBool,
    fail: bool,
    ports: Mutex<Vec<u16>>,
}

#[async_trait]
impl CompanionServer for FakeCompanion {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn start(&self, port: u16) -> Result<()> {
        self.ports.lock().push(port);
        if self.fail {
            anyhow::bail!("address in use");
        }
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
struct RecordingSink {
    fail: bool,
    reports: Mutex<Vec<TunnelStatus>>,
}

#[async_trait]
impl StatusSink for RecordingSink {
    async fn report_status(&self, status: &TunnelStatus) -> Result<()> {
        self.reports.lock().push(status.clone());
        if self.fail {
            anyhow::bail!("backend returned status 500");
        }
        Ok(())
    }
}

fn started() -> TunnelStarted {
    TunnelStarted {
        tunnel_name: "my-tunnel".to_string(),
        pid: Some(4242),
        binary: PathBuf::from("/cache/cloudflared-linux-amd64"),
    }
}

#[tokio::test]
async fn test_hooks_start_companion_once_and_report_status() {
    let companion = Arc::new(FakeCompanion::default());
    let sink = Arc::new(RecordingSink::default());
    let hooks = StartHooks::new()
        .with_companion(companion.clone(), 8080)
        .with_status_sink(sink.clone());

    hooks.on_tunnel_start(&started()).await.expect("first start");
    hooks.on_tunnel_start(&started()).await.expect("second start");

    assert_eq!(*companion.ports.lock(), vec![8080], "started only once");
    let reports = sink.reports.lock();
    assert_eq!(reports.len(), 2);
    assert!(reports[0].running);
    assert_eq!(reports[0].phase, TunnelPhase::Running);
    assert_eq!(reports[0].tunnel_name, "my-tunnel");
    assert_eq!(reports[0].pid, Some(4242));
}

#[tokio::test]
async fn test_hooks_run_all_and_join_failures() {
    let companion = Arc::new(FakeCompanion {
        fail: true,
        ..FakeCompanion::default()
    });
    let sink = Arc::new(RecordingSink {
        fail: true,
        ..RecordingSink::default()
    });
    let hooks = StartHooks::new()
        .with_companion(companion, 9000)
        .with_status_sink(sink.clone());

    let err = hooks.on_tunnel_start(&started()).await.unwrap_err();

    let msg = err.to_string();
    assert!(msg.contains("companion server: address in use"), "got {msg}");
    assert!(msg.contains("status report: backend returned status 500"), "got {msg}");
    assert_eq!(sink.reports.lock().len(), 1, "sink ran despite companion failure");
}

#[tokio::test]
async fn test_empty_hooks_succeed() {
    StartHooks::new()
        .on_tunnel_start(&started())
        .await
        .expect("no hooks, no failures");
}
