//! Tests for [`Prober`]: helper bootstrap and execution against a fake
//! remote executor.

mod common;

use std::sync::Arc;

use assert_matches::assert_matches;
use common::{helper_output, prober, FakeExecutor, HostBehaviour};
use gpuvm_collector::error::{ProbeError, RemoteError};
use gpuvm_core::types::Target;

// ---------------------------------------------------------------------------
// Test: helper already installed is not uploaded again
// ---------------------------------------------------------------------------

#[tokio::test]
async fn installed_helper_is_not_uploaded() {
    let executor = Arc::new(FakeExecutor::new().preinstalled("kvm-01"));
    let prober = prober(Arc::clone(&executor));

    let text = prober.probe(&Target::new(7, "kvm-01")).await.unwrap();

    assert_eq!(text, helper_output("7"));
    assert_eq!(executor.uploads(), 0);
}

// ---------------------------------------------------------------------------
// Test: missing helper is uploaded, then executed with the VM id
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_helper_is_uploaded_then_run_with_vm_id() {
    let executor = Arc::new(FakeExecutor::new());
    let prober = prober(Arc::clone(&executor));

    prober.probe(&Target::new(12, "kvm-02")).await.unwrap();
    prober.probe(&Target::new(13, "kvm-02")).await.unwrap();

    assert_eq!(executor.uploads(), 1, "second probe must reuse the installed helper");
    let runs = executor.runs();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].0, "kvm-02");
    assert_eq!(runs[0].1, "/tmp/get_gpu_metrics_from_vm.sh");
    assert_eq!(runs[0].2, vec!["12".to_string()]);
}

// ---------------------------------------------------------------------------
// Test: failed upload is a bootstrap failure and the helper is never run
// ---------------------------------------------------------------------------

#[tokio::test]
async fn upload_failure_is_bootstrap_failure() {
    let executor = Arc::new(FakeExecutor::new().behave("kvm-03", HostBehaviour::UploadFails));
    let prober = prober(Arc::clone(&executor));

    let err = prober.probe(&Target::new(1, "kvm-03")).await.unwrap_err();

    assert_matches!(err, ProbeError::Bootstrap { ref host, .. } if host == "kvm-03");
    assert!(executor.runs().is_empty());
}

// ---------------------------------------------------------------------------
// Test: non-zero exit is an execution failure carrying stderr
// ---------------------------------------------------------------------------

#[tokio::test]
async fn non_zero_exit_is_execution_failure() {
    let executor = Arc::new(
        FakeExecutor::new()
            .preinstalled("kvm-04")
            .behave("kvm-04", HostBehaviour::NonZeroExit),
    );
    let prober = prober(executor);

    let err = prober.probe(&Target::new(1, "kvm-04")).await.unwrap_err();

    assert_matches!(
        err,
        ProbeError::Execution {
            source: RemoteError::NonZeroExit { exit_code: 1, ref stderr, .. },
            ..
        } if stderr == "nvidia-smi failed"
    );
}

// ---------------------------------------------------------------------------
// Test: transport errors and timeouts are execution failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn transport_error_is_execution_failure() {
    let executor = Arc::new(
        FakeExecutor::new()
            .preinstalled("kvm-05")
            .behave("kvm-05", HostBehaviour::TransportError),
    );
    let prober = prober(executor);

    let err = prober.probe(&Target::new(1, "kvm-05")).await.unwrap_err();

    assert_matches!(
        err,
        ProbeError::Execution {
            source: RemoteError::Timeout { .. },
            ..
        }
    );
}

// ---------------------------------------------------------------------------
// Test: successful exit with blank stdout is not a reading
// ---------------------------------------------------------------------------

#[tokio::test]
async fn blank_output_is_rejected() {
    let executor = Arc::new(
        FakeExecutor::new()
            .preinstalled("kvm-06")
            .behave("kvm-06", HostBehaviour::EmptyOutput),
    );
    let prober = prober(executor);

    let err = prober.probe(&Target::new(1, "kvm-06")).await.unwrap_err();

    assert_matches!(err, ProbeError::EmptyOutput { ref host } if host == "kvm-06");
}
