//! The ml domain loaded from the reference shared library on disk, through
//! the same resolver production uses.

use std::env::consts::{DLL_PREFIX, DLL_SUFFIX};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use once_cell::sync::Lazy;
use warden_capabilities::ml::{CreateModelRequest, MlCore, PredictRequest, TrainModelRequest};
use warden_core::{Backend, CapabilitySettings, ErrorKind, MemorySink};

const LIBRARY_STEM: &str = "warden_ml_smoke_extension";

/// `<target>/<profile>` of the running test binary.
fn profile_dir() -> PathBuf {
    let exe = std::env::current_exe().expect("test binary path");
    // <target>/<profile>/deps/<test binary>
    exe.parent()
        .and_then(Path::parent)
        .expect("test binary lives under <target>/<profile>/deps")
        .to_path_buf()
}

fn find_library(dir: &Path) -> Option<PathBuf> {
    let exact = dir.join(format!("{}{}{}", DLL_PREFIX, LIBRARY_STEM, DLL_SUFFIX));
    if exact.exists() {
        return Some(exact);
    }
    std::fs::read_dir(dir.join("deps"))
        .ok()?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .find(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .map(|name| {
                    name.starts_with(&format!("{}{}", DLL_PREFIX, LIBRARY_STEM))
                        && name.ends_with(DLL_SUFFIX)
                })
                .unwrap_or(false)
        })
}

/// Path to the smoke cdylib, building it into the current target directory
/// when the test run has not produced it yet.
static SMOKE_LIBRARY: Lazy<PathBuf> = Lazy::new(|| {
    let profile = profile_dir();
    if let Some(path) = find_library(&profile) {
        return path;
    }

    let target = profile.parent().expect("profile dir has a parent");
    let cargo = std::env::var("CARGO").unwrap_or_else(|_| "cargo".to_string());
    let mut build = Command::new(cargo);
    build
        .args(["build", "--lib", "-p", "warden-ml-smoke-extension", "--target-dir"])
        .arg(target);
    if profile.file_name().and_then(|n| n.to_str()) == Some("release") {
        build.arg("--release");
    }
    let status = build.status().expect("run cargo build");
    assert!(status.success(), "building the smoke library failed");

    find_library(&profile).expect("smoke library present after build")
});

fn dylib_ml(environment: &str) -> (MlCore, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let settings = CapabilitySettings::new("ml")
        .with_environment(environment)
        .with_library_path(SMOKE_LIBRARY.as_path());
    let ml = MlCore::from_settings(settings, sink.clone()).unwrap();
    (ml, sink)
}

// ============================================================================
// Loading
// ============================================================================

#[tokio::test]
async fn test_shared_library_is_loaded_natively() {
    let (ml, sink) = dylib_ml("test");

    assert_eq!(ml.backend(), Backend::Native);
    assert_eq!(ml.version(), "1.2.0");
    assert!(ml.load_error().is_none());

    let loads = sink.loads();
    assert_eq!(loads.len(), 1);
    assert_eq!(loads[0].backend, Backend::Native);
    assert!(loads[0].source.contains(LIBRARY_STEM));
}

#[tokio::test]
async fn test_shared_library_self_check_failure() {
    let (ml, _) = dylib_ml("  ");

    assert_eq!(ml.backend(), Backend::Fallback);
    assert_eq!(ml.load_error().unwrap().kind, ErrorKind::LoadFailure);
}

// ============================================================================
// Calls across the boundary
// ============================================================================

#[tokio::test]
async fn test_shared_library_serves_calls() {
    let (ml, _) = dylib_ml("test");

    let created = ml
        .create_model(CreateModelRequest {
            name: "churn".into(),
            model_type: "logistic".into(),
            features: vec!["tenure".into()],
        })
        .await
        .unwrap();
    assert_eq!(created.served_by(), Backend::Native);
    let model_id = created.into_value().model_id;
    assert!(model_id.starts_with("ml-"));

    let trained = ml
        .train_model(TrainModelRequest {
            model_id: model_id.clone(),
            samples: 2000,
            epochs: 30,
        })
        .await
        .unwrap();
    assert!(!trained.is_degraded());

    let predicted = ml
        .predict(PredictRequest {
            model_id,
            input: vec![1.0, 2.0, 3.0],
        })
        .await
        .unwrap();
    assert_eq!(predicted.served_by(), Backend::Native);
    assert_eq!(predicted.value().prediction, 0.8808);
}

#[tokio::test]
async fn test_shared_library_error_message_reaches_reason() {
    let (ml, sink) = dylib_ml("test");

    let result = ml
        .predict(PredictRequest {
            model_id: "nope".into(),
            input: vec![1.0],
        })
        .await
        .unwrap();
    assert!(result.is_degraded());
    let reason = result.reason().unwrap();
    assert_eq!(reason.kind, ErrorKind::CallFailure);
    assert!(reason.message.contains("unknown model 'nope'"));

    // The handle stays native after a failed call
    let created = ml
        .create_model(CreateModelRequest {
            name: "after".into(),
            model_type: "tree".into(),
            features: vec![],
        })
        .await
        .unwrap();
    assert!(!created.is_degraded());
    assert_eq!(ml.backend(), Backend::Native);
    assert_eq!(sink.invocations().len(), 2);
}
