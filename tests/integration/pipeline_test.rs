//! End-to-end pipeline tests against a fake FBX2glTF.

#![cfg(unix)]

mod helpers;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use helpers::{RecordingApplier, TestEnv};
use modelhub_converter::inspect;
use modelhub_converter::{
    ArtifactKind, ConversionError, ConversionProcessor, ConversionRequest, ConverterConfig, Tint,
    TintFailurePolicy, TintOutcome,
};

fn processor(env: &TestEnv, config: ConverterConfig) -> ConversionProcessor {
    ConversionProcessor::new(config, env.scratch_root.clone()).expect("processor")
}

fn processor_with_applier(
    env: &TestEnv,
    config: ConverterConfig,
    applier: Arc<RecordingApplier>,
) -> ConversionProcessor {
    ConversionProcessor::with_color_applier(config, env.scratch_root.clone(), applier)
        .expect("processor")
}

fn assert_close(actual: [f32; 4], expected: [f32; 4]) {
    for (a, e) in actual.iter().zip(expected) {
        assert!((a - e).abs() < 1e-6, "{actual:?} != {expected:?}");
    }
}

// ── Successful conversions ───────────────────────────────────────

#[tokio::test]
async fn test_glb_output_is_copied_verbatim() {
    let env = TestEnv::new("cube");
    let glb = helpers::model_glb();
    let applier = RecordingApplier::succeeding();
    let processor = processor_with_applier(&env, env.glb_converter("cube", &glb), applier.clone());

    let request =
        ConversionRequest::new(&env.source, &env.output_dir).with_tint(Tint::IDENTITY);
    let outcome = processor
        .convert(&request, CancellationToken::new())
        .await
        .expect("convert");

    assert_eq!(outcome.glb_path, env.final_glb("cube"));
    assert_eq!(outcome.artifact, ArtifactKind::Glb);
    assert_eq!(outcome.tint, TintOutcome::NotRequested);
    assert_eq!(outcome.request_id, request.request_id);
    assert_eq!(outcome.converter_exit_code, Some(0));
    assert_eq!(std::fs::read(env.final_glb("cube")).expect("read"), glb);
    assert_eq!(outcome.output_bytes, glb.len() as u64);
    assert_eq!(applier.calls(), 0);
    assert!(env.scratch_is_clean());
}

#[tokio::test]
async fn test_gltf_bin_output_is_repackaged_and_tinted() {
    let env = TestEnv::new("chair");
    let processor = processor(&env, env.gltf_converter("chair"));

    let tint = Tint::new(0.2, 0.5, 0.8).expect("tint");
    let request = ConversionRequest::new(&env.source, &env.output_dir).with_tint(tint);
    let outcome = processor
        .convert(&request, CancellationToken::new())
        .await
        .expect("convert");

    assert_eq!(outcome.artifact, ArtifactKind::GltfBin);
    assert_eq!(outcome.tint, TintOutcome::Applied);
    assert!(outcome.warnings.is_empty(), "{:?}", outcome.warnings);

    let bytes = std::fs::read(env.final_glb("chair")).expect("read");
    let gltf = gltf::Gltf::from_slice(&bytes).expect("single container");
    assert_eq!(gltf.buffers().count(), 1);
    assert!(gltf.buffers().all(|b| matches!(b.source(), gltf::buffer::Source::Bin)));

    assert_eq!(helpers::read_positions(&bytes), helpers::POSITIONS.to_vec());

    // The existing material is tinted and the bare primitive gets its own.
    let colors = helpers::base_colors(&bytes);
    assert_eq!(colors.len(), 2);
    for color in colors {
        assert_close(color, [0.2, 0.5, 0.8, 1.0]);
    }
    assert!(env.scratch_is_clean());

    let snapshot = processor.metrics_snapshot();
    assert_eq!(snapshot.conversions_succeeded, 1);
    assert_eq!(snapshot.repackaged, 1);
    assert_eq!(snapshot.tints_applied, 1);
}

#[tokio::test]
async fn test_converted_model_inspects_cleanly() {
    let env = TestEnv::new("sofa");
    let processor = processor(&env, env.gltf_converter("sofa"));

    let outcome = processor
        .convert(
            &ConversionRequest::new(&env.source, &env.output_dir),
            CancellationToken::new(),
        )
        .await
        .expect("convert");

    let report = inspect::inspect(&outcome.glb_path).await.expect("inspect");
    assert_eq!(report.meshes.len(), 2);
    assert_eq!(report.meshes[1].primitive_materials, vec![None]);
    assert_eq!(report.materials[0].name.as_deref(), Some("Fabric"));

    let dims = report.dimensions.expect("dimensions");
    assert_eq!(dims.width_cm, 200.0);
    assert_eq!(dims.height_cm, 100.0);
    assert_eq!(dims.depth_cm, 50.0);
}

#[tokio::test]
async fn test_converter_stderr_becomes_warning() {
    let env = TestEnv::new("lamp");
    let glb = env.produced.join("lamp.glb");
    std::fs::write(&glb, helpers::model_glb()).expect("write glb");
    let config = env.converter(&format!(
        "mkdir -p \"$2_out\" && cp '{}' \"$2_out/\"\necho 'Error: could not load texture lamp_d.png' >&2\nexit 3\n",
        glb.display()
    ));
    let processor = processor(&env, config);

    let outcome = processor
        .convert(
            &ConversionRequest::new(&env.source, &env.output_dir),
            CancellationToken::new(),
        )
        .await
        .expect("convert");

    assert_eq!(outcome.converter_exit_code, Some(3));
    assert!(!outcome.warnings.is_empty());
    assert!(env.final_glb("lamp").is_file());
}

#[tokio::test]
async fn test_output_in_scratch_dir_is_accepted_with_warning() {
    let env = TestEnv::new("desk");
    let glb = env.produced.join("desk.glb");
    std::fs::write(&glb, helpers::model_glb()).expect("write glb");
    let config = env.converter(&format!("cp '{}' \"$2/\"\n", glb.display()));
    let processor = processor(&env, config);

    let outcome = processor
        .convert(
            &ConversionRequest::new(&env.source, &env.output_dir),
            CancellationToken::new(),
        )
        .await
        .expect("convert");

    assert_eq!(outcome.artifact, ArtifactKind::Glb);
    assert!(
        outcome.warnings.iter().any(|w| w.contains("instead of")),
        "{:?}",
        outcome.warnings
    );
    assert!(env.scratch_is_clean());
}

// ── Tint tolerance ───────────────────────────────────────────────

#[tokio::test]
async fn test_identity_tint_never_calls_applier() {
    let env = TestEnv::new("stool");
    let applier = RecordingApplier::failing("should not be called");
    let processor = processor_with_applier(&env, env.gltf_converter("stool"), applier.clone());

    let request = ConversionRequest::new(&env.source, &env.output_dir)
        .with_tint(Tint::from_hex("#FFFFFF").expect("hex"));
    let outcome = processor
        .convert(&request, CancellationToken::new())
        .await
        .expect("convert");

    assert_eq!(outcome.tint, TintOutcome::NotRequested);
    assert_eq!(applier.calls(), 0);
}

#[tokio::test]
async fn test_unreadable_glb_tint_error_still_succeeds() {
    let env = TestEnv::new("chair");
    let applier = RecordingApplier::failing("Invalid GLB container: unexpected magic");
    let mut config = env.gltf_converter("chair");
    config.tint_failure_policy = TintFailurePolicy::Strict;
    let processor = processor_with_applier(&env, config, applier.clone());

    let tint = Tint::new(0.2, 0.5, 0.8).expect("tint");
    let request = ConversionRequest::new(&env.source, &env.output_dir).with_tint(tint);
    let outcome = processor
        .convert(&request, CancellationToken::new())
        .await
        .expect("format errors are tolerated even when strict");

    assert_eq!(applier.calls(), 1);
    assert!(matches!(outcome.tint, TintOutcome::SkippedUnreadable { .. }));
    assert!(outcome.warnings.iter().any(|w| w.starts_with("Tint skipped")));

    let bytes = std::fs::read(&outcome.glb_path).expect("read");
    assert_eq!(helpers::base_colors(&bytes), vec![[0.9, 0.9, 0.9, 1.0]]);
    assert!(env.scratch_is_clean());
}

#[tokio::test]
async fn test_unexpected_tint_error_lenient_vs_strict() {
    let tint = Tint::new(1.0, 0.0, 0.0).expect("tint");

    let env = TestEnv::new("bench");
    let lenient = processor_with_applier(
        &env,
        env.gltf_converter("bench"),
        RecordingApplier::failing("disk quota exceeded"),
    );
    let outcome = lenient
        .convert(
            &ConversionRequest::new(&env.source, &env.output_dir).with_tint(tint),
            CancellationToken::new(),
        )
        .await
        .expect("lenient");
    assert!(matches!(outcome.tint, TintOutcome::Failed { .. }));
    assert!(outcome.warnings.iter().any(|w| w.starts_with("Tint failed")));

    let env = TestEnv::new("bench");
    let mut config = env.gltf_converter("bench");
    config.tint_failure_policy = TintFailurePolicy::Strict;
    let strict =
        processor_with_applier(&env, config, RecordingApplier::failing("disk quota exceeded"));
    let err = strict
        .convert(
            &ConversionRequest::new(&env.source, &env.output_dir).with_tint(tint),
            CancellationToken::new(),
        )
        .await
        .expect_err("strict");
    assert!(matches!(err, ConversionError::TintFailed { .. }));
    assert!(!env.final_glb("bench").exists());
    assert!(env.scratch_is_clean());
}

#[tokio::test]
async fn test_tint_read_error_is_not_treated_as_unreadable_glb() {
    let env = TestEnv::new("shelf");
    let mut config = env.gltf_converter("shelf");
    config.tint_failure_policy = TintFailurePolicy::Strict;
    let applier = RecordingApplier::failing_io(std::io::ErrorKind::PermissionDenied);
    let strict = processor_with_applier(&env, config, applier.clone());

    let err = strict
        .convert(
            &ConversionRequest::new(&env.source, &env.output_dir)
                .with_tint(Tint::new(0.0, 1.0, 0.0).expect("tint")),
            CancellationToken::new(),
        )
        .await
        .expect_err("io failure is not skipped");

    assert!(matches!(err, ConversionError::TintFailed { .. }));
    assert_eq!(applier.calls(), 1);
    assert!(!env.final_glb("shelf").exists());
    assert!(env.scratch_is_clean());
}

// ── Failures and cleanup ─────────────────────────────────────────

#[tokio::test]
async fn test_no_output_produced() {
    let env = TestEnv::new("ghost");
    let processor = processor(&env, env.converter("exit 0\n"));

    let err = processor
        .convert(
            &ConversionRequest::new(&env.source, &env.output_dir),
            CancellationToken::new(),
        )
        .await
        .expect_err("no output");

    assert!(matches!(err, ConversionError::NoOutputProduced { .. }));
    assert!(!env.final_glb("ghost").exists());
    assert!(env.scratch_is_clean());
}

#[tokio::test]
async fn test_unexpected_output_structure() {
    let env = TestEnv::new("notes");
    let config = env.converter("mkdir -p \"$2_out\" && echo done > \"$2_out/readme.txt\"\n");
    let processor = processor(&env, config);

    let err = processor
        .convert(
            &ConversionRequest::new(&env.source, &env.output_dir),
            CancellationToken::new(),
        )
        .await
        .expect_err("unexpected layout");

    match err {
        ConversionError::UnexpectedOutputStructure { entries, .. } => {
            assert_eq!(entries, vec!["readme.txt".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(env.scratch_is_clean());
}

#[tokio::test]
async fn test_gltf_without_bin_fails_repackaging() {
    let env = TestEnv::new("broken");
    helpers::write_model_gltf(&env.produced, "broken");
    let config = env.converter(&format!(
        "mkdir -p \"$2_out\" && cp '{}/broken.gltf' \"$2_out/\"\n",
        env.produced.display()
    ));
    let processor = processor(&env, config);

    let err = processor
        .convert(
            &ConversionRequest::new(&env.source, &env.output_dir),
            CancellationToken::new(),
        )
        .await
        .expect_err("missing bin");

    match &err {
        ConversionError::Repackaging { path, .. } => {
            assert!(path.ends_with("broken.gltf"), "{}", path.display());
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.stage(), "normalizing");
    let leftovers: Vec<_> = std::fs::read_dir(&env.output_dir)
        .expect("list output")
        .map(|e| e.expect("entry").file_name())
        .collect();
    assert_eq!(leftovers, vec![std::ffi::OsString::from("textures")]);
    assert!(env.scratch_is_clean());
}

#[tokio::test]
async fn test_truncated_glb_is_too_small() {
    let env = TestEnv::new("tiny");
    let processor = processor(&env, env.glb_converter("tiny", b"glTF\x02\x00\x00\x00"));

    let err = processor
        .convert(
            &ConversionRequest::new(&env.source, &env.output_dir),
            CancellationToken::new(),
        )
        .await
        .expect_err("too small");

    assert!(matches!(err, ConversionError::OutputTooSmall { size: 8, .. }));
    assert!(!env.final_glb("tiny").exists());
    assert!(env.scratch_is_clean());
}

#[tokio::test]
async fn test_missing_tool_creates_no_scratch() {
    let env = TestEnv::new("cube");
    let config = ConverterConfig {
        converter_path: env.temp.path().join("tools/FBX2glTF"),
        ..Default::default()
    };
    let processor = processor(&env, config);

    let err = processor
        .convert(
            &ConversionRequest::new(&env.source, &env.output_dir),
            CancellationToken::new(),
        )
        .await
        .expect_err("tool missing");

    assert!(matches!(err, ConversionError::ToolMissing { .. }));
    assert!(env.scratch_is_clean());
    assert!(!env.output_dir.exists());
}

#[tokio::test]
async fn test_hung_converter_times_out() {
    let env = TestEnv::new("hang");
    let mut config = env.converter("mkdir -p \"$2_out\"\nexec sleep 30\n");
    config.timeout_seconds = 1;
    let processor = processor(&env, config);

    let start = Instant::now();
    let err = processor
        .convert(
            &ConversionRequest::new(&env.source, &env.output_dir),
            CancellationToken::new(),
        )
        .await
        .expect_err("timeout");

    assert!(matches!(
        err,
        ConversionError::ConverterTimeout { timeout_seconds: 1 }
    ));
    assert!(start.elapsed() < Duration::from_secs(10));
    assert!(env.scratch_is_clean());
    assert_eq!(processor.metrics_snapshot().conversions_timed_out, 1);
}

#[tokio::test]
async fn test_dropped_conversion_still_cleans_scratch() {
    let env = TestEnv::new("abandoned");
    let processor = processor(&env, env.converter("mkdir -p \"$2_out\"\nexec sleep 5\n"));

    let result = tokio::time::timeout(
        Duration::from_millis(500),
        processor.convert(
            &ConversionRequest::new(&env.source, &env.output_dir),
            CancellationToken::new(),
        ),
    )
    .await;

    assert!(result.is_err());
    assert!(env.scratch_is_clean());
    assert!(!env.final_glb("abandoned").exists());
}

#[tokio::test]
async fn test_cancellation_kills_converter() {
    let env = TestEnv::new("hang");
    let processor = processor(&env, env.converter("mkdir -p \"$2_out\"\nexec sleep 30\n"));

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let start = Instant::now();
    let err = processor
        .convert(&ConversionRequest::new(&env.source, &env.output_dir), cancel)
        .await
        .expect_err("cancelled");

    assert!(matches!(err, ConversionError::Cancelled));
    assert!(start.elapsed() < Duration::from_secs(10));
    assert!(env.scratch_is_clean());
}

// ── Batches ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_batch_keeps_order_and_isolates_failures() {
    let env = TestEnv::new("first");
    let second = env.source.with_file_name("second.fbx");
    std::fs::copy(&env.source, &second).expect("copy source");
    let missing = env.source.with_file_name("missing.fbx");

    let mut config = env.gltf_converter("model");
    config.max_concurrent_conversions = 2;
    let processor = processor(&env, config);

    let requests = vec![
        ConversionRequest::new(&env.source, &env.output_dir),
        ConversionRequest::new(&missing, &env.output_dir),
        ConversionRequest::new(&second, &env.output_dir),
    ];
    let results = processor
        .convert_batch(requests, CancellationToken::new())
        .await;

    assert_eq!(results.len(), 3);
    assert_eq!(
        results[0].as_ref().expect("first").glb_path,
        env.final_glb("first")
    );
    assert!(matches!(
        results[1],
        Err(ConversionError::SourceNotFound { .. })
    ));
    assert_eq!(
        results[2].as_ref().expect("second").glb_path,
        env.final_glb("second")
    );
    assert!(env.scratch_is_clean());
    assert_eq!(processor.available_slots(), 2);
}
