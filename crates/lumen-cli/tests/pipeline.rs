use lumen_cli::commands;
use lumen_cli::synth::{BuildingGenerator, SynthConfig};
use lumen_core::{AttributionStrategy, ExplainConfig, PrototypeStrategy};
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn payload_file(dir: &Path, config: SynthConfig) -> PathBuf {
    let path = dir.join("payload.json");
    let out = commands::generate(config, Some(&path));
    assert_eq!(out.status, 200, "{}", out.body);
    path
}

fn hourly(seed: u64) -> SynthConfig {
    SynthConfig {
        weeks: 3,
        sensors: 3,
        step_minutes: 60,
        seed,
        ..Default::default()
    }
}

#[test]
fn test_generate_then_explain_with_every_strategy() {
    let dir = tempdir().unwrap();
    let path = payload_file(dir.path(), hourly(11));

    for strategy in [
        PrototypeStrategy::Local,
        PrototypeStrategy::FixedStride,
        PrototypeStrategy::WeekdayMask,
        PrototypeStrategy::Shapelets,
    ] {
        let config = commands::load_config(None, Some(strategy), None).unwrap();
        let out = commands::prototypes(&path, 1, &config);
        assert_eq!(out.exit_code(), 0, "{:?}: {}", strategy, out.body);

        // 4 h padding on each side of a 4-sample anomaly
        for key in ["prototype_a", "prototype_b", "anomaly"] {
            assert_eq!(out.body[key].as_array().unwrap().len(), 12, "{:?} {}", strategy, key);
        }
    }
}

#[test]
fn test_prototypes_follow_the_injected_sensor() {
    let config = hourly(5);
    let (_, truth) = BuildingGenerator::new(config.clone()).unwrap().generate().unwrap();
    let dir = tempdir().unwrap();
    let path = payload_file(dir.path(), config);

    let out = commands::prototypes(&path, 1, &ExplainConfig::default());
    assert!(out.is_success(), "{}", out.body);
    let sensors = ["power", "temperature", "co2"];
    assert_eq!(out.body["sensor"], sensors[truth.sensor]);
}

#[tokio::test]
async fn test_attribution_command() {
    let dir = tempdir().unwrap();
    let path = payload_file(dir.path(), hourly(3));
    let config = ExplainConfig::default();

    let out = commands::attribution(&path, 1, AttributionStrategy::Median, None, &config).await;
    assert!(out.is_success(), "{}", out.body);
    let shares = out.body["attribution"].as_array().unwrap();
    assert_eq!(shares.len(), 3);
    let total: f64 = shares.iter().map(|s| s["percent"].as_f64().unwrap()).sum();
    assert!((total - 100.0).abs() < 1e-6);

    let out = commands::attribution(&path, 0, AttributionStrategy::Point, None, &config).await;
    assert_eq!(out.exit_code(), 1);
    assert_eq!(out.body["detail"], "Internal Server Error");
}

#[test]
fn test_generate_to_stdout_body() {
    let out = commands::generate(hourly(1), None);
    assert!(out.is_success());
    assert_eq!(out.body["sensors"].as_array().unwrap().len(), 3);
    assert_eq!(out.body["algo"], 2);
    assert!(out.body["deep-error"].is_array());
}

#[test]
fn test_payload_removed_with_its_directory() {
    let dir = tempdir().unwrap();
    let path = payload_file(dir.path(), hourly(2));
    assert!(path.starts_with(dir.path()));
    assert!(path.exists());

    drop(dir);
    assert!(!path.exists());
}
