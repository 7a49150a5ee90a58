use assert_cmd::Command;
use fastener_gauge::core::{CalibrationStore, RoiStore};
use fastener_gauge::report::SessionReport;
use image::RgbImage;
use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;

fn gauge() -> Command {
    Command::cargo_bin("fastener-gauge").expect("binary built")
}

#[test]
fn calibrate_writes_the_store() {
    let dir = tempdir().expect("tempdir");
    let store = dir.path().join("cal.json");

    gauge()
        .args(["calibrate", "--from", "10,50", "--to", "310,50", "--store"])
        .arg(&store)
        .assert()
        .success()
        .stdout(predicate::str::contains("2.0000 px/mm"));

    let raw = fs::read_to_string(&store).expect("store written");
    assert!(raw.contains("pixelsPerUnit"));
    assert_eq!(CalibrationStore::new(&store).load(), 2.0);
}

#[test]
fn calibrate_rejects_zero_length_reference() {
    let dir = tempdir().expect("tempdir");
    let store = dir.path().join("cal.json");
    CalibrationStore::new(&store).save(4.0);

    gauge()
        .args(["calibrate", "--from", "5,5", "--to", "5,5", "--store"])
        .arg(&store)
        .assert()
        .failure()
        .stderr(predicate::str::contains("coincide"));

    assert_eq!(CalibrationStore::new(&store).load(), 4.0);
}

#[test]
fn roi_orders_points_and_reports_size() {
    let dir = tempdir().expect("tempdir");
    let store = dir.path().join("roi.json");

    gauge()
        .args([
            "roi", "--points", "300,300", "100,100", "100,300", "300,100", "--store",
        ])
        .arg(&store)
        .assert()
        .success()
        .stdout(predicate::str::contains("ROI 200x200"));

    let roi = RoiStore::new(&store).load().expect("stored roi");
    assert_eq!(roi.points[0], [100.0, 100.0]);
    assert_eq!(roi.points[1], [300.0, 100.0]);
}

#[test]
fn roi_rejects_collinear_points() {
    let dir = tempdir().expect("tempdir");
    let store = dir.path().join("roi.json");

    gauge()
        .args(["roi", "--points", "0,0", "10,10", "20,20", "30,30", "--store"])
        .arg(&store)
        .assert()
        .failure();
    assert!(!store.exists());
}

#[test]
fn measure_uses_explicit_ratio() {
    gauge()
        .args(["measure", "--width", "100", "--height", "50", "--ratio", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("50.0x25.0mm"));

    gauge()
        .args([
            "measure", "--width", "100", "--height", "50", "--ratio", "2", "--units", "cm",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("5.0x2.5cm"));
}

#[test]
fn measure_falls_back_to_default_ratio() {
    let dir = tempdir().expect("tempdir");
    gauge()
        .args(["measure", "--width", "100", "--height", "0", "--store"])
        .arg(dir.path().join("missing.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("0.0x0.0mm"));

    gauge()
        .args(["measure", "--width", "100", "--height", "40", "--store"])
        .arg(dir.path().join("missing.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("10.0x4.0mm"));
}

#[test]
fn run_writes_a_session_report() {
    let dir = tempdir().expect("tempdir");
    let frames = dir.path().join("frames");
    fs::create_dir_all(&frames).expect("frames dir");
    for i in 0..2 {
        RgbImage::new(160, 120)
            .save(frames.join(format!("{i:02}.png")))
            .expect("write frame");
    }
    let detections = dir.path().join("detections.json");
    fs::write(
        &detections,
        r#"{"classes": ["bolt", "nut"], "frames": [[{"x1": 10, "y1": 10, "x2": 60, "y2": 40, "confidence": 0.7, "class_id": 1}]]}"#,
    )
    .expect("write detections");
    let report = dir.path().join("report.json");

    gauge()
        .arg("run")
        .arg("--frames")
        .arg(&frames)
        .arg("--detections")
        .arg(&detections)
        .arg("--report")
        .arg(&report)
        .arg("--roi-store")
        .arg(dir.path().join("roi.json"))
        .arg("--calibration-store")
        .arg(dir.path().join("cal.json"))
        .args(["--units", "mm", "--ratio", "5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 frames, 1 measurements"));

    let report = SessionReport::load_json(&report).expect("report");
    assert_eq!(report.pixels_per_unit, 5.0);
    let m = &report.frames[0].measurements[0];
    assert_eq!(m.label(), "NUT: 10.0x6.0mm");
}

#[test]
fn run_fails_without_frames() {
    let dir = tempdir().expect("tempdir");
    let detections = dir.path().join("detections.json");
    fs::write(&detections, r#"{"classes": [], "frames": []}"#).expect("write detections");

    gauge()
        .arg("run")
        .arg("--frames")
        .arg(dir.path().join("missing"))
        .arg("--detections")
        .arg(&detections)
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing"));
}

#[cfg(not(feature = "camera"))]
#[test]
fn run_on_a_device_needs_camera_support() {
    let dir = tempdir().expect("tempdir");
    let detections = dir.path().join("detections.json");
    fs::write(&detections, r#"{"classes": [], "frames": []}"#).expect("write detections");

    gauge()
        .args(["run", "--device", "0", "--detections"])
        .arg(&detections)
        .assert()
        .failure()
        .stderr(predicate::str::contains("camera 0"));
}
