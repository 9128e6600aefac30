//! Files written per page: the annotated overlay and its sidecar text.

use image::Rgb;
use pagelane::engine::RawDetection;
use pagelane::{DispatchConfig, Dispatcher, EngineProvisioning, FixedDeviceProbe};
use std::sync::Arc;
use tempfile::tempdir;

mod helpers;
use helpers::{FixedEngine, WHITE, page_batch};

fn sequential_dispatcher(detections: Vec<RawDetection>) -> Dispatcher {
    Dispatcher::new(EngineProvisioning::shared(FixedEngine(detections)), DispatchConfig::default())
        .with_probe(Arc::new(FixedDeviceProbe(1)))
}

#[tokio::test]
async fn test_hello_round_trip() {
    let dir = tempdir().unwrap();
    let dispatcher = sequential_dispatcher(vec![RawDetection::from_rect(5.0, 5.0, 50.0, 20.0, "HELLO")]);

    let records = dispatcher.dispatch_batch(page_batch(dir.path(), 1)).await.unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].page, 1);
    assert_eq!(records[0].page_content, "HELLO");
    assert_eq!(std::fs::read_to_string(dir.path().join("page_0.png.txt")).unwrap(), "HELLO");
    assert!(dir.path().join("page_0.png").exists());
}

#[tokio::test]
async fn test_exactly_two_files_per_page() {
    let dir = tempdir().unwrap();
    let dispatcher = sequential_dispatcher(vec![RawDetection::from_rect(1.0, 1.0, 10.0, 10.0, "x")]);

    dispatcher.dispatch_batch(page_batch(dir.path(), 3)).await.unwrap();

    let mut names: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            "page_0.png",
            "page_0.png.txt",
            "page_1.png",
            "page_1.png.txt",
            "page_2.png",
            "page_2.png.txt",
        ]
    );
}

#[tokio::test]
async fn test_lines_joined_in_detection_order() {
    let dir = tempdir().unwrap();
    let dispatcher = sequential_dispatcher(vec![
        RawDetection::from_rect(2.0, 2.0, 30.0, 10.0, "Invoice 2024-17"),
        RawDetection::from_rect(2.0, 14.0, 30.0, 22.0, "Total: 42,00 €"),
        RawDetection::from_rect(2.0, 26.0, 30.0, 34.0, "Danke"),
    ]);

    let records = dispatcher.dispatch_batch(page_batch(dir.path(), 1)).await.unwrap();
    assert_eq!(records[0].page_content, "Invoice 2024-17\nTotal: 42,00 €\nDanke");
}

#[tokio::test]
async fn test_degenerate_boxes_never_reach_outputs() {
    let dir = tempdir().unwrap();
    let dispatcher = sequential_dispatcher(vec![
        RawDetection::from_rect(40.0, 5.0, 20.0, 15.0, "GHOST-X"),
        RawDetection::from_rect(20.0, 15.0, 40.0, 5.0, "GHOST-Y"),
        RawDetection::from_rect(4.0, 30.0, 15.0, 40.0, "KEEP"),
    ]);

    let records = dispatcher.dispatch_batch(page_batch(dir.path(), 1)).await.unwrap();

    assert_eq!(records[0].page_content, "KEEP");
    let sidecar = std::fs::read_to_string(dir.path().join("page_0.png.txt")).unwrap();
    assert!(!sidecar.contains("GHOST"));

    let overlay = image::open(dir.path().join("page_0.png")).unwrap().to_rgb8();
    for y in 5..=15 {
        for x in 20..=40 {
            assert_eq!(*overlay.get_pixel(x, y), WHITE, "pixel ({}, {}) was drawn", x, y);
        }
    }
    assert_eq!(*overlay.get_pixel(4, 30), Rgb([0, 0, 0]), "kept box is drawn in the first palette colour");
    assert_eq!(*overlay.get_pixel(10, 35), WHITE, "box interior is not filled");
}

#[tokio::test]
async fn test_page_without_detections() {
    let dir = tempdir().unwrap();
    let dispatcher = sequential_dispatcher(vec![]);

    let records = dispatcher.dispatch_batch(page_batch(dir.path(), 1)).await.unwrap();

    assert!(records[0].is_success());
    assert_eq!(records[0].page_content, "");
    let overlay = image::open(dir.path().join("page_0.png")).unwrap().to_rgb8();
    assert!(overlay.enumerate_pixels().all(|(x, y, p)| (x, y) == (0, 0) || *p == WHITE));
}

#[tokio::test]
async fn test_unwritable_output_becomes_error_marker() {
    let dir = tempdir().unwrap();
    let dispatcher = sequential_dispatcher(vec![RawDetection::from_rect(1.0, 1.0, 10.0, 10.0, "x")]);

    let records = dispatcher
        .dispatch_batch(page_batch(&dir.path().join("does-not-exist"), 2))
        .await
        .unwrap();

    assert_eq!(records.len(), 2);
    for record in &records {
        assert!(record.page_content.starts_with("Error: Persistence error"));
        assert_eq!(record.error.as_ref().unwrap().error_type, "Persistence");
    }
}

#[tokio::test]
async fn test_jpeg_overlay_output() {
    let dir = tempdir().unwrap();
    let batch = pagelane::PageBatch::new(vec![helpers::page_image(0)], vec![dir.path().join("scan.pdf_0.jpg")]).unwrap();
    let dispatcher = sequential_dispatcher(vec![RawDetection::from_rect(1.0, 1.0, 10.0, 10.0, "jpeg page")]);

    let records = dispatcher.dispatch_batch(batch).await.unwrap();

    assert_eq!(records[0].page_content, "jpeg page");
    let decoded = image::open(dir.path().join("scan.pdf_0.jpg")).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (64, 48));
    assert!(dir.path().join("scan.pdf_0.jpg.txt").exists());
}

#[test]
fn test_records_serialize_as_page_objects() {
    let record = pagelane::ResultRecord::success(3, "HELLO".to_string());
    assert_eq!(
        serde_json::to_string(&record).unwrap(),
        r#"{"page":3,"page_content":"HELLO"}"#
    );
}
