//! End-to-end tests: JSON records through the parser, reader and driver.

use chrono::{DateTime, Duration, TimeZone, Utc};
use geo_event_detector::core::{EmbeddingTable, SimilarityMode, StreamDriver};
use geo_event_detector::ingest::{PostParser, PostReader};
use geo_event_detector::stats::create_shared_stats;
use geo_event_detector::{ClusterReport, Config, EngineError};
use serde_json::json;
use std::io::Cursor;
use std::sync::Arc;

const CONFIG: &str = r#"{
    "snapshot_interval": 60,
    "start_time": "2017-08-26 00:00:00",
    "sequence_length": 2,
    "window_size": 3,
    "space": { "bounding_box": [-95.8, 29.5, -95.0, 30.1] },
    "clustering": { "eps": 0.02, "min_pts": 3 },
    "output": { "precision": 6 }
}"#;

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2017, 8, 26, 0, 0, 0).unwrap()
}

fn record(id: u64, secs: i64, text: &str, location: Option<(f64, f64)>) -> String {
    let created_at = (start() + Duration::seconds(secs)).to_rfc3339();
    let mut value = json!({
        "id_str": id.to_string(),
        "user": { "id": 1000 + id },
        "created_at": created_at,
        "text": text,
    });
    if let Some((lon, lat)) = location {
        value["coordinates"] = json!({ "type": "Point", "coordinates": [lon, lat] });
    }
    value.to_string()
}

/// One flooding report in each of the first two slices, a downtown cluster
/// in the third, and a quiet post opening the fourth.
fn flood_stream() -> Vec<String> {
    let mut lines = vec![
        record(1, 5, "Flooding downtown", Some((-95.37, 29.76))),
        record(2, 70, "flooding again", Some((-95.30, 29.70))),
    ];
    for i in 0..6u64 {
        lines.push(record(
            10 + i,
            121 + i as i64,
            "Flooding on Main street",
            Some((-95.36 + 0.0005 * i as f64, 29.76)),
        ));
    }
    lines.push(record(20, 130, "flooding on Main street", None));
    lines.push(record(21, 131, "sunny afternoon", Some((-95.7, 30.0))));
    lines.push(record(22, 132, "Flooding in Austin", Some((-97.74, 30.27))));
    lines.push(record(30, 185, "sunny", Some((-95.5, 29.9))));
    lines
}

fn run(config: &Config, mode: SimilarityMode, lines: &[String]) -> Vec<ClusterReport> {
    let parser = PostParser::new(config.timezone().unwrap());
    let mut driver = StreamDriver::new(config, mode, create_shared_stats()).unwrap();
    lines
        .iter()
        .filter_map(|line| driver.process(parser.parse_line(line).unwrap()).unwrap())
        .collect()
}

#[test]
fn test_flood_stream_produces_one_cluster() {
    let config = Config::from_json(CONFIG).unwrap();
    let stats = create_shared_stats();
    let parser = PostParser::new(config.timezone().unwrap());
    let mut driver =
        StreamDriver::new(&config, SimilarityMode::OverlapOnly, stats.clone()).unwrap();

    let mut reports = Vec::new();
    for line in flood_stream() {
        if let Some(report) = driver.process(parser.parse_line(&line).unwrap()).unwrap() {
            reports.push(report);
        }
    }

    assert_eq!(reports.len(), 1);
    let report = &reports[0];
    assert_eq!(report.snapshot_index, 2);
    assert_eq!(report.run_id, driver.run_id().to_string());
    let terms: Vec<&str> = report.bursty_terms.iter().map(|t| t.term.as_str()).collect();
    assert!(terms.contains(&"flooding"));
    assert!(!terms.contains(&"sunny"));

    // six geotagged, one predicted, one isolated far away; Austin was dropped
    assert_eq!(report.points.len(), 8);
    assert_eq!(report.cluster_count, 1);
    assert_eq!(report.noise_count, 1);

    let predicted: Vec<_> = report.points.iter().filter(|p| p.predicted).collect();
    assert_eq!(predicted.len(), 1);
    assert_eq!(predicted[0].post_id, 20);
    assert!(predicted[0].cluster >= 0);
    assert!((predicted[0].longitude - (-95.35875)).abs() < 1e-4);
    assert!((predicted[0].latitude - 29.76).abs() < 1e-4);

    let far = report.points.iter().find(|p| p.post_id == 21).unwrap();
    assert_eq!(far.cluster, -1);

    let counters = stats.stats();
    assert_eq!(counters.out_of_bounds, 1);
    assert_eq!(counters.bursty_snapshots, 1);
    assert_eq!(counters.predicted_locations, 1);
    assert_eq!(counters.snapshots_completed, 3);
}

#[test]
fn test_text_output_uses_configured_precision() {
    let config = Config::from_json(CONFIG).unwrap();
    let reports = run(&config, SimilarityMode::OverlapOnly, &flood_stream());
    let text = reports[0].to_text(config.output.precision);

    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 8);
    for line in lines {
        let fields: Vec<&str> = line.split(' ').collect();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[0].split('.').nth(1).unwrap().len(), 6);
        assert_eq!(fields[1].split('.').nth(1).unwrap().len(), 6);
        fields[2].parse::<i64>().unwrap();
    }
}

#[test]
fn test_embedding_mode_keeps_overlap_structure() {
    let config = Config::from_json(CONFIG).unwrap();
    let table = EmbeddingTable::from_reader(Cursor::new(
        "flooding 1.0 0.0\nmain 0.9 0.1\nstreet 0.8 0.2\n",
    ))
    .unwrap();
    let mode = SimilarityMode::OverlapPlusEmbedding {
        embeddings: Arc::new(table),
        weight: 0.3,
    };

    let reports = run(&config, mode, &flood_stream());
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].cluster_count, 1);
    assert_eq!(reports[0].points.iter().filter(|p| p.predicted).count(), 1);
}

#[test]
fn test_reader_feeds_driver_and_skips_malformed_lines() {
    let config = Config::from_json(CONFIG).unwrap();
    let stats = create_shared_stats();
    let mut driver =
        StreamDriver::new(&config, SimilarityMode::OverlapOnly, stats.clone()).unwrap();

    let mut input = flood_stream();
    input.insert(3, "{not json".to_string());
    input.insert(5, r#"{"id": 99, "text": "no author or time"}"#.to_string());
    let mut reader = PostReader::new(PostParser::new(config.timezone().unwrap()), stats.clone());
    reader
        .start(Cursor::new(input.join("\n").into_bytes()))
        .unwrap();

    let mut reports = Vec::new();
    for post in reader.receiver().clone().iter() {
        reports.extend(driver.process(post).unwrap());
    }
    reader.stop();

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].cluster_count, 1);
    let counters = stats.stats();
    assert_eq!(counters.records_read, 14);
    assert_eq!(counters.malformed_records, 2);

    let pending = driver.finish();
    assert_eq!(pending.index, 3);
    assert_eq!(pending.post_count, 1);
}

#[test]
fn test_quiet_stream_produces_no_reports() {
    let config = Config::from_json(CONFIG).unwrap();
    let lines: Vec<String> = (0..20u64)
        .map(|i| record(i, i as i64 * 30, "traffic on the loop", Some((-95.4, 29.8))))
        .collect();
    assert!(run(&config, SimilarityMode::OverlapOnly, &lines).is_empty());
}

#[test]
fn test_out_of_order_post_stops_the_stream() {
    let config = Config::from_json(CONFIG).unwrap();
    let parser = PostParser::new(config.timezone().unwrap());
    let mut driver =
        StreamDriver::new(&config, SimilarityMode::OverlapOnly, create_shared_stats()).unwrap();

    let first = parser
        .parse_line(&record(1, 200, "storm", Some((-95.4, 29.8))))
        .unwrap();
    driver.process(first).unwrap();
    assert_eq!(driver.slice_start(), start() + Duration::seconds(180));

    let late = parser
        .parse_line(&record(2, 150, "storm", Some((-95.4, 29.8))))
        .unwrap();
    assert!(matches!(
        driver.process(late),
        Err(EngineError::TimeWentBackwards { elapsed_secs: -30 })
    ));
}
