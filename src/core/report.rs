//! Cluster reports emitted once per clustered snapshot.
//!
//! Coordinates are rounded to a fixed number of decimals when the report
//! is built, so text and JSON renderings carry the same values.

use crate::core::dbscan::ClusteredPost;
use crate::core::snapshot::Snapshot;
use crate::core::space::SpaceBoundingBox;
use crate::core::windowing::SlidingWindow;
use crate::ingest::PostId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::Write as _;
use uuid::Uuid;

/// The name of this producer.
pub const PRODUCER_NAME: &str = "geo-event-detector";

/// A bursty term as reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportTerm {
    pub term: String,
    pub score: f64,
    /// Number of earlier snapshots in the sliding window where the term was also bursty
    pub recurrence: usize,
}

/// A clustered post as reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportPoint {
    pub post_id: PostId,
    /// Geographic longitude
    pub longitude: f64,
    /// Geographic latitude
    pub latitude: f64,
    /// Normalized x coordinate used for clustering
    pub x: f64,
    /// Normalized y coordinate used for clustering
    pub y: f64,
    /// Cluster id, `-1` for noise
    pub cluster: i64,
    /// Whether the location was inferred
    pub predicted: bool,
}

/// Clustering output of one snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterReport {
    pub producer: String,
    pub run_id: String,
    pub snapshot_index: u64,
    /// Slice start (RFC3339)
    pub slice_start: String,
    /// Slice end (RFC3339)
    pub slice_end: String,
    /// When this report was computed (RFC3339)
    pub computed_at_utc: String,
    pub bursty_terms: Vec<ReportTerm>,
    pub cluster_count: usize,
    pub noise_count: usize,
    pub points: Vec<ReportPoint>,
}

impl ClusterReport {
    /// One `longitude latitude label` line per point.
    ///
    /// Coordinates are restored to longitude and latitude. The box-normalized
    /// `x`/`y` values are only carried in the JSON rendering.
    pub fn to_text(&self, precision: usize) -> String {
        let mut out = String::new();
        for p in &self.points {
            let _ = writeln!(
                out,
                "{:.prec$} {:.prec$} {}",
                p.longitude,
                p.latitude,
                p.cluster,
                prec = precision
            );
        }
        out
    }

    /// Single-line JSON rendering.
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Builder for cluster reports of one run.
#[derive(Debug, Clone)]
pub struct ReportBuilder {
    run_id: Uuid,
    precision: usize,
}

impl ReportBuilder {
    /// Create a builder with a fresh run id.
    pub fn new(precision: usize) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            precision,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn precision(&self) -> usize {
        self.precision
    }

    fn round(&self, value: f64) -> f64 {
        let factor = 10f64.powi(self.precision as i32);
        (value * factor).round() / factor
    }

    /// Build the report of a clustered snapshot.
    ///
    /// `window` must not yet contain the snapshot itself.
    pub fn build(
        &self,
        snapshot: &Snapshot,
        window: &SlidingWindow,
        space: &SpaceBoundingBox,
        slice: (DateTime<Utc>, DateTime<Utc>),
        clustered: &[ClusteredPost],
    ) -> ClusterReport {
        let bursty_terms = snapshot
            .bursty_terms()
            .iter()
            .map(|t| ReportTerm {
                term: t.term.clone(),
                score: t.score,
                recurrence: window.term_recurrence(&t.term),
            })
            .collect();

        let points = clustered
            .iter()
            .map(|c| {
                let geo = space.restore(&c.point);
                ReportPoint {
                    post_id: c.post_id,
                    longitude: self.round(geo.longitude),
                    latitude: self.round(geo.latitude),
                    x: self.round(c.point.longitude),
                    y: self.round(c.point.latitude),
                    cluster: c.label.as_i64(),
                    predicted: snapshot
                        .post(c.post_id)
                        .is_some_and(|p| p.needs_location_prediction),
                }
            })
            .collect();

        let clusters: BTreeSet<_> = clustered
            .iter()
            .filter(|c| !c.label.is_noise())
            .map(|c| c.label)
            .collect();

        ClusterReport {
            producer: PRODUCER_NAME.to_string(),
            run_id: self.run_id.to_string(),
            snapshot_index: snapshot.index(),
            slice_start: slice.0.to_rfc3339(),
            slice_end: slice.1.to_rfc3339(),
            computed_at_utc: Utc::now().to_rfc3339(),
            bursty_terms,
            cluster_count: clusters.len(),
            noise_count: clustered.iter().filter(|c| c.label.is_noise()).count(),
            points,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dbscan::ClusterLabel;
    use crate::core::snapshot::BurstyTermSet;
    use crate::core::windowing::SnapshotSummary;
    use crate::ingest::post::fixtures::{at, located, unlocated};
    use crate::ingest::Point;

    fn space() -> SpaceBoundingBox {
        SpaceBoundingBox::new(Point::new(-96.0, 29.0), Point::new(-95.0, 30.0), 1.0)
    }

    fn clustered_snapshot() -> (Snapshot, Vec<ClusteredPost>) {
        let mut snapshot = Snapshot::new(3);
        snapshot.collect(located(1, &["flood"], 0.5, 0.25));
        let mut predicted = unlocated(2, &["flood"]);
        predicted.assign_predicted(Point::new(0.123456789, 0.5));
        snapshot.collect(predicted);
        let mut bursty = BurstyTermSet::new();
        bursty.insert("flood", 6.5);
        snapshot.set_bursty_terms(bursty);

        let clustered = vec![
            ClusteredPost {
                post_id: 1,
                point: Point::new(0.5, 0.25),
                label: ClusterLabel::Cluster(0),
            },
            ClusteredPost {
                post_id: 2,
                point: Point::new(0.123456789, 0.5),
                label: ClusterLabel::Noise,
            },
        ];
        (snapshot, clustered)
    }

    #[test]
    fn test_report_contents() {
        let (snapshot, clustered) = clustered_snapshot();
        let mut window = SlidingWindow::new(2);
        window.slide(SnapshotSummary {
            index: 2,
            start: at(0),
            end: at(60),
            post_count: 1,
            author_count: 1,
            geotagged_count: 1,
            bursty_terms: vec!["flood".to_string()],
        });

        let builder = ReportBuilder::new(4);
        let report = builder.build(&snapshot, &window, &space(), (at(60), at(120)), &clustered);

        assert_eq!(report.snapshot_index, 3);
        assert_eq!(report.run_id, builder.run_id().to_string());
        assert_eq!(report.cluster_count, 1);
        assert_eq!(report.noise_count, 1);
        assert_eq!(report.bursty_terms[0].recurrence, 1);

        assert_eq!(report.points[0].longitude, -95.5);
        assert_eq!(report.points[0].latitude, 29.25);
        assert!(!report.points[0].predicted);
        assert_eq!(report.points[1].x, 0.1235);
        assert_eq!(report.points[1].cluster, -1);
        assert!(report.points[1].predicted);
    }

    #[test]
    fn test_text_rendering_uses_fixed_precision() {
        let (snapshot, clustered) = clustered_snapshot();
        let builder = ReportBuilder::new(3);
        let report = builder.build(
            &snapshot,
            &SlidingWindow::new(1),
            &space(),
            (at(0), at(60)),
            &clustered,
        );

        let text = report.to_text(3);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["-95.500 29.250 0", "-95.877 29.500 -1"]);
    }

    #[test]
    fn test_json_rendering_is_single_line() {
        let (snapshot, clustered) = clustered_snapshot();
        let report = ReportBuilder::new(6).build(
            &snapshot,
            &SlidingWindow::new(1),
            &space(),
            (at(0), at(60)),
            &clustered,
        );
        let json = report.to_json_line().unwrap();
        assert!(!json.contains('\n'));
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["producer"], PRODUCER_NAME);
        assert_eq!(value["points"][1]["cluster"], -1);
    }
}
