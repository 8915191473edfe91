/*!
 * The saved list of cluster summaries.
 *
 * This is the only output that is read back in by a later run. It holds everything needed to
 * rebuild the GeoJSON for any subset of the clusters without clustering the records again.
 */
use crate::{
    cluster::{ClusterParams, ClusterSummary},
    error::{SolarMapError, SolarMapResult},
    geojson::FeatureCollection,
    persist,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Identifies the file type so other JSON files aren't mistaken for a summary file.
pub const AGGREGATE_FORMAT: &str = "solarmap-cluster-summary";
/// The newest version of the file layout this crate can read, and the one it writes.
pub const AGGREGATE_VERSION: u32 = 1;

/// The cluster summaries along with a description of how they were made.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterAggregate {
    format: String,
    version: u32,
    /// When the clustering was run.
    pub generated: DateTime<Utc>,
    /// The neighborhood radius used for clustering.
    pub eps_meters: f64,
    /// The minimum neighborhood size used for clustering.
    pub min_samples: usize,
    /// Sorted by cluster id.
    pub clusters: Vec<ClusterSummary>,
}

impl ClusterAggregate {
    pub fn new(clusters: Vec<ClusterSummary>, params: &ClusterParams) -> Self {
        ClusterAggregate {
            format: AGGREGATE_FORMAT.to_owned(),
            version: AGGREGATE_VERSION,
            generated: Utc::now(),
            eps_meters: params.eps_meters,
            min_samples: params.min_samples,
            clusters,
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// The GeoJSON for all the clusters.
    pub fn to_feature_collection(&self) -> FeatureCollection {
        FeatureCollection::from_summaries(&self.clusters)
    }

    /// The cluster with the most connections, ties go to the lower cluster id.
    pub fn largest_cluster(&self) -> Option<&ClusterSummary> {
        self.clusters
            .iter()
            .reduce(|big, s| if s.count > big.count { s } else { big })
    }

    /// Write the summary file, replacing any existing file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> SolarMapResult<()> {
        persist::write_json_atomically(path, self)
    }

    /// Load a summary file and check that it is a version this crate understands.
    pub fn load<P: AsRef<Path>>(path: P) -> SolarMapResult<Self> {
        let agg: Self = persist::read_json(
            path,
            "Cluster summary",
            "Run clusterconnections first.",
        )?;

        if agg.format != AGGREGATE_FORMAT || agg.version == 0 || agg.version > AGGREGATE_VERSION {
            return Err(SolarMapError::UnsupportedFormat {
                found: agg.format,
                version: agg.version,
            });
        }

        Ok(agg)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn summary(cluster: u32, count: usize, avg_units: f64) -> ClusterSummary {
        ClusterSummary {
            cluster,
            count,
            avg_units,
            avg_bill: None,
            avg_load: Some(2.0),
            avg_acs: None,
            suggested_kw: avg_units / 120.0,
            trend_pct: Some(-3.5),
            centroid: [77.1, 28.6],
        }
    }

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cluster_summary.json");

        let agg = ClusterAggregate::new(
            vec![summary(0, 10, 150.0), summary(1, 25, 600.0)],
            &ClusterParams::default(),
        );
        agg.save(&path).unwrap();

        let loaded = ClusterAggregate::load(&path).unwrap();
        assert_eq!(loaded, agg);
        assert_eq!(loaded.version(), AGGREGATE_VERSION);

        // No temporary files left behind.
        let entries = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn test_centroid_written_as_lon_lat() {
        let agg = ClusterAggregate::new(vec![summary(0, 10, 150.0)], &ClusterParams::default());
        let value = serde_json::to_value(&agg).unwrap();

        assert_eq!(value["format"], AGGREGATE_FORMAT);
        assert_eq!(value["clusters"][0]["centroid"], serde_json::json!([77.1, 28.6]));
        assert_eq!(value["clusters"][0]["avg_bill"], serde_json::Value::Null);
    }

    #[test]
    fn test_rejects_unknown_format() {
        let dir = tempfile::tempdir().unwrap();

        let mut agg = ClusterAggregate::new(vec![], &ClusterParams::default());
        agg.version = AGGREGATE_VERSION + 1;
        let path = dir.path().join("future.json");
        agg.save(&path).unwrap();
        assert!(matches!(
            ClusterAggregate::load(&path),
            Err(SolarMapError::UnsupportedFormat { .. })
        ));

        let path = dir.path().join("other.json");
        std::fs::write(&path, r#"{"type": "FeatureCollection", "features": []}"#).unwrap();
        assert!(ClusterAggregate::load(&path).is_err());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ClusterAggregate::load(dir.path().join("nope.json")).unwrap_err();

        assert!(err.is_missing_input());
        assert!(err.to_string().contains("Run clusterconnections first."));
    }

    #[test]
    fn test_largest_cluster() {
        let agg = ClusterAggregate::new(
            vec![summary(0, 10, 1.0), summary(1, 30, 1.0), summary(2, 30, 1.0)],
            &ClusterParams::default(),
        );
        assert_eq!(agg.largest_cluster().map(|s| s.cluster), Some(1));

        let empty = ClusterAggregate::new(vec![], &ClusterParams::default());
        assert!(empty.largest_cluster().is_none());
    }
}
