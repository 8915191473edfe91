/*!
 * The GeoJSON document handed to the map.
 *
 * Only the small part of GeoJSON needed here is implemented, a FeatureCollection of Points where
 * every feature carries the statistics of one cluster as its properties. Properties that could
 * not be calculated are written as an explicit `null`, never left out, so every feature has the
 * same shape.
 */
use crate::{cluster::ClusterSummary, error::SolarMapResult, persist};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum FeatureCollectionTag {
    FeatureCollection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum FeatureTag {
    Feature,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum PointTag {
    Point,
}

/// A GeoJSON Point geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    #[serde(rename = "type")]
    tag: PointTag,
    /// `[lon, lat]`
    pub coordinates: [f64; 2],
}

impl Point {
    pub fn new(lon: f64, lat: f64) -> Self {
        Point {
            tag: PointTag::Point,
            coordinates: [lon, lat],
        }
    }
}

/// Everything in a [ClusterSummary] except the centroid, which is the feature geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureProperties {
    pub cluster: u32,
    pub count: usize,
    pub avg_units: f64,
    pub avg_bill: Option<f64>,
    pub avg_load: Option<f64>,
    pub avg_acs: Option<f64>,
    pub suggested_kw: f64,
    pub trend_pct: Option<f64>,
}

/// A single cluster on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type")]
    tag: FeatureTag,
    pub properties: FeatureProperties,
    pub geometry: Point,
}

impl Feature {
    pub fn from_summary(summary: &ClusterSummary) -> Self {
        let ClusterSummary {
            cluster,
            count,
            avg_units,
            avg_bill,
            avg_load,
            avg_acs,
            suggested_kw,
            trend_pct,
            centroid: [lon, lat],
        } = *summary;

        Feature {
            tag: FeatureTag::Feature,
            properties: FeatureProperties {
                cluster,
                count,
                avg_units,
                avg_bill,
                avg_load,
                avg_acs,
                suggested_kw,
                trend_pct,
            },
            geometry: Point::new(lon, lat),
        }
    }

    /// Rebuild the summary this feature was made from.
    pub fn to_summary(&self) -> ClusterSummary {
        let FeatureProperties {
            cluster,
            count,
            avg_units,
            avg_bill,
            avg_load,
            avg_acs,
            suggested_kw,
            trend_pct,
        } = self.properties;

        ClusterSummary {
            cluster,
            count,
            avg_units,
            avg_bill,
            avg_load,
            avg_acs,
            suggested_kw,
            trend_pct,
            centroid: self.geometry.coordinates,
        }
    }
}

/// The document written to disk and read by the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    tag: FeatureCollectionTag,
    pub features: Vec<Feature>,
}

impl Default for FeatureCollection {
    fn default() -> Self {
        FeatureCollection {
            tag: FeatureCollectionTag::FeatureCollection,
            features: vec![],
        }
    }
}

impl FeatureCollection {
    /// One feature per summary, in the same order.
    pub fn from_summaries<'a, I>(summaries: I) -> Self
    where
        I: IntoIterator<Item = &'a ClusterSummary>,
    {
        FeatureCollection {
            features: summaries.into_iter().map(Feature::from_summary).collect(),
            ..Self::default()
        }
    }

    /// Rebuild the summaries from the features, centroids come from the point geometry.
    pub fn to_summaries(&self) -> Vec<ClusterSummary> {
        self.features.iter().map(Feature::to_summary).collect()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Write the collection as GeoJSON, replacing any existing file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> SolarMapResult<()> {
        persist::write_json_atomically(path, self)
    }

    /// Read a GeoJSON file written by [FeatureCollection::save].
    pub fn load<P: AsRef<Path>>(path: P) -> SolarMapResult<Self> {
        persist::read_json(
            path,
            "Cluster GeoJSON",
            "Run clusterconnections to create it.",
        )
    }
}
