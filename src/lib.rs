/*!
 * Find dense groups of utility connections and describe each group well enough to size a shared
 * rooftop solar installation for it.
 *
 * Connections are clustered with DBSCAN using great circle distances, every cluster is reduced to
 * a summary of its consumption statistics, and the summaries are written as GeoJSON for a map and
 * as a summary file that can be filtered later without clustering again.
 */
pub use aggregate::{ClusterAggregate, AGGREGATE_FORMAT, AGGREGATE_VERSION};
pub use cluster::{
    dbscan_haversine, suggested_capacity_kw, summarize, trend_percent, ClusterLabel,
    ClusterParams, ClusterSummary,
};
pub use config::{
    default_aggregate_path, FilterConfig, PipelineConfig, DEFAULT_AGGREGATE_NAME,
    DEFAULT_FILTERED_GEOJSON, DEFAULT_GEOJSON, DEFAULT_INPUT,
};
pub use error::{SolarMapError, SolarMapResult};
pub use filter::{BoundOverrides, FilterField, RangeFilter, ValueRange};
pub use geo::{
    great_circle_distance, haversine_radians, BoundingBox, Coord, Geo, HilbertRTree,
    EARTH_RADIUS_M,
};
pub use geojson::{Feature, FeatureCollection, FeatureProperties, Point};
pub use pipeline::{run_filter, run_pipeline, FilterReport, PipelineReport};
pub use record::{Record, RecordSet, Schema};

/**************************************************************************************************
 * Private Implementation
 *************************************************************************************************/
mod aggregate;
mod cluster;
mod config;
mod error;
mod filter;
mod geo;
mod geojson;
mod persist;
mod pipeline;
mod record;
