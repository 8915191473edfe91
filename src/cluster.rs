/*!
 * Types and functions for working with clusters.
 *
 * Connections are grouped with a density based clustering of their locations, and then a cluster
 * summary describes the aggregate properties of each group of connections.
 */

pub use dbscan::{dbscan_haversine, ClusterLabel, ClusterParams};
pub use summary::{suggested_capacity_kw, summarize, trend_percent, ClusterSummary};

mod dbscan;
mod summary;
