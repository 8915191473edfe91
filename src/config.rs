//! Settings for each step of the pipeline.
//!
//! The command line programs fill these in, the library never looks at fixed paths or the
//! environment on its own.
use crate::{cluster::ClusterParams, filter::BoundOverrides};
use std::{
    fmt::{self, Display},
    path::{Path, PathBuf},
};

/// Where the cleaned records are expected by default.
pub const DEFAULT_INPUT: &str = "data/processed/cleaned.csv";
/// Where the cluster GeoJSON is written by default.
pub const DEFAULT_GEOJSON: &str = "outputs/clusters.geojson";
/// The file name of the saved summaries when it isn't given explicitly.
pub const DEFAULT_AGGREGATE_NAME: &str = "cluster_summary.json";
/// Where the filtered GeoJSON is written by default.
pub const DEFAULT_FILTERED_GEOJSON: &str = "outputs/filtered_clusters.geojson";

/// Everything needed to cluster the records and write the outputs.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// The cleaned records, CSV.
    pub input: PathBuf,
    /// The GeoJSON output.
    pub geojson_output: PathBuf,
    /// The saved summaries used later for filtering.
    pub aggregate_output: PathBuf,
    pub params: ClusterParams,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let geojson_output = PathBuf::from(DEFAULT_GEOJSON);
        let aggregate_output = default_aggregate_path(&geojson_output);

        PipelineConfig {
            input: PathBuf::from(DEFAULT_INPUT),
            geojson_output,
            aggregate_output,
            params: ClusterParams::default(),
        }
    }
}

impl Display for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        writeln!(f, "\n")?; // yes, two blank lines.
        writeln!(f, "        Input: {}", self.input.display())?;
        writeln!(f, "      GeoJSON: {}", self.geojson_output.display())?;
        writeln!(f, "      Summary: {}", self.aggregate_output.display())?;
        writeln!(f, "   eps_meters: {}", self.params.eps_meters)?;
        writeln!(f, "  min_samples: {}", self.params.min_samples)?;
        writeln!(f, "\n")?;

        Ok(())
    }
}

/// Everything needed to filter the saved summaries.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterConfig {
    /// The summaries written by the pipeline.
    pub aggregate_input: PathBuf,
    /// Used in place of the summary file when that file is missing but the GeoJSON from the same
    /// run exists.
    pub geojson_fallback: Option<PathBuf>,
    /// Where to write the filtered GeoJSON.
    pub output: PathBuf,
    pub bounds: BoundOverrides,
}

impl Default for FilterConfig {
    fn default() -> Self {
        let geojson = PathBuf::from(DEFAULT_GEOJSON);

        FilterConfig {
            aggregate_input: default_aggregate_path(&geojson),
            geojson_fallback: Some(geojson),
            output: PathBuf::from(DEFAULT_FILTERED_GEOJSON),
            bounds: BoundOverrides::default(),
        }
    }
}

impl Display for FilterConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        fn bound(val: Option<f64>) -> String {
            val.map(|v| v.to_string())
                .unwrap_or_else(|| "observed".to_owned())
        }

        writeln!(f, "\n")?; // yes, two blank lines.
        writeln!(f, "      Summary: {}", self.aggregate_input.display())?;
        if let Some(ref geojson) = self.geojson_fallback {
            writeln!(f, "     Fallback: {}", geojson.display())?;
        }
        writeln!(f, "       Output: {}", self.output.display())?;
        writeln!(
            f,
            "    avg_units: {} to {}",
            bound(self.bounds.min_units),
            bound(self.bounds.max_units)
        )?;
        writeln!(
            f,
            " suggested_kw: {} to {}",
            bound(self.bounds.min_kw),
            bound(self.bounds.max_kw)
        )?;
        writeln!(f, "\n")?;

        Ok(())
    }
}

/// The summary file that goes with a GeoJSON file, it lives in the same directory.
pub fn default_aggregate_path<P: AsRef<Path>>(geojson: P) -> PathBuf {
    geojson.as_ref().with_file_name(DEFAULT_AGGREGATE_NAME)
}
