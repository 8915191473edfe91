/*!
 * Run whole steps of the pipeline from a configuration.
 *
 * The command line programs are thin wrappers around these functions.
 */
use crate::{
    aggregate::ClusterAggregate,
    cluster::{dbscan_haversine, summarize, ClusterSummary},
    config::{FilterConfig, PipelineConfig},
    error::SolarMapResult,
    filter::RangeFilter,
    geojson::FeatureCollection,
    record::RecordSet,
};
use log::{info, warn};
use std::fmt::{self, Display};

/// What happened during a run of [run_pipeline].
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineReport {
    /// The number of records loaded.
    pub records: usize,
    /// The number of records not assigned to any cluster.
    pub noise: usize,
    /// The saved summaries.
    pub aggregate: ClusterAggregate,
}

impl PipelineReport {
    pub fn clusters(&self) -> usize {
        self.aggregate.len()
    }
}

impl Display for PipelineReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        writeln!(f, "       records - {:>10}", self.records)?;
        writeln!(f, "      clusters - {:>10}", self.clusters())?;
        write!(f, "         noise - {:>10}", self.noise)?;

        Ok(())
    }
}

/// Load the records, cluster them, and write both the GeoJSON and the summary file.
///
/// Nothing is written unless every record loads and the clustering succeeds. An input that yields
/// no clusters is not an error, it produces an empty FeatureCollection and an empty summary file.
pub fn run_pipeline(config: &PipelineConfig) -> SolarMapResult<PipelineReport> {
    config.params.validate()?;

    let records = RecordSet::from_csv_path(&config.input)?;
    if !records.schema().has_trend() {
        info!("Previous month columns not present, trend_pct will be null.");
    }

    let labels = dbscan_haversine(&records.coords(), &config.params)?;
    let noise = labels.iter().filter(|l| l.is_noise()).count();

    let summaries = summarize(&records, &labels)?;
    let aggregate = ClusterAggregate::new(summaries, &config.params);

    aggregate
        .to_feature_collection()
        .save(&config.geojson_output)?;
    info!(
        "Wrote {} clusters to {}",
        aggregate.len(),
        config.geojson_output.display()
    );

    aggregate.save(&config.aggregate_output)?;
    info!(
        "Wrote cluster summary to {}",
        config.aggregate_output.display()
    );

    if aggregate.is_empty() {
        warn!("No clusters found, every record is noise.");
    }

    Ok(PipelineReport {
        records: records.len(),
        noise,
        aggregate,
    })
}

/// What happened during a run of [run_filter].
#[derive(Debug, Clone, PartialEq)]
pub struct FilterReport {
    /// The number of clusters before filtering.
    pub total: usize,
    /// The number of clusters written out.
    pub kept: usize,
    /// The ranges actually used, after filling in defaults.
    pub filter: RangeFilter,
}

impl Display for FilterReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(f, "kept {} of {} clusters, {}", self.kept, self.total, self.filter)
    }
}

/// Filter the saved clusters and write the ones that pass as GeoJSON.
///
/// If the summary file is missing but the GeoJSON from the same run is configured as a fallback
/// and exists, the summaries are rebuilt from that instead. When neither exists the
/// [SolarMapError::MissingInput](crate::SolarMapError::MissingInput) for the summary file is
/// returned.
pub fn run_filter(config: &FilterConfig) -> SolarMapResult<FilterReport> {
    let summaries = load_summaries(config)?;

    let filter = RangeFilter::with_overrides(&summaries, config.bounds);
    let kept = FeatureCollection::from_summaries(filter.apply(&summaries));

    kept.save(&config.output)?;
    info!(
        "Wrote {} of {} clusters to {}",
        kept.len(),
        summaries.len(),
        config.output.display()
    );

    Ok(FilterReport {
        total: summaries.len(),
        kept: kept.len(),
        filter,
    })
}

fn load_summaries(config: &FilterConfig) -> SolarMapResult<Vec<ClusterSummary>> {
    match ClusterAggregate::load(&config.aggregate_input) {
        Ok(agg) => Ok(agg.clusters),
        Err(err) if err.is_missing_input() => match config.geojson_fallback {
            Some(ref geojson) if geojson.is_file() => {
                warn!("{}", err);
                warn!("Reading clusters from {} instead.", geojson.display());

                let mut summaries = FeatureCollection::load(geojson)?.to_summaries();
                summaries.sort_by_key(|s| s.cluster);
                Ok(summaries)
            }
            _ => Err(err),
        },
        Err(err) => Err(err),
    }
}
