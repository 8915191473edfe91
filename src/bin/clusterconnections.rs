use clap::Parser;
use log::{info, warn, LevelFilter};
use simple_logger::SimpleLogger;
use solarmap::{
    default_aggregate_path, run_pipeline, ClusterParams, PipelineConfig, SolarMapResult,
    DEFAULT_GEOJSON, DEFAULT_INPUT,
};
use std::{error::Error, path::PathBuf};

/*-------------------------------------------------------------------------------------------------
 *                                     Command Line Options
 *-----------------------------------------------------------------------------------------------*/

///
/// Cluster utility connections and summarize each cluster.
///
/// This program groups connections that are close together with DBSCAN, then writes a GeoJSON
/// file with one point per cluster and a summary file for later filtering with filterclusters.
///
#[derive(Debug, Parser)]
#[clap(bin_name = "clusterconnections")]
#[clap(author, version, about)]
struct ClusterConnectionsOptionsInit {
    /// The path to the cleaned connections CSV file.
    ///
    /// If this is not specified, then the program will check for it in the "SOLARMAP_INPUT"
    /// environment variable.
    #[clap(short, long)]
    #[clap(env = "SOLARMAP_INPUT")]
    #[clap(default_value = DEFAULT_INPUT)]
    input: PathBuf,

    /// The path to the GeoJSON file to produce from this run.
    #[clap(short, long)]
    #[clap(default_value = DEFAULT_GEOJSON)]
    geojson: PathBuf,

    /// The path to the cluster summary file to produce from this run.
    ///
    /// If this is not specified, then "cluster_summary.json" in the same directory as the GeoJSON
    /// file is used.
    #[clap(short, long)]
    aggregate: Option<PathBuf>,

    /// The neighborhood radius in meters.
    #[clap(short, long)]
    #[clap(default_value_t = 500.0)]
    eps_meters: f64,

    /// The number of connections within the radius, including itself, that makes a connection a
    /// core point of a cluster.
    #[clap(short, long)]
    #[clap(default_value_t = 10)]
    min_samples: usize,

    /// Verbose output
    #[clap(short, long)]
    verbose: bool,
}

/// Get the command line arguments and check them.
///
/// The summary file path defaults to one next to the GeoJSON output, and the clustering
/// parameters are validated before anything is loaded.
fn parse_args() -> SolarMapResult<(PipelineConfig, bool)> {
    let ClusterConnectionsOptionsInit {
        input,
        geojson,
        aggregate,
        eps_meters,
        min_samples,
        verbose,
    } = ClusterConnectionsOptionsInit::parse();

    let aggregate = match aggregate {
        Some(v) => v,
        None => default_aggregate_path(&geojson),
    };

    let params = ClusterParams {
        eps_meters,
        min_samples,
    };
    params.validate()?;

    let checked = PipelineConfig {
        input,
        geojson_output: geojson,
        aggregate_output: aggregate,
        params,
    };

    Ok((checked, verbose))
}

/*-------------------------------------------------------------------------------------------------
 *                                             MAIN
 *-----------------------------------------------------------------------------------------------*/
fn main() -> Result<(), Box<dyn Error>> {
    let (config, verbose) = parse_args()?;

    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    SimpleLogger::new().with_level(level).init()?;

    if verbose {
        info!("{}", config);
    }

    let report = run_pipeline(&config)?;

    info!("");
    info!("Clustering complete:");
    for line in report.to_string().lines() {
        info!("{}", line);
    }

    if let Some(biggest) = report.aggregate.largest_cluster() {
        info!("");
        info!("Largest cluster:");
        for line in biggest.to_string().lines() {
            info!("{}", line);
        }
        info!("");
    } else {
        warn!("");
        warn!("No clusters found! Try a larger --eps-meters or smaller --min-samples.");
        warn!("");
    }

    Ok(())
}
