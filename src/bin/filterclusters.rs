use clap::Parser;
use log::{info, LevelFilter};
use simple_logger::SimpleLogger;
use solarmap::{
    default_aggregate_path, run_filter, BoundOverrides, FilterConfig, DEFAULT_FILTERED_GEOJSON,
    DEFAULT_GEOJSON,
};
use std::{error::Error, path::PathBuf};

/*-------------------------------------------------------------------------------------------------
 *                               Parse Command Line Arguments
 *-----------------------------------------------------------------------------------------------*/
///
/// Filter clusters by their consumption statistics.
///
/// This program reads the cluster summary written by clusterconnections and writes a GeoJSON file
/// with only the clusters whose average consumption and suggested capacity fall inside the given
/// ranges. Any bound that isn't given defaults to the smallest or largest value among the
/// clusters.
///
#[derive(Debug, Parser)]
#[clap(bin_name = "filterclusters")]
#[clap(author, version, about)]
struct FilterClustersOptionsInit {
    /// The path to the cluster summary file.
    ///
    /// If this is not specified, then the program will check for it in the "SOLARMAP_AGGREGATE"
    /// environment variable, and then fall back to the default output of clusterconnections.
    #[clap(short, long)]
    #[clap(env = "SOLARMAP_AGGREGATE")]
    aggregate: Option<PathBuf>,

    /// The GeoJSON file from the same clustering run, used if the summary file is missing.
    #[clap(short, long)]
    #[clap(default_value = DEFAULT_GEOJSON)]
    geojson: PathBuf,

    /// The path to the filtered GeoJSON file to produce.
    #[clap(short, long)]
    #[clap(default_value = DEFAULT_FILTERED_GEOJSON)]
    output: PathBuf,

    /// The lowest average monthly consumption (kWh) to keep.
    #[clap(long)]
    min_units: Option<f64>,

    /// The highest average monthly consumption (kWh) to keep.
    #[clap(long)]
    max_units: Option<f64>,

    /// The lowest suggested capacity (kW) to keep.
    #[clap(long)]
    min_kw: Option<f64>,

    /// The highest suggested capacity (kW) to keep.
    #[clap(long)]
    max_kw: Option<f64>,

    /// Verbose output
    #[clap(short, long)]
    verbose: bool,
}

/// Get the command line arguments and check them.
fn parse_args() -> (FilterConfig, bool) {
    let FilterClustersOptionsInit {
        aggregate,
        geojson,
        output,
        min_units,
        max_units,
        min_kw,
        max_kw,
        verbose,
    } = FilterClustersOptionsInit::parse();

    let aggregate_input = match aggregate {
        Some(v) => v,
        None => default_aggregate_path(&geojson),
    };

    let checked = FilterConfig {
        aggregate_input,
        geojson_fallback: Some(geojson),
        output,
        bounds: BoundOverrides {
            min_units,
            max_units,
            min_kw,
            max_kw,
        },
    };

    (checked, verbose)
}

/*-------------------------------------------------------------------------------------------------
 *                                             MAIN
 *-----------------------------------------------------------------------------------------------*/
fn main() -> Result<(), Box<dyn Error>> {
    let (config, verbose) = parse_args();

    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    SimpleLogger::new().with_level(level).init()?;

    if verbose {
        info!("{}", config);
    }

    match run_filter(&config) {
        Ok(report) => {
            info!("{}", report);
            Ok(())
        }
        // Nothing to filter yet, that's not a failure.
        Err(err) if err.is_missing_input() => {
            info!("{}", err);
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}
