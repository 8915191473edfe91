use crate::{
    cluster::ClusterLabel,
    error::{SolarMapError, SolarMapResult},
    geo::Coord,
    record::{Record, RecordSet, Schema},
};
use rustc_hash::FxHashMap as HashMap;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// Days in the month used to turn monthly consumption into daily consumption.
const DAYS_PER_MONTH: f64 = 30.0;
/// Average peak sun hours per day used for sizing a photovoltaic system.
const PEAK_SUN_HOURS: f64 = 4.0;

/**
 * The aggregate properties of all the connections in a cluster.
 *
 * The field names are the property names used in the GeoJSON output and in the saved summary
 * file, so don't rename them.
 */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSummary {
    /// The cluster id from the clustering step.
    pub cluster: u32,
    /// The number of connections in the cluster.
    pub count: usize,
    /// Mean monthly consumption in kWh.
    pub avg_units: f64,
    /// Mean billed amount, null if the input had no billing information.
    pub avg_bill: Option<f64>,
    /// Mean sanctioned load in kW, null if the input had no load information.
    pub avg_load: Option<f64>,
    /// Mean number of air conditioners, null if the input had no AC counts.
    pub avg_acs: Option<f64>,
    /// Suggested photovoltaic capacity in kW.
    pub suggested_kw: f64,
    /// Month over month change in mean consumption in percent, null if the input didn't have
    /// both of the previous months.
    pub trend_pct: Option<f64>,
    /// Mean location of the cluster members as `[lon, lat]`.
    pub centroid: [f64; 2],
}

impl ClusterSummary {
    /// The centroid as a coordinate.
    pub fn centroid_coord(&self) -> Coord {
        Coord {
            lon: self.centroid[0],
            lat: self.centroid[1],
        }
    }
}

impl Display for ClusterSummary {
    #[rustfmt::skip]
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        fn opt(val: Option<f64>, prec: usize) -> String {
            val.map(|v| format!("{:.*}", prec, v)).unwrap_or_else(|| "n/a".to_owned())
        }

        let centroid = self.centroid_coord();

        writeln!(f, "          Cluster: {:9}", self.cluster)?;
        writeln!(f, "      Connections: {:9}", self.count)?;
        writeln!(f, "         Centroid: {:.6},{:.6}", centroid.lat, centroid.lon)?;
        writeln!(f, "        Avg Units: {:.1} kWh", self.avg_units)?;
        writeln!(f, "         Avg Bill: {}", opt(self.avg_bill, 1))?;
        writeln!(f, "         Avg Load: {} kW", opt(self.avg_load, 2))?;
        writeln!(f, "          Avg ACs: {}", opt(self.avg_acs, 1))?;
        writeln!(f, "  Suggested Solar: {:.2} kW", self.suggested_kw)?;
        writeln!(f, "            Trend: {}%", opt(self.trend_pct, 1))
    }
}

/// Size a photovoltaic system from the average monthly consumption in kWh.
///
/// Non-positive consumption gets a size of zero.
pub fn suggested_capacity_kw(avg_units: f64) -> f64 {
    if avg_units > 0.0 {
        avg_units / (DAYS_PER_MONTH * PEAK_SUN_HOURS)
    } else {
        0.0
    }
}

/// The percent change from `prev2` to `prev`, zero if `prev2` isn't positive.
pub fn trend_percent(prev: f64, prev2: f64) -> f64 {
    if prev2 > 0.0 {
        (prev - prev2) / prev2 * 100.0
    } else {
        0.0
    }
}

/// Running sum for the mean of a value that might be missing on some records.
#[derive(Debug, Default, Clone, Copy)]
struct Mean {
    sum: f64,
    count: usize,
}

impl Mean {
    fn add(&mut self, val: Option<f64>) {
        if let Some(val) = val {
            self.sum += val;
            self.count += 1;
        }
    }

    fn value(&self) -> Option<f64> {
        if self.count > 0 {
            Some(self.sum / self.count as f64)
        } else {
            None
        }
    }
}

#[derive(Debug, Default)]
struct Accumulator {
    count: usize,
    lat: Mean,
    lon: Mean,
    units: Mean,
    bill: Mean,
    load: Mean,
    acs: Mean,
    prev: Mean,
    prev2: Mean,
}

impl Accumulator {
    fn add(&mut self, rec: &Record) {
        self.count += 1;
        self.lat.add(Some(rec.lat));
        self.lon.add(Some(rec.lon));
        self.units.add(Some(rec.consumption_kwh));
        self.bill.add(rec.billed_amount);
        self.load.add(rec.load_kw);
        self.acs.add(rec.num_acs);
        self.prev.add(rec.consumption_prev_month);
        self.prev2.add(rec.consumption_prev_to_prev_month);
    }

    fn finish(self, cluster: u32, schema: Schema) -> ClusterSummary {
        let avg_units = self.units.value().unwrap_or(0.0);

        let present = |flag: bool, mean: Mean| if flag { mean.value() } else { None };

        let trend_pct = if schema.has_trend() {
            match (self.prev.value(), self.prev2.value()) {
                (Some(prev), Some(prev2)) => Some(trend_percent(prev, prev2)),
                // No usable values for the older month is treated like a non-positive mean.
                (_, None) => Some(0.0),
                (None, Some(prev2)) if prev2 <= 0.0 => Some(0.0),
                (None, Some(_)) => None,
            }
        } else {
            None
        };

        ClusterSummary {
            cluster,
            count: self.count,
            avg_units,
            avg_bill: present(schema.billed_amount, self.bill),
            avg_load: present(schema.load, self.load),
            avg_acs: present(schema.num_acs, self.acs),
            suggested_kw: suggested_capacity_kw(avg_units),
            trend_pct,
            centroid: [
                self.lon.value().unwrap_or(f64::NAN),
                self.lat.value().unwrap_or(f64::NAN),
            ],
        }
    }
}

/**
 * Group labeled records by cluster and calculate the statistics for each cluster.
 *
 * Noise records are dropped. The summaries are sorted by ascending cluster id.
 *
 * #Arguments
 * records - the records that were clustered.
 * labels - the label for each record, in the same order as `records`.
 */
pub fn summarize(
    records: &RecordSet,
    labels: &[ClusterLabel],
) -> SolarMapResult<Vec<ClusterSummary>> {
    if records.len() != labels.len() {
        return Err(SolarMapError::InvalidParameter(format!(
            "{} labels for {} records",
            labels.len(),
            records.len()
        )));
    }

    let mut groups: HashMap<u32, Accumulator> = HashMap::default();
    for (rec, label) in records.records().iter().zip(labels) {
        if let Some(id) = label.cluster_id() {
            groups.entry(id).or_default().add(rec);
        }
    }

    let schema = records.schema();
    let mut summaries: Vec<ClusterSummary> = groups
        .into_iter()
        .map(|(id, acc)| acc.finish(id, schema))
        .collect();

    summaries.sort_unstable_by_key(|s| s.cluster);

    Ok(summaries)
}
