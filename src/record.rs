/*!
 * Cleaned connection records, the input to clustering.
 *
 * Cleaning happens upstream, so the only checks done here are the ones that would make the
 * geometry meaningless: every record must have a usable location and consumption value.
 */
use crate::{
    error::{SolarMapError, SolarMapResult},
    geo::Coord,
};
use log::{debug, info};
use serde::Deserialize;
use std::path::Path;

/// One active connection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Record {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
    /// Units consumed this month in kWh.
    pub consumption_kwh: f64,
    /// Amount billed for the month.
    pub billed_amount: Option<f64>,
    /// Sanctioned load in kW.
    pub load_kw: Option<f64>,
    /// Number of air conditioners at the connection.
    pub num_acs: Option<f64>,
    /// Units consumed the previous month in kWh.
    pub consumption_prev_month: Option<f64>,
    /// Units consumed the month before the previous month in kWh.
    pub consumption_prev_to_prev_month: Option<f64>,
}

impl Record {
    /// A record with only the required fields set.
    pub fn new(lat: f64, lon: f64, consumption_kwh: f64) -> Self {
        Record {
            lat,
            lon,
            consumption_kwh,
            billed_amount: None,
            load_kw: None,
            num_acs: None,
            consumption_prev_month: None,
            consumption_prev_to_prev_month: None,
        }
    }

    /// The location of this connection.
    pub fn coord(&self) -> Coord {
        Coord {
            lat: self.lat,
            lon: self.lon,
        }
    }
}

/**
 * Which of the optional columns were present in the input.
 *
 * A column that is absent from the input entirely makes the matching summary statistic null. This
 * is different from a column that is present with a few empty cells, those cells are skipped.
 */
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Schema {
    pub billed_amount: bool,
    pub load: bool,
    pub num_acs: bool,
    pub consumption_prev_month: bool,
    pub consumption_prev_to_prev_month: bool,
}

impl Schema {
    /// A schema with every optional column present.
    pub fn full() -> Self {
        Schema {
            billed_amount: true,
            load: true,
            num_acs: true,
            consumption_prev_month: true,
            consumption_prev_to_prev_month: true,
        }
    }

    /// Are both of the columns needed to calculate a consumption trend available?
    pub fn has_trend(&self) -> bool {
        self.consumption_prev_month && self.consumption_prev_to_prev_month
    }

    fn from_headers(headers: &csv::StringRecord) -> Self {
        let has = |name: &str| headers.iter().any(|h| h.trim() == name);

        Schema {
            billed_amount: has(BILLED_AMOUNT),
            load: has(LOAD),
            num_acs: has(NO_OF_AC),
            consumption_prev_month: has(CONSUMPTION_PREV_MNTH),
            consumption_prev_to_prev_month: has(CONSUMPTION_PREV_TO_PREV_MNTH),
        }
    }
}

const LAT: &str = "LAT";
const LON: &str = "LON";
const CONSUMPTION_KWH: &str = "CONSUMPTION_KWH";
const BILLED_AMOUNT: &str = "BILLED_AMOUNT";
const LOAD: &str = "LOAD";
const NO_OF_AC: &str = "NO_OF_AC";
const CONSUMPTION_PREV_MNTH: &str = "CONSUMPTION_PREV_MNTH";
const CONSUMPTION_PREV_TO_PREV_MNTH: &str = "CONSUMPTION_PREV_TO_PREV_MNTH";

/// A row as it appears in the cleaned CSV. Unknown columns are ignored.
#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "LAT", deserialize_with = "csv::invalid_option")]
    lat: Option<f64>,
    #[serde(rename = "LON", deserialize_with = "csv::invalid_option")]
    lon: Option<f64>,
    #[serde(rename = "CONSUMPTION_KWH", deserialize_with = "csv::invalid_option")]
    consumption_kwh: Option<f64>,
    #[serde(
        rename = "BILLED_AMOUNT",
        default,
        deserialize_with = "csv::invalid_option"
    )]
    billed_amount: Option<f64>,
    #[serde(rename = "LOAD", default, deserialize_with = "csv::invalid_option")]
    load_kw: Option<f64>,
    #[serde(rename = "NO_OF_AC", default, deserialize_with = "csv::invalid_option")]
    num_acs: Option<f64>,
    #[serde(
        rename = "CONSUMPTION_PREV_MNTH",
        default,
        deserialize_with = "csv::invalid_option"
    )]
    consumption_prev_month: Option<f64>,
    #[serde(
        rename = "CONSUMPTION_PREV_TO_PREV_MNTH",
        default,
        deserialize_with = "csv::invalid_option"
    )]
    consumption_prev_to_prev_month: Option<f64>,
}

impl CsvRow {
    fn into_record(self, row: usize) -> SolarMapResult<Record> {
        let lat = required(self.lat, row, LAT)?;
        let lon = required(self.lon, row, LON)?;
        let consumption_kwh = required(self.consumption_kwh, row, CONSUMPTION_KWH)?;

        Record {
            lat,
            lon,
            consumption_kwh,
            billed_amount: self.billed_amount,
            load_kw: self.load_kw,
            num_acs: self.num_acs,
            consumption_prev_month: self.consumption_prev_month,
            consumption_prev_to_prev_month: self.consumption_prev_to_prev_month,
        }
        .checked(row)
    }
}

impl Record {
    /// Reject records that can't be placed on the map, drop optional values that aren't finite.
    fn checked(self, row: usize) -> SolarMapResult<Self> {
        let lat = required(Some(self.lat), row, LAT)?;
        let lon = required(Some(self.lon), row, LON)?;
        required(Some(self.consumption_kwh), row, CONSUMPTION_KWH)?;

        if !(-90.0..=90.0).contains(&lat) {
            return Err(malformed(row, LAT, format!("latitude {} out of range", lat)));
        }

        if !(-180.0..=180.0).contains(&lon) {
            return Err(malformed(row, LON, format!("longitude {} out of range", lon)));
        }

        Ok(Record {
            billed_amount: finite(self.billed_amount),
            load_kw: finite(self.load_kw),
            num_acs: finite(self.num_acs),
            consumption_prev_month: finite(self.consumption_prev_month),
            consumption_prev_to_prev_month: finite(self.consumption_prev_to_prev_month),
            ..self
        })
    }
}

fn malformed(row: usize, column: &'static str, reason: String) -> SolarMapError {
    SolarMapError::MalformedRecord {
        row,
        column,
        reason,
    }
}

fn required(val: Option<f64>, row: usize, column: &'static str) -> SolarMapResult<f64> {
    match val {
        Some(v) if v.is_finite() => Ok(v),
        Some(v) => Err(malformed(row, column, format!("value {} is not finite", v))),
        None => Err(malformed(row, column, "missing or not a number".to_owned())),
    }
}

fn finite(val: Option<f64>) -> Option<f64> {
    val.filter(|v| v.is_finite())
}

/// The full set of cleaned records along with the description of which columns they came with.
#[derive(Debug, Clone, Default)]
pub struct RecordSet {
    records: Vec<Record>,
    schema: Schema,
}

impl RecordSet {
    /// Build a record set from records already in memory.
    ///
    /// The records get the same checks as rows loaded from a CSV file, `row` in a
    /// [SolarMapError::MalformedRecord] is the 1-based position in `records`.
    pub fn from_records(records: Vec<Record>, schema: Schema) -> SolarMapResult<Self> {
        let records = records
            .into_iter()
            .enumerate()
            .map(|(i, rec)| rec.checked(i + 1))
            .collect::<SolarMapResult<Vec<_>>>()?;

        Ok(RecordSet { records, schema })
    }

    /**
     * Load the cleaned records from a CSV file with a header row.
     *
     * The whole file is rejected if any row is missing a location or consumption value, there is
     * no way to place such a record on the map.
     */
    pub fn from_csv_path<P: AsRef<Path>>(path: P) -> SolarMapResult<Self> {
        let path = path.as_ref();

        if !path.is_file() {
            return Err(SolarMapError::MissingInput {
                what: "Cleaned connection records",
                path: path.to_path_buf(),
                hint: "Run the data cleaning step first.",
            });
        }

        let rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)?;

        let set = Self::from_csv_reader(rdr)?;
        info!(
            "Loaded {} records from {}",
            set.records.len(),
            path.display()
        );

        Ok(set)
    }

    /// Load records from any CSV reader, the header row must already be configured.
    pub fn from_csv_reader<R: std::io::Read>(mut rdr: csv::Reader<R>) -> SolarMapResult<Self> {
        let headers = rdr.headers()?.clone();

        for column in [LAT, LON, CONSUMPTION_KWH] {
            if !headers.iter().any(|h| h.trim() == column) {
                return Err(malformed(0, column, "required column missing".to_owned()));
            }
        }

        let schema = Schema::from_headers(&headers);
        debug!("input schema: {:?}", schema);

        let mut records = vec![];
        for (i, row) in rdr.deserialize::<CsvRow>().enumerate() {
            records.push(row?.into_record(i + 1)?);
        }

        Ok(RecordSet { records, schema })
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn schema(&self) -> Schema {
        self.schema
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The locations of all the records, in order.
    pub fn coords(&self) -> Vec<Coord> {
        self.records.iter().map(Record::coord).collect()
    }
}
