/*!
 * Restrict the clusters shown on the map by ranges of their statistics.
 *
 * Filtering only needs the saved cluster summaries, so it is cheap enough to run every time a
 * user moves a slider.
 */
use crate::{aggregate::ClusterAggregate, cluster::ClusterSummary, geojson::FeatureCollection};
use std::fmt::{self, Display};
use strum::{EnumIter, IntoEnumIterator};

/// The summary statistics that can be filtered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, strum::Display)]
pub enum FilterField {
    /// Mean monthly consumption in kWh.
    #[strum(serialize = "avg_units")]
    AvgUnits,
    /// Suggested photovoltaic capacity in kW.
    #[strum(serialize = "suggested_kw")]
    SuggestedKw,
}

impl FilterField {
    /// Get the value of this field from a summary.
    pub fn value(self, summary: &ClusterSummary) -> f64 {
        match self {
            FilterField::AvgUnits => summary.avg_units,
            FilterField::SuggestedKw => summary.suggested_kw,
        }
    }

    /// The smallest range holding this field's value for every summary, `[0, 0]` if there are
    /// none.
    pub fn extent(self, summaries: &[ClusterSummary]) -> ValueRange {
        summaries
            .iter()
            .map(|s| self.value(s))
            .fold(None, |acc: Option<ValueRange>, v| match acc {
                None => Some(ValueRange { min: v, max: v }),
                Some(r) => Some(ValueRange {
                    min: r.min.min(v),
                    max: r.max.max(v),
                }),
            })
            .unwrap_or(ValueRange { min: 0.0, max: 0.0 })
    }
}

/// An inclusive range of values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    /// Inclusive on both ends. A range with `min > max` contains nothing.
    pub fn contains(&self, val: f64) -> bool {
        self.min <= val && val <= self.max
    }
}

impl Display for ValueRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}

/// Bounds supplied by a user. Anything left as `None` defaults to the observed extreme.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BoundOverrides {
    pub min_units: Option<f64>,
    pub max_units: Option<f64>,
    pub min_kw: Option<f64>,
    pub max_kw: Option<f64>,
}

/// Keep the clusters with `avg_units` in one range and `suggested_kw` in another.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeFilter {
    pub units: ValueRange,
    pub kw: ValueRange,
}

impl RangeFilter {
    /// A filter that accepts every one of `summaries`, the default for the map.
    pub fn spanning(summaries: &[ClusterSummary]) -> Self {
        RangeFilter {
            units: FilterField::AvgUnits.extent(summaries),
            kw: FilterField::SuggestedKw.extent(summaries),
        }
    }

    /// Start from [RangeFilter::spanning] and replace whichever bounds were given.
    pub fn with_overrides(summaries: &[ClusterSummary], overrides: BoundOverrides) -> Self {
        let RangeFilter { units, kw } = Self::spanning(summaries);

        RangeFilter {
            units: ValueRange {
                min: overrides.min_units.unwrap_or(units.min),
                max: overrides.max_units.unwrap_or(units.max),
            },
            kw: ValueRange {
                min: overrides.min_kw.unwrap_or(kw.min),
                max: overrides.max_kw.unwrap_or(kw.max),
            },
        }
    }

    pub fn range(&self, field: FilterField) -> ValueRange {
        match field {
            FilterField::AvgUnits => self.units,
            FilterField::SuggestedKw => self.kw,
        }
    }

    /// Does this summary fall inside all of the ranges?
    pub fn accepts(&self, summary: &ClusterSummary) -> bool {
        FilterField::iter().all(|field| self.range(field).contains(field.value(summary)))
    }

    /// The summaries this filter accepts, in their original order.
    pub fn apply<'a>(&self, summaries: &'a [ClusterSummary]) -> Vec<&'a ClusterSummary> {
        summaries.iter().filter(|s| self.accepts(s)).collect()
    }

    /// Build the GeoJSON for the clusters in the aggregate that pass this filter.
    ///
    /// Filtering out everything is not an error, it gives an empty collection.
    pub fn to_feature_collection(&self, aggregate: &ClusterAggregate) -> FeatureCollection {
        FeatureCollection::from_summaries(self.apply(&aggregate.clusters))
    }
}

impl Display for RangeFilter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, field) in FilterField::iter().enumerate() {
            if i > 0 {
                write!(f, "  ")?;
            }
            write!(f, "{}: {}", field, self.range(field))?;
        }

        Ok(())
    }
}
