//! Service endpoints and the filters each one accepts

use super::codec;
use super::filter::{FilterField, FilterSpec};
use crate::error::{Error, Result};
use crate::types::{JsonValue, Method};
use url::Url;

use FilterField::*;

const COMMON: &[FilterField] = &[
    StartDate,
    EndDate,
    StateCode,
    Region,
    SubRegion,
    County,
    Operator,
    AggregateBy,
];

const FRAC_FILTERS: &[FilterField] = &[ServiceCompany, FracClass];
const FORECAST_FILTERS: &[FilterField] = &[ForecastRunDate];
const COMPLETION_FILTERS: &[FilterField] = &[Api, CompletionClass];
const PRODUCTION_FILTERS: &[FilterField] = &[
    Api,
    ProductionMonth,
    FirstProductionMonthStart,
    FirstProductionMonthEnd,
    Modeled,
];
const RIG_FILTERS: &[FilterField] = &[Api, RigClass];
const WELL_FILTERS: &[FilterField] = &[Api, FirstProductionMonthStart, FirstProductionMonthEnd];
const SHORT_TERM_FILTERS: &[FilterField] = &[ForecastRunDate, Category];
const DAILY_PRODUCTION_FILTERS: &[FilterField] = &[Category, Modeled];

/// A Hyperion service endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Regions,
    OperatorClassification,
    DailyFrackedFeet,
    LongTermForecast,
    Completions,
    DucsByOperator,
    FracCrews,
    ProductionByWell,
    Rigs,
    Wells,
    ShortTermForecast,
    ShortTermForecastHistory,
    DailyProduction,
    DropdownSelection,
}

impl Endpoint {
    /// Every endpoint, in listing order
    pub const ALL: [Endpoint; 14] = [
        Endpoint::Regions,
        Endpoint::OperatorClassification,
        Endpoint::DailyFrackedFeet,
        Endpoint::LongTermForecast,
        Endpoint::Completions,
        Endpoint::DucsByOperator,
        Endpoint::FracCrews,
        Endpoint::ProductionByWell,
        Endpoint::Rigs,
        Endpoint::Wells,
        Endpoint::ShortTermForecast,
        Endpoint::ShortTermForecastHistory,
        Endpoint::DailyProduction,
        Endpoint::DropdownSelection,
    ];

    /// Short name used on the command line
    pub fn name(self) -> &'static str {
        match self {
            Self::Regions => "regions",
            Self::OperatorClassification => "operator_classification",
            Self::DailyFrackedFeet => "daily_fracked_feet",
            Self::LongTermForecast => "long_term_forecast",
            Self::Completions => "completions",
            Self::DucsByOperator => "ducs_by_operator",
            Self::FracCrews => "frac_crews",
            Self::ProductionByWell => "production_by_well",
            Self::Rigs => "rigs",
            Self::Wells => "wells",
            Self::ShortTermForecast => "short_term_forecast",
            Self::ShortTermForecastHistory => "short_term_forecast_history",
            Self::DailyProduction => "daily_production",
            Self::DropdownSelection => "dropdown_selection",
        }
    }

    /// Path relative to the service base URL
    pub fn path(self) -> &'static str {
        match self {
            Self::Regions => "v3/regions",
            Self::OperatorClassification => "v3/operatorclassification",
            Self::DailyFrackedFeet => "v3/dailyfrackedfeet",
            Self::LongTermForecast => "v3/longtermforecast",
            Self::Completions => "v3/completions",
            Self::DucsByOperator => "v3/ducsbyoperator",
            Self::FracCrews => "v3/fraccrews",
            Self::ProductionByWell => "v3/productionbywell",
            Self::Rigs => "v3/rigs",
            Self::Wells => "v3/wells",
            Self::ShortTermForecast => "v3/shorttermforecast",
            Self::ShortTermForecastHistory => "v3/shorttermforecasthistory",
            Self::DailyProduction => "v3/dailyproduction",
            Self::DropdownSelection => "v3/exl_dropdownselection",
        }
    }

    pub fn method(self) -> Method {
        match self {
            Self::Regions | Self::OperatorClassification => Method::GET,
            _ => Method::POST,
        }
    }

    /// Whether the endpoint answers with paged envelopes
    pub fn is_paginated(self) -> bool {
        !matches!(
            self,
            Self::Regions | Self::OperatorClassification | Self::DropdownSelection
        )
    }

    /// Filter fields this endpoint accepts; empty for non-query endpoints
    pub fn accepted_filters(self) -> Vec<FilterField> {
        let extra: &[FilterField] = match self {
            Self::Regions | Self::OperatorClassification | Self::DropdownSelection => {
                return Vec::new()
            }
            Self::DailyFrackedFeet | Self::FracCrews => FRAC_FILTERS,
            Self::LongTermForecast => FORECAST_FILTERS,
            Self::Completions => COMPLETION_FILTERS,
            Self::DucsByOperator => &[],
            Self::ProductionByWell => PRODUCTION_FILTERS,
            Self::Rigs => RIG_FILTERS,
            Self::Wells => WELL_FILTERS,
            Self::ShortTermForecast | Self::ShortTermForecastHistory => SHORT_TERM_FILTERS,
            Self::DailyProduction => DAILY_PRODUCTION_FILTERS,
        };

        let mut fields: Vec<FilterField> = COMMON.iter().chain(extra).copied().collect();
        fields.sort();
        fields
    }

    /// Whether `field` is accepted by this endpoint
    pub fn accepts(self, field: FilterField) -> bool {
        self.accepted_filters().contains(&field)
    }

    /// Absolute URL of this endpoint under `base`
    pub fn url(self, base: &Url) -> Result<Url> {
        Ok(base.join(self.path())?)
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Endpoint {
    type Err = Error;

    /// Accepts the short name (`daily_fracked_feet`) or the path segment
    /// (`dailyfrackedfeet`)
    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        Endpoint::ALL
            .into_iter()
            .find(|endpoint| {
                endpoint.name() == wanted
                    || endpoint.path().trim_start_matches("v3/") == wanted
            })
            .ok_or_else(|| Error::invalid_value("endpoint", format!("unknown endpoint '{s}'")))
    }
}

/// A filter validated against the endpoint it will be sent to
#[derive(Debug, Clone, Copy)]
pub struct Query<'a> {
    endpoint: Endpoint,
    filter: &'a FilterSpec,
}

impl<'a> Query<'a> {
    /// Validate `filter` for `endpoint`
    ///
    /// Fails with [`Error::UnsupportedOperation`] for endpoints that take no
    /// filter and with [`Error::InvalidFilter`] when a present field is not
    /// accepted or the filter itself is inconsistent.
    pub fn new(endpoint: Endpoint, filter: &'a FilterSpec) -> Result<Self> {
        if !endpoint.is_paginated() {
            return Err(Error::UnsupportedOperation {
                endpoint: endpoint.name().to_string(),
                operation: "filtered queries".to_string(),
            });
        }

        let accepted = endpoint.accepted_filters();
        let rejected: Vec<&str> = filter
            .present_fields()
            .into_iter()
            .filter(|field| !accepted.contains(field))
            .map(FilterField::name)
            .collect();
        if !rejected.is_empty() {
            return Err(Error::invalid_filter(
                endpoint.name(),
                format!("unsupported filter(s): {}", rejected.join(", ")),
            ));
        }

        filter
            .check()
            .map_err(|msg| Error::invalid_filter(endpoint.name(), msg))?;

        Ok(Self { endpoint, filter })
    }

    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    pub fn filter(&self) -> &'a FilterSpec {
        self.filter
    }

    /// Request body for the page starting at `cursor`
    pub fn body(&self, cursor: Option<u64>) -> Result<JsonValue> {
        codec::encode(self.filter, cursor)
    }
}
