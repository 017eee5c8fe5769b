//! Filter specification
//!
//! A [`FilterSpec`] is the caller's query filter. List fields accept a bare
//! scalar or a list and are stored as a list either way, so the wire format
//! is list-uniform no matter how the filter was built or loaded.

use crate::error::{Error, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::Path;

// ============================================================================
// FilterList
// ============================================================================

/// A filter value that is always a list on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FilterList<T>(Vec<T>);

impl<T> FilterList<T> {
    /// Values in this filter
    pub fn values(&self) -> &[T] {
        &self.0
    }

    /// Number of values
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when the list holds no values
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for FilterList<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum OneOrMany<T> {
            One(T),
            Many(Vec<T>),
        }

        Ok(match OneOrMany::<T>::deserialize(deserializer)? {
            OneOrMany::One(value) => Self(vec![value]),
            OneOrMany::Many(values) => Self(values),
        })
    }
}

impl From<&str> for FilterList<String> {
    fn from(value: &str) -> Self {
        Self(vec![value.to_string()])
    }
}

impl From<String> for FilterList<String> {
    fn from(value: String) -> Self {
        Self(vec![value])
    }
}

impl From<Vec<String>> for FilterList<String> {
    fn from(values: Vec<String>) -> Self {
        Self(values)
    }
}

impl From<Vec<&str>> for FilterList<String> {
    fn from(values: Vec<&str>) -> Self {
        Self(values.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for FilterList<String> {
    fn from(values: [&str; N]) -> Self {
        Self(values.iter().map(|v| (*v).to_string()).collect())
    }
}

impl From<i64> for FilterList<i64> {
    fn from(value: i64) -> Self {
        Self(vec![value])
    }
}

impl From<Vec<i64>> for FilterList<i64> {
    fn from(values: Vec<i64>) -> Self {
        Self(values)
    }
}

impl<const N: usize> From<[i64; N]> for FilterList<i64> {
    fn from(values: [i64; N]) -> Self {
        Self(values.to_vec())
    }
}

// ============================================================================
// FilterField
// ============================================================================

/// Every filter field the service understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FilterField {
    StartDate,
    EndDate,
    ForecastRunDate,
    FirstProductionMonthStart,
    FirstProductionMonthEnd,
    ProductionMonth,
    StateCode,
    Region,
    SubRegion,
    County,
    Operator,
    Api,
    AggregateBy,
    ServiceCompany,
    RigClass,
    CompletionClass,
    FracClass,
    Category,
    Modeled,
}

impl FilterField {
    /// Wire name of the field
    pub fn name(self) -> &'static str {
        match self {
            Self::StartDate => "start_date",
            Self::EndDate => "end_date",
            Self::ForecastRunDate => "forecast_run_date",
            Self::FirstProductionMonthStart => "first_production_month_start",
            Self::FirstProductionMonthEnd => "first_production_month_end",
            Self::ProductionMonth => "production_month",
            Self::StateCode => "state_code",
            Self::Region => "region",
            Self::SubRegion => "sub_region",
            Self::County => "county",
            Self::Operator => "operator",
            Self::Api => "api",
            Self::AggregateBy => "aggregate_by",
            Self::ServiceCompany => "service_company",
            Self::RigClass => "rig_class",
            Self::CompletionClass => "completion_class",
            Self::FracClass => "frac_class",
            Self::Category => "category",
            Self::Modeled => "modeled",
        }
    }
}

impl std::fmt::Display for FilterField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for FilterField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        use FilterField::*;
        [
            StartDate,
            EndDate,
            ForecastRunDate,
            FirstProductionMonthStart,
            FirstProductionMonthEnd,
            ProductionMonth,
            StateCode,
            Region,
            SubRegion,
            County,
            Operator,
            Api,
            AggregateBy,
            ServiceCompany,
            RigClass,
            CompletionClass,
            FracClass,
            Category,
            Modeled,
        ]
        .into_iter()
        .find(|field| field.name() == s)
        .ok_or_else(|| Error::invalid_value("filter_type", format!("unknown filter field '{s}'")))
    }
}

// ============================================================================
// FilterSpec
// ============================================================================

/// Query filter sent with every page request
///
/// Absent fields are omitted from the request body. The pagination cursor
/// is not part of the serialized filter; the codec adds it per request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forecast_run_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_production_month_start: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_production_month_end: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub production_month: Option<FilterList<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_code: Option<FilterList<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<FilterList<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_region: Option<FilterList<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub county: Option<FilterList<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<FilterList<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api: Option<FilterList<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregate_by: Option<FilterList<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_company: Option<FilterList<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rig_class: Option<FilterList<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_class: Option<FilterList<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frac_class: Option<FilterList<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<FilterList<String>>,
    /// Sent as the strings `"True"` / `"False"`
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_modeled"
    )]
    pub modeled: Option<bool>,
    /// Initial pagination cursor, used when the codec gets no override
    #[serde(default, skip_serializing)]
    pub pagination_start: u64,
}

fn serialize_modeled<S: Serializer>(
    value: &Option<bool>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match value {
        Some(true) => serializer.serialize_str("True"),
        Some(false) => serializer.serialize_str("False"),
        None => serializer.serialize_none(),
    }
}

impl FilterSpec {
    /// Create a builder
    pub fn builder() -> FilterSpecBuilder {
        FilterSpecBuilder::default()
    }

    /// Parse a filter from YAML (or JSON, which YAML accepts)
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let spec: Self = serde_yaml::from_str(yaml)
            .map_err(|e| Error::config(format!("Failed to parse filter: {e}")))?;
        spec.validate()?;
        Ok(spec)
    }

    /// Load a filter from a YAML or JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!(
                "Failed to read filter file '{}': {e}",
                path.display()
            ))
        })?;
        Self::from_yaml_str(&content)
    }

    /// Fields that carry a value
    pub fn present_fields(&self) -> Vec<FilterField> {
        use FilterField::*;
        let mut fields = Vec::new();
        let mut push = |present: bool, field| {
            if present {
                fields.push(field);
            }
        };

        push(self.start_date.is_some(), StartDate);
        push(self.end_date.is_some(), EndDate);
        push(self.forecast_run_date.is_some(), ForecastRunDate);
        push(
            self.first_production_month_start.is_some(),
            FirstProductionMonthStart,
        );
        push(
            self.first_production_month_end.is_some(),
            FirstProductionMonthEnd,
        );
        push(self.production_month.is_some(), ProductionMonth);
        push(self.state_code.is_some(), StateCode);
        push(self.region.is_some(), Region);
        push(self.sub_region.is_some(), SubRegion);
        push(self.county.is_some(), County);
        push(self.operator.is_some(), Operator);
        push(self.api.is_some(), Api);
        push(self.aggregate_by.is_some(), AggregateBy);
        push(self.service_company.is_some(), ServiceCompany);
        push(self.rig_class.is_some(), RigClass);
        push(self.completion_class.is_some(), CompletionClass);
        push(self.frac_class.is_some(), FracClass);
        push(self.category.is_some(), Category);
        push(self.modeled.is_some(), Modeled);

        fields
    }

    /// Reject inverted date ranges and empty lists
    pub fn validate(&self) -> Result<()> {
        self.check()
            .map_err(|msg| Error::invalid_filter("filter", msg))
    }

    pub(crate) fn check(&self) -> std::result::Result<(), String> {
        check_range(self.start_date, self.end_date, "start_date", "end_date")?;
        check_range(
            self.first_production_month_start,
            self.first_production_month_end,
            "first_production_month_start",
            "first_production_month_end",
        )?;

        let string_lists = [
            (&self.state_code, FilterField::StateCode),
            (&self.region, FilterField::Region),
            (&self.sub_region, FilterField::SubRegion),
            (&self.county, FilterField::County),
            (&self.operator, FilterField::Operator),
            (&self.aggregate_by, FilterField::AggregateBy),
            (&self.service_company, FilterField::ServiceCompany),
            (&self.rig_class, FilterField::RigClass),
            (&self.completion_class, FilterField::CompletionClass),
            (&self.frac_class, FilterField::FracClass),
            (&self.category, FilterField::Category),
        ];
        for (list, field) in string_lists {
            if let Some(list) = list {
                if list.is_empty() {
                    return Err(format!("{field} must not be an empty list"));
                }
                if list.values().iter().any(|v| v.trim().is_empty()) {
                    return Err(format!("{field} contains an empty value"));
                }
            }
        }

        for (list, field) in [
            (&self.production_month, FilterField::ProductionMonth),
            (&self.api, FilterField::Api),
        ] {
            if list.as_ref().is_some_and(FilterList::is_empty) {
                return Err(format!("{field} must not be an empty list"));
            }
        }

        Ok(())
    }
}

fn check_range(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    start_name: &str,
    end_name: &str,
) -> std::result::Result<(), String> {
    match (start, end) {
        (Some(start), Some(end)) if start > end => Err(format!(
            "{start_name} ({start}) is after {end_name} ({end})"
        )),
        _ => Ok(()),
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`FilterSpec`]; scalar arguments become one-element lists
#[derive(Debug, Default)]
pub struct FilterSpecBuilder {
    spec: FilterSpec,
}

macro_rules! list_setter {
    ($(#[$doc:meta])* $name:ident, $ty:ty) => {
        $(#[$doc])*
        #[must_use]
        pub fn $name(mut self, value: impl Into<FilterList<$ty>>) -> Self {
            self.spec.$name = Some(value.into());
            self
        }
    };
}

impl FilterSpecBuilder {
    /// Set both ends of the date range
    #[must_use]
    pub fn date_range(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.spec.start_date = Some(start);
        self.spec.end_date = Some(end);
        self
    }

    /// Set the start date
    #[must_use]
    pub fn start_date(mut self, date: NaiveDate) -> Self {
        self.spec.start_date = Some(date);
        self
    }

    /// Set the end date
    #[must_use]
    pub fn end_date(mut self, date: NaiveDate) -> Self {
        self.spec.end_date = Some(date);
        self
    }

    /// Set the forecast run date
    #[must_use]
    pub fn forecast_run_date(mut self, date: NaiveDate) -> Self {
        self.spec.forecast_run_date = Some(date);
        self
    }

    /// Set the first production month window
    #[must_use]
    pub fn first_production_month(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.spec.first_production_month_start = Some(start);
        self.spec.first_production_month_end = Some(end);
        self
    }

    list_setter!(production_month, i64);
    list_setter!(state_code, String);
    list_setter!(region, String);
    list_setter!(sub_region, String);
    list_setter!(county, String);
    list_setter!(operator, String);
    list_setter!(
        /// API well numbers
        api,
        i64
    );
    list_setter!(aggregate_by, String);
    list_setter!(service_company, String);
    list_setter!(rig_class, String);
    list_setter!(completion_class, String);
    list_setter!(frac_class, String);
    list_setter!(category, String);

    /// Restrict to modeled (or non-modeled) data
    #[must_use]
    pub fn modeled(mut self, modeled: bool) -> Self {
        self.spec.modeled = Some(modeled);
        self
    }

    /// Set the initial pagination cursor
    #[must_use]
    pub fn pagination_start(mut self, start: u64) -> Self {
        self.spec.pagination_start = start;
        self
    }

    /// Validate and build the filter
    pub fn build(self) -> Result<FilterSpec> {
        self.spec.validate()?;
        Ok(self.spec)
    }
}
