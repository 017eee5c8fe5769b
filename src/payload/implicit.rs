//! Geographic fallback filters
//!
//! Some queries are too broad to answer without at least one geographic
//! restriction. These helpers detect that and derive a narrowed copy of the
//! filter, leaving the caller's filter as it was.

use super::filter::{FilterField, FilterList, FilterSpec};
use crate::error::{Error, Result};

/// Fields that count as a geographic restriction
pub const GEOGRAPHIC_FIELDS: [FilterField; 4] = [
    FilterField::SubRegion,
    FilterField::County,
    FilterField::StateCode,
    FilterField::Region,
];

impl FilterSpec {
    /// True when at least one geographic field is set
    pub fn has_sufficient_filters(&self) -> bool {
        self.sub_region.is_some()
            || self.county.is_some()
            || self.state_code.is_some()
            || self.region.is_some()
    }

    /// A copy restricted by `field = values` when the filter has no
    /// geographic restriction, otherwise an unchanged copy
    pub fn with_implicit_filter(
        &self,
        field: FilterField,
        values: impl Into<FilterList<String>>,
    ) -> Result<FilterSpec> {
        if !GEOGRAPHIC_FIELDS.contains(&field) {
            return Err(Error::invalid_filter(
                "filter",
                format!("{field} is not a geographic filter"),
            ));
        }

        let mut spec = self.clone();
        if self.has_sufficient_filters() {
            return Ok(spec);
        }

        let values = Some(values.into());
        match field {
            FilterField::SubRegion => spec.sub_region = values,
            FilterField::County => spec.county = values,
            FilterField::StateCode => spec.state_code = values,
            _ => spec.region = values,
        }

        spec.validate()?;
        Ok(spec)
    }
}
