//! Payload checks shared by the services.

use crate::error::{ServiceError, ServiceResult};
use chrono::{Datelike, Utc};

pub const MIN_YEAR: i32 = 1900;

pub fn require_non_empty(field: &str, value: &str) -> ServiceResult<()> {
    if value.trim().is_empty() {
        return Err(ServiceError::invariant(format!("{} must not be empty", field)));
    }
    Ok(())
}

/// Years run from 1900 up to next year, for announced releases.
pub fn require_valid_year(year: i32) -> ServiceResult<()> {
    let max_year = Utc::now().year() + 1;
    if !(MIN_YEAR..=max_year).contains(&year) {
        return Err(ServiceError::invariant(format!(
            "year must be between {} and {}",
            MIN_YEAR, max_year
        )));
    }
    Ok(())
}
