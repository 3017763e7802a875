//! Field validation applied at the store boundary.

use chrono::{NaiveDate, Utc};

use crate::store::StoreError;
use crate::store::types::{EmployeeDraft, EmployeeId, MAX_RATING, MIN_RATING, StoreLimits};

/// Minimum length (in characters, after trimming) of names and positions.
pub const MIN_TEXT_LEN: usize = 2;

/// Maximum length (in characters, after trimming) of names and positions.
pub const MAX_TEXT_LEN: usize = 50;

/// Validate every caller-supplied field of a draft.
pub fn validate_draft(draft: &EmployeeDraft, limits: &StoreLimits) -> Result<(), StoreError> {
    validate_id(draft.id, limits)?;
    validate_name(&draft.name)?;
    validate_position(&draft.position)?;
    validate_compensation(draft.compensation, limits)?;
    validate_join_date(draft.join_date, Utc::now().date_naive())
}

pub fn validate_id(id: EmployeeId, limits: &StoreLimits) -> Result<(), StoreError> {
    let min = limits.min_id.max(1);
    if id < min {
        return Err(StoreError::invalid(
            "id",
            format!("must be {min} or greater, got {id}"),
        ));
    }
    Ok(())
}

/// Names are 2-50 characters of letters and whitespace.
pub fn validate_name(name: &str) -> Result<(), StoreError> {
    let trimmed = name.trim();
    check_length("name", trimmed)?;
    if !trimmed
        .chars()
        .all(|c| c.is_alphabetic() || c.is_whitespace())
    {
        return Err(StoreError::invalid(
            "name",
            "must contain only letters and spaces",
        ));
    }
    Ok(())
}

pub fn validate_position(position: &str) -> Result<(), StoreError> {
    check_length("position", position.trim())
}

pub fn validate_compensation(compensation: f64, limits: &StoreLimits) -> Result<(), StoreError> {
    if !compensation.is_finite()
        || compensation < limits.min_compensation
        || compensation > limits.max_compensation
    {
        return Err(StoreError::invalid(
            "compensation",
            format!(
                "must be between {:.2} and {:.2}",
                limits.min_compensation, limits.max_compensation
            ),
        ));
    }
    Ok(())
}

/// A join date, when given, may not lie after `today`.
pub fn validate_join_date(
    join_date: Option<NaiveDate>,
    today: NaiveDate,
) -> Result<(), StoreError> {
    match join_date {
        Some(date) if date > today => Err(StoreError::invalid(
            "join_date",
            format!("{date} is in the future"),
        )),
        _ => Ok(()),
    }
}

pub fn validate_rating(rating: f64) -> Result<(), StoreError> {
    // NaN fails both comparisons, so check finiteness explicitly.
    if !rating.is_finite() || !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(StoreError::invalid(
            "rating",
            format!("must be between {MIN_RATING} and {MAX_RATING}"),
        ));
    }
    Ok(())
}

fn check_length(field: &'static str, value: &str) -> Result<(), StoreError> {
    let len = value.chars().count();
    if !(MIN_TEXT_LEN..=MAX_TEXT_LEN).contains(&len) {
        return Err(StoreError::invalid(
            field,
            format!("must be {MIN_TEXT_LEN}-{MAX_TEXT_LEN} characters"),
        ));
    }
    Ok(())
}
