//! Input validation helpers
//!
//! Centralized limits and checks. Everything here runs before any storage
//! access.

use shared::error::{AppError, ErrorCode};

// ── Limits ──────────────────────────────────────────────────────────

/// Lines per order
pub const MAX_ORDER_LINES: usize = 50;

/// Quantity per line
pub const MIN_QUANTITY: i64 = 1;
pub const MAX_QUANTITY: i64 = 100;

/// Declared delivery location, after trimming
pub const MIN_LOCATION_LEN: usize = 2;
pub const MAX_LOCATION_LEN: usize = 200;

/// Reservation notes
pub const MAX_NOTE_LEN: usize = 500;

pub const MAX_PARTY_SIZE: i64 = 50;

/// Pagination
pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 200;

// ── Helpers ─────────────────────────────────────────────────────────

/// Validate that an optional string, if present, is within the length limit.
pub fn validate_optional_text(
    value: &Option<String>,
    field: &str,
    max_len: usize,
) -> Result<(), AppError> {
    if let Some(v) = value
        && v.chars().count() > max_len
    {
        return Err(AppError::validation(format!(
            "{field} is too long ({} chars, max {max_len})",
            v.chars().count()
        ))
        .with_detail("field", field));
    }
    Ok(())
}

/// Validate an integer range, inclusive on both ends.
pub fn validate_range(value: i64, field: &str, min: i64, max: i64) -> Result<(), AppError> {
    if value < min || value > max {
        return Err(AppError::with_message(
            ErrorCode::ValueOutOfRange,
            format!("{field} must be between {min} and {max}"),
        )
        .with_detail("field", field)
        .with_detail("value", value));
    }
    Ok(())
}

/// Latitude/longitude, when present, must be finite and on the globe.
pub fn validate_coordinates(latitude: Option<f64>, longitude: Option<f64>) -> Result<(), AppError> {
    if let Some(lat) = latitude
        && !(lat.is_finite() && (-90.0..=90.0).contains(&lat))
    {
        return Err(AppError::validation("latitude must be within [-90, 90]")
            .with_detail("field", "latitude"));
    }
    if let Some(lng) = longitude
        && !(lng.is_finite() && (-180.0..=180.0).contains(&lng))
    {
        return Err(AppError::validation("longitude must be within [-180, 180]")
            .with_detail("field", "longitude"));
    }
    Ok(())
}

/// Clamp client pagination into `(limit, offset)`.
pub fn page(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = offset.unwrap_or(0).max(0);
    (limit, offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_reports_field() {
        let err = validate_range(101, "items[0].quantity", MIN_QUANTITY, MAX_QUANTITY).unwrap_err();
        assert_eq!(err.code, ErrorCode::ValueOutOfRange);
        assert_eq!(
            err.details.unwrap().get("field").unwrap(),
            "items[0].quantity"
        );
        assert!(validate_range(1, "q", MIN_QUANTITY, MAX_QUANTITY).is_ok());
    }

    #[test]
    fn coordinates_reject_nan_and_out_of_range() {
        assert!(validate_coordinates(Some(f64::NAN), None).is_err());
        assert!(validate_coordinates(Some(91.0), None).is_err());
        assert!(validate_coordinates(None, Some(-181.0)).is_err());
        assert!(validate_coordinates(Some(40.4), Some(-3.7)).is_ok());
        assert!(validate_coordinates(None, None).is_ok());
    }

    #[test]
    fn pagination_is_clamped() {
        assert_eq!(page(None, None), (DEFAULT_PAGE_SIZE, 0));
        assert_eq!(page(Some(10_000), Some(-5)), (MAX_PAGE_SIZE, 0));
        assert_eq!(page(Some(0), Some(20)), (1, 20));
    }

    #[test]
    fn optional_text_counts_chars() {
        let note = Some("ñ".repeat(MAX_NOTE_LEN));
        assert!(validate_optional_text(&note, "note", MAX_NOTE_LEN).is_ok());
        let long = Some("x".repeat(MAX_NOTE_LEN + 1));
        assert!(validate_optional_text(&long, "note", MAX_NOTE_LEN).is_err());
    }
}
