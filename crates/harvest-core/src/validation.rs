//! Checks on user-supplied page ranges, applied before a run starts.

use crate::error::ValidationError;

/// Validate an offset/limit pair against a document's page count.
///
/// The core page loop clamps silently; front ends call this first so the
/// user sees why a range selects nothing.
pub fn validate_page_range(
    offset: usize,
    limit: Option<usize>,
    total_pages: usize,
) -> Result<(usize, Option<usize>), ValidationError> {
    if total_pages == 0 {
        return Err(ValidationError::NoPages);
    }
    if limit == Some(0) {
        return Err(ValidationError::InvalidLimit);
    }
    if offset >= total_pages {
        return Err(ValidationError::OffsetOutOfRange);
    }
    Ok((offset, limit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_valid_ranges() {
        assert_eq!(validate_page_range(0, None, 3), Ok((0, None)));
        assert_eq!(validate_page_range(2, Some(1), 3), Ok((2, Some(1))));
        // limits past the end are clamped later, not rejected
        assert_eq!(validate_page_range(1, Some(50), 3), Ok((1, Some(50))));
    }

    #[test]
    fn test_invalid_ranges() {
        assert_eq!(validate_page_range(0, None, 0), Err(ValidationError::NoPages));
        assert_eq!(validate_page_range(0, Some(0), 3), Err(ValidationError::InvalidLimit));
        assert_eq!(validate_page_range(3, None, 3), Err(ValidationError::OffsetOutOfRange));
    }

    #[test]
    fn test_messages() {
        assert_eq!(ValidationError::NoPages.to_string(), "PDF has no pages.");
        assert_eq!(
            ValidationError::InvalidLimit.to_string(),
            "Limit pages must be a positive integer."
        );
        assert_eq!(
            ValidationError::OffsetOutOfRange.to_string(),
            "Page offset is beyond the total number of pages."
        );
    }
}
