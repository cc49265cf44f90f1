//! Review star ratings.

use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

/// Lowest star rating a review can give.
pub const MIN_RATING: i16 = 1;
/// Highest star rating a review can give.
pub const MAX_RATING: i16 = 5;

/// A rating outside `1..=5`.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("rating must be between {MIN_RATING} and {MAX_RATING} (got {0})")]
pub struct RatingError(pub i16);

/// Check that a star rating is within `1..=5`.
///
/// # Errors
///
/// Returns `RatingError` for anything outside the range.
pub const fn validate_rating(rating: i16) -> Result<i16, RatingError> {
    if rating >= MIN_RATING && rating <= MAX_RATING {
        Ok(rating)
    } else {
        Err(RatingError(rating))
    }
}

/// Mean of the given ratings rounded to one decimal place.
///
/// Returns zero for a product with no reviews.
#[must_use]
pub fn average_rating(ratings: &[i16]) -> Decimal {
    if ratings.is_empty() {
        return Decimal::ZERO;
    }
    let sum: i64 = ratings.iter().map(|&r| i64::from(r)).sum();
    let count = Decimal::from(ratings.len());
    (Decimal::from(sum) / count).round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rating() {
        assert_eq!(validate_rating(1), Ok(1));
        assert_eq!(validate_rating(5), Ok(5));
        assert_eq!(validate_rating(0), Err(RatingError(0)));
        assert_eq!(validate_rating(6), Err(RatingError(6)));
    }

    #[test]
    fn test_average_rating() {
        assert_eq!(average_rating(&[]), Decimal::ZERO);
        assert_eq!(average_rating(&[5, 4]), Decimal::new(45, 1));
        // 13 / 3 = 4.333.. -> 4.3
        assert_eq!(average_rating(&[5, 4, 4]), Decimal::new(43, 1));
        // 14 / 3 = 4.666.. -> 4.7
        assert_eq!(average_rating(&[5, 5, 4]), Decimal::new(47, 1));
    }
}
