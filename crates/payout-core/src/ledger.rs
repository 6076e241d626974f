//! # Booking Ledger Rules
//!
//! Pure helpers behind the booking ledger: stable sale ordering, period
//! selection and the first-purchase derivation performed at sale creation.
//!
//! ## First Purchase
//! ```text
//!   (partner, buyer) history ordered by (occurred_at, sequence)
//!
//!   s#7  2026-09-01 10:00   ◄── first (nothing earlier)
//!   s#9  2026-09-01 10:00   ◄── repeat (same instant, later sequence)
//!   s#4  2026-09-03 08:00   ◄── repeat
//! ```
//!
//! The flag is computed once and stored on the sale. Cancelling an earlier
//! sale later never flips it back.

use chrono::{DateTime, Utc};

use crate::period::Period;
use crate::types::Sale;

/// Decides `is_first_purchase_for_buyer` for a sale about to be recorded.
///
/// `history` is every already-recorded settleable sale of the same
/// `(partner, buyer)` pair. The candidate is first if none of them sorts
/// strictly before `(occurred_at, sequence)`.
pub fn is_first_purchase<'a, I>(occurred_at: DateTime<Utc>, sequence: i64, history: I) -> bool
where
    I: IntoIterator<Item = &'a Sale>,
{
    let key = (occurred_at, sequence);
    !history.into_iter().any(|earlier| earlier.ordering_key() < key)
}

/// Sorts sales into settlement order: `occurred_at`, then creation sequence.
pub fn sort_for_settlement(sales: &mut [Sale]) {
    sales.sort_by(|a, b| a.ordering_key().cmp(&b.ordering_key()).then_with(|| a.id.cmp(&b.id)));
}

/// Selects one partner's sales inside `period`, in settlement order.
///
/// Filters only on immutable fields, so the same inputs always produce the
/// same selection.
pub fn sales_in_period(sales: &[Sale], partner_id: &str, period: &Period) -> Vec<Sale> {
    let mut selected: Vec<Sale> = sales
        .iter()
        .filter(|sale| sale.partner_id == partner_id && period.contains(sale.occurred_at))
        .cloned()
        .collect();
    sort_for_settlement(&mut selected);
    selected
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::{Currency, Money};
    use crate::types::SaleEligibility;
    use chrono::TimeZone;

    fn sale(id: &str, day: u32, hour: u32, sequence: i64) -> Sale {
        Sale {
            id: id.into(),
            partner_id: "p-1".into(),
            buyer_id: "b-1".into(),
            gross_amount: Money::new(1_000, Currency::EUR),
            occurred_at: Utc.with_ymd_and_hms(2026, 9, day, hour, 0, 0).unwrap(),
            eligibility: SaleEligibility::Confirmed,
            is_first_purchase_for_buyer: false,
            sequence,
        }
    }

    #[test]
    fn test_first_purchase_with_empty_history() {
        let at = Utc.with_ymd_and_hms(2026, 9, 1, 10, 0, 0).unwrap();
        assert!(is_first_purchase(at, 1, std::iter::empty()));
    }

    #[test]
    fn test_identical_timestamps_tie_break_on_sequence() {
        let earlier = sale("s-7", 1, 10, 7);
        let at = earlier.occurred_at;
        assert!(!is_first_purchase(at, 9, [&earlier]));
        // Only strictly smaller keys disqualify
        assert!(is_first_purchase(at, 5, [&earlier]));
    }

    #[test]
    fn test_later_history_does_not_disqualify() {
        let later = sale("s-4", 3, 8, 4);
        let at = Utc.with_ymd_and_hms(2026, 9, 2, 0, 0, 0).unwrap();
        assert!(is_first_purchase(at, 10, [&later]));
    }

    #[test]
    fn test_sales_in_period_orders_and_filters() {
        let mut other_partner = sale("s-x", 2, 9, 3);
        other_partner.partner_id = "p-2".into();
        let sales = vec![
            sale("s-c", 5, 9, 5),
            sale("s-b", 1, 10, 9),
            sale("s-a", 1, 10, 7),
            other_partner,
        ];
        let period = Period::parse_month("2026-09").unwrap();
        let ids: Vec<_> = sales_in_period(&sales, "p-1", &period)
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec!["s-a", "s-b", "s-c"]);
    }
}
