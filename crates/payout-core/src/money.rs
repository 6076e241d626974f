//! # Money Module
//!
//! Provides the `Money` and `Currency` types for settlement arithmetic.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  A payout recomputed for audit must match the original to the cent.    │
//! │                                                                         │
//! │  OUR SOLUTION: Integer minor units + currency code                     │
//! │    15% of 100.00 EUR = 10000 × 1500 / 10000 = 1500 minor units         │
//! │    Rounded half-to-even ONCE per operation, never chained              │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use payout_core::money::{Currency, Money};
//! use payout_core::types::Percentage;
//!
//! let gross = Money::new(10_000, Currency::EUR); // 100.00 EUR
//! let base = gross.apply_percentage(Percentage::from_percent(15)).unwrap();
//! assert_eq!(base.minor_units(), 1_500);
//!
//! let net = gross.checked_sub(base).unwrap();
//! assert_eq!(net.to_string(), "85.00 EUR");
//! ```

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, CoreResult};
use crate::types::Percentage;

/// Basis points in one whole (100% = 10_000 bps).
const BPS_SCALE: i128 = 10_000;

// =============================================================================
// Currency
// =============================================================================

/// Three-letter currency code (ISO 4217 shape), stored uppercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency([u8; 3]);

impl Currency {
    /// Euro.
    pub const EUR: Currency = Currency(*b"EUR");
    /// US dollar.
    pub const USD: Currency = Currency(*b"USD");

    /// Parses a currency code, accepting lowercase input.
    ///
    /// ## Example
    /// ```rust
    /// use payout_core::money::Currency;
    ///
    /// assert_eq!(Currency::new("eur").unwrap(), Currency::EUR);
    /// assert!(Currency::new("EURO").is_err());
    /// ```
    pub fn new(code: &str) -> CoreResult<Self> {
        let bytes = code.trim().as_bytes();
        if bytes.len() != 3 || !bytes.iter().all(|b| b.is_ascii_alphabetic()) {
            return Err(CoreError::InvalidCurrency(code.to_string()));
        }
        let mut upper = [0u8; 3];
        for (slot, b) in upper.iter_mut().zip(bytes) {
            *slot = b.to_ascii_uppercase();
        }
        Ok(Currency(upper))
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        // Constructed from ASCII letters only
        std::str::from_utf8(&self.0).unwrap_or("???")
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Currency {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Currency::new(s)
    }
}

impl TryFrom<String> for Currency {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Currency::new(&value)
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.as_str().to_string()
    }
}

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value: signed count of minor units (cents) in one currency.
///
/// ## Design Decisions
/// - **i64 (signed)**: Allows negative values for penalties and reversals
/// - **Currency carried with the amount**: mixing currencies is an error,
///   not a silent conversion
/// - **No operator overloads**: every combination goes through a checked
///   method that returns `CoreResult`
///
/// ## Where Money Flows
/// ```text
/// Sale.gross_amount ──► Commission base/tax ──► LineItem.net_amount
///                                                     │
/// Adjustment.amount ──────────────────────────────────┤
///                                                     ▼
///                                   Payout gross/commission/net totals
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    minor: i64,
    currency: Currency,
}

impl Money {
    /// Creates a Money value from minor units.
    #[inline]
    pub const fn new(minor: i64, currency: Currency) -> Self {
        Money { minor, currency }
    }

    /// Creates a Money value from major and minor units (e.g. euros and cents).
    ///
    /// ## Example
    /// ```rust
    /// use payout_core::money::{Currency, Money};
    ///
    /// assert_eq!(Money::from_major_minor(82, 0, Currency::EUR).minor_units(), 8_200);
    /// assert_eq!(Money::from_major_minor(-5, 50, Currency::EUR).minor_units(), -550);
    /// ```
    ///
    /// ## Note
    /// For negative amounts, only the major unit should be negative.
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64, currency: Currency) -> Self {
        if major < 0 {
            Money::new(major * 100 - minor, currency)
        } else {
            Money::new(major * 100 + minor, currency)
        }
    }

    /// Returns zero in the given currency.
    #[inline]
    pub const fn zero(currency: Currency) -> Self {
        Money::new(0, currency)
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn minor_units(&self) -> i64 {
        self.minor
    }

    /// Returns the currency.
    #[inline]
    pub const fn currency(&self) -> Currency {
        self.currency
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.minor == 0
    }

    /// Checks if the value is negative.
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.minor < 0
    }

    /// Checks if the value is positive.
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.minor > 0
    }

    /// Returns the negated amount.
    pub fn negate(&self) -> CoreResult<Money> {
        self.minor
            .checked_neg()
            .map(|minor| Money::new(minor, self.currency))
            .ok_or(CoreError::AmountOverflow)
    }

    fn ensure_same_currency(&self, other: &Money) -> CoreResult<()> {
        if self.currency != other.currency {
            return Err(CoreError::CurrencyMismatch {
                left: self.currency,
                right: other.currency,
            });
        }
        Ok(())
    }

    /// Adds two amounts of the same currency.
    pub fn checked_add(&self, other: Money) -> CoreResult<Money> {
        self.ensure_same_currency(&other)?;
        self.minor
            .checked_add(other.minor)
            .map(|minor| Money::new(minor, self.currency))
            .ok_or(CoreError::AmountOverflow)
    }

    /// Subtracts `other` from `self`; both must share a currency.
    pub fn checked_sub(&self, other: Money) -> CoreResult<Money> {
        self.ensure_same_currency(&other)?;
        self.minor
            .checked_sub(other.minor)
            .map(|minor| Money::new(minor, self.currency))
            .ok_or(CoreError::AmountOverflow)
    }

    /// Compares two amounts of the same currency.
    pub fn checked_cmp(&self, other: &Money) -> CoreResult<Ordering> {
        self.ensure_same_currency(other)?;
        Ok(self.minor.cmp(&other.minor))
    }

    /// Multiplies by a percentage, rounding half-to-even at the minor unit.
    ///
    /// ## Bankers Rounding
    /// ```text
    /// ┌─────────────────────────────────────────────────────────────────────┐
    /// │  Round half to even:                                                │
    /// │    82.5 → 82,  83.5 → 84,  -82.5 → -82                             │
    /// │                                                                     │
    /// │  Applied exactly once per call. Callers that need base and tax     │
    /// │  round each independently (tax = round(round(base) × rate)).      │
    /// └─────────────────────────────────────────────────────────────────────┘
    /// ```
    ///
    /// ## Example
    /// ```rust
    /// use payout_core::money::{Currency, Money};
    /// use payout_core::types::Percentage;
    ///
    /// let amount = Money::new(1_000, Currency::EUR);
    /// // 10.00 × 8.25% = 0.825 → 0.82 (half to even)
    /// let tax = amount.apply_percentage(Percentage::from_bps(825)).unwrap();
    /// assert_eq!(tax.minor_units(), 82);
    /// ```
    pub fn apply_percentage(&self, rate: Percentage) -> CoreResult<Money> {
        // i128 keeps the intermediate product exact for any i64 amount
        let numerator = self.minor as i128 * rate.bps() as i128;
        let quotient = numerator / BPS_SCALE;
        let remainder = numerator % BPS_SCALE;

        let twice_remainder = remainder.abs() * 2;
        let rounded = if twice_remainder > BPS_SCALE
            || (twice_remainder == BPS_SCALE && quotient % 2 != 0)
        {
            quotient + numerator.signum()
        } else {
            quotient
        };

        i64::try_from(rounded)
            .map(|minor| Money::new(minor, self.currency))
            .map_err(|_| CoreError::AmountOverflow)
    }

    /// Sums amounts, all of which must be in `currency`.
    ///
    /// An empty iterator yields zero in `currency`.
    pub fn sum<I>(currency: Currency, amounts: I) -> CoreResult<Money>
    where
        I: IntoIterator<Item = Money>,
    {
        amounts
            .into_iter()
            .try_fold(Money::zero(currency), |acc, amount| acc.checked_add(amount))
    }

    /// Formats the amount as a plain decimal string ("82.00", "-5.00").
    ///
    /// Used for CSV export; assumes two minor-unit digits.
    pub fn to_decimal_string(&self) -> String {
        let sign = if self.minor < 0 { "-" } else { "" };
        let abs = self.minor.unsigned_abs();
        format!("{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

/// Display shows the decimal amount followed by the currency code.
///
/// ## Note
/// This is for logs and debugging. Presentation formatting is a
/// collaborator concern.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.to_decimal_string(), self.currency)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
