//! Currency Conversion Module
//!
//! Converts amounts between currency codes through a fixed table of rates
//! relative to one base currency. The table is an immutable value handed in
//! at construction, so the converter is `Send + Sync` and needs no locking.
//!
//! ## Conversion Path
//! ```text
//! amount(from) ──÷ rate(from)──▶ amount(base) ──× rate(to)──▶ amount(to) ──round(2)──▶
//! ```
//! Identical codes short-circuit and return the amount untouched (no rounding).
//! Everything else is rounded to 2 decimal places, half away from zero.
//!
//! ## Usage
//! ```rust
//! use ledger_engine::currency::CurrencyConverter;
//! use rust_decimal::Decimal;
//!
//! let converter = CurrencyConverter::with_default_rates();
//! let eur = converter.convert("USD", "EUR", Decimal::new(1000, 2)).unwrap();
//! assert_eq!(eur, Decimal::new(1100, 2)); // 10.00 USD = 11.00 EUR
//! ```

use std::collections::HashMap;

use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

use crate::config::CurrencyConfig;

/// Decimal places every converted amount is rounded to
pub const CONVERSION_SCALE: u32 = 2;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CurrencyError {
    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(String),

    #[error("Invalid rate for {currency}: {rate} (must be positive)")]
    InvalidRate { currency: String, rate: Decimal },

    #[error("Base currency {0} must have rate 1")]
    InvalidBase(String),

    #[error("Conversion overflow: {amount} {from} -> {to}")]
    Overflow {
        from: String,
        to: String,
        amount: Decimal,
    },
}

// ============================================================================
// Converter
// ============================================================================

/// Fixed-rate currency converter
#[derive(Debug, Clone)]
pub struct CurrencyConverter {
    base: String,
    rates: HashMap<String, Decimal>,
}

impl CurrencyConverter {
    /// Build a converter from a rate table.
    ///
    /// # Errors
    /// * `InvalidRate` - any rate is zero or negative
    /// * `InvalidBase` - the base currency is missing or its rate is not 1
    pub fn new(config: &CurrencyConfig) -> Result<Self, CurrencyError> {
        for (currency, rate) in &config.rates {
            if *rate <= Decimal::ZERO {
                return Err(CurrencyError::InvalidRate {
                    currency: currency.clone(),
                    rate: *rate,
                });
            }
        }

        match config.rates.get(&config.base) {
            Some(rate) if *rate == Decimal::ONE => {}
            _ => return Err(CurrencyError::InvalidBase(config.base.clone())),
        }

        Ok(Self {
            base: config.base.clone(),
            rates: config
                .rates
                .iter()
                .map(|(code, rate)| (code.clone(), *rate))
                .collect(),
        })
    }

    /// USD-based table: EUR 1.1, CAD 1.35, XAF 607.29
    pub fn with_default_rates() -> Self {
        let config = CurrencyConfig::default();
        Self {
            base: config.base,
            rates: config.rates.into_iter().collect(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn is_supported(&self, currency: &str) -> bool {
        self.rates.contains_key(currency)
    }

    /// Rate of `currency` relative to the base currency
    pub fn rate(&self, currency: &str) -> Result<Decimal, CurrencyError> {
        self.rates
            .get(currency)
            .copied()
            .ok_or_else(|| CurrencyError::UnsupportedCurrency(currency.to_string()))
    }

    /// Supported currency codes, sorted
    pub fn currencies(&self) -> Vec<&str> {
        let mut codes: Vec<&str> = self.rates.keys().map(String::as_str).collect();
        codes.sort_unstable();
        codes
    }

    /// Convert `amount` from one currency to another.
    ///
    /// Both codes are checked before the identity short-circuit, so
    /// `convert("XYZ", "XYZ", ..)` still fails for an unknown code.
    pub fn convert(&self, from: &str, to: &str, amount: Decimal) -> Result<Decimal, CurrencyError> {
        let from_rate = self.rate(from)?;
        let to_rate = self.rate(to)?;

        if from == to {
            return Ok(amount);
        }

        let overflow = || CurrencyError::Overflow {
            from: from.to_string(),
            to: to.to_string(),
            amount,
        };

        let base_amount = amount.checked_div(from_rate).ok_or_else(overflow)?;
        let converted = base_amount.checked_mul(to_rate).ok_or_else(overflow)?;

        Ok(converted.round_dp_with_strategy(CONVERSION_SCALE, RoundingStrategy::MidpointAwayFromZero))
    }
}

impl Default for CurrencyConverter {
    fn default() -> Self {
        Self::with_default_rates()
    }
}
