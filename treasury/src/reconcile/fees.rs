//! Platform fee models
//!
//! Each payout platform takes a percentage cut plus a small fixed
//! deduction before wiring funds. The tolerance band around the modeled
//! amount is asymmetric: payouts occasionally arrive at the full base
//! amount, so the upper bound is 100 % of base while the lower bound
//! sits a few points under the modeled percentage. The constants were
//! tuned against observed payouts and are part of the matching contract.

use rust_decimal::Decimal;

/// Known payout platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// Topstep funded-trader payouts
    Topstep,
    /// MFFU funded-trader payouts
    Mffu,
    /// Tradeify funded-trader payouts
    Tradeify,
    /// Anything not recognized; conservative default model
    Unknown,
}

impl Platform {
    /// Parse a free-form platform name from the ledger.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "topstep" => Platform::Topstep,
            "mffu" => Platform::Mffu,
            "tradeify" => Platform::Tradeify,
            _ => Platform::Unknown,
        }
    }

    /// Fee model for this platform.
    pub fn fee_model(&self) -> FeeModel {
        match self {
            Platform::Topstep => FeeModel {
                percentage: Decimal::new(90, 2),
                flat_fee: Decimal::from(20),
                downside_tolerance: Decimal::new(5, 2),
            },
            Platform::Mffu => FeeModel {
                percentage: Decimal::new(85, 2),
                flat_fee: Decimal::from(10),
                downside_tolerance: Decimal::new(5, 2),
            },
            Platform::Tradeify => FeeModel {
                percentage: Decimal::new(90, 2),
                flat_fee: Decimal::ZERO,
                downside_tolerance: Decimal::new(5, 2),
            },
            Platform::Unknown => FeeModel {
                percentage: Decimal::new(95, 2),
                flat_fee: Decimal::ZERO,
                downside_tolerance: Decimal::new(5, 2),
            },
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::Topstep => write!(f, "Topstep"),
            Platform::Mffu => write!(f, "MFFU"),
            Platform::Tradeify => write!(f, "Tradeify"),
            Platform::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Payout percentage plus fixed deduction for one platform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeeModel {
    /// Fraction of base paid out (0.90 = 90 %)
    pub percentage: Decimal,
    /// Fixed deduction taken on top of the percentage
    pub flat_fee: Decimal,
    /// How far under the modeled percentage an arrival may land
    pub downside_tolerance: Decimal,
}

/// Expected arrival band for one base amount.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PayoutRange {
    /// Modeled arrival amount
    pub expected: Decimal,
    /// Lowest plausible arrival, floored at zero
    pub min: Decimal,
    /// Highest plausible arrival: the full base amount
    pub max: Decimal,
}

impl FeeModel {
    /// Expected arrival band for a base payout amount.
    pub fn payout_range(&self, base: Decimal) -> PayoutRange {
        let expected = base * self.percentage - self.flat_fee;
        let min =
            (base * (self.percentage - self.downside_tolerance) - self.flat_fee).max(Decimal::ZERO);
        PayoutRange {
            expected,
            min,
            max: base,
        }
    }
}

impl PayoutRange {
    /// Whether an observed arrival falls inside the band.
    pub fn contains(&self, observed: Decimal) -> bool {
        observed >= self.min && observed <= self.max
    }
}
