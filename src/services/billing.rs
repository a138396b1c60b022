use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::config::BillingSettings;
use crate::errors::ServiceError;

/// The mutually exclusive adjustment applied over the billing subtotal.
///
/// Exactly one regime applies per bill. The contribution surcharge rate is
/// configured; the subsidy rate comes from the caller (it depends on the
/// customer's socioeconomic stratum, which this core does not model).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingRegime {
    Neutral,
    Subsidy { rate: Decimal },
    Contribution,
}

impl BillingRegime {
    /// Resolves the regime from the raw orchestrator variables. When both a
    /// contribution flag and a positive subsidy rate are supplied, the
    /// contribution wins; a missing or non-positive subsidy rate falls back
    /// to the neutral regime rather than erroring.
    pub fn resolve(subsidy_rate: Option<Decimal>, contribution: bool) -> Self {
        if contribution {
            return BillingRegime::Contribution;
        }
        match subsidy_rate {
            Some(rate) if rate > Decimal::ZERO => BillingRegime::Subsidy { rate },
            _ => BillingRegime::Neutral,
        }
    }
}

/// Full breakdown of one bill computation. Intermediate values keep full
/// precision; only `total` is rounded, to 2 decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillStatement {
    /// Metered differential in volumetric units (m3). May be negative when
    /// the meter was corrected downward; the value passes through unchanged.
    pub consumption: i64,
    /// Consumption converted to energy (kWh)
    pub energy: Decimal,
    pub subtotal: Decimal,
    pub subsidy_amount: Decimal,
    pub contribution_amount: Decimal,
    pub total: Decimal,
}

/// Stateless converter from a meter differential to a payable total.
/// Tariff constants are injected through [`BillingSettings`].
#[derive(Debug, Clone)]
pub struct BillingCalculator {
    settings: BillingSettings,
}

impl BillingCalculator {
    pub fn new(settings: BillingSettings) -> Self {
        Self { settings }
    }

    /// Computes a bill for the reading pair under the given regime.
    #[instrument(skip(self))]
    pub fn calculate(
        &self,
        previous_reading: i64,
        current_reading: i64,
        regime: BillingRegime,
    ) -> Result<BillStatement, ServiceError> {
        let consumption = current_reading - previous_reading;
        let energy = Decimal::from(consumption) * self.settings.conversion_factor;
        let subtotal = energy * self.settings.unit_price;

        let (subsidy_amount, contribution_amount, total) = match regime {
            BillingRegime::Contribution => {
                let contribution = subtotal * self.settings.contribution_rate;
                (Decimal::ZERO, contribution, subtotal + contribution)
            }
            BillingRegime::Subsidy { rate } => {
                if rate <= Decimal::ZERO {
                    return Err(ServiceError::InvalidInput(format!(
                        "Subsidy regime requires a positive rate, got {}",
                        rate
                    )));
                }
                let subsidy = subtotal * rate;
                (subsidy, Decimal::ZERO, subtotal - subsidy)
            }
            BillingRegime::Neutral => (Decimal::ZERO, Decimal::ZERO, subtotal),
        };

        Ok(BillStatement {
            consumption,
            energy,
            subtotal,
            subsidy_amount,
            contribution_amount,
            total: total.round_dp(2),
        })
    }
}
