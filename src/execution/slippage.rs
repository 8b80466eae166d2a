//! Post-fill slippage detection
//!
//! Compares the realized fill price against the price quoted before the order
//! was sent. Exceeding the threshold is reported and logged; the fill itself
//! always stands.

use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::domain::{slippage_pct, SlippageReport};

#[derive(Debug, Clone, Copy)]
pub struct SlippageMonitor {
    /// Relative deviation above which a fill is flagged (0.01 = 1%)
    threshold: Decimal,
}

impl SlippageMonitor {
    pub fn new(threshold: Decimal) -> Self {
        Self {
            threshold: threshold.abs(),
        }
    }

    pub fn threshold(&self) -> Decimal {
        self.threshold
    }

    pub fn evaluate(&self, order_id: &str, expected: Decimal, filled: Decimal) -> SlippageReport {
        let pct = slippage_pct(expected, filled);
        let exceeded = pct > self.threshold;

        if exceeded {
            warn!(
                order_id,
                expected = %expected,
                filled = %filled,
                slippage_pct = %pct,
                threshold = %self.threshold,
                "fill slippage above threshold"
            );
        } else {
            debug!(order_id, slippage_pct = %pct, "fill slippage within threshold");
        }

        SlippageReport {
            expected_price: expected,
            filled_price: filled,
            slippage_pct: pct,
            exceeded,
        }
    }
}
