//! Position sizing from account risk

use crate::error::SizingError;

/// Converts a stop distance and risk budget into a contract count
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionSizer {
    /// % of equity risked per trade; 0 selects the fixed lot size
    pub risk_percent: f64,
    pub fixed_lot_size: u32,
    pub tick_size: f64,
    pub point_value: f64,
}

impl PositionSizer {
    pub fn uses_risk(&self) -> bool {
        self.risk_percent > 0.0
    }

    /// Contracts to trade for a stop `stop_distance` price units away
    ///
    /// ```text
    /// risk_amount = equity * risk_percent / 100
    /// quantity    = floor(risk_amount / (stop_ticks * point_value)), min 1
    /// ```
    pub fn size(&self, stop_distance: f64, account_equity: f64) -> Result<u32, SizingError> {
        if !(stop_distance.is_finite() && stop_distance > 0.0) {
            return Err(SizingError::NonPositiveStopDistance(stop_distance));
        }
        if !self.uses_risk() {
            return Ok(self.fixed_lot_size);
        }

        let risk_amount = account_equity * self.risk_percent / 100.0;
        let stop_ticks = stop_distance / self.tick_size;
        let raw = (risk_amount / (stop_ticks * self.point_value)).floor();

        // Saturating float->int cast; negative equity lands on the 1-lot floor
        Ok((raw as u32).max(1))
    }
}
