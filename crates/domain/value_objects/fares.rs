pub const REFUND_RATE: f64 = 0.75;

/// Fares are shown and charged in whole currency units.
pub fn round_up_fare(fare: f64) -> f64 {
    fare.ceil()
}

pub fn refund_amount(fare: f64) -> f64 {
    fare * REFUND_RATE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_partial_units_up() {
        assert_eq!(round_up_fare(12.01), 13.0);
        assert_eq!(round_up_fare(20.0), 20.0);
    }

    #[test]
    fn refunds_three_quarters() {
        assert_eq!(refund_amount(40.0), 30.0);
    }
}
