use crate::types::{BestRecord, PriceObservation};

#[derive(Debug, Clone, PartialEq)]
pub struct AlertDecision {
    pub should_alert: bool,
    /// Record to persist as the all-time best after this run.
    pub new_best: Option<BestRecord>,
}

/// First observation with the lowest price. Observations without a price are ignored.
pub fn cheapest(observations: &[PriceObservation]) -> Option<BestRecord> {
    observations
        .iter()
        .filter_map(BestRecord::from_observation)
        .fold(None, |lowest: Option<BestRecord>, candidate| match lowest {
            Some(current) if current.price <= candidate.price => Some(current),
            _ => Some(candidate),
        })
}

/// Alerts only on a strictly lower price than the previous best, or on the
/// first price ever seen.
pub fn decide(cheapest: Option<&BestRecord>, previous: Option<&BestRecord>) -> AlertDecision {
    match (cheapest, previous) {
        (Some(current), None) => AlertDecision {
            should_alert: true,
            new_best: Some(current.clone()),
        },
        (Some(current), Some(best)) if current.price < best.price => AlertDecision {
            should_alert: true,
            new_best: Some(current.clone()),
        },
        (_, previous) => AlertDecision {
            should_alert: false,
            new_best: previous.cloned(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Vendor;
    use chrono::NaiveDate;

    fn record(price: f64) -> BestRecord {
        BestRecord {
            price,
            vendor: Vendor::Klook,
            date: NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
            url: "https://klook.example/?date=2025-09-01".to_string(),
        }
    }

    fn observation(vendor: Vendor, day: u32, price: Option<f64>) -> PriceObservation {
        PriceObservation {
            vendor,
            date: NaiveDate::from_ymd_opt(2025, 9, day).unwrap(),
            url: format!("https://{vendor}.example/?date=2025-09-{day:02}"),
            min_price: price,
        }
    }

    #[test]
    fn test_lower_price_alerts() {
        let decision = decide(Some(&record(450.0)), Some(&record(500.0)));
        assert!(decision.should_alert);
        assert_eq!(decision.new_best.map(|b| b.price), Some(450.0));
    }

    #[test]
    fn test_equal_price_does_not_alert() {
        let previous = BestRecord {
            vendor: Vendor::Tripcom,
            ..record(500.0)
        };
        let decision = decide(Some(&record(500.0)), Some(&previous));
        assert!(!decision.should_alert);
        assert_eq!(decision.new_best, Some(previous));
    }

    #[test]
    fn test_first_price_alerts() {
        let decision = decide(Some(&record(300.0)), None);
        assert!(decision.should_alert);
        assert_eq!(decision.new_best, Some(record(300.0)));
    }

    #[test]
    fn test_no_observation_carries_previous_forward() {
        let decision = decide(None, Some(&record(500.0)));
        assert!(!decision.should_alert);
        assert_eq!(decision.new_best, Some(record(500.0)));

        let decision = decide(None, None);
        assert!(!decision.should_alert);
        assert!(decision.new_best.is_none());
    }

    #[test]
    fn test_higher_price_keeps_previous() {
        let decision = decide(Some(&record(650.0)), Some(&record(500.0)));
        assert!(!decision.should_alert);
        assert_eq!(decision.new_best.map(|b| b.price), Some(500.0));
    }

    #[test]
    fn test_decide_is_idempotent() {
        let current = record(420.0);
        let previous = record(500.0);
        assert_eq!(
            decide(Some(&current), Some(&previous)),
            decide(Some(&current), Some(&previous))
        );
    }

    #[test]
    fn test_best_is_monotonic_across_runs() {
        let run_prices = [Some(620.0), Some(540.0), None, Some(700.0), Some(540.0), Some(515.5)];
        let mut best: Option<BestRecord> = None;
        let mut alerts = 0;

        for price in run_prices {
            let current = price.map(record);
            let decision = decide(current.as_ref(), best.as_ref());
            if let (Some(before), Some(after)) = (&best, &decision.new_best) {
                assert!(after.price <= before.price);
            }
            alerts += usize::from(decision.should_alert);
            best = decision.new_best;
        }

        assert_eq!(alerts, 3);
        assert_eq!(best.map(|b| b.price), Some(515.5));
    }

    #[test]
    fn test_cheapest_first_minimum_wins() {
        let observations = vec![
            observation(Vendor::Klook, 1, Some(520.0)),
            observation(Vendor::Tripcom, 1, None),
            observation(Vendor::Klook, 2, Some(475.0)),
            observation(Vendor::Tripcom, 2, Some(475.0)),
        ];

        let cheapest = cheapest(&observations).expect("Should find a price");
        assert_eq!(cheapest.price, 475.0);
        assert_eq!(cheapest.vendor, Vendor::Klook);
        assert_eq!(cheapest.date, NaiveDate::from_ymd_opt(2025, 9, 2).unwrap());
    }

    #[test]
    fn test_cheapest_of_nothing() {
        assert!(cheapest(&[]).is_none());
        assert!(cheapest(&[observation(Vendor::Klook, 1, None)]).is_none());
    }
}
