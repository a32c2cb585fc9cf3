//! Presentation order for enriched alerts.

use std::cmp::Ordering;

use crate::model::EnrichedAlert;

/// Red before yellow before green before anything else, then larger monthly
/// impact first.
#[must_use]
pub fn compare(a: &EnrichedAlert, b: &EnrichedAlert) -> Ordering {
    a.level
        .precedence()
        .cmp(&b.level.precedence())
        .then_with(|| b.impact_monthly.total_cmp(&a.impact_monthly))
}

/// Sort alerts in place. Ties keep their input order.
pub fn rank(alerts: &mut [EnrichedAlert]) {
    alerts.sort_by(compare);
}

/// Sorted copy of `alerts`.
#[must_use]
pub fn ranked(mut alerts: Vec<EnrichedAlert>) -> Vec<EnrichedAlert> {
    rank(&mut alerts);
    alerts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Level;

    fn alert(id: &str, level: &str, impact: f64) -> EnrichedAlert {
        EnrichedAlert {
            alert_id: id.to_string(),
            level: Level::parse(level),
            impact_monthly: impact,
            ..EnrichedAlert::default()
        }
    }

    fn ids(alerts: &[EnrichedAlert]) -> Vec<&str> {
        alerts.iter().map(|a| a.alert_id.as_str()).collect()
    }

    #[test]
    fn test_levels_with_equal_impact() {
        let sorted = ranked(vec![
            alert("g", "green", 100.0),
            alert("r", "red", 100.0),
            alert("y", "yellow", 100.0),
        ]);
        assert_eq!(ids(&sorted), vec!["r", "y", "g"]);
    }

    #[test]
    fn test_impact_descending_within_level_and_unknown_last() {
        let sorted = ranked(vec![
            alert("y-small", "yellow", 40.0),
            alert("odd", "purple", 9000.0),
            alert("r-small", "red", 0.0),
            alert("y-big", "YELLOW", 400.0),
            alert("r-big", "red", 1680.0),
        ]);
        assert_eq!(ids(&sorted), vec!["r-big", "r-small", "y-big", "y-small", "odd"]);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let sorted = ranked(vec![
            alert("first", "red", 10.0),
            alert("second", "red", 10.0),
            alert("third", "red", 10.0),
        ]);
        assert_eq!(ids(&sorted), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_no_lower_level_precedes_red() {
        let sorted = ranked(vec![
            alert("a", "green", 5000.0),
            alert("b", "red", 1.0),
            alert("c", "yellow", 3000.0),
            alert("d", "red", 2.0),
        ]);
        let first_non_red = sorted
            .iter()
            .position(|a| a.level != Level::Red)
            .unwrap();
        assert!(sorted[first_non_red..].iter().all(|a| a.level != Level::Red));
        for pair in sorted.windows(2) {
            if pair[0].level == pair[1].level {
                assert!(pair[0].impact_monthly >= pair[1].impact_monthly);
            }
        }
    }
}
