//! Rule evaluation against the current aggregates

use wattwatch_api::{Aggregates, Breach, Metric, Rule, RuleFields, RuleProgress, Tariff};

/// The rule's measured value: kWh for energy rules, kWh x rate for cost rules
pub fn actual_value(fields: &RuleFields, aggregates: &Aggregates, tariff: &Tariff) -> f64 {
    let wh = aggregates.for_period(fields.period).get(fields.target);
    let kwh = wh / 1000.0;
    match fields.metric {
        Metric::Energy => kwh,
        Metric::Cost => kwh * tariff.rate,
        Metric::Eco => 0.0,
    }
}

/// Every rule whose actual value is strictly above its limit, in rule order.
///
/// Cost rules are skipped in solar mode since there is no grid cost to budget.
pub fn evaluate(
    rules: &[Rule],
    aggregates: &Aggregates,
    tariff: &Tariff,
    solar_mode: bool,
) -> Vec<Breach> {
    rules
        .iter()
        .filter(|rule| rule.fields.metric.is_rule_metric())
        .filter(|rule| !(solar_mode && rule.fields.metric == Metric::Cost))
        .filter_map(|rule| {
            let actual = actual_value(&rule.fields, aggregates, tariff);
            (actual > rule.fields.limit).then(|| Breach::from_rule(rule, actual))
        })
        .collect()
}

/// How full a rule's budget is, capped at 100 percent
pub fn rule_progress(rule: &Rule, aggregates: &Aggregates, tariff: &Tariff) -> RuleProgress {
    let actual = actual_value(&rule.fields, aggregates, tariff);
    let ratio = actual / rule.fields.limit * 100.0;
    // f64::min would turn NaN into 100
    let percent = if ratio.is_finite() { ratio.min(100.0) } else { 0.0 };

    RuleProgress {
        rule_id: rule.id.clone(),
        actual,
        limit: rule.fields.limit,
        percent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wattwatch_api::{Period, PeriodAggregate, Target};

    fn rule(target: Target, period: Period, metric: Metric, limit: f64) -> Rule {
        Rule::new(RuleFields {
            target,
            period,
            metric,
            limit,
        })
    }

    fn month_total(wh: f64) -> Aggregates {
        Aggregates {
            month: PeriodAggregate {
                load1: wh,
                load2: 0.0,
                load3: 0.0,
                total: wh,
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_monthly_energy_breach() {
        let rules = vec![rule(Target::Total, Period::Month, Metric::Energy, 50.0)];
        let breaches = evaluate(&rules, &month_total(60_000.0), &Tariff::default(), false);

        assert_eq!(breaches.len(), 1);
        assert_eq!(breaches[0].actual, 60.0);
        assert_eq!(breaches[0].rule_id.as_ref(), Some(&rules[0].id));
        assert_eq!(breaches[0].limit, Some(50.0));
    }

    #[test]
    fn test_limit_is_strict() {
        let rules = vec![rule(Target::Total, Period::Month, Metric::Energy, 60.0)];
        assert!(evaluate(&rules, &month_total(60_000.0), &Tariff::default(), false).is_empty());
    }

    #[test]
    fn test_cost_rule_uses_rate() {
        let tariff = Tariff {
            rate: 5.0,
            ..Tariff::default()
        };
        let rules = vec![rule(Target::Load1, Period::Month, Metric::Cost, 100.0)];

        let breaches = evaluate(&rules, &month_total(25_000.0), &tariff, false);
        assert_eq!(breaches.len(), 1);
        assert_eq!(breaches[0].actual, 125.0);
    }

    #[test]
    fn test_cost_rules_suppressed_in_solar_mode() {
        let rules = vec![
            rule(Target::Total, Period::Month, Metric::Cost, 0.01),
            rule(Target::Load1, Period::Month, Metric::Cost, 0.01),
        ];
        let breaches = evaluate(&rules, &month_total(1_000_000.0), &Tariff::default(), true);
        assert!(breaches.is_empty());
    }

    #[test]
    fn test_energy_rules_still_fire_in_solar_mode() {
        let rules = vec![rule(Target::Total, Period::Month, Metric::Energy, 1.0)];
        let breaches = evaluate(&rules, &month_total(2_000.0), &Tariff::default(), true);
        assert_eq!(breaches.len(), 1);
    }

    #[test]
    fn test_period_and_target_lookup() {
        let aggregates = Aggregates {
            today: PeriodAggregate {
                load1: 0.0,
                load2: 3_000.0,
                load3: 0.0,
                total: 3_000.0,
            },
            ..Default::default()
        };
        let rules = vec![
            rule(Target::Load2, Period::Today, Metric::Energy, 2.0),
            rule(Target::Load2, Period::Month, Metric::Energy, 2.0),
            rule(Target::Load1, Period::Today, Metric::Energy, 2.0),
        ];

        let breaches = evaluate(&rules, &aggregates, &Tariff::default(), false);
        assert_eq!(breaches.len(), 1);
        assert_eq!(breaches[0].target, Target::Load2);
        assert_eq!(breaches[0].period, Period::Today);
    }

    #[test]
    fn test_progress_caps_and_coerces() {
        let r = rule(Target::Total, Period::Month, Metric::Energy, 40.0);

        let half = rule_progress(&r, &month_total(20_000.0), &Tariff::default());
        assert_eq!(half.percent, 50.0);

        let over = rule_progress(&r, &month_total(90_000.0), &Tariff::default());
        assert_eq!(over.percent, 100.0);
        assert_eq!(over.actual, 90.0);

        // A zero limit cannot be created, but persisted data might carry one
        let mut broken = r.clone();
        broken.fields.limit = 0.0;
        let zero = rule_progress(&broken, &Aggregates::default(), &Tariff::default());
        assert_eq!(zero.percent, 0.0);
    }
}
