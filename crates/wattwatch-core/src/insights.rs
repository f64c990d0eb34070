//! Short usage advice derived from the current aggregates
//!
//! Every applicable insight is generated, shuffled with the caller's random
//! source, and at most [`MAX_INSIGHTS`] are kept. Passing a seeded RNG makes
//! the selection reproducible.

use chrono::{DateTime, Datelike, Local, Timelike};
use rand::Rng;
use rand::seq::SliceRandom;
use wattwatch_api::{Aggregates, Insight, InsightKind, Target, Tariff};
use wattwatch_util::days_in_month;

pub const MAX_INSIGHTS: usize = 3;

/// Share of the month above which a single load is called out
const HEAVY_LIFTER_PERCENT: f64 = 35.0;

/// Suggested reduction on the heaviest load
const REDUCTION_SHARE: f64 = 0.15;

/// Minimum saving worth suggesting, in kWh
const MIN_SAVING_KWH: f64 = 0.1;

/// Days of history needed before projecting the month
const PROJECTION_MIN_DAY: u32 = 5;

/// Everything the generator reads, bundled so the call site stays short
#[derive(Debug, Clone, Copy)]
pub struct InsightContext<'a> {
    pub aggregates: &'a Aggregates,
    pub tariff: &'a Tariff,
    pub solar_mode: bool,
    pub now: DateTime<Local>,
}

/// Generate, shuffle and truncate insights. Empty while nothing has been
/// consumed this month.
pub fn generate_insights<R: Rng + ?Sized>(ctx: &InsightContext<'_>, rng: &mut R) -> Vec<Insight> {
    let mut insights = candidate_insights(ctx);
    insights.shuffle(rng);
    insights.truncate(MAX_INSIGHTS);
    insights
}

/// Every insight that applies, in a fixed order
pub fn candidate_insights(ctx: &InsightContext<'_>) -> Vec<Insight> {
    let month = &ctx.aggregates.month;
    if month.total <= 0.0 {
        return Vec::new();
    }

    let tariff = ctx.tariff;
    let total_kwh = month.total / 1000.0;
    let today_kwh = ctx.aggregates.today.total / 1000.0;
    let yesterday_kwh = ctx.aggregates.yesterday.total / 1000.0;

    let day = ctx.now.day().max(1);
    let hour = ctx.now.hour();
    let month_days = days_in_month(ctx.now.date_naive());
    let projected_daily_kwh = total_kwh / f64::from(day);
    let projected_month_kwh = projected_daily_kwh * f64::from(month_days);

    let mut out = Vec::new();
    let mut push = |kind, message: String| out.push(Insight { kind, message });

    if let Some((heaviest, max_wh)) = heaviest_load(ctx.aggregates) {
        let name = heaviest.display_name();

        let percent = max_wh / month.total * 100.0;
        if percent > HEAVY_LIFTER_PERCENT {
            push(
                InsightKind::HeavyLifter,
                format!(
                    "🔥 The {name} is your heavy lifter, drawing {percent:.1}% of your total energy this month."
                ),
            );
        }

        let saving_kwh = max_wh / 1000.0 * REDUCTION_SHARE;
        if saving_kwh > MIN_SAVING_KWH {
            let message = if ctx.solar_mode {
                format!(
                    "💡 Lowering your {name} usage by 15% this month will conserve {saving_kwh:.1} kWh of stored battery power."
                )
            } else {
                format!(
                    "💡 Reducing your {name} usage by 15% this month can realistically save you ₹{:.1}.",
                    saving_kwh * tariff.rate
                )
            };
            push(InsightKind::Savings, message);
        }
    }

    if total_kwh > 85.0 && total_kwh < 100.0 {
        push(
            InsightKind::SlabProximity,
            format!(
                "⚠️ Careful! You are only {:.1} units away from entering a higher billing tier (over 100 units).",
                100.0 - total_kwh
            ),
        );
    } else if total_kwh > 280.0 && total_kwh < 300.0 {
        push(
            InsightKind::SlabProximity,
            format!(
                "⚠️ Alert! You are only {:.1} units away from the most expensive billing tier (over 300 units).",
                300.0 - total_kwh
            ),
        );
    }

    if hour < 9 && today_kwh > 0.0 && today_kwh > projected_daily_kwh * 0.25 {
        push(
            InsightKind::VampireDrain,
            "🧛 Your overnight background energy seems exceptionally high today. Consider turning off devices left on standby.".to_string(),
        );
    }

    if tariff.solar > 0.0 {
        let message = if ctx.solar_mode {
            "☀️ Outstanding! Your system is running predominantly on green energy, massively minimizing reliance on the utility grid.".to_string()
        } else {
            let saved = total_kwh * tariff.solar / 100.0 * tariff.rate;
            format!(
                "☀️ Great job! Your solar contribution has effectively saved you ₹{saved:.0} off your grid bill this month."
            )
        };
        push(InsightKind::Solar, message);
    }

    if day >= PROJECTION_MIN_DAY {
        let message = if ctx.solar_mode {
            format!(
                "📅 Based on your current habits, your estimated energy usage for this month will land around {projected_month_kwh:.1} kWh."
            )
        } else {
            let bill = projected_month_kwh * tariff.rate + tariff.fixed;
            format!("📅 At your current usage rate, your estimated bill for this month will be ₹{bill:.0}.")
        };
        push(InsightKind::Projection, message);
    } else {
        push(
            InsightKind::BuildingProfile,
            "📈 Building your usage profile... Keep utilizing the system over the next few days to unlock an accurate monthly bill projection.".to_string(),
        );
    }

    if today_kwh > 0.0 && today_kwh < projected_daily_kwh * 0.5 && hour > 14 {
        push(
            InsightKind::LowUse,
            "🌱 Incredible! You are operating at less than 50% of your daily average energy footprint today.".to_string(),
        );
    }

    if hour >= 20 && yesterday_kwh > 0.0 && today_kwh < yesterday_kwh * 0.9 {
        let less = (yesterday_kwh - today_kwh) / yesterday_kwh * 100.0;
        push(
            InsightKind::EfficiencyWin,
            format!("🎉 Excellent! You have consumed {less:.0}% less energy today compared to yesterday."),
        );
    }

    out
}

/// The load with the largest month total, earliest load on ties
fn heaviest_load(aggregates: &Aggregates) -> Option<(Target, f64)> {
    let month = &aggregates.month;
    [Target::Load1, Target::Load2, Target::Load3]
        .into_iter()
        .map(|t| (t, month.get(t)))
        .fold(None, |best: Option<(Target, f64)>, (t, wh)| match best {
            Some((_, best_wh)) if best_wh >= wh => best,
            _ => Some((t, wh)),
        })
        .filter(|(_, wh)| *wh > 0.0)
}
