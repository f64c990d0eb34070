//! Carbon grades, the A+ streak and everyday equivalencies

use chrono::NaiveDate;
use tracing::info;
use wattwatch_api::{
    Aggregates, Breach, Equivalencies, Grade, GradeState, Metric, Period, StreakState, Target,
    Tariff,
};

/// kg CO2 emitted per grid kWh
pub const GRID_EMISSION_FACTOR: f64 = 0.710;

/// Upper bounds (inclusive) for A+, A, B, C in kg CO2 per day
pub const DAILY_THRESHOLDS: [f64; 4] = [2.36, 4.7, 7.1, 11.8];

/// Upper bounds (inclusive) for A+, A, B, C in kg CO2 per month
pub const MONTHLY_THRESHOLDS: [f64; 4] = [71.0, 142.0, 213.0, 355.0];

/// Outranks every derived rule score (at most 15)
pub const ECO_ALERT_PRIORITY: u32 = 8;

const SOLAR_STATUS: &str = "Solar Powered - Zero Emissions";

/// Everything the gamification pass derives from one set of aggregates
#[derive(Debug, Clone, PartialEq)]
pub struct GradeResult {
    pub co2_today_kg: f64,
    pub co2_month_kg: f64,
    pub today: GradeState,
    pub month: GradeState,
    /// Daily grade is C or D
    pub triggered: bool,
    pub eco_alert: Option<Breach>,
}

/// Grid share of `wh` converted to kg CO2; zero in solar mode
pub fn emissions_kg(wh: f64, tariff: &Tariff, solar_mode: bool) -> f64 {
    if solar_mode {
        return 0.0;
    }
    let grid_ratio = 1.0 - tariff.solar / 100.0;
    wh / 1000.0 * grid_ratio * GRID_EMISSION_FACTOR
}

fn grade_for(kg: f64, thresholds: &[f64; 4]) -> Grade {
    const GRADES: [Grade; 4] = [Grade::APlus, Grade::A, Grade::B, Grade::C];
    GRADES
        .iter()
        .zip(thresholds)
        .find(|(_, limit)| kg <= **limit)
        .map(|(grade, _)| *grade)
        .unwrap_or(Grade::D)
}

pub fn daily_grade(kg: f64) -> Grade {
    grade_for(kg, &DAILY_THRESHOLDS)
}

pub fn monthly_grade(kg: f64) -> Grade {
    grade_for(kg, &MONTHLY_THRESHOLDS)
}

fn grade_state(grade: Grade, solar_mode: bool) -> GradeState {
    GradeState {
        grade,
        color_class: grade.color_class().to_string(),
        status: if solar_mode {
            SOLAR_STATUS.to_string()
        } else {
            grade.status_text().to_string()
        },
    }
}

/// Grade today's and this month's emissions and build the eco alert when the
/// daily grade is poor
pub fn compute_grades(aggregates: &Aggregates, tariff: &Tariff, solar_mode: bool) -> GradeResult {
    let co2_today_kg = emissions_kg(aggregates.today.total, tariff, solar_mode);
    let co2_month_kg = emissions_kg(aggregates.month.total, tariff, solar_mode);

    let (today, month) = if solar_mode {
        (Grade::APlus, Grade::APlus)
    } else {
        (daily_grade(co2_today_kg), monthly_grade(co2_month_kg))
    };

    let triggered = today.triggers_alert();
    let eco_alert = triggered.then(|| Breach {
        rule_id: None,
        target: Target::Total,
        period: Period::Month,
        metric: Metric::Eco,
        limit: None,
        actual: co2_month_kg,
        priority_score: Some(ECO_ALERT_PRIORITY),
        custom_message: Some(format!(
            "⚠️ Eco-Warning: Monthly Carbon Footprint High (Grade {today}). Optimize usage."
        )),
    });

    GradeResult {
        co2_today_kg,
        co2_month_kg,
        today: grade_state(today, solar_mode),
        month: grade_state(month, solar_mode),
        triggered,
        eco_alert,
    }
}

/// Advance the streak for `today` using yesterday's total.
///
/// Returns None when the streak was already evaluated on `today`, so repeated
/// calls within a day are no-ops. Yesterday's emissions use the whole grid
/// factor; only solar mode zeroes them.
pub fn evaluate_streak(
    streak: &StreakState,
    today: NaiveDate,
    yesterday_total_wh: f64,
    solar_mode: bool,
) -> Option<StreakState> {
    if streak.last_evaluated == Some(today) {
        return None;
    }

    let yesterday_kg = if solar_mode {
        0.0
    } else {
        yesterday_total_wh / 1000.0 * GRID_EMISSION_FACTOR
    };

    let count = if yesterday_kg <= DAILY_THRESHOLDS[0] {
        streak.count.saturating_add(1)
    } else {
        0
    };

    info!(
        date = %today,
        yesterday_kg,
        count,
        "Streak evaluated"
    );

    Some(StreakState {
        count,
        last_evaluated: Some(today),
    })
}

/// Month emissions expressed as driving, trees and phone charges
pub fn equivalencies(co2_month_kg: f64, solar_mode: bool) -> Equivalencies {
    if solar_mode {
        return Equivalencies {
            solar: true,
            ..Default::default()
        };
    }

    let kg = co2_month_kg.max(0.0);
    Equivalencies {
        km_driven: kg / 0.2,
        trees_needed: (kg / 2.0).ceil() as u64,
        phone_charges: (kg / 0.008).round() as u64,
        solar: false,
    }
}
