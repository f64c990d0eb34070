//! Vacation sentry: flags any appliance drawing power while the house should
//! be empty

use tracing::{info, warn};
use wattwatch_api::{Sample, SentryTrip, Target};

/// Mains voltage used to estimate power when only current is reported
pub const NOMINAL_VOLTAGE: f64 = 230.0;

const WATCHED: [Target; 3] = [Target::Load1, Target::Load2, Target::Load3];

/// Armed/disarmed state plus the loads allowed to keep running.
///
/// After a trip the sentry stays quiet until it is armed again, so one
/// intrusion produces one report.
#[derive(Debug, Clone, Default)]
pub struct Sentry {
    armed: bool,
    whitelist: Vec<Target>,
    tripped: bool,
}

impl Sentry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm with the given whitelist, clearing any earlier trip
    pub fn arm(&mut self, whitelist: Vec<Target>) {
        info!(whitelist = ?whitelist, "Vacation sentry armed");
        self.armed = true;
        self.whitelist = whitelist;
        self.tripped = false;
    }

    pub fn disarm(&mut self) {
        if self.armed {
            info!("Vacation sentry disarmed");
        }
        self.armed = false;
        self.whitelist.clear();
        self.tripped = false;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn is_tripped(&self) -> bool {
        self.tripped
    }

    pub fn whitelist(&self) -> &[Target] {
        &self.whitelist
    }

    /// Inspect the latest sample. The first non-whitelisted load with
    /// positive power or current trips the sentry.
    pub fn check(&mut self, latest: &Sample) -> Option<SentryTrip> {
        if !self.armed || self.tripped {
            return None;
        }

        let trip = WATCHED
            .iter()
            .filter(|target| !self.whitelist.contains(*target))
            .find_map(|&target| {
                let reading = latest.reading(target)?;
                if reading.power <= 0.0 && reading.current <= 0.0 {
                    return None;
                }
                let power_watts = if reading.power != 0.0 {
                    reading.power
                } else {
                    reading.current * NOMINAL_VOLTAGE
                };
                Some(SentryTrip {
                    target,
                    power_watts,
                    message: format!(
                        "UNAUTHORIZED ACTIVITY DETECTED ON {} | Power Draw: {:.2} Watts",
                        target.display_name().to_uppercase(),
                        power_watts
                    ),
                })
            })?;

        warn!(
            target = trip.target.as_str(),
            power_watts = trip.power_watts,
            "Vacation sentry tripped"
        );
        self.tripped = true;
        Some(trip)
    }
}
