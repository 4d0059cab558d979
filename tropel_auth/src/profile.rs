//! Load profiles, expressed as ramping stages over [`LoadLevels`].
use std::time::Duration;

use clap::ValueEnum;
use tropel::Stage;

use crate::config::LoadLevels;

const SECOND: Duration = Duration::from_secs(1);
const MINUTE: Duration = Duration::from_secs(60);

fn minutes(n: u64) -> Duration {
    MINUTE * n as u32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Profile {
    /// One virtual user for a minute, to validate the suite itself.
    Smoke,
    /// Ramp to normal load, hold, ramp down.
    Load,
    /// Step up past the breaking point, then recover.
    Stress,
    /// A short burst far above normal load.
    Spike,
    /// Normal load for four hours.
    Soak,
}

impl Profile {
    pub fn name(self) -> &'static str {
        match self {
            Profile::Smoke => "smoke",
            Profile::Load => "load",
            Profile::Stress => "stress",
            Profile::Spike => "spike",
            Profile::Soak => "soak",
        }
    }

    pub fn stages(self, loads: &LoadLevels) -> Vec<Stage> {
        match self {
            Profile::Smoke => vec![Stage::new(Duration::ZERO, 1), Stage::new(MINUTE, 1)],
            Profile::Load => vec![
                Stage::new(minutes(5), loads.normal),
                Stage::new(minutes(10), loads.normal),
                Stage::new(minutes(5), 0),
            ],
            Profile::Stress => vec![
                Stage::new(minutes(2), loads.below_normal),
                Stage::new(minutes(5), loads.below_normal),
                Stage::new(minutes(2), loads.normal),
                Stage::new(minutes(5), loads.normal),
                Stage::new(minutes(2), loads.breaking_point),
                Stage::new(minutes(5), loads.breaking_point),
                Stage::new(minutes(2), loads.above_breaking_point),
                Stage::new(minutes(5), loads.above_breaking_point),
                // recovery
                Stage::new(minutes(10), 0),
            ],
            Profile::Spike => vec![
                Stage::new(SECOND * 10, loads.below_normal),
                Stage::new(MINUTE, loads.below_normal),
                Stage::new(SECOND * 10, loads.spike),
                Stage::new(minutes(3), loads.spike),
                Stage::new(SECOND * 10, loads.below_normal),
                Stage::new(minutes(3), loads.below_normal),
                Stage::new(SECOND * 10, 0),
            ],
            Profile::Soak => vec![
                Stage::new(minutes(2), loads.normal),
                Stage::new(minutes(3 * 60 + 56), loads.normal),
                Stage::new(minutes(2), 0),
            ],
        }
    }

    pub fn min_iteration_duration(self) -> Duration {
        match self {
            Profile::Smoke | Profile::Soak => SECOND,
            Profile::Load | Profile::Stress | Profile::Spike => SECOND * 10,
        }
    }

    /// How long in-flight iterations may finish once the stages are over.
    pub fn graceful_stop(self) -> Duration {
        match self {
            Profile::Smoke => SECOND * 5,
            _ => SECOND * 30,
        }
    }
}
