use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StageParseError {
    #[error("stage `{0}` must be in the format `<duration>:<target>`, for example `10s:50`")]
    InvalidFormat(String),
    #[error("invalid stage duration `{0}`: {1}")]
    InvalidDuration(String, String),
    #[error("invalid stage target `{0}`, expected a whole number of agents")]
    InvalidTarget(String),
}

/// One phase of a load ramp: move linearly to `target` concurrent agents over `duration`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stage {
    pub duration: Duration,
    pub target: usize,
}

impl Stage {
    pub fn new(duration: Duration, target: usize) -> Self {
        Self { duration, target }
    }
}

impl FromStr for Stage {
    type Err = StageParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (duration, target) = s
            .split_once(':')
            .ok_or_else(|| StageParseError::InvalidFormat(s.to_string()))?;

        let duration = duration.trim();
        let duration = humantime::parse_duration(duration)
            .map_err(|e| StageParseError::InvalidDuration(duration.to_string(), e.to_string()))?;

        let target = target.trim();
        let target = target
            .parse::<usize>()
            .map_err(|_| StageParseError::InvalidTarget(target.to_string()))?;

        Ok(Self { duration, target })
    }
}

/// How many agents should be running at each point of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RampSchedule {
    start_agents: usize,
    stages: Vec<Stage>,
    /// Keep the final target running after the last stage until the run is stopped.
    hold: bool,
}

impl RampSchedule {
    pub fn new(start_agents: usize, stages: Vec<Stage>) -> Self {
        Self {
            start_agents,
            stages,
            hold: false,
        }
    }

    /// A fixed number of agents for a fixed duration, or until stopped if there is no duration.
    pub fn constant(agents: usize, duration: Option<Duration>) -> Self {
        match duration {
            Some(duration) => Self::new(agents, vec![Stage::new(duration, agents)]),
            None => Self {
                start_agents: agents,
                stages: Vec::new(),
                hold: true,
            },
        }
    }

    /// Keep running at the final target once the stages are complete.
    pub fn hold_final_target(mut self) -> Self {
        self.hold = true;
        self
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn start_agents(&self) -> usize {
        self.start_agents
    }

    /// The total duration of the stages, or `None` if the schedule runs until stopped.
    pub fn total_duration(&self) -> Option<Duration> {
        if self.hold {
            None
        } else {
            Some(self.stages.iter().map(|s| s.duration).sum())
        }
    }

    /// The highest target reached at any point of the schedule.
    pub fn peak_agents(&self) -> usize {
        self.stages
            .iter()
            .map(|s| s.target)
            .fold(self.start_agents, usize::max)
    }

    fn final_target(&self) -> usize {
        self.stages
            .last()
            .map(|s| s.target)
            .unwrap_or(self.start_agents)
    }

    /// The target number of agents `elapsed` into the run.
    ///
    /// Within a stage the target moves linearly from the previous target. Ramping up only adds
    /// an agent once the line has reached the next whole agent, ramping down only removes one
    /// once the line has dropped below it. Returns `None` once the schedule has finished.
    pub fn target_at(&self, elapsed: Duration) -> Option<usize> {
        let mut from = self.start_agents;
        let mut stage_start = Duration::ZERO;

        for stage in &self.stages {
            let stage_end = stage_start + stage.duration;
            if elapsed < stage_end {
                let progress = (elapsed - stage_start).as_secs_f64() / stage.duration.as_secs_f64();
                let line = from as f64 + (stage.target as f64 - from as f64) * progress;

                let target = if stage.target >= from {
                    line.floor()
                } else {
                    line.ceil()
                };
                return Some(target as usize);
            }

            from = stage.target;
            stage_start = stage_end;
        }

        if self.hold {
            Some(self.final_target())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    fn millis(ms: u64) -> Duration {
        Duration::from_millis(ms)
    }

    fn redeem_schedule() -> RampSchedule {
        RampSchedule::new(
            0,
            vec![
                Stage::new(secs(10), 10),
                Stage::new(secs(20), 50),
                Stage::new(secs(10), 0),
            ],
        )
    }

    #[test]
    fn parse_stage() {
        assert_eq!(Stage::new(secs(10), 50), "10s:50".parse().unwrap());
        assert_eq!(Stage::new(millis(1500), 3), "1500ms:3".parse().unwrap());
        assert_eq!(Stage::new(secs(90), 0), " 1m 30s : 0 ".parse().unwrap());
    }

    #[test]
    fn parse_stage_errors() {
        assert_eq!(
            Err(StageParseError::InvalidFormat("10s".to_string())),
            "10s".parse::<Stage>()
        );
        assert!(matches!(
            "ten:5".parse::<Stage>(),
            Err(StageParseError::InvalidDuration(d, _)) if d == "ten"
        ));
        assert_eq!(
            Err(StageParseError::InvalidTarget("-1".to_string())),
            "10s:-1".parse::<Stage>()
        );
    }

    #[test]
    fn ramp_up_interpolates_and_floors() {
        let schedule = redeem_schedule();
        assert_eq!(Some(0), schedule.target_at(Duration::ZERO));
        assert_eq!(Some(0), schedule.target_at(millis(999)));
        assert_eq!(Some(1), schedule.target_at(secs(1)));
        assert_eq!(Some(5), schedule.target_at(millis(5500)));
        assert_eq!(Some(9), schedule.target_at(millis(9999)));
    }

    #[test]
    fn second_stage_starts_from_previous_target() {
        let schedule = redeem_schedule();
        assert_eq!(Some(10), schedule.target_at(secs(10)));
        // 10 + 40 * (10 / 20)
        assert_eq!(Some(30), schedule.target_at(secs(20)));
        assert_eq!(Some(49), schedule.target_at(millis(29_999)));
    }

    #[test]
    fn ramp_down_interpolates_and_ceils() {
        let schedule = redeem_schedule();
        assert_eq!(Some(50), schedule.target_at(secs(30)));
        // 50 - 50 * 0.01 = 49.5, an agent is only removed once the line reaches 49
        assert_eq!(Some(50), schedule.target_at(millis(30_100)));
        assert_eq!(Some(25), schedule.target_at(secs(35)));
        assert_eq!(Some(1), schedule.target_at(millis(39_900)));
    }

    #[test]
    fn schedule_ends_after_last_stage() {
        let schedule = redeem_schedule();
        assert_eq!(None, schedule.target_at(secs(40)));
        assert_eq!(Some(secs(40)), schedule.total_duration());
        assert_eq!(50, schedule.peak_agents());
    }

    #[test]
    fn constant_schedule() {
        let schedule = RampSchedule::constant(4, Some(secs(5)));
        assert_eq!(Some(4), schedule.target_at(Duration::ZERO));
        assert_eq!(Some(4), schedule.target_at(millis(4999)));
        assert_eq!(None, schedule.target_at(secs(5)));
        assert_eq!(4, schedule.peak_agents());
    }

    #[test]
    fn soak_schedules_never_end() {
        let schedule = RampSchedule::constant(3, None);
        assert_eq!(None, schedule.total_duration());
        assert_eq!(Some(3), schedule.target_at(secs(100_000)));

        let schedule = redeem_schedule().hold_final_target();
        assert_eq!(None, schedule.total_duration());
        assert_eq!(Some(0), schedule.target_at(secs(100)));
    }

    #[test]
    fn zero_duration_stage_jumps_to_target() {
        let schedule = RampSchedule::new(0, vec![Stage::new(Duration::ZERO, 5), Stage::new(secs(1), 5)]);
        assert_eq!(Some(5), schedule.target_at(Duration::ZERO));
    }
}
