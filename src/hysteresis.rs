use crate::safety::SafetyLatch;
use log::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaterDecision {
    Hold,
    TurnOn,
    TurnOff,
    /// Latch tripped; no actuation at all.
    Suspended,
}

/// Bang-bang heater control with an asymmetric band around the target.
#[derive(Debug, Clone)]
pub struct HysteresisController {
    upper_window: f32,
    lower_window: f32,
}

impl HysteresisController {
    pub fn new(upper_window: f32, lower_window: f32) -> Self {
        Self {
            upper_window,
            lower_window,
        }
    }

    pub fn decide(
        &self,
        target: f32,
        current: f32,
        heater_on: bool,
        latch: &SafetyLatch,
    ) -> HeaterDecision {
        if latch.is_tripped() {
            return HeaterDecision::Suspended;
        }

        let loop_error = target - current;
        debug!("Loop error: {:.2}", loop_error);

        if heater_on && loop_error < -self.upper_window {
            HeaterDecision::TurnOff
        } else if !heater_on && loop_error > self.lower_window {
            HeaterDecision::TurnOn
        } else {
            HeaterDecision::Hold
        }
    }
}

impl Default for HysteresisController {
    fn default() -> Self {
        Self::new(0.5, 0.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turns_on_below_lower_window() {
        let controller = HysteresisController::default();
        let latch = SafetyLatch::new();
        assert_eq!(
            controller.decide(102.0, 101.4, false, &latch),
            HeaterDecision::TurnOn
        );
        assert_eq!(
            controller.decide(102.0, 101.5, false, &latch),
            HeaterDecision::Hold
        );
    }

    #[test]
    fn test_turns_off_above_upper_window() {
        let controller = HysteresisController::default();
        let latch = SafetyLatch::new();
        assert_eq!(
            controller.decide(102.0, 102.6, true, &latch),
            HeaterDecision::TurnOff
        );
        assert_eq!(
            controller.decide(102.0, 102.4, true, &latch),
            HeaterDecision::Hold
        );
    }

    #[test]
    fn test_holds_inside_band() {
        let controller = HysteresisController::new(1.0, 0.25);
        let latch = SafetyLatch::new();
        assert_eq!(controller.decide(100.0, 100.9, true, &latch), HeaterDecision::Hold);
        assert_eq!(controller.decide(100.0, 99.8, false, &latch), HeaterDecision::Hold);
        assert_eq!(controller.decide(100.0, 99.7, false, &latch), HeaterDecision::TurnOn);
    }

    #[test]
    fn test_tripped_latch_suspends_regulation() {
        let controller = HysteresisController::default();
        let mut latch = SafetyLatch::new();
        latch.trip("Temperature exceeds limit (103.50)");
        assert_eq!(
            controller.decide(102.0, 90.0, false, &latch),
            HeaterDecision::Suspended
        );
        assert_eq!(
            controller.decide(102.0, 110.0, true, &latch),
            HeaterDecision::Suspended
        );
    }
}
