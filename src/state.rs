use crate::safety::SafetyLatch;
use crate::types::Line;
use crate::window::SlidingWindow;
use std::fmt;

/// Mutable state of the control loop. Owned by the control task only.
#[derive(Debug)]
pub struct ControllerState {
    pub current_temperature: f32,
    pub target_temperature: f32,
    /// Last value read back from the heater line, never set from intent.
    pub heater_on: bool,
    /// Cycles since start or since the last heater transition.
    pub cycle_counter: u32,
    pub latch: SafetyLatch,
    pub status_message: String,
    pub window: SlidingWindow,
    /// Read-back of every line, refreshed when telemetry is built.
    pub lines: [bool; 5],
}

impl ControllerState {
    pub fn new(default_target: f32, window_capacity: usize) -> Self {
        Self {
            current_temperature: default_target,
            target_temperature: default_target,
            heater_on: false,
            cycle_counter: 0,
            latch: SafetyLatch::new(),
            status_message: String::new(),
            window: SlidingWindow::new(window_capacity),
            lines: [false; 5],
        }
    }

    pub fn line(&self, line: Line) -> bool {
        self.lines[line.index()]
    }

    pub fn is_safe(&self) -> bool {
        !self.latch.is_tripped()
    }
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ControllerState:")?;
        writeln!(f, "     target temperature : {:.2}", self.target_temperature)?;
        writeln!(f, "     temperature        : {:.2}", self.current_temperature)?;
        writeln!(f, "     safety latch       : {:?}", self.latch)?;
        for line in Line::ALL {
            writeln!(f, "     {:<18} : {}", line.as_str(), self.line(line))?;
        }
        writeln!(f, "     status message     : {}", self.status_message)?;
        writeln!(f, "     cycle counter      : {}", self.cycle_counter)?;
        writeln!(
            f,
            "     window             : [length: {}/{}]",
            self.window.len(),
            self.window.capacity()
        )?;
        for (i, sample) in self.window.snapshot().iter().enumerate() {
            writeln!(f, "                          [{}]: {:.2}", i, sample)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_lists_window_samples() {
        let mut state = ControllerState::new(102.0, 10);
        state.window.push(100.25);
        state.window.push(100.5);
        state.lines[Line::Jets.index()] = true;
        let summary = state.to_string();
        assert!(summary.contains("target temperature : 102.00"));
        assert!(summary.contains(&format!("{:<18} : true", "jets")));
        assert!(summary.contains("[length: 2/10]"));
        assert!(summary.contains("[1]: 100.50"));
        assert!(summary.contains("safety latch       : Safe"));
    }
}
