use crate::{
    hardware::{Actuator, RelayError, SensorError, TemperatureSensor},
    hysteresis::{HeaterDecision, HysteresisController},
    rate::heat_rate,
    regime::{RegimeClassifier, RuleVerdict},
    remote::CommandFetchError,
    state::ControllerState,
    system::config::ControlConfig,
    types::{AlertRecord, Line, RemoteCommand, TelemetryRecord},
};
use embassy_time::{Duration, Ticker};
use log::{debug, error, info, warn};
use std::convert::Infallible;
use std::fmt;

/// The control task's view of the remote service.
///
/// Exactly one command request is outstanding at a time: the loop issues it
/// while sampling and waits for the reply before actuating. Publishing is
/// fire-and-forget and never fails from the caller's point of view.
#[allow(async_fn_in_trait)]
pub trait RemoteLink {
    async fn request_commands(&mut self) -> Result<(), CommandFetchError>;

    async fn receive_commands(&mut self) -> Result<RemoteCommand, CommandFetchError>;

    fn publish_telemetry(&mut self, record: TelemetryRecord);

    fn publish_alert(&mut self, record: AlertRecord);
}

/// Conditions the loop cannot regulate through. The caller is expected to
/// drive every line off and stop.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlError {
    Sensor(SensorError),
    Command(CommandFetchError),
    Relay(RelayError),
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlError::Sensor(e) => write!(f, "temperature sensor failed: {}", e),
            ControlError::Command(e) => write!(f, "command intake failed: {}", e),
            ControlError::Relay(e) => write!(f, "relay failed: {}", e),
        }
    }
}

impl std::error::Error for ControlError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ControlError::Sensor(e) => Some(e),
            ControlError::Command(e) => Some(e),
            ControlError::Relay(e) => Some(e),
        }
    }
}

impl From<SensorError> for ControlError {
    fn from(e: SensorError) -> Self {
        ControlError::Sensor(e)
    }
}

impl From<CommandFetchError> for ControlError {
    fn from(e: CommandFetchError) -> Self {
        ControlError::Command(e)
    }
}

impl From<RelayError> for ControlError {
    fn from(e: RelayError) -> Self {
        ControlError::Relay(e)
    }
}

/// What a single cycle observed and did.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub temperature: f32,
    pub heat_rate: f32,
    /// `None` while the warm-up gate holds classification off.
    pub verdict: Option<RuleVerdict>,
    pub decision: HeaterDecision,
    /// Set when this cycle moved the latch from safe to tripped.
    pub alert: Option<AlertRecord>,
    pub telemetry: TelemetryRecord,
}

pub struct ControlLoop<S, A, R> {
    sensor: S,
    actuator: A,
    remote: R,
    config: ControlConfig,
    classifier: RegimeClassifier,
    hysteresis: HysteresisController,
    state: ControllerState,
}

impl<S, A, R> ControlLoop<S, A, R>
where
    S: TemperatureSensor,
    A: Actuator,
    R: RemoteLink,
{
    pub fn new(sensor: S, actuator: A, remote: R, config: ControlConfig) -> Self {
        let classifier =
            RegimeClassifier::new(config.heating_rules.clone(), config.cooling_rules.clone());
        let hysteresis = HysteresisController::new(config.upper_window_f, config.lower_window_f);
        let state = ControllerState::new(config.default_target_f, config.window_capacity);

        Self {
            sensor,
            actuator,
            remote,
            config,
            classifier,
            hysteresis,
            state,
        }
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn remote_mut(&mut self) -> &mut R {
        &mut self.remote
    }

    /// Re-arms regulation after a trip. Nothing in the loop calls this; a
    /// tripped tub stays tripped until restart unless an operator path is
    /// wired to it.
    pub fn clear_latch(&mut self) {
        self.state.latch.clear();
    }

    /// Drives every output off. Used on the way out after a fatal error.
    pub fn all_off(&mut self) -> Result<(), RelayError> {
        self.actuator.all_off()
    }

    /// Cycles forever on the configured cadence. Only returns on a fatal
    /// error.
    pub async fn run(&mut self) -> Result<Infallible, ControlError> {
        let mut ticker = Ticker::every(Duration::from_secs(self.config.sample_interval_secs));
        info!(
            "Control loop running every {}s (limit {:.2}F)",
            self.config.sample_interval_secs, self.config.temperature_limit_f
        );
        loop {
            if let Err(e) = self.run_cycle().await {
                error!("Control loop stopping: {}", e);
                return Err(e);
            }
            ticker.next().await;
        }
    }

    /// Sampling, safety check, classification, command intake, actuation
    /// and reporting, in that order. A trip alert still pending when a later
    /// phase fails is published before the error is returned.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, ControlError> {
        let mut pending_alert = None;
        let result = self.cycle(&mut pending_alert).await;
        if let Some(record) = pending_alert {
            warn!("Cycle failed after tripping; sending alert: {}", record.message);
            self.remote.publish_alert(record);
        }
        result
    }

    async fn cycle(&mut self, alert: &mut Option<AlertRecord>) -> Result<CycleReport, ControlError> {
        // Sampling
        self.state.status_message.clear();
        self.state.cycle_counter += 1;
        self.state.heater_on = self.actuator.read_line(Line::Heater)?;
        debug!("cycleCounter: {}", self.state.cycle_counter);

        if self.state.heater_on && self.state.cycle_counter == self.config.dip_delay_cycles {
            self.state.window.drain();
            info!(
                "Drained temperature window after {} readings",
                self.config.dip_delay_cycles
            );
        }

        self.remote.request_commands().await?;
        let temperature = self.sensor.read_temperature_f()?;
        self.state.current_temperature = temperature;
        self.state.window.push(temperature);
        info!("Temperature: {:.2}", temperature);

        // Safety check
        let limit = self.config.temperature_limit_f;
        if self.state.heater_on && temperature > limit {
            warn!("Temperature {:.2} above limit {:.2} with heater on", temperature, limit);
            let reason = format!("Temperature exceeds limit ({:.2})", limit);
            self.shutdown(reason, alert)?;
        }

        // Classifying
        let sample_interval_minutes = self.config.sample_interval_secs as f32 / 60.0;
        let rate = heat_rate(&self.state.window, sample_interval_minutes);
        debug!("Heat rate: {:.2} (positive = warming)", rate);

        let verdict = if self.state.cycle_counter > self.config.suitable_sample_size {
            self.classifier.classify(self.state.heater_on, rate)
        } else {
            debug!(
                "Skipping alert/shutdown checks for another {} readings",
                self.config.suitable_sample_size - self.state.cycle_counter
            );
            None
        };
        match &verdict {
            Some(RuleVerdict::Status(message)) => self.state.status_message = message.clone(),
            Some(RuleVerdict::Shutdown(reason)) => {
                self.shutdown(reason.clone(), alert)?;
            }
            None => {}
        }

        // Command intake
        let command = self.remote.receive_commands().await?;
        info!(
            "Command: target {:.2}, jets {}, light {}, cold blower {}, hot blower {}",
            command.target_temperature,
            command.jets,
            command.light,
            command.cold_blower,
            command.hot_blower
        );
        self.state.target_temperature = command.target_temperature;

        // Actuating
        for (line, on) in command.line_targets() {
            self.actuator.set_line(line, on)?;
        }

        let decision = self.hysteresis.decide(
            self.state.target_temperature,
            self.state.current_temperature,
            self.state.heater_on,
            &self.state.latch,
        );
        match decision {
            HeaterDecision::TurnOn => self.switch_heater(true)?,
            HeaterDecision::TurnOff => self.switch_heater(false)?,
            HeaterDecision::Hold => {}
            HeaterDecision::Suspended => {
                warn!("Not regulating temperature; safety latch is tripped")
            }
        }

        // Reporting
        let telemetry = self.telemetry(rate)?;
        self.remote.publish_telemetry(telemetry.clone());
        let alert = alert.take();
        if let Some(record) = &alert {
            self.remote.publish_alert(record.clone());
        }
        debug!("{}", self.state);

        Ok(CycleReport {
            temperature,
            heat_rate: rate,
            verdict,
            decision,
            alert,
            telemetry,
        })
    }

    /// Writes the heater line, then restarts the trend baseline: the window
    /// is drained and the warm-up gate re-armed.
    fn switch_heater(&mut self, on: bool) -> Result<(), ControlError> {
        self.actuator.set_line(Line::Heater, on)?;
        self.state.window.drain();
        self.state.cycle_counter = 0;
        self.state.heater_on = self.actuator.read_line(Line::Heater)?;
        info!("Turned heater {}", if on { "on" } else { "off" });
        Ok(())
    }

    /// Latch tripped, status set to the reason, heater off. `alert` is set
    /// only when the latch was safe before this call.
    fn shutdown(
        &mut self,
        reason: String,
        alert: &mut Option<AlertRecord>,
    ) -> Result<(), ControlError> {
        warn!("Shutting down: {}", reason);
        self.state.status_message = reason.clone();
        if self.state.latch.trip(reason.clone()) && alert.is_none() {
            *alert = Some(AlertRecord::new(reason));
        }
        self.switch_heater(false)
    }

    fn telemetry(&mut self, rate: f32) -> Result<TelemetryRecord, ControlError> {
        for line in Line::ALL {
            self.state.lines[line.index()] = self.actuator.read_line(line)?;
        }
        self.state.heater_on = self.state.line(Line::Heater);

        Ok(TelemetryRecord {
            temperature: self.state.current_temperature,
            heater_on: self.state.heater_on,
            jets: self.state.line(Line::Jets),
            light: self.state.line(Line::Light),
            cold_blower: self.state.line(Line::ColdBlower),
            hot_blower: self.state.line(Line::HotBlower),
            status_message: self.state.status_message.clone(),
            heat_rate: rate,
            tripped: self.state.latch.reason().map(str::to_string),
        })
    }
}
