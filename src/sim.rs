//! In-process tub model for running the controller without hardware.
//!
//! Each temperature read advances the model by one sample interval: the
//! heater adds a fixed gain per minute and the water loses heat towards
//! ambient in proportion to the difference.

use crate::hardware::{SensorError, TemperatureSensor};
use crate::types::Line;
use embassy_sync::blocking_mutex::{raw::CriticalSectionRawMutex, Mutex};
use embedded_hal::digital::v2::{OutputPin, StatefulOutputPin};
use log::trace;
use std::cell::RefCell;
use std::convert::Infallible;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct SimParams {
    pub initial_water_f: f32,
    pub ambient_f: f32,
    /// Heater gain in degrees per minute.
    pub heater_gain_f_per_min: f32,
    /// Fraction of the water/ambient difference lost per minute.
    pub loss_per_min: f32,
    pub minutes_per_sample: f32,
    /// Must match the relay bank so the model sees the heater as on.
    pub active_low: bool,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            initial_water_f: 99.0,
            ambient_f: 55.0,
            heater_gain_f_per_min: 0.12,
            loss_per_min: 0.0004,
            minutes_per_sample: 1.0,
            active_low: true,
        }
    }
}

#[derive(Debug)]
struct TubModel {
    params: SimParams,
    water_f: f32,
    /// Raw pin levels in `Line::ALL` order.
    levels: [bool; 5],
}

impl TubModel {
    fn heater_on(&self) -> bool {
        self.levels[Line::Heater.index()] != self.params.active_low
    }

    fn step(&mut self) {
        let minutes = self.params.minutes_per_sample;
        if self.heater_on() {
            self.water_f += self.params.heater_gain_f_per_min * minutes;
        }
        self.water_f -= (self.water_f - self.params.ambient_f) * self.params.loss_per_min * minutes;
    }
}

type SharedModel = Arc<Mutex<CriticalSectionRawMutex, RefCell<TubModel>>>;

#[derive(Clone)]
pub struct SimulatedTub {
    model: SharedModel,
}

impl SimulatedTub {
    pub fn new(params: SimParams) -> Self {
        let levels = [params.active_low; 5];
        let model = TubModel {
            water_f: params.initial_water_f,
            params,
            levels,
        };
        Self {
            model: Arc::new(Mutex::new(RefCell::new(model))),
        }
    }

    pub fn water_temperature(&self) -> f32 {
        self.model.lock(|model| model.borrow().water_f)
    }

    pub fn heater_on(&self) -> bool {
        self.model.lock(|model| model.borrow().heater_on())
    }

    pub fn sensor(&self) -> SimSensor {
        SimSensor {
            model: Arc::clone(&self.model),
        }
    }

    /// Five pins in `Line::ALL` order, ready for a `RelayBank`.
    pub fn pins(&self) -> [SimPin; 5] {
        Line::ALL.map(|line| SimPin {
            model: Arc::clone(&self.model),
            index: line.index(),
        })
    }
}

pub struct SimSensor {
    model: SharedModel,
}

impl TemperatureSensor for SimSensor {
    fn read_temperature_f(&mut self) -> Result<f32, SensorError> {
        let water = self.model.lock(|model| {
            let mut model = model.borrow_mut();
            model.step();
            model.water_f
        });
        trace!("Simulated water temperature {:.3}", water);
        Ok(water)
    }
}

pub struct SimPin {
    model: SharedModel,
    index: usize,
}

impl SimPin {
    fn level(&self) -> bool {
        self.model.lock(|model| model.borrow().levels[self.index])
    }

    fn set_level(&mut self, high: bool) {
        self.model
            .lock(|model| model.borrow_mut().levels[self.index] = high);
    }
}

impl OutputPin for SimPin {
    type Error = Infallible;

    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.set_level(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.set_level(true);
        Ok(())
    }
}

impl StatefulOutputPin for SimPin {
    fn is_set_high(&self) -> Result<bool, Self::Error> {
        Ok(self.level())
    }

    fn is_set_low(&self) -> Result<bool, Self::Error> {
        Ok(!self.level())
    }
}
