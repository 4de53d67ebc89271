//! Operating regime classification from heater state and heat rate.
//!
//! Each heater state has its own ordered rule table; the first rule whose
//! bound matches the rate decides the verdict. Tables are plain data so the
//! thresholds live in configuration.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Bound {
    /// `rate >= value`
    AtLeast(f32),
    /// `rate > value`
    Above(f32),
    Otherwise,
}

impl Bound {
    pub fn matches(&self, rate: f32) -> bool {
        match *self {
            Bound::AtLeast(value) => rate >= value,
            Bound::Above(value) => rate > value,
            Bound::Otherwise => true,
        }
    }

    fn threshold(&self) -> Option<f32> {
        match *self {
            Bound::AtLeast(value) | Bound::Above(value) => Some(value),
            Bound::Otherwise => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "message", rename_all = "snake_case")]
pub enum RuleVerdict {
    Status(String),
    Shutdown(String),
}

impl RuleVerdict {
    pub fn message(&self) -> &str {
        match self {
            RuleVerdict::Status(message) | RuleVerdict::Shutdown(message) => message,
        }
    }

    pub fn is_shutdown(&self) -> bool {
        matches!(self, RuleVerdict::Shutdown(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeRule {
    pub bound: Bound,
    pub verdict: RuleVerdict,
}

impl RegimeRule {
    fn status(bound: Bound, label: &str) -> Self {
        Self {
            bound,
            verdict: RuleVerdict::Status(label.to_string()),
        }
    }

    fn shutdown(bound: Bound, reason: &str) -> Self {
        Self {
            bound,
            verdict: RuleVerdict::Shutdown(reason.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegimeTable {
    pub rules: Vec<RegimeRule>,
}

impl RegimeTable {
    pub fn default_heating() -> Self {
        Self {
            rules: vec![
                RegimeRule::shutdown(Bound::AtLeast(9.0), "Heat rate exceeds 9deg/hr"),
                RegimeRule::status(Bound::AtLeast(5.0), "Heating normally"),
                RegimeRule::status(Bound::AtLeast(1.0), "Cover likely open (heating slowly)"),
                RegimeRule::shutdown(
                    Bound::Otherwise,
                    "Heating too slowly (over-temp switch? thermometer in tub?)",
                ),
            ],
        }
    }

    pub fn default_cooling() -> Self {
        Self {
            rules: vec![
                RegimeRule::status(Bound::Above(2.5), "Should be cooling, but is heating"),
                RegimeRule::status(Bound::Above(-2.0), "Cooling normally"),
                RegimeRule::status(Bound::Above(-15.0), "Cover likely open (cooling quickly)"),
                RegimeRule::shutdown(
                    Bound::Otherwise,
                    "Cooling too fast (thermometer may be dislodged)",
                ),
            ],
        }
    }

    pub fn first_match(&self, rate: f32) -> Option<&RegimeRule> {
        self.rules.iter().find(|rule| rule.bound.matches(rate))
    }

    /// A usable table is non-empty, ends in exactly one catch-all rule and
    /// has non-increasing thresholds so that no rule shadows a later one.
    pub fn validate(&self) -> Result<(), String> {
        let (last, rest) = self
            .rules
            .split_last()
            .ok_or_else(|| "rule table is empty".to_string())?;
        if last.bound != Bound::Otherwise {
            return Err("last rule must be a catch-all".to_string());
        }
        let mut previous: Option<f32> = None;
        for rule in rest {
            let threshold = rule
                .bound
                .threshold()
                .ok_or_else(|| "catch-all rule must be last".to_string())?;
            if threshold.is_nan() {
                return Err("rule threshold is NaN".to_string());
            }
            if let Some(prev) = previous {
                if threshold > prev {
                    return Err(format!(
                        "thresholds must not increase ({} after {})",
                        threshold, prev
                    ));
                }
            }
            previous = Some(threshold);
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RegimeClassifier {
    heating: RegimeTable,
    cooling: RegimeTable,
}

impl RegimeClassifier {
    pub fn new(heating: RegimeTable, cooling: RegimeTable) -> Self {
        Self { heating, cooling }
    }

    pub fn classify(&self, heater_on: bool, rate: f32) -> Option<RuleVerdict> {
        let (mode, table) = if heater_on {
            ("Heating", &self.heating)
        } else {
            ("Cooling", &self.cooling)
        };
        match table.first_match(rate) {
            Some(rule) => {
                debug!(
                    "Mode: {}, rate {:.2}deg/hr matched {:?}: {}",
                    mode,
                    rate,
                    rule.bound,
                    rule.verdict.message()
                );
                Some(rule.verdict.clone())
            }
            None => {
                warn!("Mode: {}, no regime rule matched rate {:.2}", mode, rate);
                None
            }
        }
    }
}

impl Default for RegimeClassifier {
    fn default() -> Self {
        Self::new(RegimeTable::default_heating(), RegimeTable::default_cooling())
    }
}
