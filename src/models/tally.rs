//! Signup tallies entered by store staff.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::de;
use crate::error::KpiError;

/// Target strike rate a fresh tracker starts with.
pub const DEFAULT_TARGET_RATE: f64 = 20.0;

/// Shown when a submission is requested with an empty field.
pub const INCOMPLETE_MESSAGE: &str = "Please fill all fields before submitting.";

/// A complete set of counts plus the target they are measured against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignupTally {
    pub yes_count: u32,
    pub no_count: u32,
    /// Target strike rate in percent (0 to 100)
    pub target_rate: f64,
}

impl SignupTally {
    pub fn new(yes_count: u32, no_count: u32, target_rate: f64) -> Self {
        Self {
            yes_count,
            no_count,
            target_rate,
        }
    }

    pub fn total(&self) -> u64 {
        self.yes_count as u64 + self.no_count as u64
    }
}

/// A tally as typed in. `None` means the field is empty, which is not zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TallyInput {
    pub yes_count: Option<u32>,
    pub no_count: Option<u32>,
    pub target_rate: Option<f64>,
}

impl Default for TallyInput {
    fn default() -> Self {
        Self::with_target(DEFAULT_TARGET_RATE)
    }
}

impl TallyInput {
    /// Zero counts and the given target, the state a tracker opens with.
    pub fn with_target(target_rate: f64) -> Self {
        Self {
            yes_count: Some(0),
            no_count: Some(0),
            target_rate: Some(target_rate),
        }
    }

    /// Every field empty.
    pub fn empty() -> Self {
        Self {
            yes_count: None,
            no_count: None,
            target_rate: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.tally().is_some()
    }

    pub fn tally(&self) -> Option<SignupTally> {
        Some(SignupTally::new(
            self.yes_count?,
            self.no_count?,
            self.target_rate?,
        ))
    }

    /// The complete tally, or a validation error naming the empty state.
    pub fn require_complete(&self) -> Result<SignupTally, KpiError> {
        self.tally()
            .ok_or_else(|| KpiError::validation(INCOMPLETE_MESSAGE))
    }

    /// Apply a partial update. Nothing changes unless every supplied field parses.
    pub fn apply(&mut self, patch: &TallyPatch) -> Result<(), KpiError> {
        let yes = patch
            .yes_count
            .as_ref()
            .map(|v| parse_count("yes_count", v))
            .transpose()?;
        let no = patch
            .no_count
            .as_ref()
            .map(|v| parse_count("no_count", v))
            .transpose()?;
        let target = patch
            .target_strike_rate
            .as_ref()
            .map(parse_target)
            .transpose()?;

        if let Some(yes) = yes {
            self.yes_count = yes;
        }
        if let Some(no) = no {
            self.no_count = no;
        }
        if let Some(target) = target {
            self.target_rate = target;
        }
        Ok(())
    }
}

/// Partial tally update. Absent fields are left alone; `null` or `""` clears one.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TallyPatch {
    #[serde(default, deserialize_with = "de::present")]
    pub yes_count: Option<Value>,

    #[serde(default, deserialize_with = "de::present")]
    pub no_count: Option<Value>,

    #[serde(default, deserialize_with = "de::present")]
    pub target_strike_rate: Option<Value>,
}

impl TallyPatch {
    /// Build a patch that sets every field, for callers that already hold a tally.
    pub fn from_tally(tally: &SignupTally) -> Self {
        Self {
            yes_count: Some(Value::from(tally.yes_count)),
            no_count: Some(Value::from(tally.no_count)),
            target_strike_rate: Some(Value::from(tally.target_rate)),
        }
    }
}

/// Numeric content of a form field. `Ok(None)` is an empty field.
fn field_number(field: &str, value: &Value) -> Result<Option<f64>, KpiError> {
    let number = match value {
        Value::Null => return Ok(None),
        Value::String(s) if s.trim().is_empty() => return Ok(None),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    };

    match number {
        Some(n) if n.is_finite() => Ok(Some(n)),
        _ => Err(KpiError::validation(format!("{field} must be a number"))),
    }
}

fn parse_count(field: &str, value: &Value) -> Result<Option<u32>, KpiError> {
    let Some(n) = field_number(field, value)? else {
        return Ok(None);
    };
    if n < 0.0 {
        return Err(KpiError::validation(format!("{field} cannot be negative")));
    }
    if n.fract() != 0.0 {
        return Err(KpiError::validation(format!("{field} must be a whole number")));
    }
    if n > u32::MAX as f64 {
        return Err(KpiError::validation(format!("{field} is too large")));
    }
    Ok(Some(n as u32))
}

fn parse_target(value: &Value) -> Result<Option<f64>, KpiError> {
    let Some(n) = field_number("target_strike_rate", value)? else {
        return Ok(None);
    };
    if !(0.0..=100.0).contains(&n) {
        return Err(KpiError::validation(
            "target_strike_rate must be between 0 and 100",
        ));
    }
    Ok(Some(n))
}
