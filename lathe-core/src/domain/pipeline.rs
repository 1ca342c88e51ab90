//! Published pipeline and schedule domain types

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, ValidationError};

/// A pipeline published from a run, callable through its REST endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedPipeline {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub version: String,
    /// HTTP endpoint accepting `{"ExperimentName": ...}`
    pub endpoint: String,
    pub published_at: DateTime<Utc>,
}

/// Time-based trigger for a published pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub pipeline_id: Uuid,
    pub experiment: String,
    pub recurrence: Recurrence,
}

/// Recurrence unit of a schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frequency {
    Minute,
    Hour,
    Day,
    Week,
    Month,
}

/// When a schedule fires
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recurrence {
    pub frequency: Frequency,
    pub interval: u32,
    /// Only meaningful for weekly schedules (e.g. `["Monday"]`)
    #[serde(default)]
    pub week_days: Vec<String>,
    /// `HH:MM`, UTC
    pub time_of_day: Option<String>,
}

const WEEK_DAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

impl Recurrence {
    pub fn new(frequency: Frequency, interval: u32) -> Self {
        Self {
            frequency,
            interval,
            week_days: Vec::new(),
            time_of_day: None,
        }
    }

    /// Every `interval` weeks on the given days at `time_of_day`
    pub fn weekly(interval: u32, week_days: &[&str], time_of_day: &str) -> Self {
        Self {
            frequency: Frequency::Week,
            interval,
            week_days: week_days.iter().map(|d| d.to_string()).collect(),
            time_of_day: Some(time_of_day.to_string()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval == 0 {
            return Err(ValidationError::InvalidSchedule(
                "interval must be at least 1".to_string(),
            ));
        }

        if !self.week_days.is_empty() && self.frequency != Frequency::Week {
            return Err(ValidationError::InvalidSchedule(
                "week days require a weekly frequency".to_string(),
            ));
        }

        if let Some(day) = self.week_days.iter().find(|d| !WEEK_DAYS.contains(&d.as_str())) {
            return Err(ValidationError::InvalidSchedule(format!(
                "unknown week day '{day}'"
            )));
        }

        if let Some(time) = &self.time_of_day {
            NaiveTime::parse_from_str(time, "%H:%M").map_err(|_| {
                ValidationError::InvalidSchedule(format!("time of day '{time}' is not HH:MM"))
            })?;
        }

        Ok(())
    }
}
