use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use thiserror::Error;

use crate::core::GoalConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invalid month format. Expected YYYY-MM")]
pub struct InvalidMonth;

/// Calendar month in `YYYY-MM` form. Orders chronologically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Month(String);

impl Month {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Month {
    type Err = InvalidMonth;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let bytes = raw.as_bytes();
        if bytes.len() != 7 || bytes[4] != b'-' {
            return Err(InvalidMonth);
        }
        let (year, month) = (&bytes[..4], &bytes[5..]);
        if !year.iter().chain(month).all(u8::is_ascii_digit) {
            return Err(InvalidMonth);
        }
        let month_number = (month[0] - b'0') * 10 + (month[1] - b'0');
        if !(1..=12).contains(&month_number) {
            return Err(InvalidMonth);
        }
        Ok(Self(raw.to_string()))
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckIn {
    pub user_id: String,
    pub month: Month,
    pub corpus_value: f64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    goals: DashMap<String, GoalConfig>,
    check_ins: DashMap<String, BTreeMap<Month, CheckIn>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save_goal(&self, user_id: &str, goal: GoalConfig) -> GoalConfig {
        self.goals.insert(user_id.to_string(), goal.clone());
        goal
    }

    pub fn load_goal(&self, user_id: &str) -> Option<GoalConfig> {
        self.goals.get(user_id).map(|goal| goal.clone())
    }

    pub fn save_check_in(&self, user_id: &str, month: Month, corpus_value: f64) -> CheckIn {
        let check_in = CheckIn {
            user_id: user_id.to_string(),
            month: month.clone(),
            corpus_value,
            updated_at: Utc::now(),
        };
        self.check_ins
            .entry(user_id.to_string())
            .or_default()
            .insert(month, check_in.clone());
        check_in
    }

    pub fn latest_check_in(&self, user_id: &str) -> Option<CheckIn> {
        self.check_ins
            .get(user_id)
            .and_then(|months| months.values().next_back().cloned())
    }

    pub fn check_in_history(&self, user_id: &str) -> Vec<CheckIn> {
        self.check_ins
            .get(user_id)
            .map(|months| months.values().rev().cloned().collect())
            .unwrap_or_default()
    }
}
