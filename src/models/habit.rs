use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Number, Value};
use std::fmt;

/// Divisor used when a habit has no target goal.
pub const DEFAULT_MONTH_DAYS: u32 = 31;

/// A year or month as sent by the client, either a number or a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyPart {
    Number(i64),
    Text(String),
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPart::Number(n) => write!(f, "{}", n),
            KeyPart::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for KeyPart {
    fn from(n: i64) -> Self {
        KeyPart::Number(n)
    }
}

impl From<&str> for KeyPart {
    fn from(s: &str) -> Self {
        KeyPart::Text(s.to_string())
    }
}

/// Document id of a month record: `"{year}-{month}"`, unpadded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MonthKey(String);

impl MonthKey {
    pub fn new(year: &KeyPart, month: &KeyPart) -> Self {
        Self(format!("{}-{}", year, month))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Client-side view state for a month. Only `year` and `month` are
/// interpreted; everything else is stored as sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HabitState {
    pub year: KeyPart,
    pub month: KeyPart,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl HabitState {
    pub fn new(year: impl Into<KeyPart>, month: impl Into<KeyPart>) -> Self {
        Self {
            year: year.into(),
            month: month.into(),
            extra: Map::new(),
        }
    }

    pub fn month_key(&self) -> MonthKey {
        MonthKey::new(&self.year, &self.month)
    }
}

/// Cadence a habit is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Goal {
    Target(u32),
    Daily,
}

impl Goal {
    pub fn divisor(self) -> u32 {
        match self {
            Goal::Target(goal) => goal,
            Goal::Daily => DEFAULT_MONTH_DAYS,
        }
    }
}

impl Serialize for Goal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Goal::Target(goal) => serializer.serialize_u32(*goal),
            Goal::Daily => serializer.serialize_str("Daily"),
        }
    }
}

/// A tracked habit. An empty or missing name marks an inactive slot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Habit {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_completions: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_goal: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Habit {
    pub fn new(name: impl Into<String>, total_completions: u32) -> Self {
        Self {
            name: Some(name.into()),
            total_completions: Some(total_completions),
            ..Default::default()
        }
    }

    pub fn with_target_goal(mut self, goal: u32) -> Self {
        self.target_goal = Some(goal);
        self
    }

    pub fn is_active(&self) -> bool {
        self.name.as_deref().is_some_and(|name| !name.is_empty())
    }

    pub fn completions(&self) -> u32 {
        self.total_completions.unwrap_or(0)
    }

    /// A target goal of zero counts as no goal.
    pub fn goal(&self) -> Goal {
        match self.target_goal {
            Some(goal) if goal > 0 => Goal::Target(goal),
            _ => Goal::Daily,
        }
    }

    /// Completions as a fraction of the goal.
    pub fn progress(&self) -> f64 {
        f64::from(self.completions()) / f64::from(self.goal().divisor())
    }
}

/// Derived monthly statistics, computed client-side and stored verbatim.
///
/// Numbers are kept as [`Number`] so integral and fractional values
/// round-trip exactly as sent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_progress: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_rate: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_streak: Option<Number>,
    /// Completions per day; index is day-of-month minus one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily_totals: Option<Vec<u32>>,
    /// Parallel to `daily_totals`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily_efficiency: Option<Vec<Option<Number>>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The `{habitState, habits, stats}` triple captured by a backup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthSnapshot {
    pub habit_state: HabitState,
    pub habits: Vec<Habit>,
    pub stats: Stats,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A stored month document. Every field is optional on read so that
/// partially written documents still yield defaults.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub habit_state: Option<HabitState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub habits: Option<Vec<Habit>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<Stats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restored_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MonthRecord {
    pub fn habits(&self) -> &[Habit] {
        self.habits.as_deref().unwrap_or_default()
    }

    pub fn active_habits(&self) -> usize {
        self.habits().iter().filter(|habit| habit.is_active()).count()
    }

    pub fn monthly_progress(&self) -> Number {
        self.stat(|stats| stats.monthly_progress.as_ref())
    }

    pub fn success_rate(&self) -> Number {
        self.stat(|stats| stats.success_rate.as_ref())
    }

    pub fn current_streak(&self) -> Number {
        self.stat(|stats| stats.current_streak.as_ref())
    }

    pub fn daily_totals(&self) -> &[u32] {
        self.stats
            .as_ref()
            .and_then(|stats| stats.daily_totals.as_deref())
            .unwrap_or_default()
    }

    /// Efficiency for a zero-based day index, `None` when missing or null.
    pub fn daily_efficiency(&self, index: usize) -> Option<Number> {
        self.stats
            .as_ref()
            .and_then(|stats| stats.daily_efficiency.as_ref())
            .and_then(|efficiency| efficiency.get(index))
            .cloned()
            .flatten()
    }

    fn stat(&self, field: impl Fn(&Stats) -> Option<&Number>) -> Number {
        self.stats
            .as_ref()
            .and_then(field)
            .cloned()
            .unwrap_or_else(|| Number::from(0))
    }
}
