use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Number, Value};

use super::habit::{Goal, Habit, KeyPart, MonthRecord};

/// Publicly addressable snapshot of one month's progress.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareRecord {
    pub user: String,
    /// Display label, `"{month} {year}"`.
    pub month: String,
    pub summary: ShareSummary,
    /// `null` unless details were requested.
    pub details: Option<ShareDetails>,
    pub shared_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareSummary {
    pub monthly_progress: Number,
    pub success_rate: Number,
    pub current_streak: Number,
    pub active_habits: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareDetails {
    pub habits: Vec<SharedHabit>,
    pub daily_stats: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SharedHabit {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Percentage of the goal reached.
    pub progress: f64,
    pub goal: Goal,
}

impl From<&Habit> for SharedHabit {
    fn from(habit: &Habit) -> Self {
        Self {
            name: habit.name.clone(),
            progress: habit.progress() * 100.0,
            goal: habit.goal(),
        }
    }
}

/// Arguments that select what a share contains.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareOptions {
    pub year: KeyPart,
    pub month: KeyPart,
    /// Any truthy value asks for details; `null`, `false`, `0` and `""` do not.
    #[serde(default, deserialize_with = "truthy")]
    pub include_details: bool,
}

fn truthy<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    })
}

impl ShareRecord {
    pub fn build(
        user: &str,
        options: &ShareOptions,
        record: &MonthRecord,
        shared_at: DateTime<Utc>,
    ) -> Self {
        let summary = ShareSummary {
            monthly_progress: record.monthly_progress(),
            success_rate: record.success_rate(),
            current_streak: record.current_streak(),
            active_habits: record.active_habits(),
        };

        let details = options.include_details.then(|| ShareDetails {
            habits: record.habits().iter().map(SharedHabit::from).collect(),
            daily_stats: record.daily_totals().to_vec(),
        });

        Self {
            user: user.to_string(),
            month: format!("{} {}", options.month, options.year),
            summary,
            details,
            shared_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn sample_record() -> MonthRecord {
        serde_json::from_value(json!({
            "habits": [
                {"name": "Run", "totalCompletions": 10},
                {"name": "Read", "totalCompletions": 15, "targetGoal": 20},
                {"name": ""}
            ],
            "stats": {"monthlyProgress": 60, "successRate": 55.5, "dailyTotals": [2, 1, 0]}
        }))
        .unwrap()
    }

    fn options(include_details: bool) -> ShareOptions {
        ShareOptions {
            year: KeyPart::Number(2024),
            month: KeyPart::Number(5),
            include_details,
        }
    }

    fn shared_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 31, 20, 0, 0).unwrap()
    }

    #[test]
    fn test_share_without_details() {
        let share = ShareRecord::build("alice", &options(false), &sample_record(), shared_at());

        assert_eq!(share.user, "alice");
        assert_eq!(share.month, "5 2024");
        assert_eq!(share.summary.active_habits, 2);
        assert_eq!(share.summary.current_streak, Number::from(0));
        assert!(share.details.is_none());

        let json = serde_json::to_value(&share).unwrap();
        assert_eq!(json["details"], json!(null));
        assert_eq!(json["summary"]["monthlyProgress"], json!(60));
    }

    #[test]
    fn test_share_with_details_uses_percentages() {
        let share = ShareRecord::build("alice", &options(true), &sample_record(), shared_at());
        let details = share.details.expect("details requested");

        assert_eq!(details.habits[0].progress, (10.0 / 31.0) * 100.0);
        assert_eq!(details.habits[0].goal, Goal::Daily);
        assert_eq!(details.habits[1].progress, 75.0);
        assert_eq!(details.habits[1].goal, Goal::Target(20));
        assert_eq!(details.daily_stats, vec![2, 1, 0]);
    }

    #[test]
    fn test_include_details_follows_truthiness() {
        let include = |value: serde_json::Value| -> bool {
            let options: ShareOptions =
                serde_json::from_value(json!({"year": 2024, "month": 5, "includeDetails": value}))
                    .unwrap();
            options.include_details
        };

        assert!(!include(json!(null)));
        assert!(!include(json!(false)));
        assert!(!include(json!(0)));
        assert!(!include(json!(0.0)));
        assert!(!include(json!("")));

        assert!(include(json!(true)));
        assert!(include(json!(1)));
        assert!(include(json!("yes")));
        assert!(include(json!([])));
        assert!(include(json!({})));
    }

    #[test]
    fn test_include_details_defaults_to_false() {
        let options: ShareOptions = serde_json::from_value(json!({"year": 2024, "month": 5})).unwrap();
        assert!(!options.include_details);
    }

    #[test]
    fn test_share_details_of_empty_record() {
        let share = ShareRecord::build("bob", &options(true), &MonthRecord::default(), shared_at());
        let details = share.details.unwrap();

        assert!(details.habits.is_empty());
        assert!(details.daily_stats.is_empty());
        assert_eq!(share.summary.monthly_progress, Number::from(0));
    }
}
