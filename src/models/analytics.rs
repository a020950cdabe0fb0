use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Number;

use super::habit::{Goal, Habit, MonthRecord};

/// Report derived from a single month record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    pub summary: Summary,
    pub habit_performance: Vec<HabitPerformance>,
    pub daily_performance: Vec<DailyPerformance>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_habits: usize,
    pub active_habits: usize,
    pub monthly_progress: Number,
    pub success_rate: Number,
    pub current_streak: Number,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HabitPerformance {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Fraction of the goal reached, not a percentage.
    pub progress: f64,
    pub completions: u32,
    pub goal: Goal,
}

impl From<&Habit> for HabitPerformance {
    fn from(habit: &Habit) -> Self {
        Self {
            name: habit.name.clone(),
            progress: habit.progress(),
            completions: habit.completions(),
            goal: habit.goal(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyPerformance {
    /// One-based day of month.
    pub day: usize,
    pub completions: u32,
    pub efficiency: Option<Number>,
}

impl Analytics {
    /// Iterates `dailyTotals`; a day without a matching efficiency entry
    /// reports `null` and surplus efficiency entries are ignored.
    pub fn compute(record: &MonthRecord, generated_at: DateTime<Utc>) -> Self {
        let summary = Summary {
            total_habits: record.habits().len(),
            active_habits: record.active_habits(),
            monthly_progress: record.monthly_progress(),
            success_rate: record.success_rate(),
            current_streak: record.current_streak(),
        };

        let habit_performance = record.habits().iter().map(HabitPerformance::from).collect();

        let daily_performance = record
            .daily_totals()
            .iter()
            .enumerate()
            .map(|(index, &completions)| DailyPerformance {
                day: index + 1,
                completions,
                efficiency: record.daily_efficiency(index),
            })
            .collect();

        Self {
            summary,
            habit_performance,
            daily_performance,
            generated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn generated_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 1, 8, 0, 0).unwrap()
    }

    fn record(value: serde_json::Value) -> MonthRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_empty_record_defaults_to_zero() {
        let analytics = Analytics::compute(&MonthRecord::default(), generated_at());

        assert_eq!(analytics.summary.total_habits, 0);
        assert_eq!(analytics.summary.active_habits, 0);
        assert_eq!(analytics.summary.monthly_progress, Number::from(0));
        assert_eq!(analytics.summary.success_rate, Number::from(0));
        assert_eq!(analytics.summary.current_streak, Number::from(0));
        assert!(analytics.habit_performance.is_empty());
        assert!(analytics.daily_performance.is_empty());
        assert_eq!(analytics.generated_at, generated_at());
    }

    #[test]
    fn test_habit_performance_without_goal() {
        let analytics = Analytics::compute(
            &record(json!({"habits": [{"name": "Run", "totalCompletions": 10}]})),
            generated_at(),
        );

        let perf = &analytics.habit_performance[0];
        assert_eq!(perf.progress, 10.0 / 31.0);
        assert_eq!(perf.goal, Goal::Daily);
        assert_eq!(perf.completions, 10);

        let json = serde_json::to_value(&analytics).unwrap();
        assert_eq!(json["habitPerformance"][0]["goal"], json!("Daily"));
    }

    #[test]
    fn test_summary_counts_active_habits() {
        let analytics = Analytics::compute(
            &record(json!({
                "habits": [
                    {"name": "Run", "totalCompletions": 12, "targetGoal": 24},
                    {"name": "", "totalCompletions": 0},
                    {"totalCompletions": 0}
                ],
                "stats": {"monthlyProgress": 41.5, "successRate": 80, "currentStreak": 4}
            })),
            generated_at(),
        );

        assert_eq!(analytics.summary.total_habits, 3);
        assert_eq!(analytics.summary.active_habits, 1);
        assert_eq!(analytics.summary.success_rate, Number::from(80));
        assert_eq!(analytics.summary.current_streak, Number::from(4));
        assert_eq!(analytics.habit_performance[0].progress, 0.5);
        assert_eq!(analytics.habit_performance[0].goal, Goal::Target(24));

        let json = serde_json::to_value(&analytics).unwrap();
        assert_eq!(json["summary"]["monthlyProgress"], json!(41.5));
        assert!(json["habitPerformance"][2].get("name").is_none());
    }

    #[test]
    fn test_daily_performance_pairs_totals_with_efficiency() {
        let analytics = Analytics::compute(
            &record(json!({
                "stats": {"dailyTotals": [2, 0, 3], "dailyEfficiency": [0.5, 0, 0.75, 1.0]}
            })),
            generated_at(),
        );

        let days: Vec<usize> = analytics.daily_performance.iter().map(|d| d.day).collect();
        assert_eq!(days, vec![1, 2, 3]);
        assert_eq!(analytics.daily_performance[2].completions, 3);
        assert_eq!(analytics.daily_performance[2].efficiency, Number::from_f64(0.75));
    }

    #[test]
    fn test_short_efficiency_array_reports_null() {
        let analytics = Analytics::compute(
            &record(json!({"stats": {"dailyTotals": [1, 1, 1], "dailyEfficiency": [1]}})),
            generated_at(),
        );

        assert_eq!(analytics.daily_performance.len(), 3);
        assert_eq!(analytics.daily_performance[0].efficiency, Some(Number::from(1)));
        assert_eq!(analytics.daily_performance[1].efficiency, None);

        let json = serde_json::to_value(&analytics).unwrap();
        assert_eq!(json["dailyPerformance"][2]["efficiency"], json!(null));
    }
}
