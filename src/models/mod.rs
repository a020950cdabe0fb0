mod analytics;
mod habit;
mod share;
mod timestamp;

pub use analytics::{Analytics, DailyPerformance, HabitPerformance, Summary};
pub use habit::{
    Goal, Habit, HabitState, KeyPart, MonthKey, MonthRecord, MonthSnapshot, Stats,
    DEFAULT_MONTH_DAYS,
};
pub use share::{ShareDetails, ShareOptions, ShareRecord, ShareSummary, SharedHabit};
pub use timestamp::{CallerTimestamp, Clock, FixedClock, SystemClock, TimestampError};
