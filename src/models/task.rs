use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{TaskFilter, TaskStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub recommendation_id: i64,
    pub operator_id: i64,
    pub description: String,
    pub status: TaskStatus,
    pub deadline: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Derived, never stored: open past its deadline.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.completed_at.is_none() && now > self.deadline
    }

    /// Closed no later than the deadline's calendar day, with days taken
    /// in `offset`. Overdue is instant-precise; on-time is day-precise.
    pub fn completed_on_time(&self, offset: FixedOffset) -> bool {
        let due = self.deadline.with_timezone(&offset).date_naive();
        self.status == TaskStatus::Closed
            && self
                .completed_at
                .is_some_and(|done| done.with_timezone(&offset).date_naive() <= due)
    }

    pub fn matches(&self, filter: TaskFilter, now: DateTime<Utc>) -> bool {
        match filter {
            TaskFilter::All => true,
            TaskFilter::Closed => self.status.is_terminal(),
            TaskFilter::Overdue => !self.status.is_terminal() && self.is_overdue(now),
            TaskFilter::Pending => !self.status.is_terminal() && !self.is_overdue(now),
        }
    }
}
