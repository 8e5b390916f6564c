use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(Role {
    Operator => "operator",
    Agronomist => "agronomist",
    Administrator => "administrator",
});

impl Role {
    /// Agronomists and administrators review diagnoses and author recommendations.
    pub fn is_elevated(&self) -> bool {
        matches!(self, Self::Agronomist | Self::Administrator)
    }
}

str_enum!(TaskStatus {
    Assigned => "assigned",
    InProgress => "in_progress",
    Closed => "closed",
});

impl TaskStatus {
    pub const INITIAL: TaskStatus = TaskStatus::Assigned;

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Exhaustive transition table. Closed has no outgoing edges and a
    /// status never transitions to itself.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        match (*self, next) {
            (Assigned, InProgress) | (Assigned, Closed) => true,
            (InProgress, Closed) | (InProgress, Assigned) => true,
            (Assigned, Assigned) | (InProgress, InProgress) => false,
            (Closed, _) => false,
        }
    }
}

str_enum!(RecommendationStatus {
    New => "new",
    InProgress => "in_progress",
    Completed => "completed",
});

impl RecommendationStatus {
    /// Recommendation workflow is driven by its bound task.
    pub fn mirroring(task: TaskStatus) -> Self {
        match task {
            TaskStatus::Assigned => Self::New,
            TaskStatus::InProgress => Self::InProgress,
            TaskStatus::Closed => Self::Completed,
        }
    }
}

str_enum!(AuditAction {
    Create => "CREATE",
    Update => "UPDATE",
    Delete => "DELETE",
});

str_enum!(TaskScope {
    Mine => "mine",
    All => "all",
});

str_enum!(TaskFilter {
    Pending => "pending",
    Overdue => "overdue",
    Closed => "closed",
    All => "all",
});
