use chrono::{DateTime, Utc};

/// Source of the current time, used for timestamps and image names.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}
