mod clock;

use chrono::{DateTime, SubsecRound, Utc};
pub use clock::{Clock, ManualClock, SystemClock};

/// Invoice timestamps carry one-second resolution.
pub fn truncate_to_seconds(t: DateTime<Utc>) -> DateTime<Utc> {
    t.trunc_subsecs(0)
}
