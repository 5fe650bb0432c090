pub mod care;
pub mod clock;
pub mod date;
pub mod dday;
pub mod error;
pub mod lunar;
pub mod model;
pub mod recurrence;
pub mod upcoming;

pub use dday::{DDay, DDayKind, dday_label};
pub use error::DateError;
pub use model::{Anniversary, CalendarType, Contact, ContactId, DailyPick, Ping, PingKind};
pub use recurrence::next_occurrence;
pub use upcoming::{UpcomingEvent, upcoming_events};
