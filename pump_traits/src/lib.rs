pub mod clock;

pub use clock::{Clock, ManualClock, SystemClock, minute_of_day};
