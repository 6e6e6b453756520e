pub mod builder;
pub mod line;

pub use builder::ScheduleBuilder;
pub use line::{status_for_due_date, ScheduleLine};
