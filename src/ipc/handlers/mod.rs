pub mod announcements;
pub mod calendar;
pub mod core;
pub mod courses;
pub mod curriculum;
pub mod pacing;
pub mod setup;
