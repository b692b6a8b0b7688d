pub(crate) mod enrollments;
pub(crate) mod exams;
pub(crate) mod grades;
pub(crate) mod health;
pub(crate) mod images;
pub(crate) mod pg_store;
pub(crate) mod questions;
pub(crate) mod schools;
pub(crate) mod slots;
pub(crate) mod store;
pub(crate) mod submissions;
pub(crate) mod teaching_sessions;

pub(crate) use pg_store::PgStore;
pub(crate) use store::{AttendanceStore, GradingStore};
