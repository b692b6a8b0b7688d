pub(crate) mod analytics;
pub(crate) mod attendance;
pub(crate) mod errors;
pub(crate) mod guards;
pub(crate) mod handlers;
pub(crate) mod jobs;
pub(crate) mod router;
