pub(crate) mod batch;
pub(crate) mod grading;
pub(crate) mod maintenance;
pub(crate) mod ocr_queue;
pub(crate) mod scheduler;
