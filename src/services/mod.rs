pub(crate) mod ai_grading;
pub(crate) mod answer_key;
pub(crate) mod answer_segmenter;
pub(crate) mod attendance;
pub(crate) mod duration_rules;
pub(crate) mod geo;
pub(crate) mod photo_metadata;
pub(crate) mod session_validation;
pub(crate) mod slot_booking;
pub(crate) mod text_extraction;
