//! 后处理流程集合.

mod cleanup;
mod morph;

pub use cleanup::{clean_prediction, clean_truth, threshold_probability, CleanupParams};

pub use morph::{binary_dilate, binary_erode, remove_small_objects};
