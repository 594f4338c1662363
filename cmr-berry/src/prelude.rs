//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx2d, Idx3d};

pub use crate::data::slice::{
    ImgWriteRaw, ImgWriteVis, MaskSlice, MaskSliceMut, OwnedMaskSlice, OwnedScanSlice, ScanSlice,
    ScanSliceMut,
};
pub use crate::data::{Canvas, ClipNormalizer, CmrData3d, CmrMask, CmrScan, NiftiHeaderAttr};

pub use crate::consts::gray::{MYO_BACKGROUND, MYO_FOREGROUND};
pub use crate::consts::{TEST_SUBJECT_LEN, TRAIN_SUBJECT_LEN};

pub use crate::dataset::{self, home_dataset_dir_with, AssembleMode, CohortSplit, SliceBatch};

pub use crate::eval::{CohortSummary, EvalParams, Metrics};
pub use crate::post_proc::CleanupParams;
