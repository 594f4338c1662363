//! xz 平面切片视图与其持久化.

mod core;
mod save;

pub use self::core::{
    CompactMaskSlice, MaskSlice, MaskSliceMut, OwnedMaskSlice, OwnedScanSlice, ScanSlice,
    ScanSliceMut,
};

pub use save::{ImgWriteRaw, ImgWriteVis};
