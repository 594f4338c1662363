//! 数据集操作.

use once_cell::sync::Lazy;
use std::path::{Path, PathBuf};

pub mod assemble;
pub mod cohort;
mod npz_database;

pub use assemble::{assemble_cohort, assemble_subject, AssembleMode, SliceBatch};
pub use cohort::{paired_listing, CmrDataLoader, CohortSplit, PairingError};
pub use npz_database::{export_slice_batch, ExportError, NpzArchive, OpenArchiveError};

/// 用户主目录. 进程生命周期内不会变化, 只解析一次.
static HOME_DIR: Lazy<Option<PathBuf>> = Lazy::new(dirs::home_dir);

/// 获取 `{用户主目录}/dataset` 目录.
pub fn home_dataset_dir() -> Option<PathBuf> {
    let mut ans = HOME_DIR.clone()?;
    ans.push("dataset");
    Some(ans)
}

/// 获取 `{用户主目录}/dataset` 目录下给定继续项组成的全路径.
pub fn home_dataset_dir_with<P: AsRef<Path>, I: IntoIterator<Item = P>>(it: I) -> Option<PathBuf> {
    let mut ans = home_dataset_dir()?;
    ans.extend(it);
    Some(ans)
}
