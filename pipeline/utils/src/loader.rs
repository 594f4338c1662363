//! 对 `cmr_berry::dataset` 的更一层封装. 提供更直接的数据集定位与加载.

use cmr_berry::dataset::{CohortSplit, PairingError};
use std::env;
use std::path::PathBuf;

/// 获取 LGE 扫描目录.
///
/// 1. 若环境变量 `$LGE_CMR_DIR` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/lge`.
pub fn lge_dir_from_env_or_home() -> PathBuf {
    if let Ok(d) = env::var("LGE_CMR_DIR") {
        PathBuf::from(d)
    } else {
        cmr_berry::dataset::home_dataset_dir_with(["lge"]).unwrap()
    }
}

/// 获取心肌掩膜目录.
///
/// 1. 若环境变量 `$MYO_MASK_DIR` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/myo`.
pub fn myo_dir_from_env_or_home() -> PathBuf {
    if let Ok(d) = env::var("MYO_MASK_DIR") {
        PathBuf::from(d)
    } else {
        cmr_berry::dataset::home_dataset_dir_with(["myo"]).unwrap()
    }
}

/// 获取外部训练器回流的概率归档路径.
///
/// 1. 若环境变量 `$MYO_PRED_NPZ` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/pred_myo_xz.npz`.
pub fn predictions_path_from_env_or_home() -> PathBuf {
    if let Ok(p) = env::var("MYO_PRED_NPZ") {
        PathBuf::from(p)
    } else {
        cmr_berry::dataset::home_dataset_dir_with(["pred_myo_xz.npz"]).unwrap()
    }
}

/// 获取训练张量的移交归档路径.
///
/// 1. 若环境变量 `$MYO_TRAIN_NPZ` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/train_myo_xz.npz`.
pub fn export_path_from_env_or_home() -> PathBuf {
    if let Ok(p) = env::var("MYO_TRAIN_NPZ") {
        PathBuf::from(p)
    } else {
        cmr_berry::dataset::home_dataset_dir_with(["train_myo_xz.npz"]).unwrap()
    }
}

/// 从环境变量或主目录定位 LGE/掩膜目录, 并按固定方案切分队列.
#[inline]
pub fn cohort_from_env_or_home() -> Result<CohortSplit, PairingError> {
    CohortSplit::from_dirs(lge_dir_from_env_or_home(), myo_dir_from_env_or_home())
}
