//! 队列数据加载.
//!
//! 提供迭代器风格的数据集获取模式. LGE 扫描与心肌掩膜分别位于两个目录中,
//! 配对按 **排序后的目录列表位置** 进行, 文件名内容不参与配对.
//!
//! # 注意
//!
//! 位置配对是一个脆弱的前置约定: 两个目录必须含有相同个数的文件,
//! 且排序后第 `i` 个扫描必须对应第 `i` 个掩膜. 个数不符会在配对时报错,
//! 但顺序错乱无法被检测.

use crate::consts::{TEST_SUBJECT_LEN, TRAIN_SUBJECT_LEN};
use crate::{CmrData3d, OpenDataError};
use itertools::Itertools;
use std::fs;
use std::path::{Path, PathBuf};

/// 目录配对错误.
#[derive(Debug)]
pub enum PairingError {
    /// 给定路径不是目录.
    NotADirectory(PathBuf),

    /// 底层 I/O 错误.
    IoError(std::io::Error),

    /// 两个目录的文件个数不同. 两个分量依次为 LGE 目录与掩膜目录的文件数.
    LengthMismatch(usize, usize),

    /// 配对成功, 但受试者个数不足以按固定方案切分训练/测试集.
    /// 两个分量依次为实际个数与需要个数.
    TooFewSubjects(usize, usize),
}

/// 获取 `dir` 下所有普通文件, 按路径字典序排序.
fn sorted_files(dir: &Path) -> Result<Vec<PathBuf>, PairingError> {
    if !dir.is_dir() {
        return Err(PairingError::NotADirectory(dir.to_owned()));
    }
    let entries: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(PairingError::IoError)?
        .map(|e| e.map(|e| e.path()))
        .collect::<Result<_, _>>()
        .map_err(PairingError::IoError)?;

    Ok(entries.into_iter().filter(|p| p.is_file()).sorted().collect())
}

/// 将 LGE 目录与掩膜目录排序后按位置配对.
///
/// 两个目录的文件个数必须相同, 否则返回 [`PairingError::LengthMismatch`].
pub fn paired_listing<P: AsRef<Path>>(
    lge_dir: P,
    myo_dir: P,
) -> Result<Vec<(PathBuf, PathBuf)>, PairingError> {
    let lge = sorted_files(lge_dir.as_ref())?;
    let myo = sorted_files(myo_dir.as_ref())?;
    if lge.len() != myo.len() {
        return Err(PairingError::LengthMismatch(lge.len(), myo.len()));
    }
    Ok(lge.into_iter().zip(myo).collect())
}

/// 3D LGE 数据集 (扫描 + 掩膜) 加载器.
#[derive(Debug)]
pub struct CmrDataLoader {
    pairs_rev: Vec<(u32, PathBuf, PathBuf)>,
}

impl Iterator for CmrDataLoader {
    type Item = (u32, Result<CmrData3d, OpenDataError>);

    fn next(&mut self) -> Option<Self::Item> {
        let (idx, scan_path, mask_path) = self.pairs_rev.pop()?;
        let data = CmrData3d::open(&scan_path, &mask_path);
        Some((idx, data))
    }
}

impl ExactSizeIterator for CmrDataLoader {
    #[inline]
    fn len(&self) -> usize {
        self.pairs_rev.len()
    }
}

/// 按固定方案切分好的受试者队列.
///
/// 前 [`TRAIN_SUBJECT_LEN`] 个受试者为训练集, 紧随其后的
/// [`TEST_SUBJECT_LEN`] 个受试者为测试集.
#[derive(Debug)]
pub struct CohortSplit {
    pairs: Vec<(PathBuf, PathBuf)>,
}

impl CohortSplit {
    /// 从 LGE 目录与掩膜目录构建队列.
    ///
    /// 受试者个数必须不少于训练集与测试集之和, 否则返回
    /// [`PairingError::TooFewSubjects`].
    pub fn from_dirs<P: AsRef<Path>>(lge_dir: P, myo_dir: P) -> Result<Self, PairingError> {
        let pairs = paired_listing(lge_dir, myo_dir)?;
        let need = (TRAIN_SUBJECT_LEN + TEST_SUBJECT_LEN) as usize;
        if pairs.len() < need {
            return Err(PairingError::TooFewSubjects(pairs.len(), need));
        }
        Ok(Self { pairs })
    }

    /// 队列受试者总个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// 队列是否为空.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// 从指定索引创建数据加载器.
    ///
    /// `data` 的所有取值必须小于 `self.len()`, 否则程序 panic.
    pub fn loader<I: IntoIterator<Item = u32>>(&self, data: I) -> CmrDataLoader {
        let mut pairs: Vec<_> = data
            .into_iter()
            .map(|idx| {
                let (scan, mask) = &self.pairs[idx as usize];
                (idx, scan.clone(), mask.clone())
            })
            .collect();
        pairs.reverse();

        CmrDataLoader { pairs_rev: pairs }
    }

    /// 获取训练集加载器. 按配对顺序迭代前 [`TRAIN_SUBJECT_LEN`] 个受试者.
    #[inline]
    pub fn train_loader(&self) -> CmrDataLoader {
        self.loader(0..TRAIN_SUBJECT_LEN)
    }

    /// 获取测试集加载器. 按配对顺序迭代训练集之后的
    /// [`TEST_SUBJECT_LEN`] 个受试者.
    #[inline]
    pub fn test_loader(&self) -> CmrDataLoader {
        self.loader(TRAIN_SUBJECT_LEN..TRAIN_SUBJECT_LEN + TEST_SUBJECT_LEN)
    }
}
