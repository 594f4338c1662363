use super::assemble::SliceBatch;
use ndarray::{Array3, Ix3, OwnedRepr};
use ndarray_npy::{NpzReader, NpzWriter, ReadNpzError, WriteNpzError};
use std::fs::{File, OpenOptions};
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// 打开 `NpzArchive` 错误.
#[derive(Debug)]
pub enum OpenArchiveError {
    /// workers 太大. 最多支持 64.
    TooManyWorkers(u32),

    /// 打开 npz 文件错误.
    ReadNpzError(ReadNpzError),

    /// 其他底层 I/O 错误.
    IoError(std::io::Error),
}

/// 导出切片批错误.
#[derive(Debug)]
pub enum ExportError {
    /// 创建目标文件错误.
    IoError(std::io::Error),

    /// 写入 npz 归档错误.
    WriteNpzError(WriteNpzError),
}

/// Npz 文件归档.
///
/// 该结构可用于建模外部训练器写出的、按受试者组织的多个 3D
/// 概率体数据的压缩文件. 每个条目是一个 `(切片数, 画布高, 画布宽)`
/// 的 `f32` 数组.
pub struct NpzArchive {
    entries: Vec<Mutex<NpzReader<File>>>,
    turn: AtomicUsize,
}

impl NpzArchive {
    /// 初始化.
    ///
    /// `workers` 指定了底层工作通道的个数, 最大为 64. 系统会从路径 `p` 打开文件
    /// `workers` 次, 并为每个打开通道指定一个排他入口点 (以期获得更高的并行度).
    pub fn new<P: AsRef<Path>>(workers: NonZeroUsize, p: P) -> Result<Self, OpenArchiveError> {
        let workers = workers.get();
        if workers > 64 {
            return Err(OpenArchiveError::TooManyWorkers(64));
        }
        let mut v = Vec::with_capacity(workers);
        for _ in 0..workers {
            let file = OpenOptions::new()
                .read(true)
                .open(p.as_ref())
                .map_err(OpenArchiveError::IoError)?;
            v.push(Mutex::new(
                NpzReader::new(file).map_err(OpenArchiveError::ReadNpzError)?,
            ));
        }
        Ok(Self {
            entries: v,
            turn: AtomicUsize::new(0),
        })
    }

    /// 通过 npz 索引文件名 `name` 获取底层 3D 概率体数据.
    pub fn probability_by_name(&self, name: &str) -> Result<Array3<f32>, ReadNpzError> {
        let slot = self.next_slot();
        let mut file = self.entries[slot].lock().unwrap();
        file.by_name::<OwnedRepr<f32>, Ix3>(name)
    }

    /// 通过文件名 `{num}.npy` 获取底层 3D 概率体数据.
    pub fn probability_by_num_dot_npy(&self, num: u32) -> Result<Array3<f32>, ReadNpzError> {
        let slot = self.next_slot();
        let filename = format!("{num}.npy");
        let mut file = self.entries[slot].lock().unwrap();
        file.by_name::<OwnedRepr<f32>, Ix3>(filename.as_str())
    }

    /// 通过 npz 数值索引获取底层 3D 概率体数据.
    pub fn probability_by_index(&self, index: usize) -> Result<Array3<f32>, ReadNpzError> {
        let slot = self.next_slot();
        let mut file = self.entries[slot].lock().unwrap();
        file.by_index::<OwnedRepr<f32>, Ix3>(index)
    }

    /// 获取底层 npz 文件包含的所有文件名.
    pub fn names(&self) -> Result<Vec<String>, ReadNpzError> {
        let slot = self.next_slot();
        self.entries[slot].lock().unwrap().names()
    }

    /// 工作通道个数.
    #[inline]
    pub fn worker_len(&self) -> usize {
        self.entries.len()
    }

    /// 获取底层 npz 文件的 3D 概率体数据个数.
    pub fn len(&self) -> usize {
        let slot = self.next_slot();
        self.entries[slot].lock().unwrap().len()
    }

    /// 底层 npz 文件是否没有条目.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn next_slot(&self) -> usize {
        self.turn.fetch_add(1, Ordering::Relaxed) % self.worker_len()
    }
}

/// 将组装好的切片批写入 `path` 处的 npz 归档, 交给外部训练器.
///
/// 归档含两个条目: `data` 为 LGE 张量, `mask` 为掩膜张量,
/// 均为 `(N, H, W, 1)` 的 `f32` 数组.
pub fn export_slice_batch<P: AsRef<Path>>(path: P, batch: &SliceBatch) -> Result<(), ExportError> {
    let file = File::create(path.as_ref()).map_err(ExportError::IoError)?;
    let mut npz = NpzWriter::new(file);
    npz.add_array("data", batch.data())
        .map_err(ExportError::WriteNpzError)?;
    npz.add_array("mask", batch.masks())
        .map_err(ExportError::WriteNpzError)?;
    npz.finish().map_err(ExportError::WriteNpzError)?;
    Ok(())
}
