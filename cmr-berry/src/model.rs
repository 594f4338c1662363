//! 分割网络外部协作者接口.
//!
//! 网络内部层图与权重优化均不在本库范围内: 本库只定义网络的输入输出契约
//! (固定画布的单通道切片进, 同尺寸概率图出) 和训练超参数清单.
//! 实际训练由外部实现完成, 张量通过 npz 归档交换.

use crate::data::Canvas;
use crate::dataset::{export_slice_batch, SliceBatch};
use crate::Idx2d;
use ndarray::{Array2, Array4, ArrayView2};
use std::path::{Path, PathBuf};

/// 外部分割模型的运行时错误.
#[derive(Debug, Clone)]
pub enum ModelError {
    /// 外部后端失败, 携带其自述信息.
    Backend(String),

    /// 输入切片形状与网络画布不符.
    /// 两个分量依次为期望形状与实际形状.
    CanvasMismatch(Idx2d, Idx2d),
}

/// 分割网络结构与训练超参数清单.
///
/// 这是一份参数列表而非算法: 修改它不会改变本库的任何行为,
/// 只会改变交给外部训练器的配置.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UnetConfig {
    /// 网络输入画布.
    pub canvas: Canvas,

    /// 第一层卷积通道数, 每次下采样翻倍.
    pub filter_width: u32,

    /// 批大小.
    pub batch_size: usize,

    /// 训练轮数.
    pub epochs: usize,

    /// 验证集比例.
    pub validation_split: f32,

    /// 瓶颈层 dropout 比例.
    pub dropout: f32,

    /// 最优权重存盘文件名.
    pub checkpoint: String,
}

impl Default for UnetConfig {
    fn default() -> Self {
        Self {
            canvas: Canvas::unet(),
            filter_width: crate::consts::UNET_FILTER_WIDTH,
            batch_size: 10,
            epochs: 70,
            validation_split: 0.2,
            dropout: 0.5,
            checkpoint: "segment_myo_xz.hdf5".to_string(),
        }
    }
}

/// 一次完成的训练调用的不透明记录.
#[derive(Debug, Clone)]
pub struct TrainOutcome {
    /// 最优权重 (或移交张量) 的落盘路径.
    pub artifact: PathBuf,

    /// 外部训练器报告的最终损失 (若有).
    pub final_loss: Option<f64>,
}

/// 分割网络推理接口.
pub trait SegmentationModel {
    /// 对单张已归一化、已填充到画布的切片做推理,
    /// 返回同尺寸的逐像素概率图 (取值位于 \[0, 1\]).
    fn predict(&self, slice: ArrayView2<f32>) -> Result<Array2<f32>, ModelError>;

    /// 对 `(N, H, W, 1)` 批量数据逐切片推理, 返回同形状概率张量.
    fn predict_batch(&self, data: &Array4<f32>) -> Result<Array4<f32>, ModelError> {
        let &[n, h, w, _] = data.shape() else {
            unreachable!()
        };
        let mut buf = Vec::with_capacity(n * h * w);
        for k in 0..n {
            let sli = data
                .index_axis(ndarray::Axis(0), k)
                .index_axis_move(ndarray::Axis(2), 0);
            let prob = self.predict(sli)?;
            buf.extend(prob.iter().copied());
        }
        // 缓冲按形状写入, 该操作不会生成 `Err`, 可直接 unwrap.
        Ok(Array4::from_shape_vec((n, h, w, 1), buf).unwrap())
    }
}

/// 分割网络训练接口.
pub trait ModelTrainer {
    /// 以 `config` 为超参数, 在 `batch` 上训练, 返回训练记录.
    fn train(&mut self, batch: &SliceBatch, config: &UnetConfig) -> Result<TrainOutcome, ModelError>;
}

/// 把训练张量移交给外部训练器的 "训练器".
///
/// `train` 调用只负责校验形状并将张量写入 npz 归档;
/// 实际的权重优化在外部进行, 其产物再以概率归档形式回流
/// (见 [`crate::dataset::NpzArchive`]).
#[derive(Debug, Clone)]
pub struct NpzHandoff {
    out: PathBuf,
}

impl NpzHandoff {
    /// 创建移交器. `out` 为张量归档的落盘路径.
    pub fn new<P: AsRef<Path>>(out: P) -> Self {
        Self {
            out: out.as_ref().to_owned(),
        }
    }

    /// 张量归档的落盘路径.
    #[inline]
    pub fn out_path(&self) -> &Path {
        &self.out
    }
}

impl ModelTrainer for NpzHandoff {
    fn train(&mut self, batch: &SliceBatch, config: &UnetConfig) -> Result<TrainOutcome, ModelError> {
        if batch.canvas_shape() != config.canvas.shape() {
            return Err(ModelError::CanvasMismatch(
                config.canvas.shape(),
                batch.canvas_shape(),
            ));
        }
        export_slice_batch(&self.out, batch)
            .map_err(|e| ModelError::Backend(format!("npz 导出失败: {e:?}")))?;

        log::info!("训练张量已写入 {} ({} 对切片)", self.out.display(), batch.len());
        Ok(TrainOutcome {
            artifact: self.out.clone(),
            final_loss: None,
        })
    }
}
