//! 训练/评估张量组装.
//!
//! 训练阶段与测试阶段共用同一条 "归一化 + 填充 + 堆叠" 流水线,
//! 仅以 [`AssembleMode`] 区分是否丢弃空掩膜切片.

use crate::data::{canvas, Canvas, ClipNormalizer, CmrData3d};
use crate::{CmrMask, CmrScan, OpenDataError};
use either::Either;
use ndarray::{Array4, ArrayView2, Axis};

/// 张量组装模式.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AssembleMode {
    /// 训练模式: 丢弃掩膜全为背景的切片对.
    Train,

    /// 评估模式: 保留所有切片对.
    Eval,
}

impl AssembleMode {
    /// 该模式是否保留空掩膜切片?
    #[inline]
    pub fn keeps_empty_masks(&self) -> bool {
        matches!(self, Self::Eval)
    }
}

/// 一批已归一化、已填充的 (LGE, 掩膜) 切片对, 以 `(N, H, W, 1)`
/// 4D 张量形式存储.
///
/// 不变式: 两个张量第 0 维长度相同, 即包含的切片对个数.
#[derive(Debug, Clone)]
pub struct SliceBatch {
    data: Array4<f32>,
    masks: Array4<f32>,
}

impl SliceBatch {
    /// 从行优先平铺缓冲直接构建. `n` 为切片对个数.
    fn from_flat(data: Vec<f32>, masks: Vec<f32>, canvas: Canvas, n: usize) -> Self {
        let (h, w) = canvas.shape();

        // 缓冲由组装循环按形状写入, 该操作不会生成 `Err`, 可直接 unwrap.
        let data = Array4::from_shape_vec((n, h, w, 1), data).unwrap();
        let masks = Array4::from_shape_vec((n, h, w, 1), masks).unwrap();
        debug_assert_eq!(data.shape()[0], masks.shape()[0]);

        Self { data, masks }
    }

    /// 批内切片对个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.shape()[0]
    }

    /// 该批是否为空.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 画布高与宽.
    #[inline]
    pub fn canvas_shape(&self) -> crate::Idx2d {
        (self.data.shape()[1], self.data.shape()[2])
    }

    /// LGE 数据张量, `(N, H, W, 1)`.
    #[inline]
    pub fn data(&self) -> &Array4<f32> {
        &self.data
    }

    /// 掩膜张量, `(N, H, W, 1)`.
    #[inline]
    pub fn masks(&self) -> &Array4<f32> {
        &self.masks
    }

    /// 获取第 `k` 对切片的 LGE 部分, 压缩掉通道维.
    ///
    /// 当 `k` 越界时 panic.
    #[inline]
    pub fn data_slice(&self, k: usize) -> ArrayView2<f32> {
        self.data.index_axis(Axis(0), k).index_axis_move(Axis(2), 0)
    }

    /// 获取第 `k` 对切片的掩膜部分, 压缩掉通道维.
    ///
    /// 当 `k` 越界时 panic.
    #[inline]
    pub fn mask_slice(&self, k: usize) -> ArrayView2<f32> {
        self.masks.index_axis(Axis(0), k).index_axis_move(Axis(2), 0)
    }
}

/// 将一个受试者的切片对归一化、填充并写入平铺缓冲.
/// 返回写入的切片对个数.
fn assemble_into(
    scan: &CmrScan,
    mask: &CmrMask,
    norm: &ClipNormalizer,
    canvas: Canvas,
    mode: AssembleMode,
    data_buf: &mut Vec<f32>,
    mask_buf: &mut Vec<f32>,
) -> usize {
    let it = scan.slice_iter().zip(mask.slice_iter());
    let it = if mode.keeps_empty_masks() {
        Either::Left(it)
    } else {
        Either::Right(it.filter(|(_, m)| m.has_myocardium()))
    };

    let mut n = 0usize;
    for (scan_sli, mask_sli) in it {
        let lge = canvas.pad_wrap(norm.normalize(scan_sli).view());
        let myo = canvas.pad_wrap(mask_sli.array_view());

        data_buf.extend(canvas::flatten(lge.view()).iter().copied());
        mask_buf.extend(canvas::flatten(myo.view()).iter().map(|&p| f32::from(p)));
        n += 1;
    }
    n
}

/// 组装单个受试者的切片批.
///
/// 对切片轴上的每个索引: 归一化 LGE 切片, 将 LGE 与掩膜切片均 wrap
/// 填充到画布; 训练模式下丢弃掩膜全为背景的切片对. 切片按索引升序堆叠.
pub fn assemble_subject(
    data: &CmrData3d,
    norm: &ClipNormalizer,
    canvas: Canvas,
    mode: AssembleMode,
) -> SliceBatch {
    let mut data_buf = Vec::with_capacity(data.len_slices() * canvas.size());
    let mut mask_buf = Vec::with_capacity(data.len_slices() * canvas.size());

    let n = assemble_into(
        &data.scan, &data.mask, norm, canvas, mode, &mut data_buf, &mut mask_buf,
    );
    SliceBatch::from_flat(data_buf, mask_buf, canvas, n)
}

/// 组装整个队列的切片批. 切片对先按受试者顺序、再按受试者内切片顺序堆叠.
///
/// 任一受试者加载失败时立即返回 `Err`, 不会静默跳过.
pub fn assemble_cohort<L>(
    loader: L,
    norm: &ClipNormalizer,
    canvas: Canvas,
    mode: AssembleMode,
) -> Result<SliceBatch, OpenDataError>
where
    L: IntoIterator<Item = (u32, Result<CmrData3d, OpenDataError>)>,
{
    let mut data_buf = Vec::new();
    let mut mask_buf = Vec::new();
    let mut n = 0usize;

    for (idx, data) in loader {
        let data = data?;
        let local = assemble_into(
            &data.scan, &data.mask, norm, canvas, mode, &mut data_buf, &mut mask_buf,
        );
        log::debug!("受试者 {idx}: 纳入 {local}/{} 对切片", data.len_slices());
        n += local;
    }
    Ok(SliceBatch::from_flat(data_buf, mask_buf, canvas, n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array3, Array4};

    fn norm() -> ClipNormalizer {
        ClipNormalizer::from_lge_default()
    }

    /// 构造一个 4×4×4 体数据, 每层含一个已知的 2×2 前景块.
    fn block_subject() -> CmrData3d {
        let mut scan = Array3::<f32>::zeros((4, 4, 4));
        scan.iter_mut().enumerate().for_each(|(i, v)| *v = i as f32);

        let mut mask = Array3::<u8>::zeros((4, 4, 4));
        for y in 0..4 {
            for (h, w) in [(1, 1), (1, 2), (2, 1), (2, 2)] {
                mask[(y, h, w)] = 1;
            }
        }
        CmrData3d::pair(
            CmrScan::fake(scan, [1.0, 1.0, 1.0]),
            CmrMask::fake(mask, [1.0, 1.0, 1.0]),
        )
        .unwrap()
    }

    /// 与 `block_subject` 相同的扫描, 但掩膜全空.
    fn empty_subject() -> CmrData3d {
        let scan = Array3::<f32>::ones((4, 4, 4));
        let mask = Array3::<u8>::zeros((4, 4, 4));
        CmrData3d::pair(
            CmrScan::fake(scan, [1.0, 1.0, 1.0]),
            CmrMask::fake(mask, [1.0, 1.0, 1.0]),
        )
        .unwrap()
    }

    #[test]
    fn test_all_foreground_slices_kept_in_train() {
        let c = Canvas::new(8, 8).unwrap();
        let batch = assemble_subject(&block_subject(), &norm(), c, AssembleMode::Train);

        assert_eq!(batch.len(), 4);
        assert_eq!(batch.data().shape(), &[4, 8, 8, 1]);
        assert_eq!(batch.masks().shape(), &[4, 8, 8, 1]);
    }

    #[test]
    fn test_empty_masks_dropped_in_train_kept_in_eval() {
        let c = Canvas::new(8, 8).unwrap();
        let subject = empty_subject();

        let train = assemble_subject(&subject, &norm(), c, AssembleMode::Train);
        assert!(train.is_empty());

        let eval = assemble_subject(&subject, &norm(), c, AssembleMode::Eval);
        assert_eq!(eval.len(), 4);
    }

    #[test]
    fn test_train_mode_never_contains_empty_mask() {
        // 混合受试者: 第 0, 2 层有前景, 第 1, 3 层无.
        let scan = Array3::<f32>::ones((4, 3, 3));
        let mut mask = Array3::<u8>::zeros((4, 3, 3));
        mask[(0, 1, 1)] = 1;
        mask[(2, 0, 2)] = 1;
        let subject = CmrData3d::pair(
            CmrScan::fake(scan, [1.0, 1.0, 1.0]),
            CmrMask::fake(mask, [1.0, 1.0, 1.0]),
        )
        .unwrap();

        let c = Canvas::new(4, 4).unwrap();
        let batch = assemble_subject(&subject, &norm(), c, AssembleMode::Train);
        assert_eq!(batch.len(), 2);
        for k in 0..batch.len() {
            assert!(batch.mask_slice(k).iter().any(|&p| p != 0.0));
        }

        let eval = assemble_subject(&subject, &norm(), c, AssembleMode::Eval);
        assert_eq!(eval.len(), 4);
    }

    #[test]
    fn test_values_normalized_and_masks_binary() {
        let c = Canvas::new(8, 8).unwrap();
        let batch = assemble_subject(&block_subject(), &norm(), c, AssembleMode::Eval);

        assert!(batch.data().iter().all(|v| (0.0..=1.0).contains(v)));
        assert!(batch.masks().iter().all(|&v| v == 0.0 || v == 1.0));

        // 前景块被 wrap 填充保留在左上角子块中.
        let m0 = batch.mask_slice(0);
        assert_eq!(m0[(1, 1)], 1.0);
        assert_eq!(m0[(2, 2)], 1.0);
        assert_eq!(m0[(0, 0)], 0.0);
    }

    #[test]
    fn test_cohort_concatenates_in_subject_order() {
        let c = Canvas::new(8, 8).unwrap();
        let loader = vec![(0, Ok(block_subject())), (1, Ok(empty_subject()))];
        let batch = assemble_cohort(loader, &norm(), c, AssembleMode::Eval).unwrap();
        assert_eq!(batch.len(), 8);

        let train_loader = vec![(0, Ok(block_subject())), (1, Ok(empty_subject()))];
        let train = assemble_cohort(train_loader, &norm(), c, AssembleMode::Train).unwrap();
        assert_eq!(train.len(), 4);
    }

    #[test]
    fn test_empty_batch_shape() {
        let b = SliceBatch::from_flat(vec![], vec![], Canvas::new(8, 8).unwrap(), 0);
        assert!(b.is_empty());
        assert_eq!(b.data(), &Array4::<f32>::zeros((0, 8, 8, 1)));
    }
}
