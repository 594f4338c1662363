//! 评估流程: 推理 → 掩膜清理 → 指标聚合.

mod aggregate;
mod metrics;

pub use aggregate::{mean_of, CohortSummary};
pub use metrics::{dice_coefficient, Confusion, Metrics};

use crate::data::{Canvas, ClipNormalizer, CmrData3d, NiftiHeaderAttr, OpenDataError};
use crate::dataset::{assemble_subject, AssembleMode, SliceBatch};
use crate::model::{ModelError, SegmentationModel};
use crate::post_proc::{clean_prediction, clean_truth, CleanupParams};
use crate::Idx2d;
use ndarray::{Array3, ArrayView3, Axis};

/// 评估流程错误.
#[derive(Debug)]
pub enum EvalError {
    /// 受试者数据加载失败.
    Open(OpenDataError),

    /// 外部模型推理失败.
    Model(ModelError),

    /// 概率体数据的切片个数与受试者切片个数不符.
    /// 两个分量依次为期望个数与实际个数.
    MapCount(usize, usize),

    /// 概率图的平面形状与画布不符. 两个分量依次为期望形状与实际形状.
    MapExtent(Idx2d, Idx2d),

    /// 受试者不含任何切片, 无法评估.
    EmptySubject,

    /// 队列不含任何受试者, 无法汇总.
    EmptyCohort,
}

impl From<OpenDataError> for EvalError {
    #[inline]
    fn from(e: OpenDataError) -> Self {
        Self::Open(e)
    }
}

impl From<ModelError> for EvalError {
    #[inline]
    fn from(e: ModelError) -> Self {
        Self::Model(e)
    }
}

/// 预测与真值两条清理路径的参数组.
#[derive(Copy, Clone, Debug)]
pub struct EvalParams {
    /// 预测掩膜清理参数.
    pub pred: CleanupParams,

    /// 真值掩膜清理参数.
    pub truth: CleanupParams,
}

impl Default for EvalParams {
    #[inline]
    fn default() -> Self {
        Self {
            pred: CleanupParams::for_prediction(),
            truth: CleanupParams::for_truth(),
        }
    }
}

/// 单个受试者的评估结果.
#[derive(Debug, Clone)]
pub struct SubjectEval {
    /// 受试者得分: 全部切片得分的均值.
    pub score: Metrics,

    /// 每张切片的得分, 按切片索引升序.
    pub slice_scores: Vec<Metrics>,

    /// 清理后的预测掩膜体数据, 切片优先格式, 与原始体数据同形状.
    pub pred_volume: Array3<u8>,

    /// 清理后的真值掩膜体数据, 切片优先格式, 与原始体数据同形状.
    pub truth_volume: Array3<u8>,
}

/// 共用的打分内核: 给定评估批与画布大小的概率体数据, 逐切片清理并打分.
fn score_with_maps(
    data: &CmrData3d,
    batch: &SliceBatch,
    maps: ArrayView3<f32>,
    canvas: Canvas,
    params: &EvalParams,
) -> Result<SubjectEval, EvalError> {
    let y = data.len_slices();
    debug_assert_eq!(batch.len(), y);

    if maps.shape()[0] != y {
        return Err(EvalError::MapCount(y, maps.shape()[0]));
    }
    let extent = (maps.shape()[1], maps.shape()[2]);
    if extent != canvas.shape() {
        return Err(EvalError::MapExtent(canvas.shape(), extent));
    }
    if y == 0 {
        return Err(EvalError::EmptySubject);
    }

    let (x, z) = data.scan.slice_shape();
    let mut pred_volume = Array3::<u8>::zeros((y, x, z));
    let mut truth_volume = Array3::<u8>::zeros((y, x, z));
    let mut slice_scores = Vec::with_capacity(y);

    for k in 0..y {
        let seg = clean_prediction(maps.index_axis(Axis(0), k), (x, z), &params.pred);
        let truth = clean_truth(batch.mask_slice(k), (x, z), &params.truth);

        slice_scores.push(Metrics::from_masks(seg.view(), truth.view()));
        pred_volume.index_axis_mut(Axis(0), k).assign(&seg);
        truth_volume.index_axis_mut(Axis(0), k).assign(&truth);
    }

    Ok(SubjectEval {
        score: mean_of(&slice_scores),
        slice_scores,
        pred_volume,
        truth_volume,
    })
}

/// 以外部已生成的概率体数据评估单个受试者.
///
/// `maps` 为 `(切片数, 画布高, 画布宽)` 的概率体数据,
/// 通常来自 [`crate::dataset::NpzArchive`].
pub fn evaluate_subject_with_maps(
    data: &CmrData3d,
    maps: ArrayView3<f32>,
    norm: &ClipNormalizer,
    canvas: Canvas,
    params: &EvalParams,
) -> Result<SubjectEval, EvalError> {
    let batch = assemble_subject(data, norm, canvas, AssembleMode::Eval);
    score_with_maps(data, &batch, maps, canvas, params)
}

/// 以在线推理模型评估单个受试者.
///
/// 逐切片调用 `model.predict`, 其余流程与
/// [`evaluate_subject_with_maps`] 一致.
pub fn evaluate_subject(
    data: &CmrData3d,
    model: &dyn SegmentationModel,
    norm: &ClipNormalizer,
    canvas: Canvas,
    params: &EvalParams,
) -> Result<SubjectEval, EvalError> {
    let batch = assemble_subject(data, norm, canvas, AssembleMode::Eval);
    let (h, w) = canvas.shape();

    let mut maps = Array3::<f32>::zeros((batch.len(), h, w));
    for k in 0..batch.len() {
        let prob = model.predict(batch.data_slice(k))?;
        let &[ph, pw] = prob.shape() else {
            unreachable!()
        };
        if (ph, pw) != (h, w) {
            return Err(EvalError::MapExtent((h, w), (ph, pw)));
        }
        maps.index_axis_mut(Axis(0), k).assign(&prob);
    }
    score_with_maps(data, &batch, maps.view(), canvas, params)
}

/// 评估整个队列.
///
/// `maps_for` 以受试者索引换取概率体数据; `on_subject`
/// 在每个受试者评估完成后被调用一次, 可用于保留或导出中间结果.
/// 任一受试者失败时立即返回 `Err`, 不会静默跳过.
pub fn evaluate_cohort<L, M, F>(
    loader: L,
    mut maps_for: M,
    norm: &ClipNormalizer,
    canvas: Canvas,
    params: &EvalParams,
    mut on_subject: F,
) -> Result<CohortSummary, EvalError>
where
    L: IntoIterator<Item = (u32, Result<CmrData3d, OpenDataError>)>,
    M: FnMut(u32) -> Result<Array3<f32>, EvalError>,
    F: FnMut(u32, &SubjectEval),
{
    let mut scores = Vec::new();
    for (idx, data) in loader {
        let data = data?;
        let maps = maps_for(idx)?;
        let ev = evaluate_subject_with_maps(&data, maps.view(), norm, canvas, params)?;

        log::info!(
            "受试者 {idx}: {} 张切片, 像素 {:.2} mm², DI {:.2}",
            ev.slice_scores.len(),
            data.scan.slice_pixel(),
            ev.score.dice * 100.0
        );
        on_subject(idx, &ev);
        scores.push(ev.score);
    }
    CohortSummary::from_subject_scores(&scores).ok_or(EvalError::EmptyCohort)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelError, SegmentationModel};
    use crate::{CmrMask, CmrScan};
    use ndarray::{Array2, Array3, ArrayView2};

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    /// 小画布评估参数: 关闭小区域剔除, 其余与缺省口径一致.
    fn tiny_params() -> EvalParams {
        let mut p = EvalParams::default();
        p.pred.min_area = 0;
        p
    }

    /// 全前景掩膜的受试者. 闭合运算后预测与真值收敛到同一形状.
    fn saturated_subject() -> CmrData3d {
        let scan = Array3::<f32>::ones((2, 4, 4));
        let mask = Array3::<u8>::ones((2, 4, 4));
        CmrData3d::pair(
            CmrScan::fake(scan, [1.0, 1.0, 1.0]),
            CmrMask::fake(mask, [1.0, 1.0, 1.0]),
        )
        .unwrap()
    }

    #[test]
    fn test_saturated_subject_scores_perfect() {
        let subject = saturated_subject();
        let canvas = Canvas::new(6, 6).unwrap();
        let norm = ClipNormalizer::from_lge_default();

        // 概率体数据与真值完全一致 (全 1.0).
        let maps = Array3::<f32>::ones((2, 6, 6));
        let ev = evaluate_subject_with_maps(&subject, maps.view(), &norm, canvas, &tiny_params())
            .unwrap();

        assert_eq!(ev.slice_scores.len(), 2);
        assert!(close(ev.score.dice, 1.0));
        assert!(close(ev.score.accuracy, 1.0));
        assert_eq!(ev.pred_volume, ev.truth_volume);
        assert_eq!(ev.pred_volume.shape(), &[2, 4, 4]);
    }

    #[test]
    fn test_asymmetric_cleanup_separates_volumes() {
        // 单点前景: 预测路径多一次膨胀, 清理后两个体数据不同.
        let scan = Array3::<f32>::zeros((1, 10, 10));
        let mut mask = Array3::<u8>::zeros((1, 10, 10));
        mask[(0, 5, 5)] = 1;
        let subject = CmrData3d::pair(
            CmrScan::fake(scan, [1.0, 1.0, 1.0]),
            CmrMask::fake(mask, [1.0, 1.0, 1.0]),
        )
        .unwrap();

        let canvas = Canvas::new(12, 12).unwrap();
        let norm = ClipNormalizer::from_lge_default();
        let mut maps = Array3::<f32>::zeros((1, 12, 12));
        maps[(0, 5, 5)] = 1.0;

        let ev = evaluate_subject_with_maps(&subject, maps.view(), &norm, canvas, &tiny_params())
            .unwrap();
        assert_ne!(ev.pred_volume, ev.truth_volume);
        assert!(ev.score.dice < 1.0);
    }

    #[test]
    fn test_map_count_mismatch() {
        let subject = saturated_subject();
        let canvas = Canvas::new(6, 6).unwrap();
        let norm = ClipNormalizer::from_lge_default();
        let maps = Array3::<f32>::ones((3, 6, 6));

        assert!(matches!(
            evaluate_subject_with_maps(&subject, maps.view(), &norm, canvas, &tiny_params()),
            Err(EvalError::MapCount(2, 3))
        ));
    }

    #[test]
    fn test_map_extent_mismatch() {
        let subject = saturated_subject();
        let canvas = Canvas::new(6, 6).unwrap();
        let norm = ClipNormalizer::from_lge_default();
        let maps = Array3::<f32>::ones((2, 5, 6));

        assert!(matches!(
            evaluate_subject_with_maps(&subject, maps.view(), &norm, canvas, &tiny_params()),
            Err(EvalError::MapExtent((6, 6), (5, 6)))
        ));
    }

    /// 把归一化切片直接当概率图的测试模型.
    struct Identity;

    impl SegmentationModel for Identity {
        fn predict(&self, slice: ArrayView2<f32>) -> Result<Array2<f32>, ModelError> {
            Ok(slice.to_owned())
        }
    }

    #[test]
    fn test_model_path_matches_maps_path() {
        let subject = saturated_subject();
        let canvas = Canvas::new(6, 6).unwrap();
        let norm = ClipNormalizer::from_lge_default();
        let params = tiny_params();

        // 常数扫描归一化后全零, 与全零概率体数据给出相同的结果.
        let by_model = evaluate_subject(&subject, &Identity, &norm, canvas, &params).unwrap();
        let maps = Array3::<f32>::zeros((2, 6, 6));
        let by_maps =
            evaluate_subject_with_maps(&subject, maps.view(), &norm, canvas, &params).unwrap();

        assert_eq!(by_model.pred_volume, by_maps.pred_volume);
        assert!(close(by_model.score.dice, by_maps.score.dice));
    }

    #[test]
    fn test_cohort_two_level_aggregation() {
        let canvas = Canvas::new(6, 6).unwrap();
        let norm = ClipNormalizer::from_lge_default();
        let loader = vec![
            (0u32, Ok(saturated_subject())),
            (1, Ok(saturated_subject())),
        ];

        let mut seen = Vec::new();
        let summary = evaluate_cohort(
            loader,
            |_| Ok(Array3::<f32>::ones((2, 6, 6))),
            &norm,
            canvas,
            &tiny_params(),
            |idx, ev| seen.push((idx, ev.slice_scores.len())),
        )
        .unwrap();

        assert_eq!(summary.subjects, 2);
        assert_eq!(seen, vec![(0, 2), (1, 2)]);
        assert!(close(summary.mean.dice, 1.0));
        assert!(close(summary.median.dice, 1.0));
        assert!(close(summary.std.dice, 0.0));
    }

    #[test]
    fn test_cohort_fails_fast_on_bad_subject() {
        let canvas = Canvas::new(6, 6).unwrap();
        let norm = ClipNormalizer::from_lge_default();
        let loader = vec![(
            0u32,
            Err(crate::OpenDataError::ShapeMismatch((1, 1, 1), (2, 2, 2))),
        )];

        assert!(matches!(
            evaluate_cohort(
                loader,
                |_| Ok(Array3::<f32>::zeros((1, 6, 6))),
                &norm,
                canvas,
                &tiny_params(),
                |_, _| {},
            ),
            Err(EvalError::Open(_))
        ));
    }
}
