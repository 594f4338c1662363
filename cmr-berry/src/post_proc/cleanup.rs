//! 预测/真值掩膜清理流水线.

use super::morph;
use crate::consts;
use crate::consts::gray::*;
use crate::data::canvas;
use crate::Idx2d;
use ndarray::{Array2, ArrayView2};

/// 掩膜清理参数.
///
/// 预测路径与真值路径的参数是 **有意非对称** 的
/// (膨胀迭代次数 3 对 2), 该非对称直接影响评估指标, 必须原样保留.
#[derive(Copy, Clone, Debug)]
pub struct CleanupParams {
    /// 概率图二值化阈值 (严格大于). 真值路径不读取该字段.
    pub prob_threshold: f32,

    /// 小连通区域剔除阈值 (像素个数, 严格小于被清除). 0 代表关闭该阶段.
    pub min_area: usize,

    /// 膨胀迭代次数.
    pub dilate_iters: usize,

    /// 腐蚀迭代次数.
    pub erode_iters: usize,
}

impl CleanupParams {
    /// 预测掩膜的清理参数: 阈值化 + 小区域剔除 + 膨胀 3 次 + 腐蚀 1 次.
    #[inline]
    pub const fn for_prediction() -> Self {
        Self {
            prob_threshold: consts::PROB_THRESHOLD,
            min_area: consts::SMALL_OBJECT_AREA,
            dilate_iters: consts::PRED_DILATE_ITERS,
            erode_iters: consts::ERODE_ITERS,
        }
    }

    /// 真值掩膜的清理参数: 膨胀 2 次 + 腐蚀 1 次.
    /// 真值本身已是二值掩膜, 不做阈值化与小区域剔除.
    #[inline]
    pub const fn for_truth() -> Self {
        Self {
            prob_threshold: consts::PROB_THRESHOLD,
            min_area: 0,
            dilate_iters: consts::TRUTH_DILATE_ITERS,
            erode_iters: consts::ERODE_ITERS,
        }
    }
}

/// 以 `thr` 为阈值 (严格大于) 将概率图二值化.
pub fn threshold_probability(prob: ArrayView2<f32>, thr: f32) -> Array2<u8> {
    prob.mapv(|p| if p > thr { MYO_FOREGROUND } else { MYO_BACKGROUND })
}

/// 形态学闭合 + 裁剪还原. 两条清理路径共用的收尾阶段.
fn close_and_crop(mask: Array2<u8>, params: &CleanupParams, orig: Idx2d) -> Array2<u8> {
    let mask = morph::binary_dilate(mask.view(), params.dilate_iters);
    let mask = morph::binary_erode(mask.view(), params.erode_iters);
    canvas::crop(mask.view(), orig)
}

/// 清理画布大小的预测概率图, 返回 `orig` 大小的二值掩膜.
///
/// 依次: 阈值化, 小区域剔除, 膨胀, 腐蚀, 裁剪到原始范围.
pub fn clean_prediction(
    prob: ArrayView2<f32>,
    orig: Idx2d,
    params: &CleanupParams,
) -> Array2<u8> {
    let mut seg = threshold_probability(prob, params.prob_threshold);
    morph::remove_small_objects(&mut seg, params.min_area);
    close_and_crop(seg, params, orig)
}

/// 清理画布大小的真值掩膜切片 (非零即前景), 返回 `orig` 大小的二值掩膜.
///
/// 依次: 膨胀, 腐蚀, 裁剪到原始范围. 无阈值化与小区域剔除阶段.
pub fn clean_truth(mask: ArrayView2<f32>, orig: Idx2d, params: &CleanupParams) -> Array2<u8> {
    let bin = mask.mapv(|p| if p != 0.0 { MYO_FOREGROUND } else { MYO_BACKGROUND });
    close_and_crop(bin, params, orig)
}
