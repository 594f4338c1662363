//! 逐切片强度归一化.

use ndarray::{Array2, ArrayView2};
use ordered_float::OrderedFloat;

use super::slice::{ScanSlice, ScanSliceMut};

/// 求 `vals` 的中位数. 偶数长度取中间两数的平均值 (与 numpy 约定一致).
///
/// `vals` 必须非空, 否则程序 panic.
pub(crate) fn median<T>(mut vals: Vec<T>) -> T
where
    T: num::Float,
    OrderedFloat<T>: Ord,
{
    assert!(!vals.is_empty(), "空序列没有中位数");
    vals.sort_unstable_by_key(|v| OrderedFloat(*v));

    let mid = vals.len() / 2;
    if vals.len() % 2 == 1 {
        vals[mid]
    } else {
        (vals[mid - 1] + vals[mid]) / (T::one() + T::one())
    }
}

/// 强度归一化器, 包含离群值阈值.
///
/// 该归一化器是只读的. 若要修改参数, 你应该创建新的实例.
///
/// 归一化按以下顺序对单个切片进行:
///
/// 1. 求 **裁剪前** 全切片强度中位数;
/// 2. 严格大于阈值的强度被替换为该中位数 (整体条件替换, 非逐像素循环);
/// 3. 以裁剪后切片自身的 min/max 做 min-max 缩放到 \[0, 1\].
///
/// # 退化情况
///
/// 若裁剪后 max == min (常数切片), 则输出全零切片. 该函数永不产生 NaN.
#[derive(Copy, Clone, Debug)]
pub struct ClipNormalizer {
    clip_threshold: f32,
}

impl ClipNormalizer {
    /// 构建归一化器.
    ///
    /// `clip_threshold` 必须是有限正数, 否则返回 `None`.
    pub fn new(clip_threshold: f32) -> Option<ClipNormalizer> {
        if clip_threshold.is_finite() && clip_threshold > 0.0 {
            Some(Self { clip_threshold })
        } else {
            None
        }
    }

    /// 构建一个适用于 LGE 扫描的归一化器. 离群值阈值为
    /// [`crate::consts::CLIP_THRESHOLD`].
    #[inline]
    pub const fn from_lge_default() -> ClipNormalizer {
        Self {
            clip_threshold: crate::consts::CLIP_THRESHOLD,
        }
    }

    /// 离群值阈值.
    #[inline]
    pub fn clip_threshold(&self) -> f32 {
        self.clip_threshold
    }

    /// 归一化一个切片, 返回新数据. 输入切片必须非空, 否则程序 panic.
    #[inline]
    pub fn normalize(&self, slice: ScanSlice) -> Array2<f32> {
        self.normalize_view(slice.data())
    }

    /// 就地归一化一个可变切片.
    pub fn normalize_into(&self, slice: &mut ScanSliceMut) {
        let out = self.normalize_view(slice.data());
        slice.assign(&out);
    }

    /// 实际归一化逻辑.
    fn normalize_view(&self, v: ArrayView2<f32>) -> Array2<f32> {
        assert_ne!(v.len(), 0, "空切片无法归一化");

        let med = median(v.iter().copied().collect());
        let clipped = v.mapv(|p| if p > self.clip_threshold { med } else { p });

        let min = clipped.iter().copied().fold(f32::INFINITY, f32::min);
        let max = clipped.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        if max == min {
            return Array2::zeros(clipped.raw_dim());
        }
        clipped.mapv(|p| (p - min) / (max - min))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn norm1000() -> ClipNormalizer {
        ClipNormalizer::new(1000.0).unwrap()
    }

    #[test]
    fn test_invalid_threshold() {
        assert!(ClipNormalizer::new(0.0).is_none());
        assert!(ClipNormalizer::new(-1.0).is_none());
        assert!(ClipNormalizer::new(f32::NAN).is_none());
        assert!(ClipNormalizer::new(f32::INFINITY).is_none());
        assert_eq!(
            ClipNormalizer::from_lge_default().clip_threshold(),
            crate::consts::CLIP_THRESHOLD
        );
    }

    #[test]
    fn test_median_rule() {
        assert_eq!(median(vec![3.0f32, 1.0, 2.0]), 2.0);
        // 偶数长度取中间两数平均.
        assert_eq!(median(vec![0.0f32, 500.0, 2000.0, 1000.0]), 750.0);
    }

    #[test]
    fn test_outlier_replaced_by_preclip_median() {
        let s = array![[0.0f32, 500.0], [2000.0, 1000.0]];
        let out = norm1000().normalize_view(s.view());
        // 裁剪前中位数 750, 2000 被替换, 随后 min 0 / max 1000 缩放.
        assert_eq!(out, array![[0.0, 0.5], [0.75, 1.0]]);
    }

    #[test]
    fn test_output_within_unit_interval() {
        let s = array![[-3.0f32, 7.5, 1500.0], [999.0, 4.0, 0.0]];
        let out = norm1000().normalize_view(s.view());
        assert!(out.iter().all(|v| (0.0..=1.0).contains(v)));
        assert!(out.iter().any(|v| *v == 0.0));
        assert!(out.iter().any(|v| *v == 1.0));
    }

    #[test]
    fn test_constant_slice_yields_zeros() {
        // 全 1000 的切片不触发裁剪, max == min, 按退化策略输出全零.
        let s = array![[1000.0f32; 3]; 3];
        let out = norm1000().normalize_view(s.view());
        assert!(out.iter().all(|v| *v == 0.0));

        // 全部超过阈值时, 所有值都被同一个中位数替换, 同样退化为全零.
        let s = array![[2000.0f32; 2]; 2];
        let out = norm1000().normalize_view(s.view());
        assert!(out.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_normalize_into_matches_normalize() {
        let orig = array![[1.0f32, 2.0], [3.0, 4.0]];
        let mut m = orig.clone();
        let expected = norm1000().normalize_view(orig.view());

        let mut sli = ScanSliceMut::new(m.view_mut());
        norm1000().normalize_into(&mut sli);
        assert_eq!(m, expected);
    }
}
