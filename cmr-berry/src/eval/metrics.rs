//! 逐切片重叠指标.

use crate::consts::gray::*;
use ndarray::ArrayView2;

/// 像素级混淆矩阵.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Confusion {
    /// 真阳性: 预测前景, 真值前景.
    pub true_pos: usize,

    /// 真阴性: 预测背景, 真值背景.
    pub true_neg: usize,

    /// 假阳性: 预测前景, 真值背景.
    pub false_pos: usize,

    /// 假阴性: 预测背景, 真值前景.
    pub false_neg: usize,
}

impl Confusion {
    /// 从两个二值掩膜统计混淆矩阵. 掩膜先按行优先展开, 再逐像素对比.
    ///
    /// 两个掩膜形状必须一致, 否则程序 panic.
    pub fn from_masks(pred: ArrayView2<u8>, truth: ArrayView2<u8>) -> Self {
        assert_eq!(pred.shape(), truth.shape(), "预测与真值掩膜形状不符");

        let mut ans = Self::default();
        for (&p, &t) in pred.iter().zip(truth.iter()) {
            match (is_foreground(p), is_foreground(t)) {
                (true, true) => ans.true_pos += 1,
                (true, false) => ans.false_pos += 1,
                (false, true) => ans.false_neg += 1,
                (false, false) => ans.true_neg += 1,
            }
        }
        ans
    }

    /// 像素总个数.
    #[inline]
    pub fn total(&self) -> usize {
        self.true_pos + self.true_neg + self.false_pos + self.false_neg
    }
}

/// 四项评估指标的一组取值, 均为 \[0, 1\] 内的分数.
///
/// 该结构在三个聚合层次上复用: 单张切片, 单个受试者 (切片均值),
/// 以及队列统计量.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Metrics {
    /// macro 平均 Dice/F1.
    pub dice: f64,

    /// 像素准确率.
    pub accuracy: f64,

    /// macro 平均精确率.
    pub precision: f64,

    /// macro 平均召回率.
    pub recall: f64,
}

/// 带 0/0 策略的比值.
///
/// 分母为 0 时: 若该类别在预测与真值中均不存在 (无可找也无所找),
/// 记满分 1.0; 否则记 0.0. 该策略保证任何切片都不会产生 NaN 污染聚合.
#[inline]
fn safe_ratio(num: usize, den: usize, class_absent: bool) -> f64 {
    if den == 0 {
        if class_absent {
            1.0
        } else {
            0.0
        }
    } else {
        num as f64 / den as f64
    }
}

/// 精确率与召回率的调和平均. 两者皆为 0 时记 0.0.
#[inline]
fn harmonic(p: f64, r: f64) -> f64 {
    if p + r == 0.0 {
        0.0
    } else {
        2.0 * p * r / (p + r)
    }
}

impl Metrics {
    /// 从混淆矩阵计算指标.
    ///
    /// Dice/精确率/召回率均为 macro 平均: 前景与背景两个类别分别计算后
    /// 等权平均, 与类别频数无关. 由于心肌前景是少数类,
    /// macro 平均会明显抬高表观得分; 这是刻意保留的口径, 不得 "改进".
    ///
    /// 混淆矩阵必须至少含一个像素, 否则程序 panic.
    pub fn from_confusion(c: &Confusion) -> Self {
        assert_ne!(c.total(), 0, "空混淆矩阵无法计算指标");

        let accuracy = (c.true_pos + c.true_neg) as f64 / c.total() as f64;

        // 前景类: 正类为心肌.
        let fg_absent = c.true_pos + c.false_pos + c.false_neg == 0;
        let fg_prec = safe_ratio(c.true_pos, c.true_pos + c.false_pos, fg_absent);
        let fg_rec = safe_ratio(c.true_pos, c.true_pos + c.false_neg, fg_absent);

        // 背景类: 正类为背景, 混淆矩阵角色互换.
        let bg_absent = c.true_neg + c.false_neg + c.false_pos == 0;
        let bg_prec = safe_ratio(c.true_neg, c.true_neg + c.false_neg, bg_absent);
        let bg_rec = safe_ratio(c.true_neg, c.true_neg + c.false_pos, bg_absent);

        Self {
            dice: (harmonic(fg_prec, fg_rec) + harmonic(bg_prec, bg_rec)) / 2.0,
            accuracy,
            precision: (fg_prec + bg_prec) / 2.0,
            recall: (fg_rec + bg_rec) / 2.0,
        }
    }

    /// 从两个二值掩膜直接计算指标.
    ///
    /// 两个掩膜形状必须一致且非空, 否则程序 panic.
    #[inline]
    pub fn from_masks(pred: ArrayView2<u8>, truth: ArrayView2<u8>) -> Self {
        Self::from_confusion(&Confusion::from_masks(pred, truth))
    }
}

/// 经典 (仅前景) Dice 系数: `2|A∩B| / (|A| + |B|)`.
///
/// 这是分割网络训练损失所用的重叠度量. 两掩膜均为空时记 1.0.
pub fn dice_coefficient(a: ArrayView2<u8>, b: ArrayView2<u8>) -> f64 {
    assert_eq!(a.shape(), b.shape(), "掩膜形状不符");

    let mut inter = 0usize;
    let mut card = 0usize;
    for (&p, &t) in a.iter().zip(b.iter()) {
        let (p, t) = (is_foreground(p), is_foreground(t));
        inter += usize::from(p && t);
        card += usize::from(p) + usize::from(t);
    }
    if card == 0 {
        1.0
    } else {
        2.0 * inter as f64 / card as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_identical_masks_are_perfect() {
        let m = array![[0u8, 1, 0], [1, 1, 0]];
        let s = Metrics::from_masks(m.view(), m.view());
        assert!(close(s.dice, 1.0));
        assert!(close(s.accuracy, 1.0));
        assert!(close(s.precision, 1.0));
        assert!(close(s.recall, 1.0));

        assert!(close(dice_coefficient(m.view(), m.view()), 1.0));
    }

    #[test]
    fn test_disjoint_masks_dice_zero() {
        let a = array![[1u8, 0], [0, 0]];
        let b = array![[0u8, 0], [0, 1]];
        assert!(close(dice_coefficient(a.view(), b.view()), 0.0));

        // macro 口径下背景类仍有部分重叠, 前景 F1 为 0.
        let s = Metrics::from_masks(a.view(), b.view());
        assert!(s.dice > 0.0 && s.dice < 1.0);
    }

    #[test]
    fn test_all_background_pair_is_perfect() {
        // 双方均无前景: 按 0/0 策略记满分, 不产生 NaN.
        let z = array![[0u8; 4]; 4];
        let s = Metrics::from_masks(z.view(), z.view());
        assert!(close(s.dice, 1.0));
        assert!(close(s.accuracy, 1.0));
        assert!(close(s.precision, 1.0));
        assert!(close(s.recall, 1.0));
    }

    #[test]
    fn test_foreground_only_in_truth() {
        // 预测全背景但真值有前景: 前景精确率分母为 0, 记 0 而不是 NaN.
        let pred = array![[0u8, 0], [0, 0]];
        let truth = array![[1u8, 0], [0, 0]];
        let s = Metrics::from_masks(pred.view(), truth.view());
        assert!(!s.dice.is_nan() && !s.precision.is_nan() && !s.recall.is_nan());
        assert!(s.precision < 1.0);
    }

    #[test]
    fn test_hand_computed_macro_scores() {
        // 混淆矩阵: tp=2, fp=1, fn=1, tn=4.
        let pred = array![[1u8, 1, 1, 0], [0, 0, 0, 0]];
        let truth = array![[1u8, 1, 0, 1], [0, 0, 0, 0]];
        let c = Confusion::from_masks(pred.view(), truth.view());
        assert_eq!(
            c,
            Confusion {
                true_pos: 2,
                true_neg: 4,
                false_pos: 1,
                false_neg: 1
            }
        );

        let s = Metrics::from_confusion(&c);
        // 前景: P = R = 2/3, F1 = 2/3. 背景: P = R = 4/5, F1 = 4/5.
        assert!(close(s.precision, (2.0 / 3.0 + 4.0 / 5.0) / 2.0));
        assert!(close(s.recall, (2.0 / 3.0 + 4.0 / 5.0) / 2.0));
        assert!(close(s.dice, (2.0 / 3.0 + 4.0 / 5.0) / 2.0));
        assert!(close(s.accuracy, 6.0 / 8.0));
    }
}
