//! 二值形态学基元.
//!
//! 膨胀与腐蚀均使用十字 (4-邻域) 结构元; 数组边界外被视为背景.
//! 小区域剔除使用 8-邻接连通规则. 这些连通度约定会直接影响评估指标,
//! 不可互换.

use crate::consts::gray::*;
use crate::data::slice::{MaskSlice, MaskSliceMut};
use crate::neigh;
use ndarray::{Array2, ArrayView2};

/// 以十字结构元做一次膨胀.
fn dilate_once(m: &ArrayView2<u8>) -> Array2<u8> {
    Array2::from_shape_fn(m.raw_dim(), |pos| {
        if is_foreground(m[pos]) {
            return MYO_FOREGROUND;
        }
        let touched = neigh::neighbour4(pos)
            .into_iter()
            .any(|p| m.get(p).is_some_and(|&v| is_foreground(v)));
        if touched {
            MYO_FOREGROUND
        } else {
            MYO_BACKGROUND
        }
    })
}

/// 以十字结构元做一次腐蚀. 边界外被视为背景, 因此贴边的前景一定被腐蚀掉.
fn erode_once(m: &ArrayView2<u8>) -> Array2<u8> {
    Array2::from_shape_fn(m.raw_dim(), |pos| {
        if is_background(m[pos]) {
            return MYO_BACKGROUND;
        }
        let surrounded = neigh::neighbour4(pos)
            .into_iter()
            .all(|p| m.get(p).is_some_and(|&v| is_foreground(v)));
        if surrounded {
            MYO_FOREGROUND
        } else {
            MYO_BACKGROUND
        }
    })
}

/// 二值膨胀 `iterations` 次.
pub fn binary_dilate(mask: ArrayView2<u8>, iterations: usize) -> Array2<u8> {
    let mut ans = mask.to_owned();
    for _ in 0..iterations {
        ans = dilate_once(&ans.view());
    }
    ans
}

/// 二值腐蚀 `iterations` 次.
pub fn binary_erode(mask: ArrayView2<u8>, iterations: usize) -> Array2<u8> {
    let mut ans = mask.to_owned();
    for _ in 0..iterations {
        ans = erode_once(&ans.view());
    }
    ans
}

/// 就地清除像素个数 **严格小于** `min_area` 的前景连通区域 (8-邻接).
///
/// `min_area` 为 0 时该操作是恒等变换.
pub fn remove_small_objects(mask: &mut Array2<u8>, min_area: usize) {
    if min_area == 0 {
        return;
    }
    let areas = MaskSlice::new(mask.view()).foreground_areas();

    let mut sli = MaskSliceMut::new(mask.view_mut());
    for area in areas.into_iter().filter(|a| a.len() < min_area) {
        sli.fill_batch(area, MYO_BACKGROUND);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_dilate_cross_kernel() {
        let m = array![
            [0u8, 0, 0, 0, 0],
            [0, 0, 0, 0, 0],
            [0, 0, 1, 0, 0],
            [0, 0, 0, 0, 0],
            [0, 0, 0, 0, 0],
        ];
        let d = binary_dilate(m.view(), 1);
        // 单点膨胀一次得到十字, 不含对角.
        let expected = array![
            [0u8, 0, 0, 0, 0],
            [0, 0, 1, 0, 0],
            [0, 1, 1, 1, 0],
            [0, 0, 1, 0, 0],
            [0, 0, 0, 0, 0],
        ];
        assert_eq!(d, expected);

        // 两次膨胀得到半径 2 的菱形, 共 13 个像素.
        let d2 = binary_dilate(m.view(), 2);
        assert_eq!(d2.iter().filter(|&&p| p == 1).count(), 13);
    }

    #[test]
    fn test_erode_inverts_dilate_on_interior() {
        let m = array![
            [0u8, 0, 0, 0, 0],
            [0, 0, 1, 0, 0],
            [0, 1, 1, 1, 0],
            [0, 0, 1, 0, 0],
            [0, 0, 0, 0, 0],
        ];
        let e = binary_erode(m.view(), 1);
        assert_eq!(e.iter().filter(|&&p| p == 1).count(), 1);
        assert_eq!(e[(2, 2)], 1);
    }

    #[test]
    fn test_erode_removes_border_foreground() {
        // 贴边前景被边界外背景腐蚀.
        let m = array![[1u8, 1], [1, 1]];
        let e = binary_erode(m.view(), 1);
        assert!(e.iter().all(|&p| p == 0));
    }

    #[test]
    fn test_erode_thin_bar_vanishes() {
        let m = array![
            [0u8, 0, 0, 0],
            [1, 1, 1, 1],
            [0, 0, 0, 0],
        ];
        let e = binary_erode(m.view(), 1);
        assert!(e.iter().all(|&p| p == 0));
    }

    #[test]
    fn test_zero_iterations_identity() {
        let m = array![[0u8, 1], [1, 0]];
        assert_eq!(binary_dilate(m.view(), 0), m);
        assert_eq!(binary_erode(m.view(), 0), m);
    }

    #[test]
    fn test_close_idempotent_on_stable_shape() {
        // 实心矩形在闭运算 (膨胀 + 腐蚀) 下形态稳定, 重复闭运算结果不变.
        // 细长或贴边的形状不具备该性质, 不要依赖闭运算的普遍幂等性.
        let mut m = ndarray::Array2::<u8>::zeros((8, 8));
        for h in 2..5 {
            for w in 2..6 {
                m[(h, w)] = 1;
            }
        }
        let once = binary_erode(binary_dilate(m.view(), 1).view(), 1);
        let twice = binary_erode(binary_dilate(once.view(), 1).view(), 1);
        assert_eq!(once, twice);
        assert_eq!(once, m);
    }

    #[test]
    fn test_remove_small_objects_strict_threshold() {
        // 区域 A: 4 像素; 区域 B: 1 像素.
        let mut m = array![
            [1u8, 1, 0, 0],
            [1, 1, 0, 1],
            [0, 0, 0, 0],
        ];
        remove_small_objects(&mut m, 4);
        // 恰好等于阈值的区域保留, 更小的被清除.
        assert_eq!(m[(0, 0)], 1);
        assert_eq!(m[(1, 3)], 0);

        let mut m2 = m.clone();
        remove_small_objects(&mut m2, 5);
        assert!(m2.iter().all(|&p| p == 0));
    }

    #[test]
    fn test_remove_small_objects_eight_connectivity() {
        // 对角相连的 2 像素在 8-邻接下是一个区域, 阈值 2 时保留.
        let mut m = array![
            [1u8, 0, 0],
            [0, 1, 0],
            [0, 0, 0],
        ];
        remove_small_objects(&mut m, 2);
        assert_eq!(m.iter().filter(|&&p| p == 1).count(), 2);
    }
}
