//! 固定画布几何适配: wrap 填充、裁剪还原与向量化重排.

use crate::Idx2d;
use ndarray::{s, Array1, Array2, ArrayView2};

/// 网络输入画布, 包含目标高与目标宽.
///
/// 该画布是只读的. 若要修改画布参数, 你应该创建新的实例.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Canvas {
    height: usize,
    width: usize,
}

impl Canvas {
    /// 构建画布.
    ///
    /// `height` 和 `width` 必须均为正数, 否则返回 `None`.
    pub fn new(height: usize, width: usize) -> Option<Canvas> {
        if height > 0 && width > 0 {
            Some(Self { height, width })
        } else {
            None
        }
    }

    /// 构建分割网络的默认输入画布, 大小为
    /// [`UNET_CANVAS_HEIGHT`](crate::consts::UNET_CANVAS_HEIGHT) ×
    /// [`UNET_CANVAS_WIDTH`](crate::consts::UNET_CANVAS_WIDTH).
    #[inline]
    pub const fn unet() -> Canvas {
        Self {
            height: crate::consts::UNET_CANVAS_HEIGHT,
            width: crate::consts::UNET_CANVAS_WIDTH,
        }
    }

    /// 画布高.
    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// 画布宽.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// 画布形状 (高, 宽).
    #[inline]
    pub fn shape(&self) -> Idx2d {
        (self.height, self.width)
    }

    /// 画布像素个数.
    #[inline]
    pub fn size(&self) -> usize {
        self.height * self.width
    }

    /// 将 `slice` 以 wrap 方式填充到画布大小.
    ///
    /// 填充只发生在下方和右方: 新增区域从切片的对侧边缘循环取值,
    /// 原始内容始终占据画布左上角的原形状子块.
    ///
    /// # 注意
    ///
    /// `slice` 必须非空, 且两个方向均不大于画布, 否则程序 panic.
    pub fn pad_wrap<A: Clone>(&self, slice: ArrayView2<A>) -> Array2<A> {
        let (h, w) = (slice.nrows(), slice.ncols());
        assert!(h > 0 && w > 0, "空切片无法填充");
        assert!(
            h <= self.height && w <= self.width,
            "切片 ({h}, {w}) 超出画布 ({}, {})",
            self.height,
            self.width
        );

        Array2::from_shape_fn((self.height, self.width), |(i, j)| {
            slice[(i % h, j % w)].clone()
        })
    }
}

/// 从画布大小的 `padded` 中裁剪出左上角 `(h, w)` 子块, 即
/// [`Canvas::pad_wrap`] 在空间轴上的精确逆操作.
///
/// `(h, w)` 两个方向均不得超过 `padded` 自身大小, 否则程序 panic.
pub fn crop<A: Clone>(padded: ArrayView2<A>, (h, w): Idx2d) -> Array2<A> {
    assert!(
        h <= padded.nrows() && w <= padded.ncols(),
        "裁剪目标 ({h}, {w}) 超出图像 ({}, {})",
        padded.nrows(),
        padded.ncols()
    );
    padded.slice(s![..h, ..w]).to_owned()
}

/// 将二维切片按行优先顺序展开为一维向量.
pub fn flatten<A: Clone>(slice: ArrayView2<A>) -> Array1<A> {
    Array1::from_iter(slice.iter().cloned())
}

/// 将一维向量按行优先顺序重组为 `(h, w)` 的二维切片,
/// 即 [`flatten`] 的精确逆操作.
///
/// `v.len()` 必须等于 `h * w`, 否则程序 panic.
pub fn unflatten<A: Clone>(v: Array1<A>, (h, w): Idx2d) -> Array2<A> {
    assert_eq!(v.len(), h * w, "向量长度与目标形状不符");
    Array2::from_shape_vec((h, w), v.to_vec()).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_canvas_invalid_input() {
        assert!(Canvas::new(0, 8).is_none());
        assert!(Canvas::new(8, 0).is_none());
        assert_eq!(Canvas::unet().shape(), (256, 256));
    }

    #[test]
    fn test_pad_wrap_trailing_edges() {
        let s = array![[1, 2], [3, 4]];
        let c = Canvas::new(4, 5).unwrap();
        let p = c.pad_wrap(s.view());

        // 左上角子块原样保留.
        assert_eq!(p[(0, 0)], 1);
        assert_eq!(p[(1, 1)], 4);

        // 右侧填充从对侧 (左) 边缘循环取值.
        assert_eq!(p[(0, 2)], 1);
        assert_eq!(p[(0, 3)], 2);
        assert_eq!(p[(0, 4)], 1);

        // 下方填充从对侧 (上) 边缘循环取值.
        assert_eq!(p[(2, 0)], 1);
        assert_eq!(p[(3, 1)], 4);
        assert_eq!(p[(3, 4)], 3);
    }

    #[test]
    fn test_pad_identity_when_equal() {
        let s = array![[1.0f32, 2.0], [3.0, 4.0]];
        let c = Canvas::new(2, 2).unwrap();
        assert_eq!(c.pad_wrap(s.view()), s);
    }

    #[test]
    fn test_pad_then_crop_round_trip() {
        let s = array![[5u8, 6, 7], [8, 9, 10]];
        for (th, tw) in [(3, 3), (4, 8), (7, 3), (16, 16)] {
            let c = Canvas::new(th, tw).unwrap();
            let p = c.pad_wrap(s.view());
            assert_eq!(crop(p.view(), (2, 3)), s);
        }
    }

    #[test]
    #[should_panic(expected = "超出画布")]
    fn test_pad_rejects_oversized_slice() {
        let s = array![[1, 2, 3], [4, 5, 6]];
        Canvas::new(2, 2).unwrap().pad_wrap(s.view());
    }

    #[test]
    fn test_flatten_round_trip() {
        let s = array![[1, 2, 3], [4, 5, 6]];
        let v = flatten(s.view());
        assert_eq!(v.to_vec(), vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(unflatten(v, (2, 3)), s);
    }
}
