//! 通用常量. 流水线所有的固定参数都在这里命名, 不允许散落的魔法数字.

/// 单通道颜色.
pub mod gray {
    /// 心肌掩膜中, 背景的像素值.
    pub const MYO_BACKGROUND: u8 = 0;

    /// 心肌掩膜中, 心肌 (前景) 的像素值.
    pub const MYO_FOREGROUND: u8 = 1;

    /// 单通道黑色.
    pub const BLACK: u8 = 0b_0000_0000;

    /// 单通道白色.
    pub const WHITE: u8 = 0b_1111_1111;

    /// 像素是否是心肌前景?
    #[inline]
    pub const fn is_foreground(p: u8) -> bool {
        !is_background(p)
    }

    /// 像素是否是背景?
    #[inline]
    pub const fn is_background(p: u8) -> bool {
        matches!(p, MYO_BACKGROUND)
    }
}

/// 网络输入画布高度 (x 方向像素数).
pub const UNET_CANVAS_HEIGHT: usize = 256;

/// 网络输入画布宽度 (z 方向像素数).
pub const UNET_CANVAS_WIDTH: usize = 256;

/// 网络第一层卷积通道数.
pub const UNET_FILTER_WIDTH: u32 = 32;

/// 强度离群值阈值. 严格大于该值的体素被替换为全切片中位数.
pub const CLIP_THRESHOLD: f32 = 1000.0;

/// 概率图二值化阈值.
pub const PROB_THRESHOLD: f32 = 0.5;

/// 小连通区域剔除阈值. 像素数严格小于该值的前景连通区域被清除.
pub const SMALL_OBJECT_AREA: usize = 100;

/// 预测掩膜清理时的膨胀迭代次数.
pub const PRED_DILATE_ITERS: usize = 3;

/// 真值掩膜清理时的膨胀迭代次数.
///
/// 与 [`PRED_DILATE_ITERS`] 的非对称是有意为之, 两者不可互换,
/// 否则评估指标不可比.
pub const TRUTH_DILATE_ITERS: usize = 2;

/// 掩膜清理时的腐蚀迭代次数 (预测与真值共用).
pub const ERODE_ITERS: usize = 1;

/// 队列中训练集受试者个数 (按配对顺序取前 18 个).
pub const TRAIN_SUBJECT_LEN: u32 = 18;

/// 队列中测试集受试者个数 (紧随训练集的 16 个).
pub const TEST_SUBJECT_LEN: u32 = 16;
