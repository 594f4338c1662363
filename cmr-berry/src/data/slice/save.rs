//! 切片的持久化存储.

use crate::{MaskSlice, MaskSliceMut, ScanSlice, ScanSliceMut};
use image::ImageResult;
use std::path::Path;

/// 表明一个可以通过 **可视化友好** 模式持久化存储的图像对象.
///
/// `ImgWriteVis` trait 的意图是, 图像将以 "可视化友好"
/// 的方式保存, 而不是 "as is" 的方式. 这意味着, 对于 `MaskSlice`, `MaskSliceMut`
/// 这类仅存在 0, 1 像素值的掩膜, 在保存时会映射到肉眼较易能区分的黑白两色;
/// 对于 `ScanSlice`, `ScanSliceMut` 这类已归一化到 \[0, 1\] 的扫描切片,
/// 在保存时会线性放大到 8-bit 灰度 (区间外的值被钳制).
pub trait ImgWriteVis {
    /// 按照一定的可视化规则将图片保存到 `path` 路径.
    fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()>;
}

/// 表明一个可以通过 **按原样** 模式持久化存储的图像对象.
///
/// `ImgWriteRaw` trait 的额外意图是, 图像将按原样保存. 这意味着,
/// 对于 `MaskSlice`, `MaskSliceMut` 这类掩膜可以直接存储为灰度图像,
/// 但面对 `ScanSlice`, `ScanSliceMut` 这类以浮点强度存储的扫描无能为力.
pub trait ImgWriteRaw {
    /// 按原样将图片保存到 `path` 路径.
    fn save_raw<P: AsRef<Path>>(&self, path: P) -> ImageResult<()>;
}

/// 使像素更有利于单通道可视化.
#[inline]
pub(crate) fn pretty(label: u8) -> u8 {
    use crate::consts::gray::*;
    match label {
        // 背景为黑色
        MYO_BACKGROUND => BLACK,

        // 心肌为白色
        MYO_FOREGROUND => WHITE,

        any_else => panic!("只允许掩膜存在 0, 1 像素, 但发现了 `{any_else}`"),
    }
}

macro_rules! impl_mask_vis {
    ($($slice: ty),+) => {
        $(
            /// 会将背景/心肌像素分别映射为黑色/白色. 不允许其他颜色.
            impl ImgWriteVis for $slice {
                fn save<P: AsRef<Path>>(&self, path: P) -> image::ImageResult<()> {
                    let (height, width) = self.shape();
                    let mut buf = image::GrayImage::new(width as u32, height as u32);
                    for ((h, w), &pix) in self.indexed_iter() {
                        buf.put_pixel(w as u32, h as u32, image::Luma([pretty(pix)]));
                    }
                    buf.save(path)
                }
            }
        )+
    };
}

macro_rules! impl_mask_raw {
    ($($slice: ty),+) => {
        $(
            /// 按原样存储.
            impl ImgWriteRaw for $slice {
                fn save_raw<P: AsRef<Path>>(&self, path: P) -> image::ImageResult<()> {
                    let (height, width) = self.shape();
                    let mut buf = image::GrayImage::new(width as u32, height as u32);
                    for ((h, w), &pix) in self.indexed_iter() {
                        buf.put_pixel(w as u32, h as u32, image::Luma([pix]));
                    }
                    buf.save(path)
                }
            }
        )+
    };
}

macro_rules! impl_scan_vis {
    ($($scan: ty),+) => {
        $(
            /// 假定强度已归一化到 \[0, 1\], 线性映射到 0-255 灰度; 区间外的值被钳制.
            impl ImgWriteVis for $scan {
                fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
                    let (height, width) = self.shape();
                    let mut buf = image::GrayImage::new(width as u32, height as u32);
                    for ((h, w), &v) in self.indexed_iter() {
                        let gray = (v.clamp(0.0, 1.0) * 255.0) as u8;
                        buf.put_pixel(w as u32, h as u32, image::Luma([gray]));
                    }
                    buf.save(path)
                }
            }
        )+
    };
}

impl_mask_vis!(MaskSlice<'_>, MaskSliceMut<'_>);
impl_scan_vis!(ScanSlice<'_>, ScanSliceMut<'_>);
impl_mask_raw!(MaskSlice<'_>, MaskSliceMut<'_>);
