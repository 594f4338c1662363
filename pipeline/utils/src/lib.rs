//! 分割流水线依赖的通用组件.

use cmr_berry::{Canvas, ClipNormalizer};

pub mod loader;

const SEP: &str = "--------------------------------------------------------";

/// 简单分隔线.
#[inline]
pub fn sep() {
    println!("{SEP}");
}

/// 简单分隔线.
#[inline]
pub fn sep_to<W: std::io::Write>(mut w: W) {
    writeln!(&mut w, "{SEP}").unwrap();
}

/// 获得可并行核心数.
pub fn cpus() -> usize {
    std::thread::available_parallelism().map_or_else(|_| num_cpus::get(), usize::from)
}

/// 创建一般情况下合适的 LGE 强度归一化器. 离群值阈值为 1000.
#[inline]
pub fn lge_normalizer() -> ClipNormalizer {
    ClipNormalizer::from_lge_default()
}

/// 创建分割网络的缺省输入画布, 大小为 256×256.
#[inline]
pub fn unet_canvas() -> Canvas {
    Canvas::unet()
}
