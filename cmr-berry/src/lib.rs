#![warn(missing_docs)] // <= 合适时移除它.

//! 核心库. 提供 LGE (晚期钆增强) 心脏磁共振扫描与心肌掩膜文件的结构化信息,
//! 以及训练/评估一个 2D 心肌分割网络所需的全部预处理与后处理算法.
//!
//! 该 crate 目前仅提供 `safe` 接口. 分割网络本身 (层结构与权重优化)
//! 是外部协作者, 本库只定义其输入输出接口; 张量通过 npz 归档与外部训练器交换.
//!
//! # 注意
//!
//! 1. 该 crate 按 "LGE 目录 + 掩膜目录, 排序后按位置配对" 的模式组织数据,
//!   文件名本身不参与配对 (这是一个脆弱的前置约定, 见 [`dataset::cohort`]).
//! 2. 在非期望情况下 (调用者契约被破坏), 程序会直接 panic, 而不会导致内存错误.
//!   As what Rust promises. I/O 与数据一致性问题则以 `Result` 形式传播.
//!
//! # 流水线总览
//!
//! ### 强度归一化 ✅
//!
//! 逐切片离群值抑制 (超过阈值的体素以全切片中位数替换) + min-max 缩放到 \[0, 1\].
//!
//! 实现位于 `cmr-berry/src/data/normalize.rs`.
//!
//! ### 画布几何适配 ✅
//!
//! 将任意分辨率的 xz 平面切片以 wrap 方式填充到固定画布 (默认 256×256),
//! 以及评估末端的精确裁剪还原.
//!
//! 实现位于 `cmr-berry/src/data/canvas.rs`.
//!
//! ### 数据集组装 ✅
//!
//! 遍历队列中每个受试者的全部切片, 归一化 + 填充, 训练模式丢弃空掩膜切片,
//! 堆叠为 `(N, H, W, 1)` 4D 张量.
//!
//! 实现位于 `cmr-berry/src/dataset/assemble.rs`.
//!
//! ### 掩膜清理 ✅
//!
//! 概率图阈值化, 小连通区域剔除 (8-邻接), 形态学膨胀/腐蚀, 裁剪还原.
//! 预测掩膜与真值掩膜的清理参数是有意非对称的.
//!
//! 实现位于 `cmr-berry/src/post_proc`.
//!
//! ### 指标评估 ✅
//!
//! 逐切片 macro Dice/精确率/召回率与准确率, 两级聚合:
//! 切片 → 受试者均值 → 队列 mean/median/std.
//!
//! 实现位于 `cmr-berry/src/eval`.

/// 二维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx2d = (usize, usize);

/// 三维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx3d = (usize, usize, usize);

type Predicate = fn(u8) -> bool;

type Area2d = Vec<Idx2d>;
type Areas2d = Vec<Area2d>;

/// 3D LGE nii 文件基础数据结构.
mod data;

pub use data::{
    Canvas, ClipNormalizer, CmrData3d, CmrMask, CmrScan, CompactMaskSlice, ImgWriteRaw,
    ImgWriteVis, MaskSlice, MaskSliceMut, NiftiHeaderAttr, OpenDataError, OwnedMaskSlice,
    OwnedScanSlice, ScanSlice, ScanSliceMut,
};

pub mod consts;

mod neigh;

pub mod dataset;
pub mod eval;
pub mod model;
pub mod post_proc;
pub mod prelude;
