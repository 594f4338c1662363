use crate::consts::gray::*;
use crate::{Area2d, Areas2d, Idx2d, Predicate};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use ndarray::iter::{Iter, IterMut};
use ndarray::{Array2, ArrayView2, ArrayViewMut2, Ix2};
use std::borrow::Cow;
use std::collections::{HashSet, VecDeque};
use std::io::{Read, Write};
use std::ops::{Index, IndexMut};

/// 不可变、借用的二维 xz 心肌掩膜切片.
pub struct MaskSlice<'a> {
    /// 底层数据的轻量级视图, 借用于 [`crate::CmrMask`].
    ///
    /// 这里有意把代码写死为 `ArrayView` 降低灵活性, 但使结构的意图更加明确.
    data: ArrayView2<'a, u8>,
}

impl Index<Idx2d> for MaskSlice<'_> {
    type Output = u8;

    #[inline]
    fn index(&self, index: Idx2d) -> &Self::Output {
        &self.data[index]
    }
}

/// 可变、借用的二维 xz 心肌掩膜切片.
pub struct MaskSliceMut<'a> {
    /// 底层数据的轻量级视图, 借用于 [`crate::CmrMask`].
    ///
    /// 这里有意把代码写死为 `ArrayViewMut` 降低灵活性, 但使结构的意图更加明确.
    data: ArrayViewMut2<'a, u8>,
}

/// 可变方法集合.
impl<'a> MaskSliceMut<'a> {
    /// 获得 **底层** 数据的一份可变 shallow copy.
    #[inline]
    pub fn array_view_mut(&mut self) -> ArrayViewMut2<u8> {
        self.data.view_mut()
    }

    /// 获取可以迭代并修改掩膜像素的迭代器.
    #[inline]
    pub fn iter_mut(&mut self) -> IterMut<'_, u8, Ix2> {
        self.data.iter_mut()
    }

    /// 获取给定位置 (高, 宽) 的像素值, 并可就地修改. 越界时返回 `None`.
    #[inline]
    pub fn get_mut(&mut self, pos: Idx2d) -> Option<&mut u8> {
        self.data.get_mut(pos)
    }

    /// 将 `it` 给出的所有位置批量填充为 `value`.
    ///
    /// 如果存在越界索引, 则程序 panic.
    pub fn fill_batch<I: IntoIterator<Item = Idx2d>>(&mut self, it: I, value: u8) {
        for pos in it.into_iter() {
            self.data[pos] = value;
        }
    }
}

impl Index<Idx2d> for MaskSliceMut<'_> {
    type Output = u8;

    #[inline]
    fn index(&self, index: Idx2d) -> &Self::Output {
        &self.data[index]
    }
}

impl IndexMut<Idx2d> for MaskSliceMut<'_> {
    #[inline]
    fn index_mut(&mut self, index: Idx2d) -> &mut Self::Output {
        &mut self.data[index]
    }
}

/// mask 不可变方法集合.
macro_rules! impl_mask_slice_immut {
    ($life: lifetime, $slice: ty, $array: ty) => {
        /// 不可变方法集合.
        impl<$life> $slice {
            /// 直接初始化.
            #[inline]
            pub(crate) fn new(data: $array) -> Self {
                Self { data }
            }

            /// 获得 **底层** 数据的一份不可变 shallow copy.
            #[inline]
            pub fn array_view(&self) -> ArrayView2<u8> {
                self.data.view()
            }

            /// 获取可以迭代掩膜像素的迭代器.
            #[inline]
            pub fn iter(&self) -> Iter<'_, u8, Ix2> {
                self.data.iter()
            }

            /// 获取给定位置 (高, 宽) 的像素值. 越界时返回 `None`.
            #[inline]
            pub fn get(&self, pos: Idx2d) -> Option<&u8> {
                self.data.get(pos)
            }

            /// 该掩膜是否为全背景?
            #[inline]
            pub fn is_background(&self) -> bool {
                self.data.iter().copied().all(is_background)
            }

            /// 掩膜上是否存在心肌前景像素?
            ///
            /// 训练集组装以该谓词决定一对切片的去留.
            #[inline]
            pub fn has_myocardium(&self) -> bool {
                !self.is_background()
            }

            /// 掩膜的分辨率 (高, 宽).
            #[inline]
            pub fn shape(&self) -> Idx2d {
                let &[h, w] = self.data.shape() else {
                    unreachable!()
                };
                (h, w)
            }

            /// 掩膜的像素个数.
            #[inline]
            pub fn size(&self) -> usize {
                let (h, w) = self.shape();
                h * w
            }

            /// 获得掩膜的高.
            #[inline]
            pub fn height(&self) -> usize {
                self.shape().0
            }

            /// 获得掩膜的宽.
            #[inline]
            pub fn width(&self) -> usize {
                self.shape().1
            }

            /// 判断一个索引是否合法 (未越界).
            #[inline]
            pub fn check(&self, (h, w): Idx2d) -> bool {
                let (h_len, w_len) = self.shape();
                h < h_len && w < w_len
            }

            /// 统计掩膜中值为 `label` 的像素总个数.
            #[inline]
            pub fn count(&self, label: u8) -> usize {
                self.data.iter().filter(|&p| *p == label).count()
            }

            /// 统计掩膜中心肌前景像素的总个数.
            #[inline]
            pub fn foreground_len(&self) -> usize {
                self.data.iter().copied().filter(|p| is_foreground(*p)).count()
            }

            /// 将掩膜转化为行优先的序列化存储.
            pub fn as_row_major_vec(&self) -> Vec<u8> {
                let mut buf = Vec::with_capacity(self.size());
                buf.extend(self.iter());
                buf
            }

            /// 获得行优先存储的序列化数据.
            /// 当原始数据本身就是行优先格式时, 可以避免一次 deepcopy.
            pub fn as_row_major_slice(&self) -> Cow<[u8]> {
                if self.data.is_standard_layout() {
                    Cow::Borrowed(self.data.as_slice().unwrap())
                } else {
                    Cow::Owned(self.as_row_major_vec())
                }
            }

            /// 以行优先规则, 获取能迭代掩膜所有 `(索引, 像素值)` 的迭代器.
            #[inline]
            pub fn indexed_iter(&self) -> impl Iterator<Item = (Idx2d, &u8)> {
                self.data.indexed_iter()
            }

            /// 克隆自己, 获得一个拥有所有权的切片对象.
            pub fn to_owned(&self) -> OwnedMaskSlice {
                OwnedMaskSlice {
                    data: self.data.to_owned(),
                }
            }

            /// 按照 8-相邻规则获取所有区域. 两个像素 `p1` 和 `p2` 属于同一个区域,
            /// 当且仅当存在一条从 `p1` 到 `p2` 的 8-相邻路径, 且路径上的所有像素
            /// (包括 `p1` 和 `p2`) 都满足谓词 `pred`.
            pub fn areas(&self, pred: Predicate) -> Areas2d {
                let mut ans = Areas2d::with_capacity(1);
                let mut bfs_q = VecDeque::with_capacity(4);
                let mut set = HashSet::with_capacity(16);

                for (pos, &pix) in self.data.indexed_iter() {
                    if set.contains(&pos) || !pred(pix) {
                        continue;
                    }
                    bfs_q.push_back(pos);
                    let mut this_area = Area2d::with_capacity(1);
                    while let Some(cur_pos) = bfs_q.pop_front() {
                        if set.contains(&cur_pos) {
                            continue;
                        }
                        set.insert(cur_pos);
                        this_area.push(cur_pos);

                        // bfs
                        bfs_q.extend(
                            crate::neigh::neighbour8(cur_pos)
                                .into_iter()
                                .filter(|p| self.check(*p) && pred(self[*p]) && !set.contains(p)),
                        );
                    }
                    ans.push(this_area);
                }
                ans
            }

            /// 按照 8-相邻原则获得掩膜中所有心肌前景区域.
            #[inline]
            pub fn foreground_areas(&self) -> Areas2d {
                self.areas(is_foreground)
            }
        }
    };
}
impl_mask_slice_immut!('a, MaskSlice<'a>, ArrayView2<'a, u8>);
impl_mask_slice_immut!('a, MaskSliceMut<'a>, ArrayViewMut2<'a, u8>);

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 拥有所有权的二维 xz 心肌掩膜切片.
///
/// `OwnedMaskSlice` 仅提供到 `MaskSlice` 和 `MaskSliceMut`
/// 的轻量转换、底层数据移动和压缩存储, 不提供任何其它方法.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug)]
pub struct OwnedMaskSlice {
    data: Array2<u8>,
}

impl OwnedMaskSlice {
    /// 从底层数据直接创建.
    #[inline]
    pub fn from_raw(data: Array2<u8>) -> Self {
        Self { data }
    }

    /// 获得不可变切片引用.
    #[inline]
    pub fn as_immut(&self) -> MaskSlice<'_> {
        MaskSlice::new(self.data.view())
    }

    /// 获得可变切片引用.
    #[inline]
    pub fn as_mutable(&mut self) -> MaskSliceMut<'_> {
        MaskSliceMut::new(self.data.view_mut())
    }

    /// 直接获得底层数据.
    #[inline]
    pub fn into_raw(self) -> Array2<u8> {
        self.data
    }
}

impl OwnedMaskSlice {
    /// 压缩数据.
    pub fn compress(&self) -> CompactMaskSlice {
        let data = self.as_immut();
        let buf = data.as_row_major_slice();
        let mut e = ZlibEncoder::new(Vec::with_capacity(8), Compression::best());
        e.write_all(buf.as_ref()).expect("Compression error");
        let sh = data.shape();
        CompactMaskSlice {
            buf: e.finish().expect("Compression error"),
            sh,
        }
    }
}

/// 压缩存储的 `OwnedMaskSlice`; 不透明类型.
///
/// 评估流程会为整个队列保留清理后的掩膜切片, 该结构使这种保留的内存开销可控.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CompactMaskSlice {
    /// 压缩的不透明字节流.
    buf: Vec<u8>,

    /// 形状.
    sh: Idx2d,
}

impl CompactMaskSlice {
    /// 解压缩数据.
    pub fn decompress(self) -> OwnedMaskSlice {
        let Self { buf, sh: (h, w) } = self;
        let mut d = ZlibDecoder::new(buf.as_slice());
        let mut buf = Vec::with_capacity(h * w);
        d.read_to_end(&mut buf).expect("Decompression error");
        debug_assert_eq!(buf.len(), h * w);
        let data = Array2::<u8>::from_shape_vec((h, w), buf).unwrap();
        OwnedMaskSlice { data }
    }

    /// 序列化为字节流, 以便落盘或跨进程传输.
    #[cfg(feature = "serde")]
    pub fn to_bytes(&self) -> bincode::Result<Vec<u8>> {
        bincode::serialize(self)
    }

    /// 从 [`Self::to_bytes`] 产生的字节流恢复.
    #[cfg(feature = "serde")]
    pub fn from_bytes(buf: &[u8]) -> bincode::Result<Self> {
        bincode::deserialize(buf)
    }
}

/// 不可变、借用的二维 xz LGE 扫描切片.
pub struct ScanSlice<'a> {
    /// 底层数据的轻量级视图, 借用于 [`crate::CmrScan`].
    ///
    /// 这里有意把代码写死为 `ArrayView` 降低灵活性, 但使结构的意图更加明确.
    data: ArrayView2<'a, f32>,
}

impl Index<Idx2d> for ScanSlice<'_> {
    type Output = f32;

    #[inline]
    fn index(&self, index: Idx2d) -> &Self::Output {
        &self.data[index]
    }
}

/// 可变、借用的二维 xz LGE 扫描切片.
pub struct ScanSliceMut<'a> {
    /// 底层数据的轻量级视图, 借用于 [`crate::CmrScan`].
    ///
    /// 这里有意把代码写死为 `ArrayViewMut` 降低灵活性, 但使结构的意图更加明确.
    data: ArrayViewMut2<'a, f32>,
}

/// 可变方法集合.
impl<'a> ScanSliceMut<'a> {
    /// 获得数据的一份可变 shallow copy.
    #[inline]
    pub fn data_mut(&mut self) -> ArrayViewMut2<f32> {
        self.data.view_mut()
    }

    /// 获取可以迭代并修改强度值的迭代器.
    #[inline]
    pub fn iter_mut(&mut self) -> IterMut<'_, f32, Ix2> {
        self.data.iter_mut()
    }

    /// 获取给定位置 (高, 宽) 的强度值, 并可就地修改. 越界时返回 `None`.
    #[inline]
    pub fn get_mut(&mut self, pos: Idx2d) -> Option<&mut f32> {
        self.data.get_mut(pos)
    }

    /// 用 `src` 覆写原本 `self` 的内容.
    ///
    /// 如果 `src` 形状与 `self.shape()` 不符, 则程序 panic.
    pub fn assign(&mut self, src: &Array2<f32>) {
        assert_eq!(self.shape(), {
            let &[h, w] = src.shape() else { unreachable!() };
            (h, w)
        }, "切片形状不符");
        self.data.assign(src);
    }
}

impl Index<Idx2d> for ScanSliceMut<'_> {
    type Output = f32;

    #[inline]
    fn index(&self, index: Idx2d) -> &Self::Output {
        &self.data[index]
    }
}

impl IndexMut<Idx2d> for ScanSliceMut<'_> {
    #[inline]
    fn index_mut(&mut self, index: Idx2d) -> &mut Self::Output {
        &mut self.data[index]
    }
}

/// scan 不可变方法集合.
macro_rules! impl_scan_slice_immut {
    ($life: lifetime, $scan: ty, $array: ty) => {
        /// 不可变方法集合.
        impl<$life> $scan {
            /// 直接初始化.
            #[inline]
            pub(crate) fn new(data: $array) -> Self {
                Self { data }
            }

            /// 获得数据的一份不可变 shallow copy.
            #[inline]
            pub fn data(&self) -> ArrayView2<f32> {
                self.data.view()
            }

            /// 获取可以迭代强度值的迭代器.
            #[inline]
            pub fn iter(&self) -> Iter<'_, f32, Ix2> {
                self.data.iter()
            }

            /// 获取给定位置 (高, 宽) 的强度值. 越界时返回 `None`.
            #[inline]
            pub fn get(&self, pos: Idx2d) -> Option<&f32> {
                self.data.get(pos)
            }

            /// 切片的分辨率 (高, 宽).
            #[inline]
            pub fn shape(&self) -> Idx2d {
                let &[h, w] = self.data.shape() else {
                    unreachable!()
                };
                (h, w)
            }

            /// 切片的像素个数.
            #[inline]
            pub fn size(&self) -> usize {
                let (h, w) = self.shape();
                h * w
            }

            /// 以行优先规则, 获取能迭代切片所有 `(索引, 强度值)` 的迭代器.
            #[inline]
            pub fn indexed_iter(&self) -> impl Iterator<Item = (Idx2d, &f32)> {
                self.data.indexed_iter()
            }

            /// 克隆自己, 获得一个拥有所有权的切片对象.
            pub fn to_owned(&self) -> OwnedScanSlice {
                OwnedScanSlice {
                    data: self.data.to_owned(),
                }
            }
        }
    };
}

impl_scan_slice_immut!('a, ScanSlice<'a>, ArrayView2<'a, f32>);
impl_scan_slice_immut!('a, ScanSliceMut<'a>, ArrayViewMut2<'a, f32>);

/// 拥有所有权的二维 xz LGE 扫描切片.
///
/// `OwnedScanSlice` 仅提供到 `ScanSlice` 和 `ScanSliceMut`
/// 的轻量转换和底层数据移动, 不提供任何其它方法.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OwnedScanSlice {
    data: Array2<f32>,
}

impl OwnedScanSlice {
    /// 获得不可变切片引用.
    #[inline]
    pub fn as_immut(&self) -> ScanSlice<'_> {
        ScanSlice::new(self.data.view())
    }

    /// 获得可变切片引用.
    #[inline]
    pub fn as_mutable(&mut self) -> ScanSliceMut<'_> {
        ScanSliceMut::new(self.data.view_mut())
    }

    /// 直接获得底层数据.
    #[inline]
    pub fn into_raw(self) -> Array2<f32> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_mask_slice_queries() {
        let m = array![[0u8, 1, 0], [0, 1, 1]];
        let sli = MaskSlice::new(m.view());
        assert_eq!(sli.shape(), (2, 3));
        assert_eq!(sli.foreground_len(), 3);
        assert_eq!(sli.count(0), 3);
        assert!(sli.has_myocardium());
        assert!(!sli.is_background());
        assert!(sli.check((1, 2)));
        assert!(!sli.check((2, 0)));
    }

    #[test]
    fn test_areas_eight_connectivity() {
        // 两个前景像素仅对角相接, 8-邻接下属于同一区域.
        let m = array![[1u8, 0, 0], [0, 1, 0], [0, 0, 0]];
        let sli = MaskSlice::new(m.view());
        let areas = sli.foreground_areas();
        assert_eq!(areas.len(), 1);
        assert_eq!(areas[0].len(), 2);

        // 相隔一列则是两个区域.
        let m = array![[1u8, 0, 0], [0, 0, 1], [0, 0, 0]];
        let sli = MaskSlice::new(m.view());
        assert_eq!(sli.foreground_areas().len(), 2);
    }

    #[test]
    fn test_fill_batch() {
        let mut m = array![[1u8, 1], [0, 0]];
        let mut sli = MaskSliceMut::new(m.view_mut());
        let area: Vec<_> = vec![(0, 0), (0, 1)];
        sli.fill_batch(area, 0);
        assert!(sli.is_background());
    }

    #[test]
    fn test_owned_scan_slice_round_trip() {
        let s = array![[0.0f32, 0.5], [1.0, 0.25]];
        let mut owned = ScanSlice::new(s.view()).to_owned();
        *owned.as_mutable().get_mut((0, 0)).unwrap() = 0.75;
        assert_eq!(owned.as_immut()[(0, 0)], 0.75);
        assert_eq!(owned.into_raw().shape(), &[2, 2]);
    }

    #[test]
    fn test_compress_round_trip() {
        let m = array![[0u8, 1, 0, 1], [1, 1, 0, 0]];
        let owned = MaskSlice::new(m.view()).to_owned();
        let compact = owned.compress();
        let back = compact.decompress();
        assert_eq!(back.into_raw(), m);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_compact_bytes_round_trip() {
        let m = array![[0u8, 1], [1, 0]];
        let compact = MaskSlice::new(m.view()).to_owned().compress();
        let bytes = compact.to_bytes().unwrap();
        let back = CompactMaskSlice::from_bytes(&bytes).unwrap().decompress();
        assert_eq!(back.into_raw(), m);
    }
}
