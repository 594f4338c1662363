use std::ops::{Index, IndexMut};
use std::path::Path;

use ndarray::{Array3, ArrayView, ArrayViewMut, Axis, Ix3};
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};

use crate::{Idx2d, Idx3d};

pub mod canvas;
pub mod normalize;
pub mod slice;

pub use canvas::Canvas;
pub use normalize::ClipNormalizer;

pub use slice::{
    CompactMaskSlice, ImgWriteRaw, ImgWriteVis, MaskSlice, MaskSliceMut, OwnedMaskSlice,
    OwnedScanSlice, ScanSlice, ScanSliceMut,
};

/// `NiftiHeader` 是栈上大对象, 移动该对象的开销很可观.
/// 因此我们将其分配到堆上.
type BoxedHeader = Box<NiftiHeader>;

/// 打开受试者数据错误.
#[derive(Debug)]
pub enum OpenDataError {
    /// 底层 nifti 文件缺失、不可读或格式损坏.
    Nifti(nifti::NiftiError),

    /// 同一受试者的 LGE 扫描与心肌掩膜形状不一致.
    /// 两个分量依次为扫描形状与掩膜形状 (均为切片优先格式).
    ShapeMismatch(Idx3d, Idx3d),
}

impl From<nifti::NiftiError> for OpenDataError {
    #[inline]
    fn from(e: nifti::NiftiError) -> Self {
        Self::Nifti(e)
    }
}

/// nii 格式 3D LGE 心脏磁共振扫描, 包括 header 和强度数据. 强度值以 `f32` 保存.
#[derive(Debug, Clone)]
pub struct CmrScan {
    header: BoxedHeader,
    data: Array3<f32>,
}

/// 将 (X, Y, Z) 转换成 (Y, X, Z). 以后均按照该模式访问:
/// 切片轴 (Y) 在第 0 维, 每层 xz 平面切片形状为 (X, Z).
#[inline]
fn get_shape_from_header(h: &NiftiHeader) -> Idx3d {
    // [X, Y, Z]. 体素个数数组.
    let [_, x, y, z, ..] = h.dim;
    (y as usize, x as usize, z as usize)
}

/// 3D LGE nii 文件 header 的共用属性和部分通用操作.
pub trait NiftiHeaderAttr {
    /// 获取 header 部分.
    fn header(&self) -> &NiftiHeader;

    /// 获取数据形状大小, 切片优先格式 (Y, X, Z).
    #[inline]
    fn shape(&self) -> Idx3d {
        get_shape_from_header(self.header())
    }

    /// 获取数据 xz 平面切片形状大小 (X, Z).
    #[inline]
    fn slice_shape(&self) -> Idx2d {
        let (_, x, z) = self.shape();
        (x, z)
    }

    /// 获取 xz 平面切片个数.
    #[inline]
    fn len_slices(&self) -> usize {
        self.shape().0
    }

    /// 获取数据体素个数.
    #[inline]
    fn size(&self) -> usize {
        let (y, x, z) = self.shape();
        y * x * z
    }

    /// 获取单个体素分辨率. 该分辨率以毫米为单位, 按照切片优先格式
    /// 分别代表相邻切片方向 (y), 切片垂直方向 (x), 切片水平方向 (z).
    #[inline]
    fn pix_dim(&self) -> [f64; 3] {
        let [_, x, y, z, ..] = self.header().pixdim;
        [y as f64, x as f64, z as f64]
    }

    /// 获取相邻切片方向 (y) 体素分辨率, 以毫米为单位.
    #[inline]
    fn spacing_mm(&self) -> f64 {
        self.header().pixdim[2] as f64
    }

    /// 获取切片平面内 (x, z) 两个方向的像素分辨率, 以毫米为单位.
    #[inline]
    fn slice_mm(&self) -> [f64; 2] {
        let [_, x, z] = self.pix_dim();
        [x, z]
    }

    /// 获取 xz 切片方向的像素实际面积值, 以平方毫米为单位.
    #[inline]
    fn slice_pixel(&self) -> f64 {
        let [x, z] = self.slice_mm();
        x * z
    }
}

impl NiftiHeaderAttr for CmrScan {
    #[inline]
    fn header(&self) -> &NiftiHeader {
        &self.header
    }
}

impl Index<Idx3d> for CmrScan {
    type Output = f32;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl IndexMut<Idx3d> for CmrScan {
    #[inline]
    fn index_mut(&mut self, index: Idx3d) -> &mut Self::Output {
        &mut self.data[index]
    }
}

/// 将 nifti 体数据从磁盘格式 \[X, Y, Z\] 重排为切片优先格式 \[Y, X, Z\],
/// 并保证行优先布局.
fn into_slice_major<T: Clone>(data: ndarray::ArrayD<T>, sh: Idx3d) -> Array3<T> {
    // [X, Y, Z] -> [Y, X, Z].
    // hint: 重排后底层存储不再是行优先, 必须物化一次.
    let data = data.permuted_axes([1, 0, 2].as_slice());
    let data = data.as_standard_layout().to_owned();

    // 该操作不会生成 `Err`, 可直接 unwrap.
    Array3::<T>::from_shape_vec(sh, data.into_raw_vec()).unwrap()
}

/// 给 fake header 填充形状与分辨率信息.
///
/// `sh` 与 `pix_dim` 均按照磁盘格式 \[X, Y, Z\] 给出.
fn fake_header(sh: [u16; 3], pix_dim: [f32; 3]) -> BoxedHeader {
    let mut header = Box::<NiftiHeader>::default();

    let [x, y, z] = sh;
    header.dim = [3, x, y, z, 1, 1, 1, 1];

    let [_, pw, ph, pz, ..] = &mut header.pixdim;
    let [w, h, d] = &pix_dim;
    (*pw, *ph, *pz) = (*w, *h, *d);

    header.intent_name[..4].copy_from_slice(b"fake");
    header
}

impl CmrScan {
    /// 打开 nii 文件格式的 3D LGE 扫描. `path` 为 nii 文件的本地路径.
    /// 如果打开成功, 则返回 `Ok(Self)`, 否则返回 `Err`.
    pub fn open<P: AsRef<Path>>(path: P) -> nifti::Result<Self> {
        let obj = ReaderOptions::new().read_file(path.as_ref())?;
        let header = Box::new(obj.header().clone());

        let data = obj.into_volume().into_ndarray::<f32>()?;
        let data = into_slice_major(data, get_shape_from_header(&header));

        Ok(Self { header, data })
    }

    /// 根据裸强度数据和体素分辨率直接创建 `CmrScan` 实体.
    ///
    /// # 参数
    ///
    /// 1. `data` 按照切片优先格式 \[Y, X, Z\] 组织.
    /// 2. `pix_dim` 按照 \[x, y, z\] 格式存储, 以毫米为单位.
    ///
    /// # 注意
    ///
    /// 该方法可能会创建不一致的实体, 因此你应仅将其用于实验目的.
    pub fn fake(data: Array3<f32>, pix_dim: [f32; 3]) -> Self {
        let &[y, x, z] = data.shape() else {
            unreachable!()
        };
        let header = fake_header([x as u16, y as u16, z as u16], pix_dim);
        debug_assert_eq!(get_shape_from_header(&header), (y, x, z));

        Self { header, data }
    }

    /// 判断该结构是否是由 `fake` 方法手动拼接的.
    pub fn is_faked(&self) -> bool {
        self.header.intent_name.starts_with(b"fake")
    }

    /// 获取 3D 扫描切片空间的第 `index` 层 xz 切片视图.
    ///
    /// 当 `index` 越界时 panic.
    #[inline]
    pub fn slice_at(&self, index: usize) -> ScanSlice<'_> {
        ScanSlice::new(self.data.index_axis(Axis(0), index))
    }

    /// 获取 3D 扫描切片空间的第 `index` 层可变 xz 切片视图.
    ///
    /// 当 `index` 越界时 panic.
    #[inline]
    pub fn slice_at_mut(&mut self, index: usize) -> ScanSliceMut<'_> {
        ScanSliceMut::new(self.data.index_axis_mut(Axis(0), index))
    }

    /// 获取能按升序迭代 3D 扫描不可变 xz 切片的迭代器.
    #[inline]
    pub fn slice_iter(&self) -> impl ExactSizeIterator<Item = ScanSlice> {
        self.data.axis_iter(Axis(0)).map(ScanSlice::new)
    }

    /// 获取能按升序迭代 3D 扫描可变 xz 切片的迭代器.
    #[inline]
    pub fn slice_iter_mut(&mut self) -> impl ExactSizeIterator<Item = ScanSliceMut> {
        self.data.axis_iter_mut(Axis(0)).map(ScanSliceMut::new)
    }

    /// 就地归一化所有 xz 切片.
    ///
    /// 每层切片独立处理: 离群值以该切片中位数替换, 然后 min-max 缩放到 \[0, 1\].
    pub fn normalize_all(&mut self, norm: &ClipNormalizer) {
        self.slice_iter_mut().for_each(|mut s| norm.normalize_into(&mut s));
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView<'_, f32, Ix3> {
        self.data.view()
    }

    /// 获得数据的一份可变 shallow copy.
    #[inline]
    pub fn data_mut(&mut self) -> ArrayViewMut<'_, f32, Ix3> {
        self.data.view_mut()
    }
}

/// nii 格式 3D 心肌掩膜, 包括 header 和二值标签. 标签值以 `u8` 保存 (0/1).
#[derive(Debug, Clone)]
pub struct CmrMask {
    header: BoxedHeader,
    data: Array3<u8>,
}

impl NiftiHeaderAttr for CmrMask {
    #[inline]
    fn header(&self) -> &NiftiHeader {
        &self.header
    }
}

impl Index<Idx3d> for CmrMask {
    type Output = u8;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl CmrMask {
    /// 打开 nii 文件格式的 3D 心肌掩膜. `path` 为 nii 文件的本地路径.
    /// 如果打开成功, 则返回 `Ok(Self)`, 否则返回 `Err`.
    pub fn open<P: AsRef<Path>>(path: P) -> nifti::Result<Self> {
        let obj = ReaderOptions::new().read_file(path.as_ref())?;
        let header = Box::new(obj.header().clone());

        let data = obj.into_volume().into_ndarray::<u8>()?;
        let data = into_slice_major(data, get_shape_from_header(&header));

        Ok(Self { header, data })
    }

    /// 根据裸标签数据和体素分辨率直接创建 `CmrMask` 实体.
    ///
    /// # 参数
    ///
    /// 1. `data` 的体素值必须为 0 或 1, 否则程序行为未定义.
    /// 2. `data` 按照切片优先格式 \[Y, X, Z\] 组织.
    /// 3. `pix_dim` 按照 \[x, y, z\] 格式存储, 以毫米为单位.
    ///
    /// # 注意
    ///
    /// 该方法可能会创建不一致的实体, 因此你应仅将其用于实验目的.
    pub fn fake(data: Array3<u8>, pix_dim: [f32; 3]) -> Self {
        let &[y, x, z] = data.shape() else {
            unreachable!()
        };
        let header = fake_header([x as u16, y as u16, z as u16], pix_dim);
        debug_assert_eq!(get_shape_from_header(&header), (y, x, z));

        Self { header, data }
    }

    /// 判断该结构是否是由 `fake` 方法手动拼接的.
    pub fn is_faked(&self) -> bool {
        self.header.intent_name.starts_with(b"fake")
    }

    /// 获取 3D 掩膜切片空间的第 `index` 层不可变 xz 切片.
    ///
    /// 当 `index` 越界时 panic.
    #[inline]
    pub fn slice_at(&self, index: usize) -> MaskSlice {
        MaskSlice::new(self.data.index_axis(Axis(0), index))
    }

    /// 获取能按升序迭代 3D 掩膜不可变 xz 切片的迭代器.
    #[inline]
    pub fn slice_iter(&self) -> impl ExactSizeIterator<Item = MaskSlice> {
        self.data.axis_iter(Axis(0)).map(MaskSlice::new)
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView<'_, u8, Ix3> {
        self.data.view()
    }

    /// 获取 3D 掩膜中值为 `label` 的体素个数.
    #[inline]
    pub fn count(&self, label: u8) -> usize {
        self.data.iter().filter(|p| **p == label).count()
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IntoParallelIterator, ParallelIterator};
    }
}

/// 并发操作部分
#[cfg(feature = "rayon")]
impl CmrScan {
    /// 借助 `rayon`, 并行地对 3D 扫描每个可变 xz 切片实施 `op` 操作.
    pub fn par_for_each_slice_mut<F>(&mut self, op: F)
    where
        F: Fn(ScanSliceMut) + Sync + Send,
    {
        self.data_mut()
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .for_each(|v| {
                op(ScanSliceMut::new(v));
            });
    }

    /// 借助 `rayon`, 使用多任务模式运行 `self.normalize_all`.
    pub fn par_normalize_all(&mut self, norm: &ClipNormalizer) {
        self.par_for_each_slice_mut(|mut s| norm.normalize_into(&mut s));
    }
}

/// nii 格式的 3D LGE 扫描与对应的心肌掩膜.
///
/// 该结构完全透明, 仅包含两个公开的 `scan` 和 `mask` 子结构,
/// 用户可以直接使用它们来实现相关上层功能.
///
/// # 注意
///
/// 构造时会强制校验两个子结构的形状一致性; 其余数据一致性由用户保证.
#[derive(Debug, Clone)]
pub struct CmrData3d {
    /// 3D LGE 扫描.
    pub scan: CmrScan,

    /// 3D 心肌掩膜.
    pub mask: CmrMask,
}

impl CmrData3d {
    /// 分别打开 nii 文件格式的 3D LGE 扫描和对应心肌掩膜.
    /// 如果任一文件打开失败, 或两个文件的数据形状不一致, 则返回 `Err`.
    pub fn open(
        scan_path: impl AsRef<Path>,
        mask_path: impl AsRef<Path>,
    ) -> Result<Self, OpenDataError> {
        let scan = CmrScan::open(scan_path.as_ref())?;
        let mask = CmrMask::open(mask_path.as_ref())?;
        Self::pair(scan, mask)
    }

    /// 将已加载的扫描与掩膜配对. 形状不一致时返回
    /// [`OpenDataError::ShapeMismatch`].
    pub fn pair(scan: CmrScan, mask: CmrMask) -> Result<Self, OpenDataError> {
        if scan.shape() != mask.shape() {
            return Err(OpenDataError::ShapeMismatch(scan.shape(), mask.shape()));
        }
        Ok(Self { scan, mask })
    }

    /// 获取 xz 平面切片个数.
    #[inline]
    pub fn len_slices(&self) -> usize {
        self.mask.len_slices()
    }

    /// 依次获取 3D 扫描和 3D 掩膜切片空间的第 `index` 层不可变切片.
    ///
    /// 当 `index` 越界时 panic.
    #[inline]
    pub fn slice_at(&self, index: usize) -> (ScanSlice<'_>, MaskSlice<'_>) {
        (self.scan.slice_at(index), self.mask.slice_at(index))
    }

    /// 获取能按升序迭代 3D (扫描, 掩膜) 不可变 xz 切片对的迭代器.
    #[inline]
    pub fn slice_iter(&self) -> impl ExactSizeIterator<Item = (ScanSlice, MaskSlice)> {
        self.scan.slice_iter().zip(self.mask.slice_iter())
    }
}
