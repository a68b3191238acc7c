//! 闪存能力接口

use crate::error::Result;

/// 原始闪存访问接口
///
/// 实现此 trait 以提供底层可按扇区擦除的介质访问。
/// 错误从介质原样向上传播，本层不做重试。
///
/// # 示例
///
/// ```rust,ignore
/// use wl_core::{FlashAccess, Result};
///
/// struct MyChip {
///     // ...
/// }
///
/// impl FlashAccess for MyChip {
///     fn chip_size(&self) -> u32 {
///         4 * 1024 * 1024
///     }
///
///     fn sector_size(&self) -> u32 {
///         4096
///     }
///
///     fn erase_sector(&mut self, sector: u32) -> Result<()> {
///         // 擦除一个物理扇区
///         Ok(())
///     }
///
///     fn write(&mut self, addr: u32, data: &[u8]) -> Result<()> {
///         // 写入数据
///         Ok(())
///     }
///
///     fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
///         // 读取数据
///         Ok(())
///     }
/// }
/// ```
pub trait FlashAccess {
    /// 介质总容量（字节）
    fn chip_size(&self) -> u32;

    /// 物理擦除扇区大小（字节）
    fn sector_size(&self) -> u32;

    /// 擦除一个物理扇区
    ///
    /// # 参数
    ///
    /// * `sector` - 扇区编号（以扇区为单位）
    fn erase_sector(&mut self, sector: u32) -> Result<()>;

    /// 擦除一段地址范围
    ///
    /// 默认实现对范围覆盖到的每个扇区调用 [`erase_sector`]。
    /// 不保证整个范围的原子性。
    ///
    /// # 参数
    ///
    /// * `addr` - 起始字节地址
    /// * `len` - 长度（字节）
    ///
    /// [`erase_sector`]: FlashAccess::erase_sector
    fn erase_range(&mut self, addr: u32, len: u32) -> Result<()> {
        if len == 0 {
            return Ok(());
        }
        let sector_size = self.sector_size() as u64;
        let first = addr as u64 / sector_size;
        let last = (addr as u64 + len as u64 + sector_size - 1) / sector_size;
        for sector in first..last {
            self.erase_sector(sector as u32)?;
        }
        Ok(())
    }

    /// 写入数据
    ///
    /// 写入长度由 `data` 的长度决定。调用方负责保证目标区域
    /// 已处于擦除状态（介质约束）。
    fn write(&mut self, addr: u32, data: &[u8]) -> Result<()>;

    /// 读取数据
    ///
    /// 读取长度由 `buf` 的长度决定。
    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()>;

    /// 将未落盘的数据刷入介质
    ///
    /// 默认实现什么都不做，带写缓冲的设备可以覆盖此方法。
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// 允许借用的设备直接作为 FlashAccess 使用，
/// 这样引擎可以持有 `&mut D` 而设备的所有权留在调用方。
impl<T: FlashAccess + ?Sized> FlashAccess for &mut T {
    fn chip_size(&self) -> u32 {
        (**self).chip_size()
    }

    fn sector_size(&self) -> u32 {
        (**self).sector_size()
    }

    fn erase_sector(&mut self, sector: u32) -> Result<()> {
        (**self).erase_sector(sector)
    }

    fn erase_range(&mut self, addr: u32, len: u32) -> Result<()> {
        (**self).erase_range(addr, len)
    }

    fn write(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        (**self).write(addr, data)
    }

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        (**self).read(addr, buf)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}
