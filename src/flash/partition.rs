//! 分区包装器
//!
//! 把设备上的一段偏移窗口作为独立的 FlashAccess 暴露出来，
//! 磨损均衡引擎可以直接运行在一个分区上而不感知偏移。

use crate::error::{Error, ErrorKind, Result};
use crate::flash::FlashAccess;

/// 闪存分区
///
/// 所有地址都相对分区起点，越界访问返回 `InvalidInput`。
pub struct FlashPartition<F> {
    /// 底层设备
    flash: F,
    /// 分区起始偏移（字节）
    offset: u32,
    /// 分区大小（字节）
    size: u32,
}

impl<F: FlashAccess> FlashPartition<F> {
    /// 创建新的分区包装器
    ///
    /// # 参数
    ///
    /// * `flash` - 底层设备
    /// * `offset` - 分区起始偏移（字节），必须扇区对齐
    /// * `size` - 分区大小（字节），必须扇区对齐
    pub fn new(flash: F, offset: u32, size: u32) -> Result<Self> {
        let sector_size = flash.sector_size();
        if sector_size == 0 || size == 0 {
            return Err(Error::new(ErrorKind::InvalidInput, "empty partition"));
        }
        if offset % sector_size != 0 || size % sector_size != 0 {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "partition bounds must be sector aligned",
            ));
        }
        let end = offset as u64 + size as u64;
        if end > flash.chip_size() as u64 {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "partition beyond chip size",
            ));
        }
        Ok(Self { flash, offset, size })
    }

    /// 获取底层设备的引用
    pub fn flash(&self) -> &F {
        &self.flash
    }

    /// 获取底层设备的可变引用
    pub fn flash_mut(&mut self) -> &mut F {
        &mut self.flash
    }

    /// 拆出底层设备
    pub fn into_flash(self) -> F {
        self.flash
    }

    fn check_range(&self, addr: u32, len: usize) -> Result<()> {
        if addr as u64 + len as u64 > self.size as u64 {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "access beyond partition size",
            ));
        }
        Ok(())
    }
}

impl<F: FlashAccess> FlashAccess for FlashPartition<F> {
    fn chip_size(&self) -> u32 {
        self.size
    }

    fn sector_size(&self) -> u32 {
        self.flash.sector_size()
    }

    fn erase_sector(&mut self, sector: u32) -> Result<()> {
        let sector_size = self.flash.sector_size();
        if (sector as u64 + 1) * sector_size as u64 > self.size as u64 {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "sector beyond partition size",
            ));
        }
        self.flash.erase_sector(self.offset / sector_size + sector)
    }

    fn write(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        self.check_range(addr, data.len())?;
        self.flash.write(self.offset + addr, data)
    }

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        self.check_range(addr, buf.len())?;
        self.flash.read(self.offset + addr, buf)
    }

    fn flush(&mut self) -> Result<()> {
        self.flash.flush()
    }
}
