//! 逻辑扇区适配器
//!
//! 把核心引擎的物理扇区粒度重新映射为更小的逻辑扇区：子扇区擦除
//! 先把覆盖物理扇区内不在擦除范围里的子槽读进暂存缓冲区，整扇区
//! 擦除后再写回。一个物理擦除始终只花一个物理擦除，邻居子槽不受
//! 影响。

use crate::engine::{WlConfig, WlFlash};
use crate::error::{Error, ErrorKind, Result};
use crate::flash::FlashAccess;
use alloc::vec;
use alloc::vec::Vec;

/// 逻辑扇区适配配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WlExtConfig {
    /// 对上层暴露的逻辑扇区大小（字节）
    pub logical_sector_size: u32,
}

/// 逻辑扇区适配器
pub struct WlExtPerf<F> {
    /// 下层核心引擎
    wl: WlFlash<F>,
    /// 逻辑扇区大小（字节）
    logical_sector_size: u32,
    /// 物理扇区 / 逻辑扇区
    size_factor: u32,
    /// 一个物理扇区的暂存缓冲区
    sector_buf: Vec<u8>,
}

impl<F: FlashAccess> WlExtPerf<F> {
    /// 创建适配器（连同下层引擎）
    ///
    /// # 错误
    ///
    /// 逻辑扇区为零、大于物理扇区或不能整除物理扇区时返回
    /// `InvalidInput`。
    pub fn new(cfg: WlConfig, ext: WlExtConfig, flash: F) -> Result<Self> {
        let wl = WlFlash::new(cfg, flash)?;
        let physical = wl.sector_size();
        let logical = ext.logical_sector_size;
        if logical == 0 || logical > physical || physical % logical != 0 {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "logical sector size must divide the physical sector size",
            ));
        }
        Ok(Self {
            wl,
            logical_sector_size: logical,
            size_factor: physical / logical,
            sector_buf: vec![0u8; physical as usize],
        })
    }

    /// 初始化下层引擎
    pub fn init(&mut self) -> Result<()> {
        self.wl.init()
    }

    /// 可用容量（字节）
    pub fn chip_size(&self) -> u32 {
        self.wl.chip_size()
    }

    /// 对上层暴露的逻辑扇区大小（字节）
    pub fn sector_size(&self) -> u32 {
        self.logical_sector_size
    }

    /// 下层的物理扇区大小（字节）
    pub fn physical_sector_size(&self) -> u32 {
        self.wl.sector_size()
    }

    /// 物理扇区 / 逻辑扇区
    pub(crate) fn size_factor(&self) -> u32 {
        self.size_factor
    }

    /// 下层引擎（掉电安全适配器直接驱动它做无保留的操作）
    pub(crate) fn wl_mut(&mut self) -> &mut WlFlash<F> {
        &mut self.wl
    }

    /// 拆出底层介质
    pub fn into_flash(self) -> F {
        self.wl.into_flash()
    }

    /// 读取数据（字节地址不变，直接透传）
    pub fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        self.wl.read(addr, buf)
    }

    /// 写入数据
    pub fn write(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        self.wl.write(addr, data)
    }

    /// 擦除一个逻辑扇区
    pub fn erase_sector(&mut self, sector: u32) -> Result<()> {
        self.erase_sector_fit(sector, 1)
    }

    /// 子扇区擦除
    ///
    /// 擦除覆盖物理扇区内 `[start_sector, start_sector+count)` 的
    /// 逻辑扇区，其余子槽读出保留、擦除后写回。范围必须落在同一个
    /// 物理扇区内。
    pub fn erase_sector_fit(&mut self, start_sector: u32, count: u32) -> Result<()> {
        if count == 0 {
            return Ok(());
        }
        let factor = self.size_factor;
        let base = start_sector / factor * factor;
        let offset = start_sector - base;
        if offset + count > factor {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "erase range must fit one physical sector",
            ));
        }
        let logical = self.logical_sector_size;

        // 读出保留子槽
        for i in 0..factor {
            if i >= offset && i < offset + count {
                continue;
            }
            let slot = (i * logical) as usize;
            self.wl.read(
                (base + i) * logical,
                &mut self.sector_buf[slot..slot + logical as usize],
            )?;
        }

        // 整物理扇区擦除（一个物理擦除）
        self.wl.erase_sector(start_sector / factor)?;

        // 写回保留子槽
        for i in 0..factor {
            if i >= offset && i < offset + count {
                continue;
            }
            let slot = (i * logical) as usize;
            self.wl.write(
                (base + i) * logical,
                &self.sector_buf[slot..slot + logical as usize],
            )?;
        }
        Ok(())
    }

    /// 擦除一段逻辑地址范围
    ///
    /// 两端必须是逻辑扇区的整数倍。拆成头部零头（子扇区擦除）、
    /// 中间整物理扇区（直接擦除，无需保留）和尾部零头三段，避免
    /// 对整扇区覆盖的部分做无谓的读出写回。
    pub fn erase_range(&mut self, addr: u32, len: u32) -> Result<()> {
        let logical = self.logical_sector_size;
        if addr % logical != 0 || len % logical != 0 {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "erase bounds must be logical sector aligned",
            ));
        }
        if len == 0 {
            return Ok(());
        }
        if addr as u64 + len as u64 > self.chip_size() as u64 {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "erase beyond usable size",
            ));
        }

        let split = super::split_erase_range(self.size_factor, addr / logical, len / logical);
        if let Some((sector, count)) = split.lead {
            self.erase_sector_fit(sector, count)?;
        }
        if let Some((phys_sector, count)) = split.mid {
            for i in 0..count {
                self.wl.erase_sector(phys_sector + i)?;
            }
        }
        if let Some((sector, count)) = split.tail {
            self.erase_sector_fit(sector, count)?;
        }
        Ok(())
    }

    /// 提交待持久化的状态
    pub fn flush(&mut self) -> Result<()> {
        self.wl.flush()
    }
}

impl<F: FlashAccess> FlashAccess for WlExtPerf<F> {
    fn chip_size(&self) -> u32 {
        WlExtPerf::chip_size(self)
    }

    fn sector_size(&self) -> u32 {
        WlExtPerf::sector_size(self)
    }

    fn erase_sector(&mut self, sector: u32) -> Result<()> {
        WlExtPerf::erase_sector(self, sector)
    }

    fn erase_range(&mut self, addr: u32, len: u32) -> Result<()> {
        WlExtPerf::erase_range(self, addr, len)
    }

    fn write(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        WlExtPerf::write(self, addr, data)
    }

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        WlExtPerf::read(self, addr, buf)
    }

    fn flush(&mut self) -> Result<()> {
        WlExtPerf::flush(self)
    }
}
