//! 引擎变体
//!
//! 挂载时用擦除策略选出三种具体引擎之一，之后所有调用显式分发，
//! 析构走普通的所有权规则。

use crate::engine::{WlConfig, WlFlash};
use crate::error::Result;
use crate::ext::{WlExtConfig, WlExtPerf, WlExtSafe};
use crate::flash::FlashAccess;

/// 擦除策略（挂载时选定）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErasePolicy {
    /// 物理扇区粒度直接擦除（核心引擎）
    Direct,
    /// 子扇区擦除：邻居子槽读出保留、擦除后写回
    Fit,
    /// 子扇区擦除 + 备份扇区和事务标记，跨掉电原子
    Safe,
}

/// 挂载好的磨损均衡设备（三种引擎上的和类型）
pub enum WlDevice<F> {
    /// 核心引擎
    Direct(WlFlash<F>),
    /// 逻辑扇区适配器
    Fit(WlExtPerf<F>),
    /// 掉电安全适配器
    Safe(WlExtSafe<F>),
}

impl<F: FlashAccess> WlDevice<F> {
    /// 按策略构建引擎
    ///
    /// `Direct` 策略忽略 `ext`（没有子扇区重映射）。
    pub fn new(policy: ErasePolicy, cfg: WlConfig, ext: WlExtConfig, flash: F) -> Result<Self> {
        match policy {
            ErasePolicy::Direct => Ok(Self::Direct(WlFlash::new(cfg, flash)?)),
            ErasePolicy::Fit => Ok(Self::Fit(WlExtPerf::new(cfg, ext, flash)?)),
            ErasePolicy::Safe => Ok(Self::Safe(WlExtSafe::new(cfg, ext, flash)?)),
        }
    }

    /// 初始化（加载/恢复持久化状态）
    pub fn init(&mut self) -> Result<()> {
        match self {
            Self::Direct(dev) => dev.init(),
            Self::Fit(dev) => dev.init(),
            Self::Safe(dev) => dev.init(),
        }
    }

    /// 可用容量（字节）
    pub fn chip_size(&self) -> u32 {
        match self {
            Self::Direct(dev) => dev.chip_size(),
            Self::Fit(dev) => dev.chip_size(),
            Self::Safe(dev) => dev.chip_size(),
        }
    }

    /// 对上层暴露的扇区大小（字节）
    pub fn sector_size(&self) -> u32 {
        match self {
            Self::Direct(dev) => dev.sector_size(),
            Self::Fit(dev) => dev.sector_size(),
            Self::Safe(dev) => dev.sector_size(),
        }
    }

    /// 读取数据
    pub fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        match self {
            Self::Direct(dev) => dev.read(addr, buf),
            Self::Fit(dev) => dev.read(addr, buf),
            Self::Safe(dev) => dev.read(addr, buf),
        }
    }

    /// 写入数据
    pub fn write(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        match self {
            Self::Direct(dev) => dev.write(addr, data),
            Self::Fit(dev) => dev.write(addr, data),
            Self::Safe(dev) => dev.write(addr, data),
        }
    }

    /// 擦除一段地址范围
    pub fn erase_range(&mut self, addr: u32, len: u32) -> Result<()> {
        match self {
            Self::Direct(dev) => dev.erase_range(addr, len),
            Self::Fit(dev) => dev.erase_range(addr, len),
            Self::Safe(dev) => dev.erase_range(addr, len),
        }
    }

    /// 提交待持久化的状态
    pub fn flush(&mut self) -> Result<()> {
        match self {
            Self::Direct(dev) => dev.flush(),
            Self::Fit(dev) => dev.flush(),
            Self::Safe(dev) => dev.flush(),
        }
    }

    /// 拆出底层介质
    pub fn into_flash(self) -> F {
        match self {
            Self::Direct(dev) => dev.into_flash(),
            Self::Fit(dev) => dev.into_flash(),
            Self::Safe(dev) => dev.into_flash(),
        }
    }
}

impl<F: FlashAccess> FlashAccess for WlDevice<F> {
    fn chip_size(&self) -> u32 {
        WlDevice::chip_size(self)
    }

    fn sector_size(&self) -> u32 {
        WlDevice::sector_size(self)
    }

    fn erase_sector(&mut self, sector: u32) -> Result<()> {
        match self {
            Self::Direct(dev) => dev.erase_sector(sector),
            Self::Fit(dev) => dev.erase_sector(sector),
            Self::Safe(dev) => dev.erase_sector(sector),
        }
    }

    fn erase_range(&mut self, addr: u32, len: u32) -> Result<()> {
        WlDevice::erase_range(self, addr, len)
    }

    fn write(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        WlDevice::write(self, addr, data)
    }

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        WlDevice::read(self, addr, buf)
    }

    fn flush(&mut self) -> Result<()> {
        WlDevice::flush(self)
    }
}
