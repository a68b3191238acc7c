//! 句柄管理
//!
//! 应用自己持有的挂载表：句柄是小的不透明整数，映射到
//! (引擎实例, 卷锁)。没有全局静态状态，也就没有初始化顺序问题。
//!
//! registry/lock.rs 提供卷锁接口：同一卷上的并发调用由锁串行化，
//! 不同卷互不影响；本层内部不加锁、不支持取消，所有操作同步
//! 执行到完成或硬失败。

mod lock;

pub use lock::{NoLock, VolumeLock};

use crate::consts::{
    WL_DEFAULT_TEMP_BUFF_SIZE, WL_DEFAULT_UPDATERATE, WL_DEFAULT_WR_SIZE, WL_LAYOUT_VERSION,
};
use crate::device::{ErasePolicy, WlDevice};
use crate::engine::WlConfig;
use crate::error::{Error, ErrorKind, Result};
use crate::ext::WlExtConfig;
use crate::flash::FlashAccess;
use alloc::vec::Vec;

/// 挂载表容量上限
pub const WL_MAX_VOLUMES: usize = 8;

/// 挂载参数
///
/// 引擎几何（页大小、物理扇区）取自设备本身；要把磨损均衡限制
/// 在设备的一段区域上，用 [`FlashPartition`](crate::flash::FlashPartition)
/// 包装后再挂载。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MountConfig {
    /// 擦除策略
    pub policy: ErasePolicy,
    /// 对上层暴露的逻辑扇区大小（字节）；0 表示等于物理扇区
    pub logical_sector_size: u32,
    /// 移动阈值；0 表示按容量推导
    pub updaterate: u32,
    /// 位置标记写入粒度（字节）
    pub wr_size: u32,
    /// 页拷贝临时缓冲区大小（字节）
    pub temp_buff_size: u32,
    /// 落盘布局版本
    pub version: u32,
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            policy: ErasePolicy::Direct,
            logical_sector_size: 0,
            updaterate: WL_DEFAULT_UPDATERATE,
            wr_size: WL_DEFAULT_WR_SIZE,
            temp_buff_size: WL_DEFAULT_TEMP_BUFF_SIZE,
            version: WL_LAYOUT_VERSION,
        }
    }
}

/// 挂载卷句柄（小的不透明整数）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WlHandle(u32);

struct Volume<F, L> {
    device: WlDevice<F>,
    lock: L,
}

/// 挂载表
///
/// # 示例
///
/// ```rust,ignore
/// use wl_core::{WlRegistry, MountConfig, NoLock, MemFlash};
///
/// let mut registry: WlRegistry<MemFlash, NoLock> = WlRegistry::new();
/// let handle = registry.mount(MemFlash::new(64, 4096), MountConfig::default())?;
/// registry.write(handle, 0, b"hello")?;
/// let flash = registry.unmount(handle)?;
/// ```
pub struct WlRegistry<F, L = NoLock> {
    volumes: Vec<Option<Volume<F, L>>>,
}

impl<F: FlashAccess, L: VolumeLock + Default> WlRegistry<F, L> {
    /// 创建空的挂载表
    pub fn new() -> Self {
        Self {
            volumes: Vec::new(),
        }
    }

    /// 挂载一个设备
    ///
    /// 构建选定策略的引擎并完成初始化（包括状态恢复）。
    ///
    /// # 返回
    ///
    /// 之后所有操作使用的卷句柄
    ///
    /// # 错误
    ///
    /// 挂载表已满返回 `OutOfMemory`；配置或初始化失败原样上抛。
    pub fn mount(&mut self, flash: F, cfg: MountConfig) -> Result<WlHandle> {
        let sector_size = flash.sector_size();
        let cfg_wl = WlConfig {
            start_addr: 0,
            total_size: flash.chip_size(),
            page_size: sector_size,
            sector_size,
            updaterate: cfg.updaterate,
            wr_size: cfg.wr_size,
            version: cfg.version,
            temp_buff_size: cfg.temp_buff_size,
        };
        let ext = WlExtConfig {
            logical_sector_size: if cfg.logical_sector_size == 0 {
                sector_size
            } else {
                cfg.logical_sector_size
            },
        };

        let mut device = WlDevice::new(cfg.policy, cfg_wl, ext, flash)?;
        device.init()?;

        let slot = match self.volumes.iter().position(Option::is_none) {
            Some(i) => i,
            None => {
                if self.volumes.len() >= WL_MAX_VOLUMES {
                    return Err(Error::new(ErrorKind::OutOfMemory, "volume table is full"));
                }
                self.volumes.push(None);
                self.volumes.len() - 1
            }
        };
        self.volumes[slot] = Some(Volume {
            device,
            lock: L::default(),
        });
        log::info!("[MOUNT] volume {} mounted", slot);
        Ok(WlHandle(slot as u32))
    }

    /// 卸载一个卷
    ///
    /// 先 flush（把挂起的移动进度落盘），再释放句柄并交还底层
    /// 介质。flush 失败时错误上抛，句柄同样被释放。
    pub fn unmount(&mut self, handle: WlHandle) -> Result<F> {
        let slot = self.slot_index(handle)?;
        let mut volume = self.volumes[slot].take().expect("slot checked above");
        volume.lock.lock()?;
        let flushed = volume.device.flush();
        volume.lock.unlock()?;
        log::info!("[MOUNT] volume {} unmounted", slot);
        flushed?;
        Ok(volume.device.into_flash())
    }

    /// 读取数据
    pub fn read(&mut self, handle: WlHandle, addr: u32, buf: &mut [u8]) -> Result<()> {
        let volume = self.volume_mut(handle)?;
        volume.lock.lock()?;
        let result = volume.device.read(addr, buf);
        volume.lock.unlock()?;
        result
    }

    /// 写入数据
    pub fn write(&mut self, handle: WlHandle, addr: u32, data: &[u8]) -> Result<()> {
        let volume = self.volume_mut(handle)?;
        volume.lock.lock()?;
        let result = volume.device.write(addr, data);
        volume.lock.unlock()?;
        result
    }

    /// 擦除一段地址范围
    pub fn erase_range(&mut self, handle: WlHandle, addr: u32, len: u32) -> Result<()> {
        let volume = self.volume_mut(handle)?;
        volume.lock.lock()?;
        let result = volume.device.erase_range(addr, len);
        volume.lock.unlock()?;
        result
    }

    /// 卷的可用容量（字节）
    pub fn size(&self, handle: WlHandle) -> Result<u32> {
        Ok(self.volume(handle)?.device.chip_size())
    }

    /// 卷对上层暴露的扇区大小（字节）
    pub fn sector_size(&self, handle: WlHandle) -> Result<u32> {
        Ok(self.volume(handle)?.device.sector_size())
    }

    fn slot_index(&self, handle: WlHandle) -> Result<usize> {
        let slot = handle.0 as usize;
        match self.volumes.get(slot) {
            Some(Some(_)) => Ok(slot),
            _ => Err(Error::new(ErrorKind::NotFound, "handle not mounted")),
        }
    }

    fn volume(&self, handle: WlHandle) -> Result<&Volume<F, L>> {
        let slot = self.slot_index(handle)?;
        Ok(self.volumes[slot].as_ref().expect("slot checked above"))
    }

    fn volume_mut(&mut self, handle: WlHandle) -> Result<&mut Volume<F, L>> {
        let slot = self.slot_index(handle)?;
        Ok(self.volumes[slot].as_mut().expect("slot checked above"))
    }
}

impl<F: FlashAccess, L: VolumeLock + Default> Default for WlRegistry<F, L> {
    fn default() -> Self {
        Self::new()
    }
}
