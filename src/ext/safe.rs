//! 掉电安全的子扇区擦除
//!
//! 在逻辑扇区适配器之上把"读出保留-擦除-写回"序列做成跨掉电
//! 原子：磨损均衡空间顶部保留两个物理扇区，一个放整扇区备份，
//! 一个放事务标记。状态机 Idle → BackingUp → Marked → Erasing →
//! Idle；标记落盘之后的任何掉电都能在下次初始化时从备份重放。

use crate::consts::{WL_SAFE_RESERVED_SECTORS, WL_TRANS_MARKER_OK, WL_TRANS_REC_SIZE};
use crate::engine::WlConfig;
use crate::error::{Error, ErrorKind, Result};
use crate::flash::FlashAccess;
use crate::state::checksum::{set_trans_crc, verify_trans_crc};
use crate::state::wl_trans_rec;
use alloc::vec;
use alloc::vec::Vec;

use super::perf::{WlExtConfig, WlExtPerf};

/// 掉电安全适配器
///
/// 备份扇区和标记扇区都是下层的逻辑地址，跟用户数据一起参与
/// 磨损轮转。
pub struct WlExtSafe<F> {
    /// 下层逻辑扇区适配器
    inner: WlExtPerf<F>,
    /// 整扇区备份缓冲区
    backup_buf: Vec<u8>,
    /// 备份扇区地址（下层逻辑字节地址）
    dump_addr: u32,
    /// 事务标记扇区地址
    trans_addr: u32,
}

impl<F: FlashAccess> WlExtSafe<F> {
    /// 创建适配器（连同下层两层）
    pub fn new(cfg: WlConfig, ext: WlExtConfig, flash: F) -> Result<Self> {
        let inner = WlExtPerf::new(cfg, ext, flash)?;
        let physical = inner.physical_sector_size();
        let base_size = inner.chip_size();
        // 保留区之外至少还要剩一个物理扇区给上层
        if base_size < (WL_SAFE_RESERVED_SECTORS + 1) * physical {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "region too small for power-safe erase",
            ));
        }
        Ok(Self {
            backup_buf: vec![0u8; physical as usize],
            dump_addr: base_size - 2 * physical,
            trans_addr: base_size - physical,
            inner,
        })
    }

    /// 初始化下层引擎，然后重放未完成的擦除事务
    pub fn init(&mut self) -> Result<()> {
        self.inner.init()?;
        self.recover()
    }

    /// 可用容量（字节）：下层容量减去两个保留扇区
    pub fn chip_size(&self) -> u32 {
        self.inner.chip_size() - WL_SAFE_RESERVED_SECTORS * self.inner.physical_sector_size()
    }

    /// 对上层暴露的逻辑扇区大小（字节）
    pub fn sector_size(&self) -> u32 {
        self.inner.sector_size()
    }

    /// 拆出底层介质
    pub fn into_flash(self) -> F {
        self.inner.into_flash()
    }

    fn check_io_range(&self, addr: u32, len: usize) -> Result<()> {
        if addr as u64 + len as u64 > self.chip_size() as u64 {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "access beyond usable size",
            ));
        }
        Ok(())
    }

    /// 读取数据
    pub fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        self.check_io_range(addr, buf.len())?;
        self.inner.read(addr, buf)
    }

    /// 写入数据
    pub fn write(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        self.check_io_range(addr, data.len())?;
        self.inner.write(addr, data)
    }

    /// 擦除一个逻辑扇区
    pub fn erase_sector(&mut self, sector: u32) -> Result<()> {
        self.erase_sector_fit(sector, 1)
    }

    /// 掉电安全的子扇区擦除
    ///
    /// # 状态机
    ///
    /// 1. BackingUp：把覆盖物理扇区的全部子槽无条件读进备份缓冲区
    /// 2. Marked：备份写入备份扇区，事务记录写入标记扇区（持久点）
    /// 3. Erasing：擦除真正的目标扇区，写回保留子槽
    /// 4. Idle：擦除标记扇区，事务结束
    ///
    /// 第 2 步完成前掉电：目标扇区未动，重启后无事可做；之后掉电：
    /// 重启时 [`recover`](WlExtSafe::recover) 从备份精确重放第 3 步。
    pub fn erase_sector_fit(&mut self, start_sector: u32, count: u32) -> Result<()> {
        if count == 0 {
            return Ok(());
        }
        let factor = self.inner.size_factor();
        let base = start_sector / factor * factor;
        let offset = start_sector - base;
        if offset + count > factor {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "erase range must fit one physical sector",
            ));
        }
        let logical = self.inner.sector_size();
        self.check_io_range((start_sector + count) * logical - 1, 1)?;

        let physical = self.inner.physical_sector_size();
        let phys_sector = start_sector / factor;

        // 1. BackingUp
        self.inner
            .read(phys_sector * physical, &mut self.backup_buf)?;

        // 2. Marked
        let dump_sector = self.dump_addr / physical;
        self.inner.wl_mut().erase_sector(dump_sector)?;
        self.inner.wl_mut().write(self.dump_addr, &self.backup_buf)?;

        let trans_sector = self.trans_addr / physical;
        self.inner.wl_mut().erase_sector(trans_sector)?;
        let mut rec = wl_trans_rec {
            marker: WL_TRANS_MARKER_OK,
            target_sector: phys_sector,
            sub_start: offset,
            sub_count: count,
            crc: 0,
        };
        set_trans_crc(&mut rec);
        self.inner.wl_mut().write(self.trans_addr, &rec.encode())?;

        // 3. Erasing
        self.replay_erase(phys_sector, offset, count)?;

        // 4. Idle
        self.inner.wl_mut().erase_sector(trans_sector)?;
        Ok(())
    }

    /// 第 3 步本体：擦除目标物理扇区，从备份写回记录范围之外的子槽
    fn replay_erase(&mut self, phys_sector: u32, sub_start: u32, sub_count: u32) -> Result<()> {
        let factor = self.inner.size_factor();
        let logical = self.inner.sector_size();

        self.inner.wl_mut().erase_sector(phys_sector)?;
        for i in 0..factor {
            if i >= sub_start && i < sub_start + sub_count {
                continue;
            }
            let slot = (i * logical) as usize;
            self.inner.wl_mut().write(
                (phys_sector * factor + i) * logical,
                &self.backup_buf[slot..slot + logical as usize],
            )?;
        }
        Ok(())
    }

    /// 重放未完成的擦除事务
    ///
    /// 标记扇区读出 OK 魔数且 CRC 匹配时，从备份扇区取回内容并
    /// 精确重放第 3 步，然后清除标记。无论掉电发生在原第 3 步之前
    /// 还是之后，重放结果都一样（幂等）。
    pub fn recover(&mut self) -> Result<()> {
        let mut buf = [0u8; WL_TRANS_REC_SIZE];
        self.inner.wl_mut().read(self.trans_addr, &mut buf)?;
        let rec = wl_trans_rec::decode(&buf);
        if rec.marker != WL_TRANS_MARKER_OK || !verify_trans_crc(&rec) {
            // 没有进行中的事务
            return Ok(());
        }
        log::info!(
            "[WL_SAFE] incomplete erase on physical sector {}, replaying",
            rec.target_sector
        );

        self.inner.wl_mut().read(self.dump_addr, &mut self.backup_buf)?;
        self.replay_erase(rec.target_sector, rec.sub_start, rec.sub_count)?;

        let trans_sector = self.trans_addr / self.inner.physical_sector_size();
        self.inner.wl_mut().erase_sector(trans_sector)
    }

    /// 擦除一段逻辑地址范围
    ///
    /// 拆分规则与下层一致，头尾零头走掉电安全的子扇区擦除，中间
    /// 整物理扇区直接擦除（没有需要保留的内容，无需事务）。
    pub fn erase_range(&mut self, addr: u32, len: u32) -> Result<()> {
        let logical = self.inner.sector_size();
        if addr % logical != 0 || len % logical != 0 {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "erase bounds must be logical sector aligned",
            ));
        }
        if len == 0 {
            return Ok(());
        }
        self.check_io_range(addr, len as usize)?;

        let factor = self.inner.size_factor();
        let split = super::split_erase_range(factor, addr / logical, len / logical);
        if let Some((sector, count)) = split.lead {
            self.erase_sector_fit(sector, count)?;
        }
        if let Some((phys_sector, count)) = split.mid {
            for i in 0..count {
                self.inner.wl_mut().erase_sector(phys_sector + i)?;
            }
        }
        if let Some((sector, count)) = split.tail {
            self.erase_sector_fit(sector, count)?;
        }
        Ok(())
    }

    /// 提交待持久化的状态
    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()
    }
}

impl<F: FlashAccess> FlashAccess for WlExtSafe<F> {
    fn chip_size(&self) -> u32 {
        WlExtSafe::chip_size(self)
    }

    fn sector_size(&self) -> u32 {
        WlExtSafe::sector_size(self)
    }

    fn erase_sector(&mut self, sector: u32) -> Result<()> {
        WlExtSafe::erase_sector(self, sector)
    }

    fn erase_range(&mut self, addr: u32, len: u32) -> Result<()> {
        WlExtSafe::erase_range(self, addr, len)
    }

    fn write(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        WlExtSafe::write(self, addr, data)
    }

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        WlExtSafe::read(self, addr, buf)
    }

    fn flush(&mut self) -> Result<()> {
        WlExtSafe::flush(self)
    }
}
