//! 内存模拟的 NOR 闪存
//!
//! 用于宿主机测试：按 NOR 语义建模（擦除后全 0xFF，写入只能把位
//! 从 1 清到 0），记录每个扇区的擦除次数，并支持掉电注入。

use crate::consts::WL_ERASED_BYTE;
use crate::error::{Error, ErrorKind, Result};
use crate::flash::FlashAccess;
use alloc::vec;
use alloc::vec::Vec;

/// 内存模拟闪存设备
///
/// # 掉电注入
///
/// `power_cut_after(n)` 安排第 n+1 次修改介质的操作（写入或擦除）
/// 中途断电：该操作只落下一个前缀，返回 I/O 错误，之后所有操作都
/// 失败，直到 `power_on()` 重新上电。内存镜像保留断电时刻的内容，
/// 重新构建引擎即可模拟重启后的恢复流程。
///
/// # 示例
///
/// ```rust,ignore
/// let mut flash = MemFlash::new(16, 4096);
/// flash.power_cut_after(3);
/// // ... 第 4 次写入/擦除中途断电 ...
/// flash.power_on();
/// // ... 重新挂载并恢复 ...
/// ```
pub struct MemFlash {
    /// 扇区大小（字节）
    sector_size: u32,
    /// 介质镜像
    data: Vec<u8>,
    /// 每个扇区的累计擦除次数
    erase_counts: Vec<u32>,
    /// 剩余多少次修改操作后断电
    power_cut: Option<u32>,
    /// 是否处于断电状态
    dead: bool,
}

impl MemFlash {
    /// 创建新的模拟设备，初始为全擦除状态
    ///
    /// # 参数
    ///
    /// * `sector_count` - 扇区数
    /// * `sector_size` - 扇区大小（字节）
    pub fn new(sector_count: u32, sector_size: u32) -> Self {
        let size = sector_count as usize * sector_size as usize;
        Self {
            sector_size,
            data: vec![WL_ERASED_BYTE; size],
            erase_counts: vec![0; sector_count as usize],
            power_cut: None,
            dead: false,
        }
    }

    /// 每个扇区的累计擦除次数
    pub fn erase_counts(&self) -> &[u32] {
        &self.erase_counts
    }

    /// 安排 `ops` 次成功的修改操作之后、下一次修改操作中途断电
    pub fn power_cut_after(&mut self, ops: u32) {
        self.power_cut = Some(ops);
    }

    /// 重新上电，清除断电状态
    pub fn power_on(&mut self) {
        self.power_cut = None;
        self.dead = false;
    }

    /// 是否处于断电状态
    pub fn is_dead(&self) -> bool {
        self.dead
    }

    /// 介质镜像（测试用）
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// 可变介质镜像（测试时直接注入损坏）
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// 修改操作开始前的掉电检查
    ///
    /// # 返回
    ///
    /// `Ok(true)` 表示本次操作中途断电，只应落下前缀
    fn begin_mutation(&mut self) -> Result<bool> {
        if self.dead {
            return Err(Error::new(ErrorKind::Io, "flash is powered off"));
        }
        match self.power_cut {
            Some(0) => {
                self.dead = true;
                self.power_cut = None;
                Ok(true)
            }
            Some(ref mut n) => {
                *n -= 1;
                Ok(false)
            }
            None => Ok(false),
        }
    }

    fn check_range(&self, addr: u32, len: usize) -> Result<()> {
        let end = addr as u64 + len as u64;
        if end > self.data.len() as u64 {
            return Err(Error::new(ErrorKind::InvalidInput, "access beyond chip size"));
        }
        Ok(())
    }
}

impl FlashAccess for MemFlash {
    fn chip_size(&self) -> u32 {
        self.data.len() as u32
    }

    fn sector_size(&self) -> u32 {
        self.sector_size
    }

    fn erase_sector(&mut self, sector: u32) -> Result<()> {
        if sector as usize >= self.erase_counts.len() {
            return Err(Error::new(ErrorKind::InvalidInput, "sector beyond chip size"));
        }
        let torn = self.begin_mutation()?;
        self.erase_counts[sector as usize] += 1;

        let start = sector as usize * self.sector_size as usize;
        let len = if torn {
            // 擦除中途断电：只有前半个扇区回到擦除态
            self.sector_size as usize / 2
        } else {
            self.sector_size as usize
        };
        self.data[start..start + len].fill(WL_ERASED_BYTE);

        if torn {
            return Err(Error::new(ErrorKind::Io, "power cut during erase"));
        }
        Ok(())
    }

    fn write(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        self.check_range(addr, data.len())?;
        let torn = self.begin_mutation()?;

        let applied = if torn { data.len() / 2 } else { data.len() };
        // NOR 语义：写入只能把位从 1 清到 0
        for (i, &b) in data[..applied].iter().enumerate() {
            self.data[addr as usize + i] &= b;
        }

        if torn {
            return Err(Error::new(ErrorKind::Io, "power cut during write"));
        }
        Ok(())
    }

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        if self.dead {
            return Err(Error::new(ErrorKind::Io, "flash is powered off"));
        }
        self.check_range(addr, buf.len())?;
        buf.copy_from_slice(&self.data[addr as usize..addr as usize + buf.len()]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_device_reads_erased() {
        let mut flash = MemFlash::new(4, 4096);
        let mut buf = [0u8; 64];
        flash.read(0, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_write_clears_bits_only() {
        let mut flash = MemFlash::new(1, 4096);
        flash.write(0, &[0xF0]).unwrap();
        // 再写 0x0F：NOR 下两次写的与
        flash.write(0, &[0x0F]).unwrap();

        let mut buf = [0u8; 1];
        flash.read(0, &mut buf).unwrap();
        assert_eq!(buf[0], 0x00);
    }

    #[test]
    fn test_erase_restores_fill_and_counts() {
        let mut flash = MemFlash::new(2, 4096);
        flash.write(4096, &[0u8; 16]).unwrap();
        flash.erase_sector(1).unwrap();

        let mut buf = [0u8; 16];
        flash.read(4096, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0xFF));
        assert_eq!(flash.erase_counts(), &[0, 1]);
    }

    #[test]
    fn test_out_of_range_rejected() {
        let mut flash = MemFlash::new(1, 4096);
        let err = flash.write(4090, &[0u8; 16]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        let err = flash.erase_sector(1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_power_cut_tears_write_then_fails() {
        let mut flash = MemFlash::new(1, 4096);
        flash.power_cut_after(0);

        // 断电的写入只落下前一半
        let err = flash.write(0, &[0u8; 8]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(flash.is_dead());

        let mut buf = [0u8; 1];
        assert!(flash.read(0, &mut buf).is_err());

        flash.power_on();
        flash.read(0, &mut buf).unwrap();

        let mut full = [0u8; 8];
        flash.read(0, &mut full).unwrap();
        assert_eq!(&full[..4], &[0, 0, 0, 0]);
        assert_eq!(&full[4..], &[0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_power_cut_countdown() {
        let mut flash = MemFlash::new(1, 4096);
        flash.power_cut_after(2);
        flash.write(0, &[0u8; 4]).unwrap();
        flash.write(16, &[0u8; 4]).unwrap();
        assert!(flash.write(32, &[0u8; 4]).is_err());
    }
}
