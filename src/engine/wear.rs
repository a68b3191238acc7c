//! 移动记账与位置标记
//!
//! 擦除访问计数到达阈值时把下一位置的页内容搬进空洞，再通过
//! 状态副本后面的标记区记录进度：每次移动只清一个标记字节，
//! 只有空洞转满一圈（全局映射移动一页）才重写完整状态记录。

use crate::consts::{WL_ERASED_BYTE, WL_STATE_REC_SIZE};
use crate::error::Result;
use crate::flash::FlashAccess;
use crate::state::checksum::set_state_crc;

use super::WlFlash;

impl<F: FlashAccess> WlFlash<F> {
    /// 位置标记的落盘地址
    ///
    /// 标记区紧跟在状态记录之后，每个位置占 `wr_size` 字节。
    pub(crate) fn marker_addr(&self, state_addr: u32, index: u32) -> u32 {
        state_addr + WL_STATE_REC_SIZE as u32 + index * self.cfg.wr_size
    }

    /// 在两个副本中清除指定位置的标记（各写一个零字节）
    fn clear_markers(&mut self, index: u32) -> Result<()> {
        let addr1 = self.marker_addr(self.addr_state1, index);
        let addr2 = self.marker_addr(self.addr_state2, index);
        self.flash.write(addr1, &[0u8])?;
        self.flash.write(addr2, &[0u8])?;
        Ok(())
    }

    /// 重写两个完整状态副本（含 CRC），顺带清空标记区
    pub(crate) fn persist_both_states(&mut self) -> Result<()> {
        set_state_crc(&mut self.state);
        let buf = self.state.encode();
        self.flash.erase_range(self.addr_state1, self.state_size)?;
        self.flash.write(self.addr_state1, &buf)?;
        self.flash.erase_range(self.addr_state2, self.state_size)?;
        self.flash.write(self.addr_state2, &buf)?;
        Ok(())
    }

    /// 移动记账
    ///
    /// 每次擦除访问调用一次。计数未到阈值直接返回；到达阈值执行
    /// 一次磨损移动。移动失败时把计数重新置回阈值前一格，下一次
    /// 访问重试，错误原样上抛。
    pub(crate) fn update_wear(&mut self) -> Result<()> {
        self.state.access_count += 1;
        if self.state.access_count < self.state.max_count {
            return Ok(());
        }
        self.state.access_count = 0;
        match self.do_move() {
            Ok(()) => Ok(()),
            Err(e) => {
                log::error!("[WL_MOVE] move failed: {}, re-arming", e);
                self.state.access_count = self.state.max_count.saturating_sub(1);
                Err(e)
            }
        }
    }

    /// 执行一次磨损移动
    ///
    /// 擦除空洞页，把下一位置的页内容按临时缓冲区粒度搬进来，
    /// 然后推进位置。整圈轮转时 move_count 前进一步并持久化完整
    /// 状态；否则只清一个标记字节。
    fn do_move(&mut self) -> Result<()> {
        let page = self.cfg.page_size;
        let dummy_addr = self.cfg.start_addr + self.state.pos * page;
        let next = if self.state.pos + 1 >= self.state.max_pos {
            0
        } else {
            self.state.pos + 1
        };
        let data_addr = self.cfg.start_addr + next * page;

        self.flash.erase_range(dummy_addr, page)?;
        let step = self.cfg.temp_buff_size;
        let copy_count = page / step;
        for i in 0..copy_count {
            self.flash.read(data_addr + i * step, &mut self.temp_buff)?;
            self.flash.write(dummy_addr + i * step, &self.temp_buff)?;
        }

        let moved = self.state.pos;
        self.state.pos += 1;
        if self.state.pos >= self.state.max_pos {
            // 整圈轮转：全局映射移动一页，此时才需要重写完整状态
            self.state.pos = 0;
            self.state.move_count += 1;
            if self.state.move_count >= self.state.max_pos - 1 {
                self.state.move_count = 0;
            }
            self.persist_both_states()?;
            log::debug!(
                "[WL_MOVE] rotation complete, move_count={}",
                self.state.move_count
            );
        } else {
            self.clear_markers(moved)?;
        }
        Ok(())
    }

    /// 扫描副本 1 的标记区恢复当前位置
    ///
    /// 第一个仍处于擦除态的标记就是当前位置；所有标记都已清除时
    /// 取 max_pos-1，让下一次记账访问把这圈轮转补完。
    pub(crate) fn recover_pos(&mut self) -> Result<()> {
        let mut pos = self.state.max_pos - 1;
        for i in 0..self.state.max_pos {
            let mut marker = [0u8; 1];
            let addr = self.marker_addr(self.addr_state1, i);
            self.flash.read(addr, &mut marker)?;
            if marker[0] == WL_ERASED_BYTE {
                pos = i;
                break;
            }
        }
        self.state.pos = pos;
        log::debug!("[WL_INIT] recovered position {}", pos);
        Ok(())
    }
}
