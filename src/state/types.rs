//! 落盘记录定义
//!
//! 这个模块包含了直接对应闪存布局的记录结构。
//!
//! ## 设计原则
//!
//! 1. **落盘格式结构** - 保留 C 风格命名（便于对照十六进制转储）
//! 2. **显式编解码** - 所有字段以小端序逐个编解码，不依赖内存布局
//! 3. **固定大小** - 每种记录编码为固定字节数，尾部以 0xFF 填充
//!    （与擦除态一致，写入时不额外清位）
//!
//! 解码永远成功：CRC 是否匹配由 [`checksum`](super::checksum) 模块
//! 单独判定，初始化流程需要看到"撕裂"的副本而不是错误。

#![allow(non_camel_case_types)] // 允许C风格命名

use crate::consts::*;
use byteorder::{ByteOrder, LittleEndian};

//=============================================================================
// 状态记录
//=============================================================================

/// 磨损均衡状态记录
///
/// 以两个冗余副本持久化，每个副本后紧跟位置标记区
/// （每个位置一个标记，间距为 `wr_size`）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct wl_state_rec {
    pub pos: u32,          // 0: 当前空洞位置
    pub max_pos: u32,      // 4: 位置总数（含空洞）
    pub move_count: u32,   // 8: 完整轮转次数
    pub access_count: u32, // 12: 距上次移动的擦除访问数
    pub max_count: u32,    // 16: 移动阈值
    pub block_size: u32,   // 20: 页大小（移动粒度）
    pub version: u32,      // 24: 落盘布局版本
    pub device_id: u32,    // 28: 设备标识
    pub crc: u32,          // 32: 前 32 字节的 CRC32
}

impl wl_state_rec {
    /// 编码为落盘字节
    pub fn encode(&self) -> [u8; WL_STATE_REC_SIZE] {
        let mut buf = [WL_ERASED_BYTE; WL_STATE_REC_SIZE];
        LittleEndian::write_u32(&mut buf[0..4], self.pos);
        LittleEndian::write_u32(&mut buf[4..8], self.max_pos);
        LittleEndian::write_u32(&mut buf[8..12], self.move_count);
        LittleEndian::write_u32(&mut buf[12..16], self.access_count);
        LittleEndian::write_u32(&mut buf[16..20], self.max_count);
        LittleEndian::write_u32(&mut buf[20..24], self.block_size);
        LittleEndian::write_u32(&mut buf[24..28], self.version);
        LittleEndian::write_u32(&mut buf[28..32], self.device_id);
        LittleEndian::write_u32(
            &mut buf[WL_STATE_CRC_OFFSET..WL_STATE_CRC_OFFSET + 4],
            self.crc,
        );
        buf
    }

    /// 从落盘字节解码
    ///
    /// # 参数
    ///
    /// * `buf` - 至少 [`WL_STATE_REC_SIZE`] 字节
    pub fn decode(buf: &[u8]) -> Self {
        Self {
            pos: LittleEndian::read_u32(&buf[0..4]),
            max_pos: LittleEndian::read_u32(&buf[4..8]),
            move_count: LittleEndian::read_u32(&buf[8..12]),
            access_count: LittleEndian::read_u32(&buf[12..16]),
            max_count: LittleEndian::read_u32(&buf[16..20]),
            block_size: LittleEndian::read_u32(&buf[20..24]),
            version: LittleEndian::read_u32(&buf[24..28]),
            device_id: LittleEndian::read_u32(&buf[28..32]),
            crc: LittleEndian::read_u32(&buf[WL_STATE_CRC_OFFSET..WL_STATE_CRC_OFFSET + 4]),
        }
    }
}

//=============================================================================
// 配置副本
//=============================================================================

/// 配置副本记录
///
/// 挂载配置的持久化快照，用于跨挂载检测布局版本或几何参数变化。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct wl_cfg_rec {
    pub start_addr: u32,     // 0: 区域起始地址
    pub total_size: u32,     // 4: 区域总大小
    pub page_size: u32,      // 8: 页大小（移动粒度）
    pub sector_size: u32,    // 12: 物理扇区大小
    pub updaterate: u32,     // 16: 移动阈值配置
    pub wr_size: u32,        // 20: 位置标记写入粒度
    pub version: u32,        // 24: 落盘布局版本
    pub temp_buff_size: u32, // 28: 临时缓冲区大小
    pub crc: u32,            // 32: 前 32 字节的 CRC32
}

impl wl_cfg_rec {
    /// 编码为落盘字节
    pub fn encode(&self) -> [u8; WL_CFG_REC_SIZE] {
        let mut buf = [WL_ERASED_BYTE; WL_CFG_REC_SIZE];
        LittleEndian::write_u32(&mut buf[0..4], self.start_addr);
        LittleEndian::write_u32(&mut buf[4..8], self.total_size);
        LittleEndian::write_u32(&mut buf[8..12], self.page_size);
        LittleEndian::write_u32(&mut buf[12..16], self.sector_size);
        LittleEndian::write_u32(&mut buf[16..20], self.updaterate);
        LittleEndian::write_u32(&mut buf[20..24], self.wr_size);
        LittleEndian::write_u32(&mut buf[24..28], self.version);
        LittleEndian::write_u32(&mut buf[28..32], self.temp_buff_size);
        LittleEndian::write_u32(&mut buf[WL_CFG_CRC_OFFSET..WL_CFG_CRC_OFFSET + 4], self.crc);
        buf
    }

    /// 从落盘字节解码
    pub fn decode(buf: &[u8]) -> Self {
        Self {
            start_addr: LittleEndian::read_u32(&buf[0..4]),
            total_size: LittleEndian::read_u32(&buf[4..8]),
            page_size: LittleEndian::read_u32(&buf[8..12]),
            sector_size: LittleEndian::read_u32(&buf[12..16]),
            updaterate: LittleEndian::read_u32(&buf[16..20]),
            wr_size: LittleEndian::read_u32(&buf[20..24]),
            version: LittleEndian::read_u32(&buf[24..28]),
            temp_buff_size: LittleEndian::read_u32(&buf[28..32]),
            crc: LittleEndian::read_u32(&buf[WL_CFG_CRC_OFFSET..WL_CFG_CRC_OFFSET + 4]),
        }
    }
}

//=============================================================================
// 事务标记
//=============================================================================

/// 带保留擦除的事务标记
///
/// 在破坏性擦除开始前写入标记扇区，成功完成后整扇区擦除清掉。
/// 重启时读到 `marker == WL_TRANS_MARKER_OK` 且 CRC 匹配，说明
/// 擦除在完成前掉电，需要从备份扇区重放。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct wl_trans_rec {
    pub marker: u32,        // 0: 标记魔数（WL_TRANS_MARKER_OK）
    pub target_sector: u32, // 4: 目标物理扇区编号
    pub sub_start: u32,     // 8: 被擦除子槽区间起点
    pub sub_count: u32,     // 12: 被擦除子槽数量
    pub crc: u32,           // 16: 前 16 字节的 CRC32
}

impl wl_trans_rec {
    /// 编码为落盘字节
    pub fn encode(&self) -> [u8; WL_TRANS_REC_SIZE] {
        let mut buf = [WL_ERASED_BYTE; WL_TRANS_REC_SIZE];
        LittleEndian::write_u32(&mut buf[0..4], self.marker);
        LittleEndian::write_u32(&mut buf[4..8], self.target_sector);
        LittleEndian::write_u32(&mut buf[8..12], self.sub_start);
        LittleEndian::write_u32(&mut buf[12..16], self.sub_count);
        LittleEndian::write_u32(
            &mut buf[WL_TRANS_CRC_OFFSET..WL_TRANS_CRC_OFFSET + 4],
            self.crc,
        );
        buf
    }

    /// 从落盘字节解码
    pub fn decode(buf: &[u8]) -> Self {
        Self {
            marker: LittleEndian::read_u32(&buf[0..4]),
            target_sector: LittleEndian::read_u32(&buf[4..8]),
            sub_start: LittleEndian::read_u32(&buf[8..12]),
            sub_count: LittleEndian::read_u32(&buf[12..16]),
            crc: LittleEndian::read_u32(&buf[WL_TRANS_CRC_OFFSET..WL_TRANS_CRC_OFFSET + 4]),
        }
    }
}
