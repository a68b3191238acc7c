//! 磨损均衡层常量定义
//!
//! 这个模块包含了磨损均衡层的所有常量定义，包括：
//! - 落盘记录布局相关常量
//! - 校验和覆盖范围契约
//! - 挂载默认参数

//=============================================================================
// 布局版本
//=============================================================================

/// 当前落盘布局版本
///
/// 任何落盘记录的字段布局变更都必须提升此版本；
/// 状态记录的版本与当前版本不一致时会触发整区重新格式化。
pub const WL_LAYOUT_VERSION: u32 = 2;

//=============================================================================
// 落盘记录布局
//=============================================================================

/// 状态记录编码大小（字节）
pub const WL_STATE_REC_SIZE: usize = 64;

/// 状态记录 CRC 覆盖范围：编码的前 32 字节
/// （`crc` 字段之前的全部字段，见 `state::types::wl_state_rec`）
pub const WL_STATE_CRC_SPAN: usize = 32;

/// 状态记录中 `crc` 字段的偏移
pub const WL_STATE_CRC_OFFSET: usize = 32;

/// 配置副本编码大小（字节）
pub const WL_CFG_REC_SIZE: usize = 48;

/// 配置副本 CRC 覆盖范围：编码的前 32 字节
pub const WL_CFG_CRC_SPAN: usize = 32;

/// 配置副本中 `crc` 字段的偏移
pub const WL_CFG_CRC_OFFSET: usize = 32;

/// 事务标记编码大小（字节）
pub const WL_TRANS_REC_SIZE: usize = 32;

/// 事务标记 CRC 覆盖范围：编码的前 16 字节
pub const WL_TRANS_CRC_SPAN: usize = 16;

/// 事务标记中 `crc` 字段的偏移
pub const WL_TRANS_CRC_OFFSET: usize = 16;

/// 事务标记魔数："WLTX"
///
/// 标记扇区读出此值且记录 CRC 校验通过，表示一次带保留的擦除
/// 事务在掉电前已进入 Marked 阶段，需要在下次初始化时重放。
pub const WL_TRANS_MARKER_OK: u32 = 0x574C_5458;

//=============================================================================
// 介质相关
//=============================================================================

/// 擦除后介质读出的填充字节
pub const WL_ERASED_BYTE: u8 = 0xFF;

/// 掉电安全适配器在磨损均衡空间顶部保留的物理扇区数
/// （一个备份扇区 + 一个事务标记扇区）
pub const WL_SAFE_RESERVED_SECTORS: u32 = 2;

//=============================================================================
// 挂载默认参数
//=============================================================================

/// 默认移动阈值：每 16 次擦除访问触发一次磨损移动
pub const WL_DEFAULT_UPDATERATE: u32 = 16;

/// 默认临时缓冲区大小（字节），页拷贝按此粒度分批进行
pub const WL_DEFAULT_TEMP_BUFF_SIZE: u32 = 32;

/// 默认位置标记间距（字节），即介质的最小写入粒度
pub const WL_DEFAULT_WR_SIZE: u32 = 16;
