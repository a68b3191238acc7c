//! wl_core: 纯 Rust 磨损均衡闪存转换层
//!
//! 这是一个纯 Rust 实现的磨损均衡层（FTL），运行在可按扇区擦除的
//! 原始介质之上，对上层（文件系统或应用）暴露一个逻辑的、可随机
//! 读写、可按扇区擦除的设备，旨在提供：
//! - **均匀磨损**：擦写均匀分摊到整个介质，不需要独立的备用区
//! - **掉电韧性**：簿记状态双副本 + CRC，重启时自动恢复
//! - **子扇区模拟**（可选）：逻辑扇区可以小于物理擦除扇区，
//!   读出保留-擦除-写回序列可以做成跨掉电原子
//!
//! # 示例
//!
//! ```rust,ignore
//! use wl_core::{FlashAccess, MountConfig, WlRegistry, Result};
//!
//! // 实现 FlashAccess trait
//! struct MyChip {
//!     // ...
//! }
//!
//! impl FlashAccess for MyChip {
//!     // 实现必要的方法
//!     // ...
//! }
//!
//! fn main() -> Result<()> {
//!     let mut registry: WlRegistry<MyChip> = WlRegistry::new();
//!     let handle = registry.mount(MyChip::new(), MountConfig::default())?;
//!
//!     registry.write(handle, 0, b"hello")?;
//!     let mut buf = [0u8; 5];
//!     registry.read(handle, 0, &mut buf)?;
//!
//!     registry.unmount(handle)?;
//!     Ok(())
//! }
//! ```
//!
//! # 模块结构
//!
//! - [`error`] - 错误类型定义
//! - [`flash`] - 原始闪存访问抽象（能力接口、分区、内存模拟）
//! - [`consts`] - 常量定义
//! - [`state`] - 落盘记录和校验和契约
//! - [`engine`] - 磨损均衡核心引擎
//! - [`ext`] - 逻辑扇区适配器与掉电安全擦除
//! - [`device`] - 擦除策略与引擎和类型
//! - [`registry`] - 句柄管理

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

// ===== 核心模块 =====

/// 错误处理
pub mod error;

/// 原始闪存访问抽象
pub mod flash;

/// 常量定义
pub mod consts;

/// 落盘记录和校验和契约
pub mod state;

/// 磨损均衡核心引擎
pub mod engine;

/// 逻辑扇区适配器与掉电安全擦除
pub mod ext;

/// 擦除策略与引擎和类型
pub mod device;

/// 句柄管理
pub mod registry;

/// CRC32 校验和计算
pub(crate) mod crc;

// ===== 公共导出 =====

// 错误处理
pub use error::{Error, ErrorKind, Result};

// 闪存访问
pub use flash::{FlashAccess, FlashPartition, MemFlash};

// 核心引擎
pub use engine::{WlConfig, WlFlash};

// 适配器
pub use ext::{WlExtConfig, WlExtPerf, WlExtSafe};

// 引擎变体
pub use device::{ErasePolicy, WlDevice};

// 句柄管理
pub use registry::{MountConfig, NoLock, VolumeLock, WlHandle, WlRegistry, WL_MAX_VOLUMES};
