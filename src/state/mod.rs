//! 持久化状态
//!
//! 磨损均衡层落盘的三种记录：状态记录（双副本）、配置副本和
//! 掉电安全适配器的事务标记。
//!
//! state/types.rs 定义记录的字段和显式小端编解码
//! state/checksum.rs 定义每种记录的 CRC 契约（覆盖范围是布局常量，
//! 不是从结构体大小推算出来的）

pub mod checksum;
pub mod types;

pub use types::{wl_cfg_rec, wl_state_rec, wl_trans_rec};
