//! 原始闪存访问抽象
//!
//! 提供磨损均衡层对底层介质的能力接口和两个实现：
//! flash/access.rs 定义 FlashAccess trait，描述介质必须提供的能力
//! （容量、扇区大小、擦除、读写、flush）
//!
//! flash/partition.rs 提供分区包装器，把设备上的一段偏移窗口
//! 作为独立的 FlashAccess 暴露出来
//!
//! flash/mem.rs 提供内存模拟的 NOR 闪存，带擦除计数和掉电注入，
//! 用于宿主机测试

mod access;
mod mem;
mod partition;

pub use access::FlashAccess;
pub use mem::MemFlash;
pub use partition::FlashPartition;
