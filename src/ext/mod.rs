//! 逻辑扇区适配层
//!
//! 在核心引擎之上把比物理擦除扇区更小的逻辑扇区暴露给上层：
//!
//! ext/perf.rs 通过"读出保留-整扇区擦除-写回"实现子扇区擦除
//! ext/safe.rs 再加一层备份扇区和事务标记，让上述序列跨掉电原子
//!
//! 两个适配器都持有下一层并显式调用它（组合而不是继承），共享的
//! 擦除范围三段拆分是这里的纯函数，各自用自己的子扇区擦除驱动。

mod perf;
mod safe;

pub use perf::{WlExtConfig, WlExtPerf};
pub use safe::WlExtSafe;

/// 擦除范围的三段拆分结果（单位：逻辑扇区 / 物理扇区）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EraseSplit {
    /// 头部不满一个物理扇区的部分：(起始逻辑扇区, 数量)
    pub lead: Option<(u32, u32)>,
    /// 中间整物理扇区的部分：(起始物理扇区, 物理扇区数)
    pub mid: Option<(u32, u32)>,
    /// 尾部不满一个物理扇区的部分：(起始逻辑扇区, 数量)
    pub tail: Option<(u32, u32)>,
}

/// 把逻辑扇区范围拆成头部/整扇区/尾部三段
///
/// 整扇区段可以直接擦除，无需读出写回；头尾两段交给调用方自己的
/// 子扇区擦除处理。
///
/// # 参数
///
/// * `size_factor` - 物理扇区 / 逻辑扇区
/// * `start_sector` - 起始逻辑扇区
/// * `count` - 逻辑扇区数量
pub(crate) fn split_erase_range(size_factor: u32, start_sector: u32, count: u32) -> EraseSplit {
    let mut sector = start_sector;
    let mut remaining = count;

    let lead = if remaining > 0 && sector % size_factor != 0 {
        let n = core::cmp::min(size_factor - sector % size_factor, remaining);
        let zone = Some((sector, n));
        sector += n;
        remaining -= n;
        zone
    } else {
        None
    };

    let mid_count = remaining / size_factor;
    let mid = if mid_count > 0 {
        Some((sector / size_factor, mid_count))
    } else {
        None
    };

    let tail_count = remaining % size_factor;
    let tail = if tail_count > 0 {
        Some((sector + mid_count * size_factor, tail_count))
    } else {
        None
    };

    EraseSplit { lead, mid, tail }
}
