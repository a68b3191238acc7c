//! 卷锁接口
//!
//! 挂载表对同一卷上的每个操作都用卷锁包住：引擎本身单线程、
//! 无内部锁，串行化完全交给这里。

use crate::error::Result;

/// 卷锁 trait
///
/// 用于在多线程环境中串行化同一挂载卷上的访问，不同卷各有
/// 一把锁，可以并行推进。
///
/// # 设计说明
///
/// 这是一个接口预留，允许嵌入方根据环境选择锁实现：
/// - `NoLock` - 单线程环境，无锁（默认）
/// - `Mutex<()>` - 互斥锁（`std` 特性）
/// - 自定义锁实现（RTOS 信号量等）
pub trait VolumeLock {
    /// 获取锁
    fn lock(&self) -> Result<()>;

    /// 释放锁
    fn unlock(&self) -> Result<()>;
}

/// 无锁实现（默认）
///
/// 用于单线程环境或已知不需要并发保护的场景
#[derive(Debug, Default)]
pub struct NoLock;

impl VolumeLock for NoLock {
    #[inline]
    fn lock(&self) -> Result<()> {
        Ok(())
    }

    #[inline]
    fn unlock(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(feature = "std")]
mod std_locks {
    use super::*;
    use std::sync::Mutex;

    /// Mutex 锁实现
    impl VolumeLock for Mutex<()> {
        fn lock(&self) -> Result<()> {
            let _ = self.lock().map_err(|_| {
                crate::error::Error::new(
                    crate::error::ErrorKind::Io,
                    "Failed to acquire volume lock",
                )
            })?;
            Ok(())
        }

        fn unlock(&self) -> Result<()> {
            // Rust 的 Mutex 在 lock guard drop 时自动释放
            // 这里不需要显式 unlock
            Ok(())
        }
    }
}
