//! 错误类型定义
//!
//! 提供磨损均衡层操作的错误类型。

use core::fmt;

/// 磨损均衡层操作错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    message: &'static str,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// 介质 I/O 错误（包括模拟掉电）
    Io,
    /// 无效参数（非法配置、未对齐的擦除范围）
    InvalidInput,
    /// 无效状态（未初始化就调用，或初始化失败后继续使用）
    InvalidState,
    /// 内存不足（句柄表已满）
    OutOfMemory,
    /// 句柄不存在（区别于有效句柄上的操作失败）
    NotFound,
    /// 持久化记录损坏且无法恢复
    Corrupted,
}

impl Error {
    /// 创建新错误
    pub const fn new(kind: ErrorKind, message: &'static str) -> Self {
        Self { kind, message }
    }

    /// 获取错误类型
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// 获取错误消息
    pub const fn message(&self) -> &'static str {
        self.message
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result 类型别名
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind() {
        let err = Error::new(ErrorKind::InvalidInput, "page size below sector size");
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(err.message(), "page size below sector size");
    }

    #[test]
    fn test_error_distinct_kinds() {
        // 无效句柄与操作失败必须可区分
        let bad_handle = Error::new(ErrorKind::NotFound, "handle not mounted");
        let io_fail = Error::new(ErrorKind::Io, "flash write failed");
        assert_ne!(bad_handle.kind(), io_fail.kind());
    }
}
