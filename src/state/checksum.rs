//! 落盘记录的校验和契约
//!
//! 每种记录的 CRC32 覆盖其小端编码中 `crc` 字段之前的全部字节，
//! 覆盖范围是 `consts` 里的命名常量（`WL_*_CRC_SPAN`），`crc` 之后
//! 的填充不参与计算。任何记录的字段布局变更都必须同时提升
//! [`WL_LAYOUT_VERSION`](crate::consts::WL_LAYOUT_VERSION)。

use crate::consts::{WL_CFG_CRC_SPAN, WL_STATE_CRC_SPAN, WL_TRANS_CRC_SPAN};
use crate::crc::{crc32_append, WL_CRC32_INIT};
use crate::state::types::{wl_cfg_rec, wl_state_rec, wl_trans_rec};

/// 计算状态记录的 CRC32
pub fn compute_state_crc(rec: &wl_state_rec) -> u32 {
    crc32_append(WL_CRC32_INIT, &rec.encode()[..WL_STATE_CRC_SPAN])
}

/// 验证状态记录校验和
///
/// # 返回
///
/// 校验和与记录内容匹配返回 `true`，否则该副本视为撕裂
pub fn verify_state_crc(rec: &wl_state_rec) -> bool {
    compute_state_crc(rec) == rec.crc
}

/// 设置状态记录校验和
///
/// # 副作用
///
/// 更新 `rec.crc` 字段
pub fn set_state_crc(rec: &mut wl_state_rec) {
    rec.crc = compute_state_crc(rec);
}

/// 计算配置副本的 CRC32
pub fn compute_cfg_crc(rec: &wl_cfg_rec) -> u32 {
    crc32_append(WL_CRC32_INIT, &rec.encode()[..WL_CFG_CRC_SPAN])
}

/// 验证配置副本校验和
pub fn verify_cfg_crc(rec: &wl_cfg_rec) -> bool {
    compute_cfg_crc(rec) == rec.crc
}

/// 设置配置副本校验和
pub fn set_cfg_crc(rec: &mut wl_cfg_rec) {
    rec.crc = compute_cfg_crc(rec);
}

/// 计算事务标记的 CRC32
pub fn compute_trans_crc(rec: &wl_trans_rec) -> u32 {
    crc32_append(WL_CRC32_INIT, &rec.encode()[..WL_TRANS_CRC_SPAN])
}

/// 验证事务标记校验和
///
/// 撕裂的标记写入会在这里被拒绝，视为"没有进行中的事务"
pub fn verify_trans_crc(rec: &wl_trans_rec) -> bool {
    compute_trans_crc(rec) == rec.crc
}

/// 设置事务标记校验和
pub fn set_trans_crc(rec: &mut wl_trans_rec) {
    rec.crc = compute_trans_crc(rec);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::WL_LAYOUT_VERSION;

    #[test]
    fn test_state_crc_roundtrip() {
        let mut rec = wl_state_rec {
            pos: 1,
            max_pos: 9,
            move_count: 2,
            access_count: 3,
            max_count: 16,
            block_size: 4096,
            version: WL_LAYOUT_VERSION,
            device_id: 42,
            crc: 0,
        };
        set_state_crc(&mut rec);
        assert!(verify_state_crc(&rec));
    }

    #[test]
    fn test_state_crc_detects_corruption() {
        let mut rec = wl_state_rec::default();
        set_state_crc(&mut rec);
        assert!(verify_state_crc(&rec));

        // 修改任意被覆盖字段（模拟损坏）
        rec.move_count = 12345;
        assert!(!verify_state_crc(&rec));
    }

    #[test]
    fn test_crc_ignores_padding() {
        // 覆盖范围只到 crc 字段之前：两条字段相同的记录 CRC 必然一致
        let mut a = wl_state_rec::default();
        let mut b = wl_state_rec::default();
        set_state_crc(&mut a);
        set_state_crc(&mut b);
        assert_eq!(a.crc, b.crc);
    }

    #[test]
    fn test_trans_crc_rejects_torn_marker() {
        let mut rec = wl_trans_rec {
            marker: crate::consts::WL_TRANS_MARKER_OK,
            target_sector: 3,
            sub_start: 0,
            sub_count: 1,
            crc: 0,
        };
        set_trans_crc(&mut rec);
        assert!(verify_trans_crc(&rec));

        // 撕裂：字段只落下一半
        rec.sub_count = 0xFFFF_FFFF;
        assert!(!verify_trans_crc(&rec));
    }

    #[test]
    fn test_cfg_crc_deterministic() {
        let mut rec = wl_cfg_rec::default();
        set_cfg_crc(&mut rec);
        let c1 = rec.crc;
        set_cfg_crc(&mut rec);
        assert_eq!(c1, rec.crc);
    }
}
