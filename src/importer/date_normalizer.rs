// ==========================================
// 签证客户管理 - 日期规范化
// ==========================================
// 输入形态（按顺序匹配，先匹配者生效）:
//   (a) DD/MM/YYYY → 重排为 YYYY-MM-DD（仅校验结构，不校验日历）
//   (b) YYYY-MM-DD → 原样保留
//   (c) 其他       → NoDate（存储为哨兵 9999-12-31，排序最后）
// 红线: 永不失败，任何输入都有返回值
// ==========================================

use crate::domain::client::ClientRecord;
use crate::domain::types::NormalizedDate;
use crate::importer::id_allocator::{parse_canonical_suffix, CLIENT_ID_PREFIX};
use std::cmp::Ordering;

/// 规范化单个日期字符串
pub fn normalize_date(raw: &str) -> NormalizedDate {
    let s = raw.trim();
    let b = s.as_bytes();
    if b.len() != 10 {
        return NormalizedDate::NoDate;
    }

    let digits_at = |idx: &[usize]| idx.iter().all(|&i| b[i].is_ascii_digit());

    // (a) DD/MM/YYYY
    if b[2] == b'/' && b[5] == b'/' && digits_at(&[0, 1, 3, 4, 6, 7, 8, 9]) {
        return NormalizedDate::Dated(format!("{}-{}-{}", &s[6..10], &s[3..5], &s[0..2]));
    }

    // (b) YYYY-MM-DD
    if b[4] == b'-' && b[7] == b'-' && digits_at(&[0, 1, 2, 3, 5, 6, 8, 9]) {
        return NormalizedDate::Dated(s.to_string());
    }

    NormalizedDate::NoDate
}

/// 规范化可选日期（空值视为 NoDate）
pub fn normalize_optional_date(raw: Option<&str>) -> NormalizedDate {
    raw.map(normalize_date).unwrap_or(NormalizedDate::NoDate)
}

/// 客户编号的排序比较
///
/// 规范编号按数值比较（CLI999 < CLI1000），非规范编号排在其后按字面比较
pub fn client_id_cmp(a: &str, b: &str) -> Ordering {
    let ka = parse_canonical_suffix(a, CLIENT_ID_PREFIX);
    let kb = parse_canonical_suffix(b, CLIENT_ID_PREFIX);
    match (ka, kb) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

/// 时间顺序比较
///
/// 1. 有日期在前  2. 规范日期升序  3. 客户编号升序
pub fn chronological_cmp(a: &ClientRecord, b: &ClientRecord) -> Ordering {
    a.application_date_normalized
        .cmp(&b.application_date_normalized)
        .then_with(|| client_id_cmp(&a.client_id, &b.client_id))
}

/// 按时间顺序原地排序
pub fn sort_chronologically(records: &mut [ClientRecord]) {
    records.sort_by(chronological_cmp);
}
