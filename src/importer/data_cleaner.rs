// ==========================================
// 签证客户管理 - 数据清洗
// ==========================================
// 职责: TRIM / NULL 标准化 / 电话号码数字化 / 签证状态标准化
// ==========================================

use crate::domain::types::VisaStatus;

/// 去首尾空白
pub fn clean_text(value: &str) -> String {
    value.trim().to_string()
}

/// 空白字符串视为无值
pub fn normalize_null(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// 电话号码只保留数字（来源格式混杂：+、空格、横线、括号）
pub fn normalize_contact_number(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// 识别签证状态
///
/// 匹配顺序: 状态码 → 显示标签完全相等 → 标签与输入互相包含
///
/// # 返回
/// - Some(VisaStatus): 识别成功
/// - None: 空值或无法识别（调用方使用默认状态）
pub fn normalize_visa_status(raw: &str) -> Option<VisaStatus> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    if let Some(status) = VisaStatus::from_db_str(value) {
        return Some(status);
    }

    if let Some(status) = VisaStatus::ALL.iter().find(|s| s.label() == value) {
        return Some(*status);
    }

    VisaStatus::ALL
        .iter()
        .find(|s| value.contains(s.label()) || s.label().contains(value))
        .copied()
}
