// ==========================================
// 签证客户管理 - 领域类型定义
// ==========================================
// 职责: 签证状态 / 重复处理策略 / 规范字段 / 规范日期
// ==========================================

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

// ==========================================
// 签证跟踪状态 (Visa Status)
// ==========================================
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// 显示标签: 业务表格中使用的阿拉伯语原文
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VisaStatus {
    Submitted,          // 已在系统中提交
    SubmittedToEmbassy, // 已递交使馆
    Approved,           // 签证获批
    Rejected,           // 签证被拒
    Completed,          // 流程完成
}

impl VisaStatus {
    pub const ALL: [VisaStatus; 5] = [
        VisaStatus::Submitted,
        VisaStatus::SubmittedToEmbassy,
        VisaStatus::Approved,
        VisaStatus::Rejected,
        VisaStatus::Completed,
    ];

    /// 从数据库字符串解析
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "SUBMITTED" => Some(VisaStatus::Submitted),
            "SUBMITTED_TO_EMBASSY" => Some(VisaStatus::SubmittedToEmbassy),
            "APPROVED" => Some(VisaStatus::Approved),
            "REJECTED" => Some(VisaStatus::Rejected),
            "COMPLETED" => Some(VisaStatus::Completed),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            VisaStatus::Submitted => "SUBMITTED",
            VisaStatus::SubmittedToEmbassy => "SUBMITTED_TO_EMBASSY",
            VisaStatus::Approved => "APPROVED",
            VisaStatus::Rejected => "REJECTED",
            VisaStatus::Completed => "COMPLETED",
        }
    }

    /// 业务表格中的显示标签
    pub fn label(&self) -> &'static str {
        match self {
            VisaStatus::Submitted => "تم التقديم في السيستام",
            VisaStatus::SubmittedToEmbassy => "تم التقديم إلى السفارة",
            VisaStatus::Approved => "تمت الموافقة على التأشيرة",
            VisaStatus::Rejected => "التأشيرة غير موافق عليها",
            VisaStatus::Completed => "اكتملت العملية",
        }
    }
}

impl Default for VisaStatus {
    fn default() -> Self {
        VisaStatus::Submitted
    }
}

impl fmt::Display for VisaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 重复记录处理策略 (Duplicate Policy)
// ==========================================
// SKIP: 命中重复时不做任何修改
// ENRICH: 仅补全已有记录中为空的字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DuplicatePolicy {
    Skip,
    Enrich,
}

impl DuplicatePolicy {
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "SKIP" => Some(DuplicatePolicy::Skip),
            "ENRICH" => Some(DuplicatePolicy::Enrich),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            DuplicatePolicy::Skip => "SKIP",
            DuplicatePolicy::Enrich => "ENRICH",
        }
    }
}

impl Default for DuplicatePolicy {
    fn default() -> Self {
        DuplicatePolicy::Enrich
    }
}

impl fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 规范字段 (Canonical Field)
// ==========================================
// 声明顺序即字段映射的解析顺序（先解析者优先占用列）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    FullName,
    ContactNumber,
    ApplicationDate,
    Nationality,
    VisaStatus,
    ResponsibleEmployee,
    PassportNumber,
    ProcessedBy,
    Summary,
    Notes,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 10] = [
        CanonicalField::FullName,
        CanonicalField::ContactNumber,
        CanonicalField::ApplicationDate,
        CanonicalField::Nationality,
        CanonicalField::VisaStatus,
        CanonicalField::ResponsibleEmployee,
        CanonicalField::PassportNumber,
        CanonicalField::ProcessedBy,
        CanonicalField::Summary,
        CanonicalField::Notes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalField::FullName => "full_name",
            CanonicalField::ContactNumber => "contact_number",
            CanonicalField::ApplicationDate => "application_date",
            CanonicalField::Nationality => "nationality",
            CanonicalField::VisaStatus => "visa_status",
            CanonicalField::ResponsibleEmployee => "responsible_employee",
            CanonicalField::PassportNumber => "passport_number",
            CanonicalField::ProcessedBy => "processed_by",
            CanonicalField::Summary => "summary",
            CanonicalField::Notes => "notes",
        }
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 规范日期 (Normalized Date)
// ==========================================
// 无可用日期时使用独立变体，哨兵值仅在存储/排序边界出现
pub const NO_DATE_SENTINEL: &str = "9999-12-31";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum NormalizedDate {
    /// YYYY-MM-DD（仅保证结构，不保证日历合法）
    Dated(String),
    NoDate,
}

impl NormalizedDate {
    pub fn has_date(&self) -> bool {
        matches!(self, NormalizedDate::Dated(_))
    }

    pub fn as_dated(&self) -> Option<&str> {
        match self {
            NormalizedDate::Dated(s) => Some(s.as_str()),
            NormalizedDate::NoDate => None,
        }
    }

    /// 存储列 application_date_normalized 的取值
    pub fn sort_key(&self) -> &str {
        match self {
            NormalizedDate::Dated(s) => s.as_str(),
            NormalizedDate::NoDate => NO_DATE_SENTINEL,
        }
    }

    /// 从存储列还原（has_date 标志优先）
    pub fn from_stored(has_date: bool, stored: Option<String>) -> Self {
        match stored {
            Some(s) if has_date => NormalizedDate::Dated(s),
            _ => NormalizedDate::NoDate,
        }
    }
}

impl Ord for NormalizedDate {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (NormalizedDate::Dated(a), NormalizedDate::Dated(b)) => a.cmp(b),
            (NormalizedDate::Dated(_), NormalizedDate::NoDate) => Ordering::Less,
            (NormalizedDate::NoDate, NormalizedDate::Dated(_)) => Ordering::Greater,
            (NormalizedDate::NoDate, NormalizedDate::NoDate) => Ordering::Equal,
        }
    }
}

impl PartialOrd for NormalizedDate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
