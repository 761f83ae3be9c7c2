// ==========================================
// 签证客户管理 - 导入领域模型
// ==========================================
// 职责: 原始行 / 映射后行 / 导入统计 / 导入批次
// 生命周期: 除 ImportBatch 外均只存在于一次导入运行内
// ==========================================

use crate::domain::types::CanonicalField;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ==========================================
// CellValue - 单元格取值
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

impl CellValue {
    /// 转为去首尾空白的文本；空白视为无值
    ///
    /// 整数值不带小数部分（电话号码常以数字形式存储）
    pub fn as_text(&self) -> Option<String> {
        let text = match self {
            CellValue::Empty => return None,
            CellValue::Text(s) => s.trim().to_string(),
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            CellValue::Number(n) => n.to_string(),
            CellValue::Date(d) => d.format("%Y-%m-%d").to_string(),
        };
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    pub fn is_blank(&self) -> bool {
        self.as_text().is_none()
    }
}

// ==========================================
// RawRow / SheetData - 行来源输出
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct RawRow {
    pub row_number: usize, // 表格行号（表头为第 1 行）
    pub cells: HashMap<String, CellValue>,
}

impl RawRow {
    pub fn new(row_number: usize) -> Self {
        Self {
            row_number,
            cells: HashMap::new(),
        }
    }

    pub fn with_cell(mut self, header: &str, value: CellValue) -> Self {
        self.cells.insert(header.to_string(), value);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct SheetData {
    pub headers: Vec<String>, // 保持表格列顺序
    pub rows: Vec<RawRow>,
}

// ==========================================
// ImportRow - 映射后的行
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportRow {
    pub row_number: usize,
    pub full_name: Option<String>,
    pub contact_number: Option<String>,
    pub application_date: Option<String>,
    pub nationality: Option<String>,
    pub visa_status: Option<String>,
    pub responsible_employee: Option<String>,
    pub passport_number: Option<String>,
    pub processed_by: Option<String>,
    pub summary: Option<String>,
    pub notes: Option<String>,
}

impl ImportRow {
    pub fn set(&mut self, field: CanonicalField, value: Option<String>) {
        let slot = match field {
            CanonicalField::FullName => &mut self.full_name,
            CanonicalField::ContactNumber => &mut self.contact_number,
            CanonicalField::ApplicationDate => &mut self.application_date,
            CanonicalField::Nationality => &mut self.nationality,
            CanonicalField::VisaStatus => &mut self.visa_status,
            CanonicalField::ResponsibleEmployee => &mut self.responsible_employee,
            CanonicalField::PassportNumber => &mut self.passport_number,
            CanonicalField::ProcessedBy => &mut self.processed_by,
            CanonicalField::Summary => &mut self.summary,
            CanonicalField::Notes => &mut self.notes,
        };
        *slot = value;
    }
}

// ==========================================
// RowStage - 行级错误的退出阶段
// ==========================================
// 行处理: 映射 → 校验 → 日期规范化 → 重复判定 → (分配编号 | 命中已有) → 写入
// 映射与日期规范化不会失败；分配编号耗尽为运行级错误
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RowStage {
    /// 必填字段为空
    Validated,
    /// 按姓名查询已有客户失败
    DuplicateChecked,
    /// 新增或补全写入被存储拒绝
    Persisted,
}

impl fmt::Display for RowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RowStage::Validated => "VALIDATED",
            RowStage::DuplicateChecked => "DUPLICATE_CHECKED",
            RowStage::Persisted => "PERSISTED",
        };
        write!(f, "{}", s)
    }
}

/// 行级错误（行号 + 失败阶段 + 原因）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowError {
    pub row_number: usize,
    pub stage: RowStage,
    pub reason: String,
}

// ==========================================
// ImportDiagnostic - 运行诊断（供人工复核）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportDiagnostic {
    /// 规范字段本次未找到对应列，所有行按空值处理
    FieldUnresolved {
        field: CanonicalField,
        reason: String,
    },
    /// 仅姓名相同（联系电话不同），已作为新客户导入
    PossibleDuplicate {
        row_number: usize,
        new_client_id: String,
        existing_client_ids: Vec<String>,
    },
    /// 重复客户已补全空字段
    DuplicateEnriched {
        row_number: usize,
        client_id: String,
        fields: Vec<CanonicalField>,
    },
    /// 签证状态无法识别，已使用默认状态
    UnknownVisaStatus { row_number: usize, value: String },
    /// 存储中存在前缀匹配但序号非法的客户编号（不参与最大值计算）
    MalformedClientId { client_id: String },
}

// ==========================================
// ImportStats - 导入运行结果
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportStats {
    pub batch_id: String,
    pub file_name: Option<String>,
    pub total_rows: usize,

    // ===== 互斥计数（每行恰好计入其一）=====
    pub imported: usize,
    pub duplicates: usize,
    pub errors: usize,

    // ===== 细分计数 =====
    pub enriched: usize,            // duplicates 中被补全的行数
    pub possible_duplicates: usize, // imported 中仅姓名相同的行数

    pub new_client_ids: Vec<String>, // 按文件行顺序
    pub row_errors: Vec<RowError>,   // 按文件行顺序
    pub diagnostics: Vec<ImportDiagnostic>,
    pub elapsed_ms: i64,
}

impl ImportStats {
    pub fn new(batch_id: String, file_name: Option<String>) -> Self {
        Self {
            batch_id,
            file_name,
            ..Default::default()
        }
    }

    pub fn record_error(&mut self, row_number: usize, stage: RowStage, reason: impl Into<String>) {
        self.errors += 1;
        self.row_errors.push(RowError {
            row_number,
            stage,
            reason: reason.into(),
        });
    }
}

// ==========================================
// ImportBatch - 导入批次历史
// ==========================================
// 对齐: import_batch 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportBatch {
    pub batch_id: String,
    pub file_name: Option<String>,
    pub total_rows: i64,
    pub imported: i64,
    pub duplicates: i64,
    pub enriched: i64,
    pub errors: i64,
    pub elapsed_ms: i64,
    pub imported_at: DateTime<Utc>,
    pub stats_json: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_value_as_text() {
        assert_eq!(CellValue::Empty.as_text(), None);
        assert_eq!(CellValue::Text("  ".to_string()).as_text(), None);
        assert_eq!(
            CellValue::Text(" Ali ".to_string()).as_text(),
            Some("Ali".to_string())
        );
        assert_eq!(
            CellValue::Number(212600112233.0).as_text(),
            Some("212600112233".to_string())
        );
        assert_eq!(CellValue::Number(1.5).as_text(), Some("1.5".to_string()));
        let d = NaiveDate::from_ymd_opt(2025, 1, 5).unwrap();
        assert_eq!(CellValue::Date(d).as_text(), Some("2025-01-05".to_string()));
    }

    #[test]
    fn test_record_error_keeps_order() {
        let mut stats = ImportStats::new("b".to_string(), None);
        stats.record_error(3, RowStage::Validated, "empty name");
        stats.record_error(7, RowStage::Persisted, "write failed");
        assert_eq!(stats.errors, 2);
        assert_eq!(stats.row_errors[0].row_number, 3);
        assert_eq!(stats.row_errors[1].stage, RowStage::Persisted);
    }

    #[test]
    fn test_row_stage_serialized_name_matches_display() {
        for stage in [RowStage::Validated, RowStage::DuplicateChecked, RowStage::Persisted] {
            let json = serde_json::to_string(&stage).unwrap();
            assert_eq!(json, format!("\"{}\"", stage));
        }
    }
}
