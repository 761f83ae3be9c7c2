// ==========================================
// 签证客户管理 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含导入流程逻辑
// ==========================================

pub mod client;
pub mod import;
pub mod types;

// 重导出核心类型
pub use client::{ClientFilter, ClientRecord, ClientStatistics, NewClient, Page};
pub use import::{
    CellValue, ImportBatch, ImportDiagnostic, ImportRow, ImportStats, RawRow, RowError, RowStage,
    SheetData,
};
pub use types::{CanonicalField, DuplicatePolicy, NormalizedDate, VisaStatus, NO_DATE_SENTINEL};
