// ==========================================
// 签证客户管理 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 客户表格导入与客户库对账
// - 每次运行重新发现表头映射
// - 识别重复客户，按策略跳过或补全空字段
// - 为新客户分配连续、永不复用的 CLI 编号
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 导入层 - 外部表格
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{CanonicalField, DuplicatePolicy, NormalizedDate, VisaStatus};

// 领域实体
pub use domain::{ClientRecord, ImportBatch, ImportDiagnostic, ImportStats, NewClient};

// 导入
pub use importer::{ClientImporter, ClientImporterImpl, ImportError, ImportOptions};

// API
pub use api::{ClientApi, ImportApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "签证客户管理";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
