// ==========================================
// 签证客户管理 - 配置层
// ==========================================
// 职责: 配置加载与读取
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod import_config_trait;

// 重导出
pub use config_manager::ConfigManager;
pub use import_config_trait::ImportConfigReader;
