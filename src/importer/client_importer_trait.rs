// ==========================================
// 签证客户管理 - 导入接口定义
// ==========================================
// 职责: 定义行来源与导入器接口（不包含实现）
// ==========================================

use crate::domain::import::{ImportStats, SheetData};
use crate::domain::types::DuplicatePolicy;
use crate::importer::error::ImportResult;
use async_trait::async_trait;
use std::path::Path;

// ==========================================
// FileParser - 行来源
// ==========================================
pub trait FileParser: Send + Sync {
    /// 解析文件为表头 + 原始行
    ///
    /// # 返回
    /// - Ok(SheetData): 表头保持列顺序，完全空白的行已跳过
    /// - Err: 文件不存在 / 格式不支持 / 解析失败
    fn parse(&self, path: &Path) -> ImportResult<SheetData>;
}

/// 单次导入运行的选项
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// 覆盖配置中的重复处理策略
    pub duplicate_policy: Option<DuplicatePolicy>,
    /// 写入导入历史的文件名
    pub file_name: Option<String>,
}

// ==========================================
// ClientImporter - 导入器
// ==========================================
#[async_trait]
pub trait ClientImporter: Send + Sync {
    /// 从文件导入客户
    ///
    /// # 返回
    /// - Ok(ImportStats): 运行已提交（行级错误在 stats 中）
    /// - Err: 文件级失败或存储失败（整体回滚）
    async fn import_file<P: AsRef<Path> + Send>(
        &self,
        file_path: P,
        options: ImportOptions,
    ) -> ImportResult<ImportStats>;

    /// 导入已解析的表格数据
    async fn import_sheet(&self, sheet: SheetData, options: ImportOptions) -> ImportResult<ImportStats>;

    /// 批量导入多个文件（每个文件一次独立运行，经写锁串行化）
    async fn batch_import<P: AsRef<Path> + Send + Sync>(
        &self,
        file_paths: Vec<P>,
        options: ImportOptions,
    ) -> Vec<Result<ImportStats, String>>;
}
