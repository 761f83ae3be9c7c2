// ==========================================
// 客户导入API
// ==========================================
// 职责: 封装客户表格导入功能
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::ConfigManager;
use crate::db::open_and_init;
use crate::domain::import::{ImportDiagnostic, ImportStats, RowError};
use crate::domain::types::DuplicatePolicy;
use crate::importer::{ClientImporter, ClientImporterImpl, ImportOptions};
use crate::repository::ClientRepository;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;

/// 导入API响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportApiResponse {
    /// 批次ID
    pub batch_id: String,
    pub file_name: Option<String>,
    pub total_rows: usize,
    /// 新建客户数
    pub imported: usize,
    /// 判定为重复的行数（含补全）
    pub duplicates: usize,
    pub enriched: usize,
    pub errors: usize,
    /// 本次分配的客户编号（文件行顺序）
    pub new_client_ids: Vec<String>,
    pub row_errors: Vec<RowError>,
    pub diagnostics: Vec<ImportDiagnostic>,
    /// 导入耗时（毫秒）
    pub elapsed_ms: i64,
    /// 结果说明
    pub message: String,
}

impl From<ImportStats> for ImportApiResponse {
    fn from(stats: ImportStats) -> Self {
        let message = format!(
            "导入 {} 条，重复 {} 条（补全 {} 条），错误 {} 条",
            stats.imported, stats.duplicates, stats.enriched, stats.errors
        );
        Self {
            batch_id: stats.batch_id,
            file_name: stats.file_name,
            total_rows: stats.total_rows,
            imported: stats.imported,
            duplicates: stats.duplicates,
            enriched: stats.enriched,
            errors: stats.errors,
            new_client_ids: stats.new_client_ids,
            row_errors: stats.row_errors,
            diagnostics: stats.diagnostics,
            elapsed_ms: stats.elapsed_ms,
            message,
        }
    }
}

/// 导入API
pub struct ImportApi {
    db_path: String,
}

impl ImportApi {
    /// 创建新的ImportApi实例
    pub fn new(db_path: String) -> Self {
        Self { db_path }
    }

    /// 创建导入器（仓储与配置共享同一连接）
    fn create_importer(&self) -> ApiResult<ClientImporterImpl<ConfigManager>> {
        let conn = open_and_init(&self.db_path)
            .map_err(|e| ApiError::DatabaseConnectionError(e.to_string()))?;
        let conn = Arc::new(Mutex::new(conn));
        let repo = ClientRepository::from_connection(conn.clone());
        let config = ConfigManager::from_connection(conn)?;
        Ok(ClientImporterImpl::new(repo, config))
    }

    /// 导入客户表格
    ///
    /// # 参数
    /// - file_path: 文件路径（.xlsx/.xls/.xlsm/.ods/.csv）
    /// - policy: 重复处理策略（None 时使用配置）
    ///
    /// # 返回
    /// - Ok(ImportApiResponse): 运行已提交
    /// - Err(ApiError): 运行失败，数据库无变化
    pub async fn import_file(
        &self,
        file_path: &str,
        policy: Option<DuplicatePolicy>,
    ) -> ApiResult<ImportApiResponse> {
        if file_path.trim().is_empty() {
            return Err(ApiError::InvalidInput("文件路径不能为空".to_string()));
        }

        let importer = self.create_importer()?;
        let options = ImportOptions {
            duplicate_policy: policy,
            file_name: None,
        };
        let stats = importer.import_file(Path::new(file_path), options).await?;
        info!(batch_id = %stats.batch_id, imported = stats.imported, "导入API调用完成");
        Ok(stats.into())
    }

    /// 批量导入多个文件
    ///
    /// # 返回
    /// - 每个文件一个结果（与输入顺序一致）
    pub async fn batch_import(
        &self,
        file_paths: &[String],
        policy: Option<DuplicatePolicy>,
    ) -> ApiResult<Vec<Result<ImportApiResponse, String>>> {
        if file_paths.is_empty() {
            return Err(ApiError::InvalidInput("文件列表不能为空".to_string()));
        }

        let importer = self.create_importer()?;
        let options = ImportOptions {
            duplicate_policy: policy,
            file_name: None,
        };
        let paths: Vec<&Path> = file_paths.iter().map(Path::new).collect();
        let results = importer
            .batch_import(paths, options)
            .await
            .into_iter()
            .map(|r| r.map(ImportApiResponse::from))
            .collect();
        Ok(results)
    }
}
