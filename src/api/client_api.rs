// ==========================================
// 客户管理API
// ==========================================
// 职责: 列表 / 检索 / 人工录入 / 状态修改 / 删除 / 统计 / 编号迁移 / 导入历史
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::{ConfigManager, ImportConfigReader};
use crate::db::open_and_init;
use crate::domain::client::{ClientDraft, ClientFilter, ClientRecord, ClientStatistics, NewClient, Page};
use crate::domain::import::ImportBatch;
use crate::domain::types::VisaStatus;
use crate::importer::data_cleaner::{normalize_null, normalize_visa_status};
use crate::importer::date_normalizer::normalize_optional_date;
use crate::importer::error::ImportError;
use crate::importer::id_allocator::{IdAllocator, CLIENT_ID_PREFIX};
use crate::importer::id_migration::IdMigration;
use crate::repository::{ClientRepository, ClientStore};
use chrono::Utc;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::{info, instrument};

/// 客户列表响应（带分页信息）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientListResponse {
    pub clients: Vec<ClientRecord>,
    /// 过滤后的总记录数
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// 编号迁移的一条映射
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdRenumbering {
    pub old_client_id: String,
    pub new_client_id: String,
}

/// 客户管理API
pub struct ClientApi {
    repo: ClientRepository,
    config: ConfigManager,
}

impl ClientApi {
    /// 打开数据库（确保表结构存在）并创建实例
    pub fn new(db_path: &str) -> ApiResult<Self> {
        let conn = open_and_init(db_path)
            .map_err(|e| ApiError::DatabaseConnectionError(e.to_string()))?;
        Self::from_connection(Arc::new(Mutex::new(conn)))
    }

    /// 从已有连接创建
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ApiResult<Self> {
        let repo = ClientRepository::from_connection(conn.clone());
        let config = ConfigManager::from_connection(conn)?;
        Ok(Self { repo, config })
    }

    pub fn config(&self) -> &ConfigManager {
        &self.config
    }

    // ==========================================
    // 查询
    // ==========================================

    /// 按时间顺序列出客户
    pub fn list_clients(&self, filter: &ClientFilter, page: Page) -> ApiResult<ClientListResponse> {
        if page.limit <= 0 || page.offset < 0 {
            return Err(ApiError::InvalidInput(format!(
                "分页参数无效: limit={}, offset={}",
                page.limit, page.offset
            )));
        }
        let clients = self.repo.list_chronological(filter, page)?;
        let total = self.repo.count(filter)?;
        Ok(ClientListResponse {
            clients,
            total,
            limit: page.limit,
            offset: page.offset,
        })
    }

    /// 检索（姓名 / 编号 / 电话 / 护照号）
    pub fn search_clients(&self, term: &str, page: Page) -> ApiResult<Vec<ClientRecord>> {
        if term.trim().is_empty() {
            return Err(ApiError::InvalidInput("检索词不能为空".to_string()));
        }
        Ok(self.repo.search(term, page)?)
    }

    pub fn get_client(&self, client_id: &str) -> ApiResult<ClientRecord> {
        self.repo
            .get_client(client_id)?
            .ok_or_else(|| ApiError::NotFound(format!("客户(id={})不存在", client_id.trim())))
    }

    pub fn statistics(&self) -> ApiResult<ClientStatistics> {
        Ok(self.repo.statistics()?)
    }

    /// 导入历史（最近在前）
    pub fn import_history(&self, limit: i64) -> ApiResult<Vec<ImportBatch>> {
        Ok(self.repo.list_import_batches(limit)?)
    }

    // ==========================================
    // 人工录入
    // ==========================================

    /// 新建客户（编号由分配器在写事务内生成）
    #[instrument(skip(self, input))]
    pub async fn create_client(&self, input: NewClient) -> ApiResult<ClientRecord> {
        let full_name = normalize_null(Some(input.full_name))
            .ok_or_else(|| ApiError::InvalidInput("姓名不能为空".to_string()))?;

        let visa_status = match normalize_null(input.visa_status) {
            Some(raw) => Some(
                normalize_visa_status(&raw)
                    .ok_or_else(|| ApiError::InvalidInput(format!("无法识别的签证状态: {}", raw)))?,
            ),
            None => None,
        };

        let application_date = normalize_null(input.application_date);
        let draft = ClientDraft {
            full_name,
            contact_number: normalize_null(input.contact_number),
            nationality: normalize_null(input.nationality),
            passport_number: normalize_null(input.passport_number),
            application_date_normalized: normalize_optional_date(application_date.as_deref()),
            application_date,
            visa_status,
            responsible_employee: normalize_null(input.responsible_employee),
            processed_by: normalize_null(input.processed_by),
            summary: normalize_null(input.summary),
            notes: normalize_null(input.notes),
        };

        let min_width = self.config.get_id_min_width().await?;
        let max_retries = self.config.get_id_collision_max_retries().await?;

        let record = self
            .repo
            .with_write_transaction(|store| -> Result<ClientRecord, ImportError> {
                let mut allocator = IdAllocator::seed_from_store(store, CLIENT_ID_PREFIX, min_width)?;
                let client_id = allocator.allocate_checked(store, max_retries)?;
                let record = draft.into_record(client_id, None, Utc::now());
                store.insert_client(&record)?;
                Ok(record)
            })?;

        info!(client_id = %record.client_id, "客户已创建");
        Ok(record)
    }

    // ==========================================
    // 修改 / 删除
    // ==========================================

    /// 修改签证状态（接受状态码或阿拉伯语标签）
    pub fn update_visa_status(&self, client_id: &str, status: &str) -> ApiResult<VisaStatus> {
        let status = normalize_visa_status(status)
            .ok_or_else(|| ApiError::InvalidInput(format!("无法识别的签证状态: {}", status)))?;
        self.repo.update_visa_status(client_id, status)?;
        Ok(status)
    }

    pub fn update_notes(&self, client_id: &str, notes: Option<&str>) -> ApiResult<()> {
        Ok(self.repo.update_notes(client_id, notes)?)
    }

    pub fn delete_client(&self, client_id: &str) -> ApiResult<()> {
        Ok(self.repo.delete_client(client_id)?)
    }

    /// 删除全部客户（编号全部退役）
    pub fn delete_all_clients(&self) -> ApiResult<usize> {
        Ok(self.repo.delete_all_clients()?)
    }

    // ==========================================
    // 编号迁移
    // ==========================================

    /// 将非规范编号重新编号
    ///
    /// # 参数
    /// - dry_run: true 时只返回计划
    pub async fn migrate_ids(&self, dry_run: bool) -> ApiResult<Vec<IdRenumbering>> {
        let migration = IdMigration::new(
            self.config.get_id_min_width().await?,
            self.config.get_id_collision_max_retries().await?,
        );
        let plan = migration.renumber_legacy_ids(&self.repo, dry_run)?;
        Ok(plan
            .into_iter()
            .map(|(old_client_id, new_client_id)| IdRenumbering {
                old_client_id,
                new_client_id,
            })
            .collect())
    }
}
