// ==========================================
// 签证客户管理 - 客户仓储
// ==========================================
// 职责: 写事务边界（BEGIN IMMEDIATE）+ 列表/检索/统计/状态修改/删除
// 并发: 写事务即导入运行的互斥单元；文件库 WAL 模式下读不被阻塞
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::client::{ClientFilter, ClientRecord, ClientStatistics, Page};
use crate::domain::import::ImportBatch;
use crate::domain::types::VisaStatus;
use crate::importer::data_cleaner::normalize_contact_number;
use crate::repository::client_store::{
    client_from_row, get_client_by_id, SqliteClientStore, CLIENT_COLUMNS,
};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, TransactionBehavior};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// 时间顺序排序子句
///
/// 有日期在前 → 规范日期升序 → 规范编号按数值升序 → 非规范编号按字面升序
pub const CHRONOLOGICAL_ORDER_BY: &str = r#"
    ORDER BY has_application_date DESC,
             application_date_normalized ASC,
             CASE WHEN client_id GLOB 'CLI[0-9]*' AND substr(client_id, 4) NOT GLOB '*[^0-9]*'
                  THEN 0 ELSE 1 END ASC,
             CASE WHEN client_id GLOB 'CLI[0-9]*' AND substr(client_id, 4) NOT GLOB '*[^0-9]*'
                  THEN CAST(substr(client_id, 4) AS INTEGER) ELSE 0 END ASC,
             client_id ASC
"#;

// ==========================================
// ClientRepository
// ==========================================
/// 克隆共享同一连接
#[derive(Clone)]
pub struct ClientRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ClientRepository {
    /// 创建新的 Repository 实例（独立连接）
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn lock(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 在写事务中执行闭包
    ///
    /// - BEGIN IMMEDIATE 立即取得写锁，并发写事务在 busy_timeout 内排队
    /// - 闭包返回 Ok 时提交，返回 Err 时回滚（事务对象析构即回滚）
    /// - 提交失败视为整体失败，不存在部分持久化
    pub fn with_write_transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&SqliteClientStore<'_>) -> Result<T, E>,
        E: From<RepositoryError>,
    {
        let mut guard = self.lock()?;
        let tx = guard
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| RepositoryError::DatabaseTransactionError(format!("开启写事务失败: {}", e)))?;

        let value = {
            let store = SqliteClientStore::new(&tx);
            f(&store)
        };

        match value {
            Ok(v) => {
                tx.commit().map_err(|e| {
                    RepositoryError::DatabaseTransactionError(format!("提交事务失败: {}", e))
                })?;
                debug!("写事务已提交");
                Ok(v)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback() {
                    warn!(error = %rollback_err, "写事务回滚失败");
                }
                debug!("写事务已回滚");
                Err(e)
            }
        }
    }

    // ==========================================
    // 查询
    // ==========================================

    pub fn get_client(&self, client_id: &str) -> RepositoryResult<Option<ClientRecord>> {
        let conn = self.lock()?;
        get_client_by_id(&conn, client_id.trim())
    }

    /// 按时间顺序列出客户（过滤 + 分页）
    pub fn list_chronological(
        &self,
        filter: &ClientFilter,
        page: Page,
    ) -> RepositoryResult<Vec<ClientRecord>> {
        let (where_sql, mut values) = build_filter(filter);
        values.push(Value::Integer(page.limit.max(0)));
        values.push(Value::Integer(page.offset.max(0)));
        let sql = format!(
            "SELECT {} FROM clients {} {} LIMIT ?{} OFFSET ?{}",
            CLIENT_COLUMNS,
            where_sql,
            CHRONOLOGICAL_ORDER_BY,
            values.len() - 1,
            values.len()
        );

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map(params_from_iter(values.iter()), client_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// 过滤后的总数
    pub fn count(&self, filter: &ClientFilter) -> RepositoryResult<i64> {
        let (where_sql, values) = build_filter(filter);
        let sql = format!("SELECT COUNT(*) FROM clients {}", where_sql);
        let conn = self.lock()?;
        let total = conn.query_row(&sql, params_from_iter(values.iter()), |row| row.get(0))?;
        Ok(total)
    }

    /// 检索（姓名 / 编号 / 电话数字 / 护照号），结果按时间顺序
    pub fn search(&self, term: &str, page: Page) -> RepositoryResult<Vec<ClientRecord>> {
        let filter = ClientFilter {
            search: Some(term.to_string()),
            ..Default::default()
        };
        self.list_chronological(&filter, page)
    }

    /// 统计（总数 / 无日期数 / 按状态 / 按国籍 / 按负责员工）
    pub fn statistics(&self) -> RepositoryResult<ClientStatistics> {
        let conn = self.lock()?;
        let total_clients: i64 = conn.query_row("SELECT COUNT(*) FROM clients", [], |r| r.get(0))?;
        let undated_clients: i64 = conn.query_row(
            "SELECT COUNT(*) FROM clients WHERE has_application_date = 0",
            [],
            |r| r.get(0),
        )?;

        let group = |column: &str| -> RepositoryResult<Vec<(String, i64)>> {
            let sql = format!(
                "SELECT COALESCE(NULLIF(TRIM({col}), ''), '-') AS k, COUNT(*) AS n \
                 FROM clients GROUP BY k ORDER BY n DESC, k ASC",
                col = column
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        };

        Ok(ClientStatistics {
            total_clients,
            undated_clients,
            by_status: group("visa_status")?,
            by_nationality: group("nationality")?,
            by_employee: group("responsible_employee")?,
        })
    }

    /// 导入历史（最近在前）
    pub fn list_import_batches(&self, limit: i64) -> RepositoryResult<Vec<ImportBatch>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT batch_id, file_name, total_rows, imported, duplicates, enriched,
                   errors, elapsed_ms, imported_at, stats_json
            FROM import_batch
            ORDER BY imported_at DESC
            LIMIT ?1
            "#,
        )?;
        let batches = stmt
            .query_map(params![limit.max(0)], |row| {
                Ok(ImportBatch {
                    batch_id: row.get(0)?,
                    file_name: row.get(1)?,
                    total_rows: row.get(2)?,
                    imported: row.get(3)?,
                    duplicates: row.get(4)?,
                    enriched: row.get(5)?,
                    errors: row.get(6)?,
                    elapsed_ms: row.get(7)?,
                    imported_at: row.get(8)?,
                    stats_json: row.get(9)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(batches)
    }

    // ==========================================
    // 修改
    // ==========================================

    pub fn update_visa_status(&self, client_id: &str, status: VisaStatus) -> RepositoryResult<()> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE clients SET visa_status = ?2, updated_at = ?3 WHERE client_id = ?1",
            params![client_id.trim(), status.to_db_str(), Utc::now()],
        )?;
        if changed == 0 {
            return Err(not_found(client_id));
        }
        info!(client_id = %client_id, status = %status, "签证状态已更新");
        Ok(())
    }

    pub fn update_notes(&self, client_id: &str, notes: Option<&str>) -> RepositoryResult<()> {
        let notes = notes.map(str::trim).filter(|n| !n.is_empty());
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE clients SET notes = ?2, updated_at = ?3 WHERE client_id = ?1",
            params![client_id.trim(), notes, Utc::now()],
        )?;
        if changed == 0 {
            return Err(not_found(client_id));
        }
        Ok(())
    }

    /// 删除客户；编号进入退役表，不再分配
    pub fn delete_client(&self, client_id: &str) -> RepositoryResult<()> {
        let client_id = client_id.trim().to_string();
        let mut guard = self.lock()?;
        let tx = guard.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let changed = tx.execute("DELETE FROM clients WHERE client_id = ?1", params![client_id])?;
        if changed == 0 {
            return Err(not_found(&client_id));
        }
        tx.execute(
            "INSERT OR IGNORE INTO retired_client_id (client_id, retired_at) VALUES (?1, ?2)",
            params![client_id, Utc::now()],
        )?;
        tx.commit()?;
        info!(client_id = %client_id, "客户已删除，编号已退役");
        Ok(())
    }

    /// 删除全部客户；所有编号进入退役表
    pub fn delete_all_clients(&self) -> RepositoryResult<usize> {
        let mut guard = self.lock()?;
        let tx = guard.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT OR IGNORE INTO retired_client_id (client_id, retired_at) \
             SELECT client_id, ?1 FROM clients",
            params![Utc::now()],
        )?;
        let deleted = tx.execute("DELETE FROM clients", [])?;
        tx.commit()?;
        warn!(deleted, "已删除全部客户");
        Ok(deleted)
    }
}

fn not_found(client_id: &str) -> RepositoryError {
    RepositoryError::NotFound {
        entity: "Client".to_string(),
        id: client_id.trim().to_string(),
    }
}

/// 构建 WHERE 子句与参数（参数从 ?1 起连续编号）
/// 转义 LIKE 通配符，检索词按字面匹配
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn build_filter(filter: &ClientFilter) -> (String, Vec<Value>) {
    let mut clauses: Vec<String> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    if let Some(status) = filter.visa_status {
        values.push(Value::Text(status.to_db_str().to_string()));
        clauses.push(format!("visa_status = ?{}", values.len()));
    }
    if let Some(nationality) = filter.nationality.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        values.push(Value::Text(nationality.to_string()));
        clauses.push(format!("TRIM(nationality) = ?{}", values.len()));
    }
    if let Some(employee) = filter
        .responsible_employee
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        values.push(Value::Text(employee.to_string()));
        clauses.push(format!("TRIM(responsible_employee) = ?{}", values.len()));
    }
    if let Some(term) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        values.push(Value::Text(format!("%{}%", escape_like(term))));
        let like = values.len();
        let mut parts = vec![
            format!("full_name LIKE ?{} ESCAPE '\\'", like),
            format!("client_id LIKE ?{} ESCAPE '\\'", like),
            format!("passport_number LIKE ?{} ESCAPE '\\'", like),
        ];
        let digits = normalize_contact_number(term);
        if !digits.is_empty() {
            values.push(Value::Text(format!("%{}%", digits)));
            parts.push(format!("contact_number_clean LIKE ?{}", values.len()));
        }
        clauses.push(format!("({})", parts.join(" OR ")));
    }

    if clauses.is_empty() {
        (String::new(), values)
    } else {
        (format!("WHERE {}", clauses.join(" AND ")), values)
    }
}
