// ==========================================
// 签证客户管理 - 事务内客户存储接口
// ==========================================
// 职责: 导入运行 / 人工录入 / 编号迁移在同一写事务内使用的读写操作
// 实现者: SqliteClientStore（借用事务连接，不持有锁）
// ==========================================

use crate::domain::client::ClientRecord;
use crate::domain::import::ImportBatch;
use crate::domain::types::{NormalizedDate, VisaStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

/// clients 表查询列（与 client_from_row 对齐）
pub(crate) const CLIENT_COLUMNS: &str = "client_id, full_name, contact_number, nationality, \
     passport_number, application_date, application_date_normalized, has_application_date, \
     visa_status, responsible_employee, processed_by, summary, notes, source_batch_id, \
     created_at, updated_at";

/// 行 → ClientRecord
pub(crate) fn client_from_row(row: &Row) -> rusqlite::Result<ClientRecord> {
    let has_date: bool = row.get(7)?;
    let normalized: Option<String> = row.get(6)?;
    let status: String = row.get(8)?;
    Ok(ClientRecord {
        client_id: row.get(0)?,
        full_name: row.get(1)?,
        contact_number: row.get(2)?,
        nationality: row.get(3)?,
        passport_number: row.get(4)?,
        application_date: row.get(5)?,
        application_date_normalized: NormalizedDate::from_stored(has_date, normalized),
        visa_status: VisaStatus::from_db_str(&status).unwrap_or_default(),
        responsible_employee: row.get(9)?,
        processed_by: row.get(10)?,
        summary: row.get(11)?,
        notes: row.get(12)?,
        source_batch_id: row.get(13)?,
        created_at: row.get::<_, DateTime<Utc>>(14)?,
        updated_at: row.get::<_, DateTime<Utc>>(15)?,
    })
}

// ==========================================
// ClientIdSource - 编号分配器所需的读路径
// ==========================================
pub trait ClientIdSource {
    /// 所有以前缀开头的编号（含已删除并退役的编号）
    fn list_prefixed_ids(&self, prefix: &str) -> RepositoryResult<Vec<String>>;

    /// 编号是否已被使用（含已退役编号）
    fn client_id_exists(&self, client_id: &str) -> RepositoryResult<bool>;
}

// ==========================================
// ClientStore - 写事务内的完整操作集
// ==========================================
pub trait ClientStore: ClientIdSource {
    /// 按去空白后的姓名精确查找（插入顺序）
    fn find_by_full_name(&self, full_name: &str) -> RepositoryResult<Vec<ClientRecord>>;

    fn insert_client(&self, record: &ClientRecord) -> RepositoryResult<()>;

    /// 按 client_id 覆盖可变字段（client_id 与 created_at 不变）
    fn update_client(&self, record: &ClientRecord) -> RepositoryResult<()>;

    /// 全部编号，按插入顺序
    fn list_client_ids_in_insertion_order(&self) -> RepositoryResult<Vec<String>>;

    /// 编号迁移专用：修改编号
    fn rename_client_id(&self, old_id: &str, new_id: &str) -> RepositoryResult<()>;

    fn record_import_batch(&self, batch: &ImportBatch) -> RepositoryResult<()>;
}

// ==========================================
// SqliteClientStore
// ==========================================
pub struct SqliteClientStore<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteClientStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }
}

impl ClientIdSource for SqliteClientStore<'_> {
    fn list_prefixed_ids(&self, prefix: &str) -> RepositoryResult<Vec<String>> {
        let mut stmt = self.conn.prepare_cached(
            r#"
            SELECT client_id FROM clients WHERE substr(client_id, 1, length(?1)) = ?1
            UNION
            SELECT client_id FROM retired_client_id WHERE substr(client_id, 1, length(?1)) = ?1
            "#,
        )?;
        let ids = stmt
            .query_map(params![prefix], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    fn client_id_exists(&self, client_id: &str) -> RepositoryResult<bool> {
        let exists: bool = self.conn.query_row(
            r#"
            SELECT EXISTS(SELECT 1 FROM clients WHERE client_id = ?1)
                OR EXISTS(SELECT 1 FROM retired_client_id WHERE client_id = ?1)
            "#,
            params![client_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }
}

impl ClientStore for SqliteClientStore<'_> {
    fn find_by_full_name(&self, full_name: &str) -> RepositoryResult<Vec<ClientRecord>> {
        let sql = format!(
            "SELECT {} FROM clients WHERE TRIM(full_name) = ?1 ORDER BY seq",
            CLIENT_COLUMNS
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let records = stmt
            .query_map(params![full_name.trim()], client_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn insert_client(&self, record: &ClientRecord) -> RepositoryResult<()> {
        let mut stmt = self.conn.prepare_cached(
            r#"
            INSERT INTO clients (
                client_id, full_name, contact_number, contact_number_clean, nationality,
                passport_number, application_date, application_date_normalized,
                has_application_date, visa_status, responsible_employee, processed_by,
                summary, notes, source_batch_id, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17
            )
            "#,
        )?;
        stmt.execute(params![
            record.client_id,
            record.full_name,
            record.contact_number,
            record.contact_digits(),
            record.nationality,
            record.passport_number,
            record.application_date,
            record.application_date_normalized.sort_key(),
            record.application_date_normalized.has_date(),
            record.visa_status.to_db_str(),
            record.responsible_employee,
            record.processed_by,
            record.summary,
            record.notes,
            record.source_batch_id,
            record.created_at,
            record.updated_at,
        ])?;
        Ok(())
    }

    fn update_client(&self, record: &ClientRecord) -> RepositoryResult<()> {
        let mut stmt = self.conn.prepare_cached(
            r#"
            UPDATE clients SET
                full_name = ?2,
                contact_number = ?3,
                contact_number_clean = ?4,
                nationality = ?5,
                passport_number = ?6,
                application_date = ?7,
                application_date_normalized = ?8,
                has_application_date = ?9,
                visa_status = ?10,
                responsible_employee = ?11,
                processed_by = ?12,
                summary = ?13,
                notes = ?14,
                updated_at = ?15
            WHERE client_id = ?1
            "#,
        )?;
        let changed = stmt.execute(params![
            record.client_id,
            record.full_name,
            record.contact_number,
            record.contact_digits(),
            record.nationality,
            record.passport_number,
            record.application_date,
            record.application_date_normalized.sort_key(),
            record.application_date_normalized.has_date(),
            record.visa_status.to_db_str(),
            record.responsible_employee,
            record.processed_by,
            record.summary,
            record.notes,
            record.updated_at,
        ])?;
        if changed == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Client".to_string(),
                id: record.client_id.clone(),
            });
        }
        Ok(())
    }

    fn list_client_ids_in_insertion_order(&self) -> RepositoryResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT client_id FROM clients ORDER BY seq")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    fn rename_client_id(&self, old_id: &str, new_id: &str) -> RepositoryResult<()> {
        let changed = self.conn.execute(
            "UPDATE clients SET client_id = ?2, updated_at = ?3 WHERE client_id = ?1",
            params![old_id, new_id, Utc::now()],
        )?;
        if changed == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Client".to_string(),
                id: old_id.to_string(),
            });
        }
        Ok(())
    }

    fn record_import_batch(&self, batch: &ImportBatch) -> RepositoryResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO import_batch (
                batch_id, file_name, total_rows, imported, duplicates, enriched,
                errors, elapsed_ms, imported_at, stats_json
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                batch.batch_id,
                batch.file_name,
                batch.total_rows,
                batch.imported,
                batch.duplicates,
                batch.enriched,
                batch.errors,
                batch.elapsed_ms,
                batch.imported_at,
                batch.stats_json,
            ],
        )?;
        Ok(())
    }
}

/// 按编号读取单个客户
pub(crate) fn get_client_by_id(
    conn: &Connection,
    client_id: &str,
) -> RepositoryResult<Option<ClientRecord>> {
    let sql = format!("SELECT {} FROM clients WHERE client_id = ?1", CLIENT_COLUMNS);
    let record = conn
        .query_row(&sql, params![client_id], client_from_row)
        .optional()?;
    Ok(record)
}
