// ==========================================
// 签证客户管理 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::import_config_trait::ImportConfigReader;
use crate::db::open_sqlite_connection;
use crate::domain::types::DuplicatePolicy;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::id_allocator::{DEFAULT_COLLISION_MAX_RETRIES, DEFAULT_MIN_WIDTH};
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

// ===== 配置键 =====
pub const KEY_DUPLICATE_POLICY: &str = "import/duplicate_policy";
pub const KEY_ID_MIN_WIDTH: &str = "client_id/min_width";
pub const KEY_ID_COLLISION_MAX_RETRIES: &str = "client_id/collision_max_retries";

const GLOBAL_SCOPE: &str = "global";

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
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

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let conn_guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 读取 global scope 的配置值
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_global_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;

        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = ?1 AND key = ?2",
                params![GLOBAL_SCOPE, key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global scope 的配置值（存在则覆盖）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;

        conn.execute(
            r#"
            INSERT INTO config_kv (scope_id, key, value, updated_at)
            VALUES (?1, ?2, ?3, datetime('now'))
            ON CONFLICT(scope_id, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
            params![GLOBAL_SCOPE, key, value],
        )?;
        Ok(())
    }

    /// 列出全部 global 配置（按键排序）
    pub fn list_global_config(&self) -> RepositoryResult<Vec<(String, String)>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = ?1 ORDER BY key")?;
        let rows = stmt
            .query_map(params![GLOBAL_SCOPE], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 读取配置值，带默认值
    fn get_config_or_default(&self, key: &str, default: &str) -> ImportResult<String> {
        let value = self
            .get_global_config_value(key)
            .map_err(|e| ImportError::ConfigReadError {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        Ok(value.unwrap_or_else(|| default.to_string()))
    }

    fn parse_number<T: std::str::FromStr>(&self, key: &str, default: T) -> ImportResult<T>
    where
        T: ToString,
    {
        let raw = self.get_config_or_default(key, &default.to_string())?;
        raw.trim().parse::<T>().map_err(|_| ImportError::ConfigValueError {
            key: key.to_string(),
            value: raw.clone(),
            message: "期望非负整数".to_string(),
        })
    }
}

#[async_trait]
impl ImportConfigReader for ConfigManager {
    async fn get_duplicate_policy(&self) -> ImportResult<DuplicatePolicy> {
        let raw = self.get_config_or_default(KEY_DUPLICATE_POLICY, DuplicatePolicy::default().to_db_str())?;
        DuplicatePolicy::from_db_str(&raw).ok_or_else(|| ImportError::ConfigValueError {
            key: KEY_DUPLICATE_POLICY.to_string(),
            value: raw.clone(),
            message: "期望 SKIP 或 ENRICH".to_string(),
        })
    }

    async fn get_id_min_width(&self) -> ImportResult<usize> {
        let width = self.parse_number(KEY_ID_MIN_WIDTH, DEFAULT_MIN_WIDTH)?;
        if width == 0 {
            return Err(ImportError::ConfigValueError {
                key: KEY_ID_MIN_WIDTH.to_string(),
                value: "0".to_string(),
                message: "宽度必须大于 0".to_string(),
            });
        }
        Ok(width)
    }

    async fn get_id_collision_max_retries(&self) -> ImportResult<u32> {
        self.parse_number(KEY_ID_COLLISION_MAX_RETRIES, DEFAULT_COLLISION_MAX_RETRIES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;

    fn manager() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[tokio::test]
    async fn test_defaults() {
        let config = manager();
        assert_eq!(config.get_duplicate_policy().await.unwrap(), DuplicatePolicy::Enrich);
        assert_eq!(config.get_id_min_width().await.unwrap(), 3);
        assert_eq!(config.get_id_collision_max_retries().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_overrides() {
        let config = manager();
        config.set_global_config_value(KEY_DUPLICATE_POLICY, "skip").unwrap();
        config.set_global_config_value(KEY_ID_MIN_WIDTH, "4").unwrap();
        assert_eq!(config.get_duplicate_policy().await.unwrap(), DuplicatePolicy::Skip);
        assert_eq!(config.get_id_min_width().await.unwrap(), 4);
        assert_eq!(config.list_global_config().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_value_is_reported() {
        let config = manager();
        config.set_global_config_value(KEY_ID_COLLISION_MAX_RETRIES, "many").unwrap();
        assert!(matches!(
            config.get_id_collision_max_retries().await,
            Err(ImportError::ConfigValueError { .. })
        ));
    }
}
