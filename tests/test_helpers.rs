// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的数据库初始化、测试数据生成等功能
// ==========================================

#![allow(dead_code)]

use chrono::Utc;
use rusqlite::Connection;
use std::error::Error;
use std::io::Write;
use tempfile::NamedTempFile;
use visa_client_import::config::ConfigManager;
use visa_client_import::db;
use visa_client_import::domain::client::ClientRecord;
use visa_client_import::domain::types::VisaStatus;
use visa_client_import::importer::date_normalizer::normalize_optional_date;
use visa_client_import::importer::ClientImporterImpl;
use visa_client_import::repository::{ClientRepository, ClientStore, SqliteClientStore};

/// 生产表格的表头（阿拉伯语）
pub const ARABIC_HEADER: &str =
    "الاسم الكامل,رقم الواتساب,تاريخ التقديم,الجنسية,حالة تتبع التأشيرة,اختيار الموظف مسؤول,رقم جواز السفر,ملاحظة";

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_str().unwrap().to_string();

    let conn = db::open_sqlite_connection(&db_path)?;
    db::init_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 构造客户记录
pub fn client(client_id: &str, full_name: &str, phone: Option<&str>, date: Option<&str>) -> ClientRecord {
    let now = Utc::now();
    ClientRecord {
        client_id: client_id.to_string(),
        full_name: full_name.to_string(),
        contact_number: phone.map(str::to_string),
        nationality: None,
        passport_number: None,
        application_date: date.map(str::to_string),
        application_date_normalized: normalize_optional_date(date),
        visa_status: VisaStatus::Submitted,
        responsible_employee: None,
        processed_by: None,
        summary: None,
        notes: None,
        source_batch_id: None,
        created_at: now,
        updated_at: now,
    }
}

/// 直接写入客户记录（绕过导入流程）
pub fn insert_clients(db_path: &str, records: &[ClientRecord]) -> Result<(), Box<dyn Error>> {
    let conn = Connection::open(db_path)?;
    let store = SqliteClientStore::new(&conn);
    for record in records {
        store.insert_client(record)?;
    }
    Ok(())
}

/// 预置 CLI001..CLI005
///
/// CLI003 = ("Sara Benali", "0612345678")，护照号为空
pub fn seed_five_clients(db_path: &str) -> Result<(), Box<dyn Error>> {
    insert_clients(
        db_path,
        &[
            client("CLI001", "Youssef Amrani", Some("0600000001"), Some("02/01/2025")),
            client("CLI002", "Khadija Idrissi", Some("0600000002"), Some("03/01/2025")),
            client("CLI003", "Sara Benali", Some("0612345678"), Some("04/01/2025")),
            client("CLI004", "Hamza Tazi", Some("0600000004"), None),
            client("CLI005", "Imane Chraibi", Some("0600000005"), Some("06/01/2025")),
        ],
    )
}

/// 写入临时 CSV 文件
pub fn write_csv(content: &str) -> Result<NamedTempFile, Box<dyn Error>> {
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile()?;
    file.write_all(content.as_bytes())?;
    file.flush()?;
    Ok(file)
}

/// 创建使用独立连接的仓储
pub fn create_repo(db_path: &str) -> ClientRepository {
    ClientRepository::new(db_path).expect("Failed to create repo")
}

/// 创建测试用的导入器（独立连接）
pub fn create_importer(db_path: &str) -> ClientImporterImpl<ConfigManager> {
    let repo = create_repo(db_path);
    let config = ConfigManager::new(db_path).expect("Failed to create config");
    ClientImporterImpl::new(repo, config)
}

/// 读取全部客户编号（插入顺序）
pub fn all_client_ids(db_path: &str) -> Vec<String> {
    let conn = Connection::open(db_path).unwrap();
    let store = SqliteClientStore::new(&conn);
    store.list_client_ids_in_insertion_order().unwrap()
}
