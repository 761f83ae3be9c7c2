// ==========================================
// 导入对账集成测试
// ==========================================
// 测试目标: 文件 → 列映射 → 重复判定 → 编号分配 → 落库 全流程
// ==========================================

mod test_helpers;

use visa_client_import::config::config_manager::KEY_DUPLICATE_POLICY;
use visa_client_import::config::ConfigManager;
use visa_client_import::domain::client::{ClientFilter, Page};
use visa_client_import::domain::import::{ImportDiagnostic, RowStage};
use visa_client_import::domain::types::{CanonicalField, DuplicatePolicy, NormalizedDate, VisaStatus};
use visa_client_import::importer::{ClientImporter, ImportError, ImportOptions};
use visa_client_import::logging;

use test_helpers::{
    all_client_ids, client, create_importer, create_repo, create_test_db, insert_clients,
    seed_five_clients, write_csv, ARABIC_HEADER,
};

fn scenario_csv() -> String {
    format!(
        "{}\n\
         Amina Alaoui,0611111111,10/01/2025,المغرب,تم التقديم إلى السفارة,Nadia,,\n\
         Sara Benali,06 12 34 56 78,15/01/2025,المغرب,,Karim,AB123456,ملف جديد\n\
         Omar Fassi,0622222222,,,,,,\n",
        ARABIC_HEADER
    )
}

#[tokio::test]
async fn test_reference_scenario() {
    logging::init_test();

    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    seed_five_clients(&db_path).unwrap();
    let file = write_csv(&scenario_csv()).unwrap();

    let importer = create_importer(&db_path);
    let stats = importer
        .import_file(file.path(), ImportOptions::default())
        .await
        .expect("导入应该成功");

    assert_eq!(stats.total_rows, 3);
    assert_eq!(stats.imported, 2);
    assert_eq!(stats.duplicates, 1);
    assert_eq!(stats.errors, 0);
    assert_eq!(stats.enriched, 1);
    assert_eq!(stats.new_client_ids, vec!["CLI006", "CLI007"]);

    let repo = create_repo(&db_path);

    // 文件行顺序分配编号
    let amina = repo.get_client("CLI006").unwrap().unwrap();
    assert_eq!(amina.full_name, "Amina Alaoui");
    assert_eq!(amina.visa_status, VisaStatus::SubmittedToEmbassy);
    assert_eq!(
        amina.application_date_normalized,
        NormalizedDate::Dated("2025-01-10".to_string())
    );
    let omar = repo.get_client("CLI007").unwrap().unwrap();
    assert_eq!(omar.full_name, "Omar Fassi");
    assert_eq!(omar.application_date_normalized, NormalizedDate::NoDate);
    assert_eq!(omar.visa_status, VisaStatus::Submitted);

    // 重复客户：只补全空字段
    let sara = repo.get_client("CLI003").unwrap().unwrap();
    assert_eq!(sara.passport_number.as_deref(), Some("AB123456"));
    assert_eq!(sara.notes.as_deref(), Some("ملف جديد"));
    assert_eq!(sara.contact_number.as_deref(), Some("0612345678"));
    assert_eq!(sara.application_date.as_deref(), Some("04/01/2025"));

    assert!(stats.diagnostics.iter().any(|d| matches!(
        d,
        ImportDiagnostic::DuplicateEnriched { client_id, fields, .. }
            if client_id == "CLI003" && fields.contains(&CanonicalField::PassportNumber)
    )));

    // 导入历史
    let history = repo.list_import_batches(10).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].batch_id, stats.batch_id);
    assert_eq!(history[0].imported, 2);
}

#[tokio::test]
async fn test_second_identical_import_is_idempotent() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    seed_five_clients(&db_path).unwrap();
    let file = write_csv(&scenario_csv()).unwrap();
    let importer = create_importer(&db_path);

    importer
        .import_file(file.path(), ImportOptions::default())
        .await
        .unwrap();
    let ids_after_first = all_client_ids(&db_path);
    let snapshot: Vec<_> = {
        let repo = create_repo(&db_path);
        ids_after_first
            .iter()
            .map(|id| repo.get_client(id).unwrap().unwrap().updated_at)
            .collect()
    };

    let second = importer
        .import_file(file.path(), ImportOptions::default())
        .await
        .unwrap();

    assert_eq!(second.imported, 0);
    assert_eq!(second.duplicates, 3);
    assert_eq!(second.enriched, 0);
    assert!(second.new_client_ids.is_empty());
    assert_eq!(all_client_ids(&db_path), ids_after_first);

    // 第二次运行不修改任何记录
    let repo = create_repo(&db_path);
    let after: Vec<_> = ids_after_first
        .iter()
        .map(|id| repo.get_client(id).unwrap().unwrap().updated_at)
        .collect();
    assert_eq!(after, snapshot);
}

#[tokio::test]
async fn test_calendar_invalid_date_is_kept() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let file = write_csv(&format!("{}\nLaila Haddad,0633,31/02/2025,,,,,\n", ARABIC_HEADER)).unwrap();

    let stats = create_importer(&db_path)
        .import_file(file.path(), ImportOptions::default())
        .await
        .unwrap();

    assert_eq!(stats.imported, 1);
    assert_eq!(stats.errors, 0);
    let laila = create_repo(&db_path).get_client("CLI001").unwrap().unwrap();
    assert_eq!(
        laila.application_date_normalized,
        NormalizedDate::Dated("2025-02-31".to_string())
    );
    assert_eq!(laila.application_date.as_deref(), Some("31/02/2025"));
}

#[tokio::test]
async fn test_chronological_listing_puts_undated_last() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let file = write_csv(&format!(
        "{}\n\
         A,01,,,,,,\n\
         B,02,2025-03-01,,,,,\n\
         C,03,not a date,,,,,\n\
         D,04,15/01/2025,,,,,\n",
        ARABIC_HEADER
    ))
    .unwrap();

    create_importer(&db_path)
        .import_file(file.path(), ImportOptions::default())
        .await
        .unwrap();

    let listed: Vec<String> = create_repo(&db_path)
        .list_chronological(&ClientFilter::default(), Page::default())
        .unwrap()
        .into_iter()
        .map(|c| c.full_name)
        .collect();
    assert_eq!(listed, vec!["D", "B", "A", "C"]);
}

#[tokio::test]
async fn test_header_drift_is_resolved_each_run() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let importer = create_importer(&db_path);

    let arabic = write_csv(&format!("{}\nNour,0644,,,,,,\n", ARABIC_HEADER)).unwrap();
    importer
        .import_file(arabic.path(), ImportOptions::default())
        .await
        .unwrap();

    // 第二份表格：列顺序、语言均不同，另有未命名列
    let french = write_csv(
        "Unnamed: 0,telephone,nom_complet,statut,file_date\n\
         x,0655,Rachid,تمت الموافقة على التأشيرة,2025-02-02\n\
         y,0644,Nour,,\n",
    )
    .unwrap();
    let stats = importer
        .import_file(french.path(), ImportOptions::default())
        .await
        .unwrap();

    assert_eq!(stats.imported, 1);
    assert_eq!(stats.duplicates, 1);
    let rachid = create_repo(&db_path).get_client("CLI002").unwrap().unwrap();
    assert_eq!(rachid.full_name, "Rachid");
    assert_eq!(rachid.contact_number.as_deref(), Some("0655"));
    assert_eq!(rachid.visa_status, VisaStatus::Approved);

    // 缺失的字段逐一报告
    assert!(stats.diagnostics.iter().any(|d| matches!(
        d,
        ImportDiagnostic::FieldUnresolved { field: CanonicalField::PassportNumber, .. }
    )));
}

#[tokio::test]
async fn test_empty_name_rows_are_row_errors() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let file = write_csv(&format!(
        "{}\n\
         Ali,0101,,,,,,\n\
         ,0202,,,,,,\n\
         Hind,0303,,,,,,\n",
        ARABIC_HEADER
    ))
    .unwrap();

    let stats = create_importer(&db_path)
        .import_file(file.path(), ImportOptions::default())
        .await
        .unwrap();

    assert_eq!(stats.imported, 2);
    assert_eq!(stats.errors, 1);
    assert_eq!(stats.row_errors[0].row_number, 3);
    assert_eq!(stats.row_errors[0].stage, RowStage::Validated);
    assert_eq!(stats.new_client_ids, vec!["CLI001", "CLI002"]);
}

#[tokio::test]
async fn test_skip_policy_from_config() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    seed_five_clients(&db_path).unwrap();
    ConfigManager::new(&db_path)
        .unwrap()
        .set_global_config_value(KEY_DUPLICATE_POLICY, "SKIP")
        .unwrap();

    let file = write_csv(&scenario_csv()).unwrap();
    let stats = create_importer(&db_path)
        .import_file(file.path(), ImportOptions::default())
        .await
        .unwrap();

    assert_eq!(stats.duplicates, 1);
    assert_eq!(stats.enriched, 0);
    let sara = create_repo(&db_path).get_client("CLI003").unwrap().unwrap();
    assert_eq!(sara.passport_number, None);
}

#[tokio::test]
async fn test_policy_option_overrides_config() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    seed_five_clients(&db_path).unwrap();

    let file = write_csv(&scenario_csv()).unwrap();
    let options = ImportOptions {
        duplicate_policy: Some(DuplicatePolicy::Skip),
        file_name: Some("clients-jan.csv".to_string()),
    };
    let stats = create_importer(&db_path)
        .import_file(file.path(), options)
        .await
        .unwrap();

    assert_eq!(stats.enriched, 0);
    assert_eq!(stats.file_name.as_deref(), Some("clients-jan.csv"));
}

#[tokio::test]
async fn test_identifier_widens_past_999() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    insert_clients(&db_path, &[client("CLI999", "Last Three", Some("9"), None)]).unwrap();

    let file = write_csv(&format!("{}\nFirst Four,1000,,,,,,\nNext,1001,,,,,,\n", ARABIC_HEADER)).unwrap();
    let stats = create_importer(&db_path)
        .import_file(file.path(), ImportOptions::default())
        .await
        .unwrap();

    assert_eq!(stats.new_client_ids, vec!["CLI1000", "CLI1001"]);
}

#[tokio::test]
async fn test_malformed_identifiers_are_reported_and_ignored() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    insert_clients(
        &db_path,
        &[
            client("CLI002", "Two", Some("2"), None),
            client("CLI12A", "Broken", Some("3"), None),
            client("LEGACY-77", "Legacy", Some("4"), None),
        ],
    )
    .unwrap();

    let file = write_csv(&format!("{}\nNew One,5,,,,,,\n", ARABIC_HEADER)).unwrap();
    let stats = create_importer(&db_path)
        .import_file(file.path(), ImportOptions::default())
        .await
        .unwrap();

    assert_eq!(stats.new_client_ids, vec!["CLI003"]);
    assert!(stats.diagnostics.contains(&ImportDiagnostic::MalformedClientId {
        client_id: "CLI12A".to_string()
    }));
}

#[tokio::test]
async fn test_storage_rejection_is_a_row_error() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let mut holder = client("CLI001", "Holder", Some("1"), None);
    holder.passport_number = Some("P-001".to_string());
    insert_clients(&db_path, &[holder]).unwrap();

    let file = write_csv(&format!(
        "{}\n\
         Other Person,22,,,,,P-001,\n\
         Third Person,33,,,,,P-003,\n",
        ARABIC_HEADER
    ))
    .unwrap();
    let stats = create_importer(&db_path)
        .import_file(file.path(), ImportOptions::default())
        .await
        .unwrap();

    assert_eq!(stats.errors, 1);
    assert_eq!(stats.row_errors[0].row_number, 2);
    assert_eq!(stats.row_errors[0].stage, RowStage::Persisted);
    assert_eq!(stats.imported, 1);
    assert_eq!(all_client_ids(&db_path).len(), 2);
}

#[tokio::test]
async fn test_failed_run_rolls_back_everything() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    seed_five_clients(&db_path).unwrap();

    // 批次记录写入失败 → 整个运行回滚
    let conn = rusqlite::Connection::open(&db_path).unwrap();
    conn.execute_batch(
        "CREATE TRIGGER block_history BEFORE INSERT ON import_batch \
         BEGIN SELECT RAISE(ABORT, 'history disabled'); END;",
    )
    .unwrap();
    drop(conn);

    let file = write_csv(&scenario_csv()).unwrap();
    let result = create_importer(&db_path)
        .import_file(file.path(), ImportOptions::default())
        .await;

    assert!(matches!(result, Err(ImportError::Repository(_))));
    assert_eq!(all_client_ids(&db_path).len(), 5);
    let repo = create_repo(&db_path);
    assert_eq!(repo.get_client("CLI003").unwrap().unwrap().passport_number, None);
    assert!(repo.list_import_batches(10).unwrap().is_empty());
}

#[tokio::test]
async fn test_unreadable_file_changes_nothing() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let result = create_importer(&db_path)
        .import_file("/nonexistent/clients.csv", ImportOptions::default())
        .await;

    assert!(matches!(result, Err(ImportError::FileNotFound(_))));
    assert!(create_repo(&db_path).list_import_batches(10).unwrap().is_empty());
}
