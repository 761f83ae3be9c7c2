// ==========================================
// 并发导入测试
// ==========================================
// 测试目标: 并发运行串行化，编号唯一且连续
// ==========================================

mod test_helpers;

use std::collections::HashSet;
use visa_client_import::importer::id_allocator::parse_canonical_suffix;
use visa_client_import::importer::{ClientImporter, ImportOptions, CLIENT_ID_PREFIX};
use visa_client_import::logging;

use test_helpers::{all_client_ids, create_importer, create_test_db, write_csv, ARABIC_HEADER};

/// 生成 count 行互不相同的客户
fn batch_csv(tag: &str, count: usize) -> String {
    let mut content = String::from(ARABIC_HEADER);
    content.push('\n');
    for i in 0..count {
        content.push_str(&format!("{} Client {},07{:08},,,,,\n", tag, i, i));
    }
    content
}

fn suffixes(ids: &[String]) -> Vec<u64> {
    ids.iter()
        .map(|id| parse_canonical_suffix(id, CLIENT_ID_PREFIX).unwrap())
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_runs_issue_unique_contiguous_ids() {
    logging::init_test();

    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");

    let files: Vec<_> = ["A", "B", "C", "D"]
        .iter()
        .map(|tag| write_csv(&batch_csv(tag, 10)).unwrap())
        .collect();

    // 每个任务使用独立连接，写事务由 SQLite 串行化
    let mut handles = Vec::new();
    for file in &files {
        let db_path = db_path.clone();
        let path = file.path().to_path_buf();
        handles.push(tokio::spawn(async move {
            let importer = create_importer(&db_path);
            importer.import_file(path, ImportOptions::default()).await
        }));
    }

    let mut all_new = Vec::new();
    for handle in handles {
        let stats = handle.await.unwrap().expect("并发导入应该成功");
        assert_eq!(stats.imported, 10);

        // 单次运行内编号连续
        let run = suffixes(&stats.new_client_ids);
        assert!(run.windows(2).all(|w| w[1] == w[0] + 1), "运行内编号应连续: {:?}", run);
        all_new.extend(stats.new_client_ids);
    }

    let unique: HashSet<_> = all_new.iter().collect();
    assert_eq!(unique.len(), 40);

    let mut stored = suffixes(&all_client_ids(&db_path));
    stored.sort_unstable();
    assert_eq!(stored, (1..=40).collect::<Vec<u64>>());
}

#[tokio::test]
async fn test_batch_import_multiple_files() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let first = write_csv(&batch_csv("X", 3)).unwrap();
    let second = write_csv(&batch_csv("Y", 2)).unwrap();
    let missing = std::path::PathBuf::from("/nonexistent/clients.csv");

    let importer = create_importer(&db_path);
    let results = importer
        .batch_import(
            vec![first.path().to_path_buf(), second.path().to_path_buf(), missing],
            ImportOptions::default(),
        )
        .await;

    assert_eq!(results.len(), 3);
    assert!(results[0].is_ok());
    assert!(results[1].is_ok());
    assert!(results[2].is_err());

    let ids = all_client_ids(&db_path);
    assert_eq!(ids.len(), 5);
    let unique: HashSet<_> = ids.iter().collect();
    assert_eq!(unique.len(), 5);
}

#[tokio::test]
async fn test_waiting_import_does_not_stall_runtime() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let file = write_csv(&batch_csv("W", 2)).unwrap();
    let importer = create_importer(&db_path);

    // 另一连接持有写锁，导入需在 busy_timeout 内等待
    let blocker = rusqlite::Connection::open(&db_path).unwrap();
    blocker.execute_batch("BEGIN IMMEDIATE").unwrap();

    let import = importer.import_file(file.path().to_path_buf(), ImportOptions::default());
    let release = async {
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        blocker.execute_batch("COMMIT").unwrap();
    };

    // 单线程运行时：等待写锁期间释放任务仍能推进
    let (result, ()) = tokio::join!(import, release);
    let stats = result.expect("释放写锁后导入应该成功");
    assert_eq!(stats.imported, 2);
    assert_eq!(all_client_ids(&db_path).len(), 2);
}
