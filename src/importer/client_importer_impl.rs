// ==========================================
// 签证客户管理 - 客户导入器实现
// ==========================================
// 职责: 整合导入流程，从文件到数据库
// 流程: 解析 → 列映射 → 清洗 → 日期规范化 → 重复判定 → 编号分配 → 落库 → 批次记录
// 事务: 一次运行 = 一个写事务（BEGIN IMMEDIATE）
// - 行级问题记入 ImportStats，不中断运行
// - 运行级错误（编号耗尽 / 存储失败）整体回滚，不留下部分数据与批次记录
// ==========================================

use crate::config::ImportConfigReader;
use crate::domain::client::ClientDraft;
use crate::domain::import::{ImportBatch, ImportDiagnostic, ImportRow, ImportStats, RowStage, SheetData};
use crate::domain::types::DuplicatePolicy;
use crate::importer::client_importer_trait::{ClientImporter, FileParser, ImportOptions};
use crate::importer::data_cleaner::{normalize_null, normalize_visa_status};
use crate::importer::date_normalizer::normalize_optional_date;
use crate::importer::duplicate_detector::{DuplicateDetector, DuplicateVerdict};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_mapper::{FieldMapper, FieldMapping};
use crate::importer::file_parser::UniversalFileParser;
use crate::importer::id_allocator::{IdAllocator, CLIENT_ID_PREFIX};
use crate::repository::client_repo::ClientRepository;
use crate::repository::client_store::ClientStore;
use chrono::Utc;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn, Span};
use uuid::Uuid;

/// 单次运行的生效参数
#[derive(Debug, Clone, Copy)]
struct RunSettings {
    policy: DuplicatePolicy,
    min_width: usize,
    max_retries: u32,
}

// ==========================================
// ClientImporterImpl - 客户导入器实现
// ==========================================
pub struct ClientImporterImpl<C>
where
    C: ImportConfigReader,
{
    // 数据访问层
    repo: ClientRepository,

    // 配置读取器
    config: C,

    // 导入组件
    file_parser: Box<dyn FileParser>,
    field_mapper: FieldMapper,
    detector: DuplicateDetector,
}

impl<C> ClientImporterImpl<C>
where
    C: ImportConfigReader,
{
    /// 使用默认组件创建（通用文件解析器 + 内置表头词表）
    pub fn new(repo: ClientRepository, config: C) -> Self {
        Self::with_components(repo, config, Box::new(UniversalFileParser), FieldMapper::default())
    }

    /// 创建导入器
    ///
    /// # 参数
    /// - repo: 客户仓储（提供写事务）
    /// - config: 配置读取器
    /// - file_parser: 行来源
    /// - field_mapper: 列发现
    pub fn with_components(
        repo: ClientRepository,
        config: C,
        file_parser: Box<dyn FileParser>,
        field_mapper: FieldMapper,
    ) -> Self {
        Self {
            repo,
            config,
            file_parser,
            field_mapper,
            detector: DuplicateDetector,
        }
    }

    async fn load_settings(&self, options: &ImportOptions) -> ImportResult<RunSettings> {
        let policy = match options.duplicate_policy {
            Some(policy) => policy,
            None => self.config.get_duplicate_policy().await?,
        };
        Ok(RunSettings {
            policy,
            min_width: self.config.get_id_min_width().await?,
            max_retries: self.config.get_id_collision_max_retries().await?,
        })
    }
}

// ==========================================
// 运行主体（写事务内）
// ==========================================
/// 在写事务内处理全部行并记录批次（同步执行，调用方放入阻塞线程池）
fn reconcile(
    repo: &ClientRepository,
    detector: &DuplicateDetector,
    sheet: &SheetData,
    mapping: &FieldMapping,
    settings: RunSettings,
    mut stats: ImportStats,
    started: Instant,
) -> ImportResult<ImportStats> {
    repo.with_write_transaction(|store| {
        // === 步骤 3: 编号分配器播种 ===
        let mut allocator =
            IdAllocator::seed_from_store(store, CLIENT_ID_PREFIX, settings.min_width)?;
        for client_id in allocator.malformed_ids() {
            stats.diagnostics.push(ImportDiagnostic::MalformedClientId {
                client_id: client_id.clone(),
            });
        }
        debug!(next_id = %allocator.peek(), "编号分配器就绪");

        // === 步骤 4: 逐行处理（文件顺序）===
        for raw in &sheet.rows {
            let row = mapping.map_row(raw);
            process_row(detector, store, &mut allocator, row, settings, &mut stats)?;
        }

        // === 步骤 5: 记录批次 ===
        stats.elapsed_ms = started.elapsed().as_millis() as i64;
        let batch = ImportBatch {
            batch_id: stats.batch_id.clone(),
            file_name: stats.file_name.clone(),
            total_rows: stats.total_rows as i64,
            imported: stats.imported as i64,
            duplicates: stats.duplicates as i64,
            enriched: stats.enriched as i64,
            errors: stats.errors as i64,
            elapsed_ms: stats.elapsed_ms,
            imported_at: Utc::now(),
            stats_json: serde_json::to_string(&stats)
                .map_err(|e| ImportError::InternalError(format!("统计序列化失败: {}", e)))?,
        };
        store.record_import_batch(&batch)?;

        Ok(stats)
    })
}

/// 处理单行
///
/// 仅运行级错误（编号分配耗尽）通过 Err 返回，其余问题记为行级错误
fn process_row<S: ClientStore + ?Sized>(
    detector: &DuplicateDetector,
    store: &S,
    allocator: &mut IdAllocator,
    row: ImportRow,
    settings: RunSettings,
    stats: &mut ImportStats,
) -> ImportResult<()> {
    let row_number = row.row_number;

    // 校验：姓名必填
    let full_name = match normalize_null(row.full_name) {
        Some(name) => name,
        None => {
            debug!(row_number, "姓名为空，跳过");
            stats.record_error(row_number, RowStage::Validated, "姓名为空");
            return Ok(());
        }
    };

    // 签证状态：无法识别时使用默认状态并记录诊断
    let raw_status = normalize_null(row.visa_status);
    let visa_status = raw_status.as_deref().and_then(normalize_visa_status);
    if let (Some(raw), None) = (&raw_status, visa_status) {
        stats.diagnostics.push(ImportDiagnostic::UnknownVisaStatus {
            row_number,
            value: raw.clone(),
        });
    }

    let application_date = normalize_null(row.application_date);
    let draft = ClientDraft {
        full_name,
        contact_number: normalize_null(row.contact_number),
        nationality: normalize_null(row.nationality),
        passport_number: normalize_null(row.passport_number),
        application_date_normalized: normalize_optional_date(application_date.as_deref()),
        application_date,
        visa_status,
        responsible_employee: normalize_null(row.responsible_employee),
        processed_by: normalize_null(row.processed_by),
        summary: normalize_null(row.summary),
        notes: normalize_null(row.notes),
    };

    let verdict = match detector.check(store, &draft) {
        Ok(verdict) => verdict,
        Err(e) => {
            warn!(row_number, error = %e, "重复判定失败");
            stats.record_error(row_number, RowStage::DuplicateChecked, e.to_string());
            return Ok(());
        }
    };

    let possible_of = match verdict {
        DuplicateVerdict::Duplicate { existing } => {
            stats.duplicates += 1;
            if settings.policy == DuplicatePolicy::Skip {
                debug!(row_number, client_id = %existing.client_id, "重复客户，跳过");
                return Ok(());
            }

            if let Some(enrichment) = detector.enrich(&existing, &draft, Utc::now()) {
                if let Err(e) = store.update_client(&enrichment.record) {
                    // 行已计入 duplicates，失败时改计为错误
                    stats.duplicates -= 1;
                    warn!(row_number, client_id = %existing.client_id, error = %e, "补全写入失败");
                    stats.record_error(row_number, RowStage::Persisted, e.to_string());
                    return Ok(());
                }
                debug!(row_number, client_id = %existing.client_id, filled = enrichment.filled.len(), "重复客户已补全");
                stats.enriched += 1;
                stats.diagnostics.push(ImportDiagnostic::DuplicateEnriched {
                    row_number,
                    client_id: existing.client_id.clone(),
                    fields: enrichment.filled,
                });
            }
            return Ok(());
        }
        DuplicateVerdict::PossibleDuplicate { existing_client_ids } => Some(existing_client_ids),
        DuplicateVerdict::New => None,
    };

    // 新客户：分配编号（耗尽为运行级错误）
    let client_id = allocator.allocate_checked(store, settings.max_retries)?;
    let record = draft.into_record(client_id.clone(), Some(stats.batch_id.clone()), Utc::now());

    if let Err(e) = store.insert_client(&record) {
        warn!(row_number, client_id = %client_id, error = %e, "客户写入失败");
        stats.record_error(row_number, RowStage::Persisted, e.to_string());
        return Ok(());
    }

    stats.imported += 1;
    stats.new_client_ids.push(client_id.clone());
    if let Some(existing_client_ids) = possible_of {
        stats.possible_duplicates += 1;
        stats.diagnostics.push(ImportDiagnostic::PossibleDuplicate {
            row_number,
            new_client_id: client_id,
            existing_client_ids,
        });
    }
    Ok(())
}

#[async_trait::async_trait]
impl<C> ClientImporter for ClientImporterImpl<C>
where
    C: ImportConfigReader + Send + Sync,
{
    /// 从文件导入客户
    ///
    /// # 参数
    /// - file_path: 文件路径（.xlsx/.xls/.xlsm/.ods/.csv）
    #[instrument(skip(self, file_path, options))]
    async fn import_file<P: AsRef<Path> + Send>(
        &self,
        file_path: P,
        options: ImportOptions,
    ) -> ImportResult<ImportStats> {
        let path = file_path.as_ref();
        info!(file_path = %path.display(), "开始导入客户数据");

        // === 步骤 1: 解析文件 ===
        debug!("步骤 1: 解析文件");
        let sheet = self.file_parser.parse(path).map_err(|e| {
            error!(error = %e, "文件解析失败");
            e
        })?;
        info!(total_rows = sheet.rows.len(), "文件解析完成");

        let mut options = options;
        if options.file_name.is_none() {
            options.file_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(str::to_string);
        }

        self.import_sheet(sheet, options).await
    }

    #[instrument(skip(self, sheet, options), fields(batch_id))]
    async fn import_sheet(&self, sheet: SheetData, options: ImportOptions) -> ImportResult<ImportStats> {
        let started = Instant::now();
        let batch_id = Uuid::new_v4().to_string();
        Span::current().record("batch_id", batch_id.as_str());

        let settings = self.load_settings(&options).await?;
        debug!(policy = %settings.policy, min_width = settings.min_width, "导入参数已加载");

        let mut stats = ImportStats::new(batch_id.clone(), options.file_name);
        stats.total_rows = sheet.rows.len();

        // === 步骤 2: 列映射（每次运行重新发现）===
        debug!("步骤 2: 列映射");
        let mapping = self.field_mapper.resolve(&sheet.headers);
        stats.diagnostics.extend(mapping.diagnostics());
        info!(
            resolved = mapping.resolved().len(),
            unresolved = mapping.unresolved().len(),
            "列映射完成"
        );

        // 写事务含 busy_timeout 等待，放入阻塞线程池执行
        let repo = self.repo.clone();
        let detector = self.detector;
        let span = Span::current();
        let stats = tokio::task::spawn_blocking(move || {
            span.in_scope(|| reconcile(&repo, &detector, &sheet, &mapping, settings, stats, started))
        })
        .await
        .map_err(|e| ImportError::InternalError(format!("导入任务异常终止: {}", e)))
        .and_then(|result| result)
        .map_err(|e| {
            error!(batch_id = %batch_id, error = %e, "导入运行失败，已整体回滚");
            e
        })?;

        info!(
            batch_id = %batch_id,
            total = stats.total_rows,
            imported = stats.imported,
            duplicates = stats.duplicates,
            enriched = stats.enriched,
            errors = stats.errors,
            elapsed_ms = stats.elapsed_ms,
            "客户数据导入完成"
        );
        Ok(stats)
    }

    /// 批量导入多个文件
    ///
    /// 各文件为独立运行，写事务保证同一时刻只有一个运行在写
    async fn batch_import<P: AsRef<Path> + Send + Sync>(
        &self,
        file_paths: Vec<P>,
        options: ImportOptions,
    ) -> Vec<Result<ImportStats, String>> {
        use futures::future::join_all;

        info!(count = file_paths.len(), "开始批量导入文件");

        let import_tasks = file_paths.into_iter().map(|path| {
            let path_str = path.as_ref().display().to_string();
            let mut options = options.clone();
            // 文件名以各自路径为准
            options.file_name = None;
            async move {
                info!(file = %path_str, "开始导入文件");
                match self.import_file(path, options).await {
                    Ok(stats) => {
                        info!(file = %path_str, imported = stats.imported, "文件导入成功");
                        Ok(stats)
                    }
                    Err(e) => {
                        error!(file = %path_str, error = %e, "文件导入失败");
                        Err(format!("文件 {} 导入失败: {}", path_str, e))
                    }
                }
            }
        });

        let results = join_all(import_tasks).await;

        info!(
            total = results.len(),
            success = results.iter().filter(|r| r.is_ok()).count(),
            failed = results.iter().filter(|r| r.is_err()).count(),
            "批量导入完成"
        );

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;
    use crate::domain::import::{CellValue, RawRow};
    use crate::importer::error::ImportResult;
    use async_trait::async_trait;
    use rusqlite::Connection;
    use std::sync::{Arc, Mutex};

    struct FixedConfig(DuplicatePolicy);

    #[async_trait]
    impl ImportConfigReader for FixedConfig {
        async fn get_duplicate_policy(&self) -> ImportResult<DuplicatePolicy> {
            Ok(self.0)
        }
        async fn get_id_min_width(&self) -> ImportResult<usize> {
            Ok(3)
        }
        async fn get_id_collision_max_retries(&self) -> ImportResult<u32> {
            Ok(3)
        }
    }

    fn importer(policy: DuplicatePolicy) -> ClientImporterImpl<FixedConfig> {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        let repo = ClientRepository::from_connection(Arc::new(Mutex::new(conn)));
        ClientImporterImpl::new(repo, FixedConfig(policy))
    }

    fn sheet(rows: Vec<RawRow>) -> SheetData {
        SheetData {
            headers: vec![
                "الاسم الكامل".to_string(),
                "رقم الهاتف".to_string(),
                "حالة تتبع التأشيرة".to_string(),
            ],
            rows,
        }
    }

    fn row(n: usize, name: &str, phone: &str, status: &str) -> RawRow {
        RawRow::new(n)
            .with_cell("الاسم الكامل", CellValue::Text(name.to_string()))
            .with_cell("رقم الهاتف", CellValue::Text(phone.to_string()))
            .with_cell("حالة تتبع التأشيرة", CellValue::Text(status.to_string()))
    }

    #[tokio::test]
    async fn test_rows_within_one_run_see_each_other() {
        let importer = importer(DuplicatePolicy::Enrich);
        let stats = importer
            .import_sheet(
                sheet(vec![
                    row(2, "Amina", "0600", ""),
                    row(3, "Amina", "06 00", ""),
                    row(4, "Amina", "0711", ""),
                ]),
                ImportOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(stats.imported, 2);
        assert_eq!(stats.duplicates, 1);
        assert_eq!(stats.possible_duplicates, 1);
        assert_eq!(stats.new_client_ids, vec!["CLI001", "CLI002"]);
    }

    #[tokio::test]
    async fn test_unknown_status_defaults_and_is_reported() {
        let importer = importer(DuplicatePolicy::Enrich);
        let stats = importer
            .import_sheet(sheet(vec![row(2, "Omar", "1", "??")]), ImportOptions::default())
            .await
            .unwrap();

        assert_eq!(stats.imported, 1);
        assert!(stats.diagnostics.iter().any(|d| matches!(
            d,
            ImportDiagnostic::UnknownVisaStatus { row_number: 2, .. }
        )));
        let client = importer.repo.get_client("CLI001").unwrap().unwrap();
        assert_eq!(client.visa_status, crate::domain::types::VisaStatus::Submitted);
    }

    #[tokio::test]
    async fn test_counts_partition_rows() {
        let importer = importer(DuplicatePolicy::Skip);
        let stats = importer
            .import_sheet(
                sheet(vec![
                    row(2, "A", "1", ""),
                    row(3, "", "2", ""),
                    row(4, "A", "1", ""),
                ]),
                ImportOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(stats.total_rows, 3);
        assert_eq!(stats.imported + stats.duplicates + stats.errors, stats.total_rows);
        assert_eq!(stats.row_errors[0].stage, RowStage::Validated);
    }
}
