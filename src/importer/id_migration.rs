// ==========================================
// 签证客户管理 - 历史编号迁移
// ==========================================
// 职责: 将非规范编号（旧系统遗留）按插入顺序重新编号为规范编号
// 触发: 仅由操作员显式调用，导入运行从不自动改写编号
// ==========================================

use crate::importer::error::ImportResult;
use crate::importer::id_allocator::{
    is_canonical_client_id, IdAllocator, CLIENT_ID_PREFIX, DEFAULT_COLLISION_MAX_RETRIES,
    DEFAULT_MIN_WIDTH,
};
use crate::repository::client_repo::ClientRepository;
use crate::repository::client_store::ClientStore;
use tracing::{info, instrument};

pub struct IdMigration {
    min_width: usize,
    max_retries: u32,
}

impl Default for IdMigration {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_WIDTH, DEFAULT_COLLISION_MAX_RETRIES)
    }
}

impl IdMigration {
    pub fn new(min_width: usize, max_retries: u32) -> Self {
        Self {
            min_width,
            max_retries,
        }
    }

    /// 重新编号全部非规范编号
    ///
    /// # 参数
    /// - dry_run: true 时只返回计划，不写入
    ///
    /// # 返回
    /// - (旧编号, 新编号) 列表，按插入顺序
    #[instrument(skip(self, repo))]
    pub fn renumber_legacy_ids(
        &self,
        repo: &ClientRepository,
        dry_run: bool,
    ) -> ImportResult<Vec<(String, String)>> {
        repo.with_write_transaction(|store| {
            let legacy: Vec<String> = store
                .list_client_ids_in_insertion_order()?
                .into_iter()
                .filter(|id| !is_canonical_client_id(id))
                .collect();

            let mut allocator = IdAllocator::seed_from_store(store, CLIENT_ID_PREFIX, self.min_width)?;
            let mut plan = Vec::with_capacity(legacy.len());
            for old_id in legacy {
                let new_id = allocator.allocate_checked(store, self.max_retries)?;
                if !dry_run {
                    store.rename_client_id(&old_id, &new_id)?;
                }
                plan.push((old_id, new_id));
            }

            info!(count = plan.len(), dry_run, "历史编号迁移完成");
            Ok(plan)
        })
    }
}
