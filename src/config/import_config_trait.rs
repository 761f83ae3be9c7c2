// ==========================================
// 签证客户管理 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入模块所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::domain::types::DuplicatePolicy;
use crate::importer::error::ImportResult;
use async_trait::async_trait;

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 用途: 导入模块所需的配置读取接口
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait ImportConfigReader: Send + Sync {
    /// 获取重复客户处理策略
    ///
    /// # 默认值
    /// - ENRICH
    async fn get_duplicate_policy(&self) -> ImportResult<DuplicatePolicy>;

    /// 获取客户编号最小序号宽度
    ///
    /// # 默认值
    /// - 3
    async fn get_id_min_width(&self) -> ImportResult<usize>;

    /// 获取编号冲突最大重试次数
    ///
    /// # 默认值
    /// - 3
    async fn get_id_collision_max_retries(&self) -> ImportResult<u32>;
}
