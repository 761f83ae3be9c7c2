// ==========================================
// 签证客户管理 - 数据仓储层
// ==========================================
// 职责: 客户数据访问、写事务边界
// 红线: 不含导入流程逻辑
// ==========================================

pub mod client_repo;
pub mod client_store;
pub mod error;

// 重导出核心类型
pub use client_repo::ClientRepository;
pub use client_store::{ClientIdSource, ClientStore, SqliteClientStore};
pub use error::{RepositoryError, RepositoryResult};
