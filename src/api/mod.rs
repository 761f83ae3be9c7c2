// ==========================================
// 签证客户管理 - API 层
// ==========================================
// 职责: 面向 CLI / 调用方的业务接口，统一错误类型
// ==========================================

pub mod client_api;
pub mod error;
pub mod import_api;

// 重导出
pub use client_api::{ClientApi, ClientListResponse, IdRenumbering};
pub use error::{ApiError, ApiResult};
pub use import_api::{ImportApi, ImportApiResponse};
