// ==========================================
// 签证客户管理 - 导入层
// ==========================================
// 职责: 外部表格导入，与客户库对账
// 支持: Excel, CSV
// ==========================================

// 模块声明
pub mod client_importer_impl;
pub mod client_importer_trait;
pub mod data_cleaner;
pub mod date_normalizer;
pub mod duplicate_detector;
pub mod error;
pub mod field_mapper;
pub mod file_parser;
pub mod id_allocator;
pub mod id_migration;

// 重导出核心类型
pub use client_importer_impl::ClientImporterImpl;
pub use duplicate_detector::{DuplicateDetector, DuplicateVerdict};
pub use error::{ImportError, ImportResult};
pub use field_mapper::{FieldMapper, FieldMapping};
pub use file_parser::{CsvParser, ExcelParser, UniversalFileParser};
pub use id_allocator::{IdAllocator, CLIENT_ID_PREFIX};
pub use id_migration::IdMigration;

// 重导出 Trait 接口
pub use client_importer_trait::{ClientImporter, FileParser, ImportOptions};
