// ==========================================
// 签证客户管理 - 客户领域模型
// ==========================================
// 对齐: clients 表
// ==========================================

use crate::domain::types::{NormalizedDate, VisaStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// ClientRecord - 客户主数据
// ==========================================
// 红线: client_id 一经分配不可修改，删除后亦不回收
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRecord {
    // ===== 主键 =====
    pub client_id: String, // CLI + 至少 3 位补零序号

    // ===== 基础信息 =====
    pub full_name: String,
    pub contact_number: Option<String>, // 原始录入形式
    pub nationality: Option<String>,
    pub passport_number: Option<String>,

    // ===== 申请日期 =====
    pub application_date: Option<String>, // 原始录入形式（显示用）
    pub application_date_normalized: NormalizedDate,

    // ===== 流程信息 =====
    pub visa_status: VisaStatus,
    pub responsible_employee: Option<String>,
    pub processed_by: Option<String>,
    pub summary: Option<String>,
    pub notes: Option<String>,

    // ===== 审计字段 =====
    pub source_batch_id: Option<String>, // 创建该记录的导入批次（人工录入为空）
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ClientRecord {
    /// 去除非数字字符后的联系电话（重复判定键的一部分）
    pub fn contact_digits(&self) -> String {
        self.contact_number
            .as_deref()
            .map(crate::importer::data_cleaner::normalize_contact_number)
            .unwrap_or_default()
    }
}

// ==========================================
// ClientDraft - 已清洗、尚未分配编号的客户
// ==========================================
// 来源: 导入行（映射 + 清洗 + 日期规范化后）或人工录入
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientDraft {
    pub full_name: String,
    pub contact_number: Option<String>,
    pub nationality: Option<String>,
    pub passport_number: Option<String>,
    pub application_date: Option<String>,
    pub application_date_normalized: NormalizedDate,
    pub visa_status: Option<VisaStatus>, // None: 未提供或无法识别
    pub responsible_employee: Option<String>,
    pub processed_by: Option<String>,
    pub summary: Option<String>,
    pub notes: Option<String>,
}

impl ClientDraft {
    pub fn contact_digits(&self) -> String {
        self.contact_number
            .as_deref()
            .map(crate::importer::data_cleaner::normalize_contact_number)
            .unwrap_or_default()
    }

    /// 分配编号后转为持久化实体
    pub fn into_record(
        self,
        client_id: String,
        source_batch_id: Option<String>,
        now: DateTime<Utc>,
    ) -> ClientRecord {
        ClientRecord {
            client_id,
            full_name: self.full_name,
            contact_number: self.contact_number,
            nationality: self.nationality,
            passport_number: self.passport_number,
            application_date: self.application_date,
            application_date_normalized: self.application_date_normalized,
            visa_status: self.visa_status.unwrap_or_default(),
            responsible_employee: self.responsible_employee,
            processed_by: self.processed_by,
            summary: self.summary,
            notes: self.notes,
            source_batch_id,
            created_at: now,
            updated_at: now,
        }
    }
}

// ==========================================
// NewClient - 人工录入请求
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewClient {
    pub full_name: String,
    pub contact_number: Option<String>,
    pub nationality: Option<String>,
    pub passport_number: Option<String>,
    pub application_date: Option<String>,
    pub visa_status: Option<String>,
    pub responsible_employee: Option<String>,
    pub processed_by: Option<String>,
    pub summary: Option<String>,
    pub notes: Option<String>,
}

// ==========================================
// 列表过滤 / 分页
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientFilter {
    pub visa_status: Option<VisaStatus>,
    pub nationality: Option<String>,
    pub responsible_employee: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}

// ==========================================
// 统计视图
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientStatistics {
    pub total_clients: i64,
    pub undated_clients: i64,
    pub by_status: Vec<(String, i64)>,
    pub by_nationality: Vec<(String, i64)>,
    pub by_employee: Vec<(String, i64)>,
}
