// ==========================================
// 签证客户管理 - 重复客户检测
// ==========================================
// 判定键: TRIM(姓名) 完全相等 AND 电话号码（仅数字）完全相等
// - 姓名 + 电话命中 → 重复（按策略跳过或补全空字段）
// - 仅姓名命中     → 疑似重复（作为新客户导入并记录诊断）
// 红线: 补全只写入已有记录中为空的字段，绝不覆盖非空字段与 client_id
// ==========================================

use crate::domain::client::{ClientDraft, ClientRecord};
use crate::domain::types::CanonicalField;
use crate::repository::client_store::ClientStore;
use crate::repository::error::RepositoryResult;
use chrono::{DateTime, Utc};

/// 单行判定结果
#[derive(Debug, Clone)]
pub enum DuplicateVerdict {
    New,
    PossibleDuplicate { existing_client_ids: Vec<String> },
    Duplicate { existing: Box<ClientRecord> },
}

/// 补全结果
#[derive(Debug, Clone)]
pub struct Enrichment {
    pub record: ClientRecord,
    pub filled: Vec<CanonicalField>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DuplicateDetector;

impl DuplicateDetector {
    /// 针对存储判定（读路径与写入处于同一事务，运行内已写入的行同样可见）
    pub fn check<S: ClientStore + ?Sized>(
        &self,
        store: &S,
        draft: &ClientDraft,
    ) -> RepositoryResult<DuplicateVerdict> {
        let candidates = store.find_by_full_name(&draft.full_name)?;
        Ok(self.classify(&candidates, draft))
    }

    /// 在同名候选中判定
    ///
    /// 候选按插入顺序给出，多条完全命中时取最早的一条
    pub fn classify(&self, same_name: &[ClientRecord], draft: &ClientDraft) -> DuplicateVerdict {
        let name = draft.full_name.trim();
        let digits = draft.contact_digits();

        let same_name: Vec<&ClientRecord> = same_name
            .iter()
            .filter(|c| c.full_name.trim() == name)
            .collect();
        if same_name.is_empty() {
            return DuplicateVerdict::New;
        }

        match same_name.iter().find(|c| c.contact_digits() == digits) {
            Some(existing) => DuplicateVerdict::Duplicate {
                existing: Box::new((*existing).clone()),
            },
            None => DuplicateVerdict::PossibleDuplicate {
                existing_client_ids: same_name.iter().map(|c| c.client_id.clone()).collect(),
            },
        }
    }

    /// 非破坏性补全
    ///
    /// # 返回
    /// - Some(Enrichment): 至少补全了一个字段
    /// - None: 无可补全字段（记录保持不变）
    pub fn enrich(
        &self,
        existing: &ClientRecord,
        draft: &ClientDraft,
        now: DateTime<Utc>,
    ) -> Option<Enrichment> {
        let mut record = existing.clone();
        let mut filled = Vec::new();

        fill(&mut record.contact_number, &draft.contact_number, CanonicalField::ContactNumber, &mut filled);
        fill(&mut record.nationality, &draft.nationality, CanonicalField::Nationality, &mut filled);
        fill(&mut record.passport_number, &draft.passport_number, CanonicalField::PassportNumber, &mut filled);
        fill(
            &mut record.responsible_employee,
            &draft.responsible_employee,
            CanonicalField::ResponsibleEmployee,
            &mut filled,
        );
        fill(&mut record.processed_by, &draft.processed_by, CanonicalField::ProcessedBy, &mut filled);
        fill(&mut record.summary, &draft.summary, CanonicalField::Summary, &mut filled);
        fill(&mut record.notes, &draft.notes, CanonicalField::Notes, &mut filled);

        // 申请日期：原文与规范值一起补全
        if record.application_date.is_none() && draft.application_date.is_some() {
            record.application_date = draft.application_date.clone();
            record.application_date_normalized = draft.application_date_normalized.clone();
            filled.push(CanonicalField::ApplicationDate);
        }

        if filled.is_empty() {
            return None;
        }
        record.updated_at = now;
        Some(Enrichment { record, filled })
    }
}

fn fill(
    target: &mut Option<String>,
    incoming: &Option<String>,
    field: CanonicalField,
    filled: &mut Vec<CanonicalField>,
) {
    let target_empty = target.as_deref().map(str::trim).map_or(true, str::is_empty);
    let incoming = incoming.as_deref().map(str::trim).filter(|s| !s.is_empty());
    if let (true, Some(value)) = (target_empty, incoming) {
        *target = Some(value.to_string());
        filled.push(field);
    }
}
