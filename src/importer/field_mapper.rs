// ==========================================
// 签证客户管理 - 字段映射器
// ==========================================
// 职责: 表头 → 规范字段的列发现（每次运行解析一次）
// 规则:
// - 按字段声明顺序逐个解析
// - 表头(trim) 包含变体，或变体包含表头(trim)，即视为匹配
// - 按列顺序取第一个匹配该字段任一变体的表头
// - 一列只能被一个字段占用；后解析字段若命中已占用列则标记为未解析
// ==========================================

use crate::domain::import::{ImportDiagnostic, ImportRow, RawRow};
use crate::domain::types::CanonicalField;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

/// pandas 导出的空表头占位前缀
const UNNAMED_HEADER_PREFIX: &str = "unnamed:";

// ==========================================
// 默认表头词表（生产表格中实际出现过的写法）
// ==========================================
pub fn default_variant_table() -> Vec<(CanonicalField, Vec<&'static str>)> {
    vec![
        (
            CanonicalField::FullName,
            vec![
                "الاسم الكامل",
                "full_name",
                "nom_complet",
                "الاسم_الكامل",
                "الاسم",
                "name",
                "nom",
            ],
        ),
        (
            CanonicalField::ContactNumber,
            vec![
                "رقم الواتساب",
                "whatsapp_number",
                "رقم_الهاتف",
                "الهاتف",
                "واتساب",
                "phone",
                "telephone",
                "portable",
                "tel",
            ],
        ),
        (
            CanonicalField::ApplicationDate,
            vec![
                "تاريخ التقديم",
                "application_date",
                "تاريخ_الملف",
                "file_date",
                "date_dossier",
            ],
        ),
        (
            CanonicalField::Nationality,
            vec!["الجنسية", "nationality", "nationalite", "pays"],
        ),
        (
            CanonicalField::VisaStatus,
            vec!["حالة تتبع التأشيرة", "visa_status", "statut", "status", "الحالة"],
        ),
        (
            CanonicalField::ResponsibleEmployee,
            vec![
                "اختيار الموظف مسؤول",
                "اختيار الموظف",
                "اختار الموظف",
                "responsible_employee",
                "employee",
                "الموظف",
            ],
        ),
        (
            CanonicalField::PassportNumber,
            vec!["رقم جواز السفر", "passport_number", "passeport", "جواز"],
        ),
        (CanonicalField::ProcessedBy, vec!["من طرف", "processed_by"]),
        (CanonicalField::Summary, vec!["الخلاصة", "summary"]),
        (
            CanonicalField::Notes,
            vec!["ملاحظة", "ملاحضة", "ملاحظات", "notes", "remarques"],
        ),
    ]
}

// ==========================================
// FieldMapping - 一次运行的列映射结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UnresolvedReason {
    /// 没有任何表头匹配
    NotFound,
    /// 最佳匹配列已被其他字段占用
    Collision {
        header: String,
        claimed_by: CanonicalField,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldMapping {
    resolved: BTreeMap<CanonicalField, String>,
    unresolved: Vec<(CanonicalField, UnresolvedReason)>,
}

impl FieldMapping {
    /// 字段对应的具体表头
    pub fn header_for(&self, field: CanonicalField) -> Option<&str> {
        self.resolved.get(&field).map(String::as_str)
    }

    pub fn is_resolved(&self, field: CanonicalField) -> bool {
        self.resolved.contains_key(&field)
    }

    pub fn resolved(&self) -> &BTreeMap<CanonicalField, String> {
        &self.resolved
    }

    pub fn unresolved(&self) -> &[(CanonicalField, UnresolvedReason)] {
        &self.unresolved
    }

    /// 未解析字段的运行诊断（每字段一条）
    pub fn diagnostics(&self) -> Vec<ImportDiagnostic> {
        self.unresolved
            .iter()
            .map(|(field, reason)| ImportDiagnostic::FieldUnresolved {
                field: *field,
                reason: match reason {
                    UnresolvedReason::NotFound => "未找到匹配列".to_string(),
                    UnresolvedReason::Collision { header, claimed_by } => {
                        format!("列 '{}' 已被字段 {} 占用", header, claimed_by)
                    }
                },
            })
            .collect()
    }

    /// 将原始行映射为规范字段（未解析字段一律为空）
    pub fn map_row(&self, row: &RawRow) -> ImportRow {
        let mut mapped = ImportRow {
            row_number: row.row_number,
            ..Default::default()
        };
        for (field, header) in &self.resolved {
            let value = row.cells.get(header).and_then(|cell| cell.as_text());
            mapped.set(*field, value);
        }
        mapped
    }
}

// ==========================================
// FieldMapper - 列发现
// ==========================================
pub struct FieldMapper {
    table: Vec<(CanonicalField, Vec<String>)>,
}

impl Default for FieldMapper {
    fn default() -> Self {
        Self::new(default_variant_table())
    }
}

impl FieldMapper {
    /// 使用自定义词表创建（变体统一转小写）
    pub fn new<S: AsRef<str>>(table: Vec<(CanonicalField, Vec<S>)>) -> Self {
        let table = table
            .into_iter()
            .map(|(field, variants)| {
                let variants = variants
                    .iter()
                    .map(|v| v.as_ref().trim().to_lowercase())
                    .filter(|v| !v.is_empty())
                    .collect();
                (field, variants)
            })
            .collect();
        Self { table }
    }

    /// 解析表头，生成本次运行的 FieldMapping
    ///
    /// # 参数
    /// - headers: 表头（表格列顺序）
    pub fn resolve(&self, headers: &[String]) -> FieldMapping {
        let candidates: Vec<(usize, String)> = headers
            .iter()
            .enumerate()
            .filter_map(|(idx, h)| {
                let key = h.trim().to_lowercase();
                if key.is_empty() || key.starts_with(UNNAMED_HEADER_PREFIX) {
                    None
                } else {
                    Some((idx, key))
                }
            })
            .collect();

        let mut mapping = FieldMapping::default();
        let mut claimed: HashMap<usize, CanonicalField> = HashMap::new();

        for (field, variants) in &self.table {
            // 按表格列顺序，第一个满足任一变体的表头胜出
            let best = candidates
                .iter()
                .find(|(_, key)| {
                    variants
                        .iter()
                        .any(|variant| key.contains(variant.as_str()) || variant.contains(key.as_str()))
                })
                .map(|(idx, _)| *idx);

            match best {
                None => {
                    warn!(field = %field, "字段未找到匹配列");
                    mapping.unresolved.push((*field, UnresolvedReason::NotFound));
                }
                Some(idx) => match claimed.get(&idx) {
                    Some(owner) => {
                        warn!(field = %field, header = %headers[idx], claimed_by = %owner, "字段匹配列已被占用");
                        mapping.unresolved.push((
                            *field,
                            UnresolvedReason::Collision {
                                header: headers[idx].clone(),
                                claimed_by: *owner,
                            },
                        ));
                    }
                    None => {
                        debug!(field = %field, header = %headers[idx], "字段映射成功");
                        claimed.insert(idx, *field);
                        mapping.resolved.insert(*field, headers[idx].clone());
                    }
                },
            }
        }

        mapping
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::import::CellValue;

    fn headers(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_production_headers_resolve() {
        let mapper = FieldMapper::default();
        let mapping = mapper.resolve(&headers(&[
            "معرف العميل",
            "الاسم الكامل",
            "رقم الواتساب",
            "تاريخ التقديم        ",
            "الجنسية",
            "حالة تتبع التأشيرة",
            "اختيار الموظف مسؤول",
            "ملاحظة",
        ]));

        assert_eq!(mapping.header_for(CanonicalField::FullName), Some("الاسم الكامل"));
        assert_eq!(mapping.header_for(CanonicalField::ContactNumber), Some("رقم الواتساب"));
        assert_eq!(
            mapping.header_for(CanonicalField::ApplicationDate),
            Some("تاريخ التقديم        ")
        );
        assert_eq!(mapping.header_for(CanonicalField::Notes), Some("ملاحظة"));
        assert!(!mapping.is_resolved(CanonicalField::PassportNumber));
    }

    #[test]
    fn test_reordered_headers_with_suffixes_resolve_same_fields() {
        let mapper = FieldMapper::default();
        let original = mapper.resolve(&headers(&["full_name", "phone", "application_date", "notes"]));
        let drifted = mapper.resolve(&headers(&[
            "notes (internal)",
            "Application_Date of file",
            "Phone number",
            "Full_Name of applicant",
        ]));

        let fields = |m: &FieldMapping| m.resolved().keys().copied().collect::<Vec<_>>();
        assert_eq!(fields(&original), fields(&drifted));
        assert_eq!(
            drifted.header_for(CanonicalField::FullName),
            Some("Full_Name of applicant")
        );
    }

    #[test]
    fn test_abbreviated_header_matches_longer_variant() {
        let mapper = FieldMapper::default();
        // 变体 "الاسم الكامل" 包含表头 "الاسم"
        let mapping = mapper.resolve(&headers(&["الاسم"]));
        assert_eq!(mapping.header_for(CanonicalField::FullName), Some("الاسم"));
    }

    #[test]
    fn test_collision_marks_later_field_unresolved() {
        let mapper = FieldMapper::new(vec![
            (CanonicalField::FullName, vec!["name"]),
            (CanonicalField::Nationality, vec!["name"]),
        ]);
        let mapping = mapper.resolve(&headers(&["client name"]));

        assert_eq!(mapping.header_for(CanonicalField::FullName), Some("client name"));
        assert!(!mapping.is_resolved(CanonicalField::Nationality));
        assert_eq!(
            mapping.unresolved()[0].1,
            UnresolvedReason::Collision {
                header: "client name".to_string(),
                claimed_by: CanonicalField::FullName,
            }
        );
    }

    #[test]
    fn test_first_matching_column_wins() {
        let mapper = FieldMapper::default();
        let mapping = mapper.resolve(&headers(&["رقم الهاتف", "رقم الواتساب"]));
        assert_eq!(mapping.header_for(CanonicalField::ContactNumber), Some("رقم الهاتف"));

        let mapper = FieldMapper::new(vec![(CanonicalField::FullName, vec!["full_name", "name"])]);
        let mapping = mapper.resolve(&headers(&["client name", "full_name"]));
        assert_eq!(mapping.header_for(CanonicalField::FullName), Some("client name"));
    }

    #[test]
    fn test_empty_and_unnamed_headers_ignored() {
        let mapper = FieldMapper::default();
        let mapping = mapper.resolve(&headers(&["", "Unnamed: 3", "nom"]));
        assert_eq!(mapping.header_for(CanonicalField::FullName), Some("nom"));
        assert!(!mapping.is_resolved(CanonicalField::ContactNumber));
    }

    #[test]
    fn test_unresolved_fields_reported_once() {
        let mapper = FieldMapper::default();
        let mapping = mapper.resolve(&headers(&["full_name"]));
        let diagnostics = mapping.diagnostics();
        assert_eq!(diagnostics.len(), CanonicalField::ALL.len() - 1);
    }

    #[test]
    fn test_map_row_uses_resolved_headers() {
        let mapper = FieldMapper::default();
        let mapping = mapper.resolve(&headers(&["full_name", "phone"]));
        let row = RawRow::new(2)
            .with_cell("full_name", CellValue::Text("  Amina Idrissi ".to_string()))
            .with_cell("phone", CellValue::Number(212600112233.0))
            .with_cell("other", CellValue::Text("ignored".to_string()));

        let mapped = mapping.map_row(&row);
        assert_eq!(mapped.row_number, 2);
        assert_eq!(mapped.full_name.as_deref(), Some("Amina Idrissi"));
        assert_eq!(mapped.contact_number.as_deref(), Some("212600112233"));
        assert_eq!(mapped.notes, None);
    }
}
