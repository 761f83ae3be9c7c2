// ==========================================
// 签证客户管理 - 文件解析器实现
// ==========================================
// 支持: Excel (.xlsx/.xls/.xlsm/.ods，读取第一个工作表) / CSV (.csv)
// 输出: 保持列顺序的表头 + 行号 → 单元格映射
// ==========================================

use crate::domain::import::{CellValue, RawRow, SheetData};
use crate::importer::client_importer_trait::FileParser;
use crate::importer::error::{ImportError, ImportResult};
use calamine::{open_workbook_auto, Data, Reader};
use chrono::{Days, NaiveDate};
use csv::ReaderBuilder;
use std::fs::File;
use std::path::Path;
use tracing::debug;

/// 扩展名（小写）
fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

fn ensure_exists(path: &Path) -> ImportResult<()> {
    if !path.exists() {
        return Err(ImportError::FileNotFound(path.display().to_string()));
    }
    Ok(())
}

/// 重名表头追加序号（"الاسم" → "الاسم#2"），保证按表头取值不丢列
fn dedupe_headers(headers: Vec<String>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::with_capacity(headers.len());
    for header in headers {
        let mut candidate = header.clone();
        let mut n = 2;
        while !candidate.is_empty() && seen.contains(&candidate) {
            candidate = format!("{}#{}", header, n);
            n += 1;
        }
        seen.push(candidate);
    }
    seen
}

// ==========================================
// CSV Parser 实现
// ==========================================
pub struct CsvParser;

impl FileParser for CsvParser {
    fn parse(&self, path: &Path) -> ImportResult<SheetData> {
        ensure_exists(path)?;

        let ext = extension_of(path);
        if ext != "csv" {
            return Err(ImportError::UnsupportedFormat(ext));
        }

        let file = File::open(path)?;
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // 允许行长度不一致
            .from_reader(file);

        // 读取表头（去除 UTF-8 BOM）
        let headers: Vec<String> = reader
            .byte_headers()?
            .iter()
            .enumerate()
            .map(|(idx, h)| {
                let text = String::from_utf8_lossy(h).trim().to_string();
                if idx == 0 {
                    text.trim_start_matches('\u{feff}').trim().to_string()
                } else {
                    text
                }
            })
            .collect();
        let headers = dedupe_headers(headers);

        let mut rows = Vec::new();
        for (idx, result) in reader.byte_records().enumerate() {
            let record = result?;
            let mut row = RawRow::new(idx + 2);

            for (col_idx, value) in record.iter().enumerate() {
                if let Some(header) = headers.get(col_idx) {
                    if header.is_empty() {
                        continue;
                    }
                    let text = String::from_utf8_lossy(value).trim().to_string();
                    let cell = if text.is_empty() {
                        CellValue::Empty
                    } else {
                        CellValue::Text(text)
                    };
                    row.cells.insert(header.clone(), cell);
                }
            }

            // 跳过完全空白的行
            if row.cells.values().all(CellValue::is_blank) {
                continue;
            }
            rows.push(row);
        }

        debug!(file = %path.display(), columns = headers.len(), rows = rows.len(), "CSV 解析完成");
        Ok(SheetData { headers, rows })
    }
}

// ==========================================
// Excel Parser 实现
// ==========================================
pub struct ExcelParser;

/// Excel 序列日期 → 日期（1900 日期系统）
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 {
        return None;
    }
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    base.checked_add_days(Days::new(serial.floor() as u64))
}

fn cell_from_excel(cell: &Data) -> CellValue {
    match cell {
        Data::Empty | Data::Error(_) => CellValue::Empty,
        Data::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                CellValue::Empty
            } else {
                CellValue::Text(trimmed.to_string())
            }
        }
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::Bool(b) => CellValue::Text(b.to_string()),
        Data::DateTime(dt) => {
            if dt.is_duration() {
                CellValue::Number(dt.as_f64())
            } else {
                excel_serial_to_date(dt.as_f64())
                    .map(CellValue::Date)
                    .unwrap_or(CellValue::Empty)
            }
        }
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.trim().to_string()),
    }
}

impl FileParser for ExcelParser {
    fn parse(&self, path: &Path) -> ImportResult<SheetData> {
        ensure_exists(path)?;

        let ext = extension_of(path);
        if !matches!(ext.as_str(), "xlsx" | "xls" | "xlsm" | "ods") {
            return Err(ImportError::UnsupportedFormat(ext));
        }

        let mut workbook = open_workbook_auto(path)?;

        // 读取第一个 sheet
        let sheet_names = workbook.sheet_names();
        let sheet_name = sheet_names
            .first()
            .cloned()
            .ok_or_else(|| ImportError::ExcelParseError("Excel 文件无工作表".to_string()))?;
        let range = workbook.worksheet_range(&sheet_name)?;
        let start_row = range.start().map(|(r, _)| r as usize).unwrap_or(0);

        // 提取表头（第一行）
        let mut rows_iter = range.rows();
        let header_row = rows_iter
            .next()
            .ok_or_else(|| ImportError::ExcelParseError("Excel 文件无数据行".to_string()))?;
        let headers = dedupe_headers(
            header_row
                .iter()
                .map(|cell| cell.to_string().trim().to_string())
                .collect(),
        );

        let mut rows = Vec::new();
        for (idx, data_row) in rows_iter.enumerate() {
            // 表头所在行号为 start_row + 1（1 起）
            let mut row = RawRow::new(start_row + idx + 2);
            for (col_idx, cell) in data_row.iter().enumerate() {
                if let Some(header) = headers.get(col_idx) {
                    if header.is_empty() {
                        continue;
                    }
                    row.cells.insert(header.clone(), cell_from_excel(cell));
                }
            }

            if row.cells.values().all(CellValue::is_blank) {
                continue;
            }
            rows.push(row);
        }

        debug!(file = %path.display(), sheet = %sheet_name, rows = rows.len(), "Excel 解析完成");
        Ok(SheetData { headers, rows })
    }
}

// ==========================================
// 通用文件解析器（按扩展名分派）
// ==========================================
pub struct UniversalFileParser;

impl FileParser for UniversalFileParser {
    fn parse(&self, path: &Path) -> ImportResult<SheetData> {
        match extension_of(path).as_str() {
            "csv" => CsvParser.parse(path),
            "xlsx" | "xls" | "xlsm" | "ods" => ExcelParser.parse(path),
            other => {
                ensure_exists(path)?;
                Err(ImportError::UnsupportedFormat(other.to_string()))
            }
        }
    }
}
