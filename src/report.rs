//! 結果のExcel出力
//!
//! 既存の行を読み込み、1行追加してブック全体を書き直す。列幅は毎回再計算する。

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use calamine::{open_workbook, Data, Reader, Xlsx};
use rust_xlsxwriter::{Format, Workbook};
use tracing::{debug, info};

use crate::document::ExtractedFields;
use crate::error::ScraperError;

pub const HEADERS: [&str; 2] = ["Номер телефона", "Почта"];

/// 1行分（値がない項目は空文字）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultRow {
    pub phone: String,
    pub email: String,
}

impl From<&ExtractedFields> for ResultRow {
    fn from(fields: &ExtractedFields) -> Self {
        Self {
            phone: fields.phone.clone().unwrap_or_default(),
            email: fields.email.clone().unwrap_or_default(),
        }
    }
}

/// 列幅（最長セルの文字数 + 2）
pub fn column_widths(rows: &[ResultRow]) -> [usize; 2] {
    let mut widths = [HEADERS[0].chars().count(), HEADERS[1].chars().count()];
    for row in rows {
        widths[0] = widths[0].max(row.phone.chars().count());
        widths[1] = widths[1].max(row.email.chars().count());
    }
    widths.map(|w| w + 2)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// 書式付きの空セルも数えるので、両方空の行も落ちない
fn read_rows(path: &Path) -> Result<Vec<ResultRow>, ScraperError> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let Some(sheet) = workbook.sheet_names().first().cloned() else {
        return Ok(Vec::new());
    };
    let mut cells = workbook.worksheet_cells_reader(&sheet)?;

    let mut rows: Vec<ResultRow> = Vec::new();
    while let Some(cell) = cells.next_cell()? {
        let (row, col) = cell.get_position();
        if row == 0 {
            continue;
        }
        let index = (row - 1) as usize;
        if rows.len() <= index {
            rows.resize(index + 1, ResultRow::default());
        }

        let text = cell_text(&Data::from(cell.get_value().clone()));
        match col {
            0 => rows[index].phone = text,
            1 => rows[index].email = text,
            _ => {}
        }
    }
    Ok(rows)
}

fn write_rows(path: &Path, rows: &[ResultRow]) -> Result<(), ScraperError> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();
    // 空の値も書式付きの空セルとして残す
    let text = Format::new().set_num_format("@");
    let worksheet = workbook.add_worksheet();

    for (col, title) in HEADERS.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *title, &header)?;
    }

    for (i, row) in rows.iter().enumerate() {
        let r = (i + 1) as u32;
        worksheet.write_string_with_format(r, 0, &row.phone, &text)?;
        worksheet.write_string_with_format(r, 1, &row.email, &text)?;
    }

    for (col, width) in column_widths(rows).iter().enumerate() {
        worksheet.set_column_width(col as u16, *width as f64)?;
    }

    workbook.save(path)?;
    Ok(())
}

/// 結果テーブル
///
/// 行の読み込み・追加・書き戻しはロックの中で行う。行は開いた時点でファイルから読み、
/// 以降はメモリ上の行を正とする（空行もそのまま数える）。
pub struct ResultWriter {
    path: PathBuf,
    rows: Mutex<Vec<ResultRow>>,
}

impl ResultWriter {
    /// 既存のファイルがあれば行を読み込む
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ScraperError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let rows = if path.exists() {
            let rows = read_rows(&path)?;
            info!("Loaded {} existing rows from {:?}", rows.len(), path);
            rows
        } else {
            Vec::new()
        };

        Ok(Self {
            path,
            rows: Mutex::new(rows),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 1行追加してファイルを書き直す
    pub fn append(&self, fields: &ExtractedFields) -> Result<(), ScraperError> {
        let mut rows = self
            .rows
            .lock()
            .map_err(|_| ScraperError::Spreadsheet("結果テーブルのロックが壊れています".into()))?;

        rows.push(ResultRow::from(fields));
        if let Err(e) = write_rows(&self.path, &rows) {
            rows.pop();
            return Err(e);
        }

        debug!("Wrote row {} to {:?}", rows.len(), self.path);
        Ok(())
    }

    /// 現在の行
    pub fn rows(&self) -> Vec<ResultRow> {
        match self.rows.lock() {
            Ok(rows) => rows.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}
