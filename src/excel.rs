//! Excel workbooks: order report export and product bulk import.
//! Column headers are Korean and act as the file format.

use std::io::Cursor;

use calamine::{Data, Reader, Xlsx, open_workbook_from_rs};
use chrono::{DateTime, FixedOffset, Utc};
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};

pub const ORDER_SHEET: &str = "주문리스트";
pub const ORDER_HEADERS: [&str; 10] = [
    "주문번호",
    "주문일시",
    "고객명",
    "연락처",
    "배송지",
    "주문내역",
    "상품금액",
    "배송비",
    "결제금액",
    "상태",
];

const COL_NAME: &str = "상품명";
const COL_CATEGORY: &str = "카테고리";
const COL_PRICE: &str = "판매가";
const COL_SUB_CATEGORY: &str = "세부카테고리";
const COL_WHOLESALE: &str = "도매가";
const COL_STOCK: &str = "재고";
const COL_SPEC: &str = "규격";
const COL_IMAGE: &str = "이미지";

#[derive(Debug, Clone)]
pub struct OrderReportRow {
    pub order_number: String,
    pub created_at: DateTime<Utc>,
    pub customer: String,
    pub phone: String,
    pub address: String,
    pub details: String,
    pub items_amount: i64,
    pub delivery_fee: i64,
    pub total_amount: i64,
    pub status: String,
}

fn xlsx_err(err: XlsxError) -> AppError {
    AppError::Internal(anyhow::anyhow!("excel export failed: {err}"))
}

pub fn orders_workbook(rows: &[OrderReportRow]) -> AppResult<Vec<u8>> {
    let kst = kst()?;
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let sheet = workbook.add_worksheet();
    sheet.set_name(ORDER_SHEET).map_err(xlsx_err)?;

    for (col, header) in ORDER_HEADERS.iter().enumerate() {
        sheet
            .write_string_with_format(0, col as u16, *header, &bold)
            .map_err(xlsx_err)?;
    }

    for (idx, row) in rows.iter().enumerate() {
        let r = idx as u32 + 1;
        let created = row
            .created_at
            .with_timezone(&kst)
            .format("%Y-%m-%d %H:%M")
            .to_string();
        sheet.write_string(r, 0, row.order_number.as_str()).map_err(xlsx_err)?;
        sheet.write_string(r, 1, created).map_err(xlsx_err)?;
        sheet.write_string(r, 2, row.customer.as_str()).map_err(xlsx_err)?;
        sheet.write_string(r, 3, row.phone.as_str()).map_err(xlsx_err)?;
        sheet.write_string(r, 4, row.address.as_str()).map_err(xlsx_err)?;
        sheet.write_string(r, 5, row.details.as_str()).map_err(xlsx_err)?;
        sheet.write_number(r, 6, row.items_amount as f64).map_err(xlsx_err)?;
        sheet.write_number(r, 7, row.delivery_fee as f64).map_err(xlsx_err)?;
        sheet.write_number(r, 8, row.total_amount as f64).map_err(xlsx_err)?;
        sheet.write_string(r, 9, row.status.as_str()).map_err(xlsx_err)?;
    }

    sheet.set_column_width(0, 24).map_err(xlsx_err)?;
    sheet.set_column_width(4, 36).map_err(xlsx_err)?;
    sheet.set_column_width(5, 60).map_err(xlsx_err)?;

    workbook.save_to_buffer().map_err(xlsx_err)
}

/// Korea Standard Time. Order dates in exports are shown and filtered in KST.
pub fn kst() -> AppResult<FixedOffset> {
    FixedOffset::east_opt(9 * 3600)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("invalid KST offset")))
}

/// Dated by the local calendar day of `now`.
pub fn orders_filename(now: DateTime<FixedOffset>) -> String {
    format!("바구니삼촌_주문내역_{}.xlsx", now.format("%Y%m%d"))
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductImportRow {
    /// 1-based spreadsheet row, header included.
    pub row: usize,
    pub name: String,
    pub category: String,
    pub sub_category: Option<String>,
    pub price_retail: i64,
    pub price_wholesale: Option<i64>,
    pub stock: i32,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ImportIssue {
    pub row: usize,
    pub reason: String,
}

struct Columns {
    name: usize,
    category: usize,
    price: usize,
    sub_category: Option<usize>,
    wholesale: Option<usize>,
    stock: Option<usize>,
    spec: Option<usize>,
    image: Option<usize>,
}

impl Columns {
    fn locate(header: &[Data]) -> AppResult<Self> {
        let find = |title: &str| header.iter().position(|c| cell_text(c) == title);
        let required = |title: &str| {
            find(title).ok_or_else(|| AppError::BadRequest(format!("missing column: {title}")))
        };
        Ok(Self {
            name: required(COL_NAME)?,
            category: required(COL_CATEGORY)?,
            price: required(COL_PRICE)?,
            sub_category: find(COL_SUB_CATEGORY),
            wholesale: find(COL_WHOLESALE),
            stock: find(COL_STOCK),
            spec: find(COL_SPEC),
            image: find(COL_IMAGE),
        })
    }
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) if f.fract() == 0.0 => format!("{}", *f as i64),
        other => other.to_string().trim().to_string(),
    }
}

fn cell_number(cell: &Data) -> Option<i64> {
    match cell {
        Data::Int(i) => Some(*i),
        Data::Float(f) => Some(f.round() as i64),
        Data::String(s) => s.trim().replace(',', "").parse::<i64>().ok(),
        _ => None,
    }
}

fn optional_text(row: &[Data], col: Option<usize>) -> Option<String> {
    col.and_then(|c| row.get(c))
        .map(cell_text)
        .filter(|s| !s.is_empty())
}

/// Read the first sheet of an uploaded workbook. Rows with an empty name are
/// skipped; rows with unusable values are reported instead of returned.
pub fn parse_product_sheet(bytes: &[u8]) -> AppResult<(Vec<ProductImportRow>, Vec<ImportIssue>)> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes))
        .map_err(|e| AppError::BadRequest(format!("invalid Excel file: {e}")))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| AppError::BadRequest("workbook has no sheets".into()))?
        .map_err(|e| AppError::BadRequest(format!("invalid Excel sheet: {e}")))?;

    let mut rows = range.rows();
    let header = rows
        .next()
        .ok_or_else(|| AppError::BadRequest("sheet is empty".into()))?;
    let cols = Columns::locate(header)?;

    let mut parsed = Vec::new();
    let mut issues = Vec::new();
    for (idx, row) in rows.enumerate() {
        let row_no = idx + 2;
        let name = row.get(cols.name).map(cell_text).unwrap_or_default();
        if name.is_empty() {
            continue;
        }
        let category = row.get(cols.category).map(cell_text).unwrap_or_default();
        if category.is_empty() {
            issues.push(ImportIssue {
                row: row_no,
                reason: format!("{name}: category is empty"),
            });
            continue;
        }
        let Some(price_retail) = row.get(cols.price).and_then(cell_number).filter(|p| *p >= 0)
        else {
            issues.push(ImportIssue {
                row: row_no,
                reason: format!("{name}: invalid price"),
            });
            continue;
        };
        let price_wholesale = cols
            .wholesale
            .and_then(|c| row.get(c))
            .and_then(cell_number)
            .filter(|p| *p > 0);
        let stock = cols
            .stock
            .and_then(|c| row.get(c))
            .and_then(cell_number)
            .unwrap_or(0)
            .clamp(0, i64::from(i32::MAX)) as i32;

        parsed.push(ProductImportRow {
            row: row_no,
            name,
            category,
            sub_category: optional_text(row, cols.sub_category),
            price_retail,
            price_wholesale,
            stock,
            description: optional_text(row, cols.spec),
            image_url: optional_text(row, cols.image),
        });
    }

    Ok((parsed, issues))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product_sheet() -> Vec<u8> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        let header = ["상품명", "카테고리", "판매가", "재고", "도매가", "규격"];
        for (c, h) in header.iter().enumerate() {
            sheet.write_string(0, c as u16, *h).unwrap();
        }
        sheet.write_string(1, 0, "감자 1kg").unwrap();
        sheet.write_string(1, 1, "채소").unwrap();
        sheet.write_number(1, 2, 5000).unwrap();
        sheet.write_number(1, 3, 20).unwrap();
        sheet.write_number(1, 4, 4000).unwrap();
        sheet.write_string(1, 5, "1kg 내외").unwrap();
        // blank name: skipped silently
        sheet.write_string(2, 1, "채소").unwrap();
        sheet.write_string(3, 0, "사과").unwrap();
        sheet.write_string(3, 1, "과일").unwrap();
        sheet.write_string(3, 2, "비쌈").unwrap();
        sheet.write_string(4, 0, "배").unwrap();
        sheet.write_string(4, 1, "과일").unwrap();
        sheet.write_string(4, 2, "12,000").unwrap();
        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn imports_valid_rows_and_reports_bad_ones() {
        let (rows, issues) = parse_product_sheet(&product_sheet()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "감자 1kg");
        assert_eq!(rows[0].price_retail, 5000);
        assert_eq!(rows[0].price_wholesale, Some(4000));
        assert_eq!(rows[0].stock, 20);
        assert_eq!(rows[0].description.as_deref(), Some("1kg 내외"));
        assert_eq!(rows[1].name, "배");
        assert_eq!(rows[1].price_retail, 12_000);
        assert_eq!(rows[1].stock, 0);
        assert_eq!(issues, vec![ImportIssue { row: 4, reason: "사과: invalid price".into() }]);
    }

    #[test]
    fn missing_required_column_is_rejected() {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "상품명").unwrap();
        let bytes = workbook.save_to_buffer().unwrap();
        assert!(matches!(parse_product_sheet(&bytes), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn order_report_has_korean_headers() {
        let rows = vec![OrderReportRow {
            order_number: "ORD-1".into(),
            created_at: Utc::now(),
            customer: "홍길동".into(),
            phone: "010-0000-0000".into(),
            address: "인천 연수구 송도동 1".into(),
            details: "[채소] 감자(2)".into(),
            items_amount: 10_000,
            delivery_fee: 1900,
            total_amount: 11_900,
            status: "결제완료".into(),
        }];
        let bytes = orders_workbook(&rows).unwrap();

        let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes)).unwrap();
        assert_eq!(workbook.sheet_names(), vec![ORDER_SHEET.to_string()]);
        let range = workbook.worksheet_range_at(0).unwrap().unwrap();
        let mut rows = range.rows();
        let header: Vec<String> = rows.next().unwrap().iter().map(cell_text).collect();
        assert_eq!(header, ORDER_HEADERS);
        let first = rows.next().unwrap();
        assert_eq!(cell_text(&first[0]), "ORD-1");
        assert_eq!(cell_number(&first[8]), Some(11_900));
    }

    #[test]
    fn filename_uses_kst_date() {
        // 08:00 KST on the 4th is still the 3rd in UTC.
        let at = DateTime::parse_from_rfc3339("2025-03-03T23:00:00Z")
            .unwrap()
            .with_timezone(&kst().unwrap());
        assert_eq!(orders_filename(at), "바구니삼촌_주문내역_20250304.xlsx");
    }
}
