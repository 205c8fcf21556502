//! Text extraction for uploaded documents.
//!
//! PDF goes through `pdf-extract`. DOCX and XLSX are zip archives of
//! OOXML parts and are read with `zip` + `quick-xml`. Spreadsheet-like
//! inputs (XLSX, CSV) are rendered as a right-aligned text table with the
//! first row as header.

use crate::core::DocumentKind;
use crate::utils::error::{RagError, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::{Cursor, Read};
use zip::ZipArchive;

const MISSING_CELL: &str = "NaN";

pub fn extract_text(kind: DocumentKind, bytes: &[u8]) -> Result<String> {
    match kind {
        DocumentKind::Pdf => extract_pdf(bytes),
        DocumentKind::Docx => extract_docx(bytes),
        DocumentKind::Xlsx => extract_xlsx(bytes),
        DocumentKind::Csv => extract_csv(bytes),
        DocumentKind::Text => Ok(String::from_utf8_lossy(bytes).into_owned()),
    }
}

/// Page texts concatenated with no separator.
///
/// `pdf-extract` panics on some structurally broken files (e.g. a missing
/// font resource); those are reported as `PdfError` as well.
pub fn extract_pdf(bytes: &[u8]) -> Result<String> {
    let outcome = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes));
    let text = match outcome {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            return Err(RagError::PdfError {
                message: format!("{:?}", e),
            })
        }
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown failure".to_string());
            tracing::warn!("PDF extractor aborted: {}", message);
            return Err(RagError::PdfError {
                message: format!("malformed PDF ({})", message),
            });
        }
    };

    // 每頁開頭的換行不算內容
    Ok(text.trim_start_matches('\n').to_string())
}

/// Body-level paragraphs of `word/document.xml`, joined with a space.
///
/// Only `w:p` elements that are direct children of `w:body` count, so
/// table cells and content controls are left out. Inside a paragraph,
/// text boxes and alternate content are skipped.
pub fn extract_docx(bytes: &[u8]) -> Result<String> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let xml = read_part(&mut archive, "word/document.xml")?
        .ok_or_else(|| missing_part("word/document.xml"))?;

    let mut reader = Reader::from_str(&xml);
    let mut buf = Vec::new();
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut body_depth: Option<usize> = None;
    let mut paragraph_depth: Option<usize> = None;
    let mut skipped = 0usize;
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                depth += 1;
                let in_paragraph = paragraph_depth.is_some();
                match e.local_name().as_ref() {
                    b"body" if body_depth.is_none() => body_depth = Some(depth),
                    b"p" if !in_paragraph && body_depth.map(|b| b + 1) == Some(depth) => {
                        paragraph_depth = Some(depth);
                        current.clear();
                    }
                    name if in_paragraph && is_nested_content(name) => skipped += 1,
                    b"t" if in_paragraph && skipped == 0 => in_text = true,
                    _ => {}
                }
            }
            Event::Empty(e) => {
                let collecting = paragraph_depth.is_some() && skipped == 0;
                match e.local_name().as_ref() {
                    b"p" if paragraph_depth.is_none() && body_depth == Some(depth) => {
                        paragraphs.push(String::new())
                    }
                    b"tab" if collecting => current.push('\t'),
                    b"br" | b"cr" if collecting => current.push('\n'),
                    _ => {}
                }
            }
            Event::Text(e) if in_text => current.push_str(&e.unescape()?),
            Event::End(e) => {
                match e.local_name().as_ref() {
                    b"t" => in_text = false,
                    b"p" if paragraph_depth == Some(depth) => {
                        paragraph_depth = None;
                        paragraphs.push(std::mem::take(&mut current));
                    }
                    name if skipped > 0 && is_nested_content(name) => skipped -= 1,
                    b"body" if body_depth == Some(depth) => body_depth = None,
                    _ => {}
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(paragraphs.join(" "))
}

/// Containers whose paragraphs are not part of the enclosing paragraph's text.
fn is_nested_content(local_name: &[u8]) -> bool {
    matches!(local_name, b"txbxContent" | b"AlternateContent" | b"sdt")
}

/// First worksheet of the workbook rendered as a text table.
pub fn extract_xlsx(bytes: &[u8]) -> Result<String> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;

    let shared_strings = match read_part(&mut archive, "xl/sharedStrings.xml")? {
        Some(xml) => parse_shared_strings(&xml)?,
        None => Vec::new(),
    };

    let sheet_path = first_sheet_path(&mut archive)?;
    tracing::debug!("Reading worksheet {}", sheet_path);
    let sheet_xml =
        read_part(&mut archive, &sheet_path)?.ok_or_else(|| missing_part(&sheet_path))?;

    let rows = parse_sheet_rows(&sheet_xml, &shared_strings)?;
    Ok(render_rows(rows))
}

pub fn extract_csv(bytes: &[u8]) -> Result<String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(
            record
                .iter()
                .map(|field| {
                    if field.is_empty() {
                        None
                    } else {
                        Some(field.to_string())
                    }
                })
                .collect(),
        );
    }

    Ok(render_rows(rows))
}

/// Renders rows as a table: first row is the header, every column is
/// right-aligned to its widest cell, columns are separated by one space.
pub fn render_rows(rows: Vec<Vec<Option<String>>>) -> String {
    let mut rows = rows.into_iter();
    let header = match rows.next() {
        Some(header) => header,
        None => return String::new(),
    };
    let body: Vec<Vec<Option<String>>> = rows.collect();

    let width = body
        .iter()
        .map(Vec::len)
        .chain(std::iter::once(header.len()))
        .max()
        .unwrap_or(0);
    if width == 0 {
        return String::new();
    }

    let header_cells: Vec<String> = (0..width)
        .map(|col| match header.get(col).cloned().flatten() {
            Some(name) => name,
            None => format!("Unnamed: {}", col),
        })
        .collect();
    let body_cells: Vec<Vec<String>> = body
        .into_iter()
        .map(|row| {
            (0..width)
                .map(|col| {
                    row.get(col)
                        .cloned()
                        .flatten()
                        .unwrap_or_else(|| MISSING_CELL.to_string())
                })
                .collect()
        })
        .collect();

    let column_widths: Vec<usize> = (0..width)
        .map(|col| {
            body_cells
                .iter()
                .map(|row| row[col].chars().count())
                .chain(std::iter::once(header_cells[col].chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let format_row = |cells: &[String]| -> String {
        cells
            .iter()
            .zip(&column_widths)
            .map(|(cell, w)| format!("{:>width$}", cell, width = *w))
            .collect::<Vec<_>>()
            .join(" ")
    };

    std::iter::once(format_row(&header_cells))
        .chain(body_cells.iter().map(|row| format_row(row)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn read_part<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<Option<String>> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut content = String::new();
    file.read_to_string(&mut content)?;
    Ok(Some(content))
}

fn missing_part(name: &str) -> RagError {
    RagError::ProcessingError {
        message: format!("archive has no {} part", name),
    }
}

fn attribute(e: &BytesStart<'_>, local: &[u8]) -> Option<String> {
    e.attributes()
        .filter_map(|a| a.ok())
        .find(|a| a.key.local_name().as_ref() == local)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

fn parse_shared_strings(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_item = false;
    let mut in_text = false;
    // 注音 (rPh) 內的文字不屬於儲存格內容
    let mut in_phonetic = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => {
                    in_item = true;
                    current.clear();
                }
                b"rPh" => in_phonetic = true,
                b"t" if in_item && !in_phonetic => in_text = true,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Event::Text(e) if in_text => current.push_str(&e.unescape()?),
            Event::End(e) => match e.local_name().as_ref() {
                b"si" => {
                    in_item = false;
                    strings.push(std::mem::take(&mut current));
                }
                b"rPh" => in_phonetic = false,
                b"t" => in_text = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(strings)
}

/// Resolves the first `<sheet>` of the workbook through its relationship id.
fn first_sheet_path<R: Read + std::io::Seek>(archive: &mut ZipArchive<R>) -> Result<String> {
    const FALLBACK: &str = "xl/worksheets/sheet1.xml";

    let workbook = match read_part(archive, "xl/workbook.xml")? {
        Some(xml) => xml,
        None => return Ok(FALLBACK.to_string()),
    };

    let mut first_rel_id = None;
    let mut reader = Reader::from_str(&workbook);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                first_rel_id = attribute(&e, b"id");
                break;
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    let rel_id = match first_rel_id {
        Some(id) => id,
        None => return Ok(FALLBACK.to_string()),
    };
    let rels = match read_part(archive, "xl/_rels/workbook.xml.rels")? {
        Some(xml) => xml,
        None => return Ok(FALLBACK.to_string()),
    };

    let mut reader = Reader::from_str(&rels);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                if attribute(&e, b"Id").as_deref() == Some(rel_id.as_str()) {
                    if let Some(target) = attribute(&e, b"Target") {
                        return Ok(match target.strip_prefix('/') {
                            Some(absolute) => absolute.to_string(),
                            None => format!("xl/{}", target),
                        });
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(FALLBACK.to_string())
}

#[derive(Default)]
struct CellState {
    column: usize,
    cell_type: Option<String>,
    value: String,
    has_value: bool,
}

fn parse_sheet_rows(xml: &str, shared_strings: &[String]) -> Result<Vec<Vec<Option<String>>>> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut rows: Vec<Vec<Option<String>>> = Vec::new();
    let mut row: Option<Vec<Option<String>>> = None;
    let mut cell: Option<CellState> = None;
    let mut capture = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"row" => row = Some(Vec::new()),
                b"c" => {
                    let next_column = row.as_ref().map(Vec::len).unwrap_or(0);
                    let column = match attribute(&e, b"r") {
                        Some(r) => column_index(&r)?,
                        None => None,
                    };
                    cell = Some(CellState {
                        column: column.unwrap_or(next_column),
                        cell_type: attribute(&e, b"t"),
                        ..CellState::default()
                    });
                }
                b"v" | b"t" if cell.is_some() => capture = true,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"c" => {
                // 空儲存格只佔位
                let column = match attribute(&e, b"r") {
                    Some(r) => column_index(&r)?,
                    None => None,
                };
                if let (Some(r), Some(col)) = (row.as_mut(), column) {
                    if r.len() <= col {
                        r.resize(col + 1, None);
                    }
                }
            }
            Event::Text(e) if capture => {
                if let Some(c) = cell.as_mut() {
                    c.value.push_str(&e.unescape()?);
                    c.has_value = true;
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"v" | b"t" => capture = false,
                b"c" => {
                    if let (Some(r), Some(c)) = (row.as_mut(), cell.take()) {
                        let rendered = render_cell(&c, shared_strings);
                        if r.len() <= c.column {
                            r.resize(c.column + 1, None);
                        }
                        r[c.column] = rendered;
                    }
                }
                b"row" => {
                    if let Some(r) = row.take() {
                        if r.iter().any(Option::is_some) {
                            rows.push(r);
                        }
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(rows)
}

fn render_cell(cell: &CellState, shared_strings: &[String]) -> Option<String> {
    if !cell.has_value {
        return None;
    }
    let raw = cell.value.as_str();
    let rendered = match cell.cell_type.as_deref() {
        Some("s") => raw
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|i| shared_strings.get(i).cloned())
            .unwrap_or_default(),
        Some("b") => {
            if raw.trim() == "1" {
                "True".to_string()
            } else {
                "False".to_string()
            }
        }
        Some("str") | Some("inlineStr") | Some("e") => raw.to_string(),
        _ => format_number(raw),
    };
    Some(rendered)
}

fn format_number(raw: &str) -> String {
    match raw.trim().parse::<f64>() {
        Ok(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", n as i64),
        Ok(n) => format!("{}", n),
        Err(_) => raw.to_string(),
    }
}

/// Last column Excel allows (XFD).
const MAX_COLUMN: usize = 16_383;

/// "A1" -> 0, "AB12" -> 27. `None` when the reference has no column letters.
fn column_index(reference: &str) -> Result<Option<usize>> {
    let mut index = 0usize;
    let mut seen = false;
    for c in reference.chars().take_while(|c| c.is_ascii_alphabetic()) {
        seen = true;
        let digit = c.to_ascii_uppercase() as usize - 'A' as usize + 1;
        index = index
            .checked_mul(26)
            .and_then(|i| i.checked_add(digit))
            .filter(|i| *i <= MAX_COLUMN + 1)
            .ok_or_else(|| RagError::ProcessingError {
                message: format!("cell reference {} is beyond column XFD", reference),
            })?;
    }
    Ok(seen.then(|| index - 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_index() {
        assert_eq!(column_index("A1").unwrap(), Some(0));
        assert_eq!(column_index("Z9").unwrap(), Some(25));
        assert_eq!(column_index("AA3").unwrap(), Some(26));
        assert_eq!(column_index("ab12").unwrap(), Some(27));
        assert_eq!(column_index("XFD1").unwrap(), Some(16_383));
        assert_eq!(column_index("12").unwrap(), None);
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number("42"), "42");
        assert_eq!(format_number("42.0"), "42");
        assert_eq!(format_number("3.5"), "3.5");
        assert_eq!(format_number("n/a"), "n/a");
    }

    #[test]
    fn test_render_rows_aligns_columns() {
        let rows = vec![
            vec![Some("name".to_string()), Some("qty".to_string())],
            vec![Some("apple".to_string()), Some("3".to_string())],
            vec![Some("fig".to_string()), None],
        ];
        assert_eq!(render_rows(rows), " name qty\napple   3\n  fig NaN");
    }

    #[test]
    fn test_render_rows_names_missing_headers() {
        let rows = vec![
            vec![Some("id".to_string())],
            vec![Some("1".to_string()), Some("extra".to_string())],
        ];
        assert_eq!(render_rows(rows), "id Unnamed: 1\n 1      extra");
    }

    #[test]
    fn test_render_rows_empty() {
        assert_eq!(render_rows(Vec::new()), "");
        assert_eq!(render_rows(vec![Vec::new()]), "");
    }

    #[test]
    fn test_extract_csv() {
        let csv = b"city,population\nParis,2100000\nLyon,\n";
        assert_eq!(
            extract_csv(csv).unwrap(),
            " city population\nParis    2100000\n Lyon        NaN"
        );
    }

    #[test]
    fn test_plain_text_is_lossy_utf8() {
        let text = extract_text(DocumentKind::Text, b"caf\xc3\xa9 \xff").unwrap();
        assert_eq!(text, "café \u{fffd}");
    }

    #[test]
    fn test_shared_strings_skip_phonetic_runs() {
        let xml = r#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
            <si><t>plain</t></si>
            <si><r><t>rich </t></r><r><t>text</t></r></si>
            <si><t>漢字</t><rPh sb="0" eb="2"><t>カンジ</t></rPh></si>
            <si/>
        </sst>"#;
        let strings = parse_shared_strings(xml).unwrap();
        assert_eq!(strings, vec!["plain", "rich text", "漢字", ""]);
    }

    #[test]
    fn test_sheet_rows_resolve_cell_types() {
        let xml = r#"<worksheet><sheetData>
            <row r="1"><c r="A1" t="s"><v>0</v></c><c r="C1" t="inlineStr"><is><t>flag</t></is></c></row>
            <row r="2"><c r="A2"><v>12.0</v></c><c r="B2"/><c r="C2" t="b"><v>1</v></c></row>
            <row r="3"/>
        </sheetData></worksheet>"#;
        let rows = parse_sheet_rows(xml, &["label".to_string()]).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0],
            vec![Some("label".to_string()), None, Some("flag".to_string())]
        );
        assert_eq!(
            rows[1],
            vec![Some("12".to_string()), None, Some("True".to_string())]
        );
    }

    #[test]
    fn test_column_beyond_xfd_is_rejected() {
        assert!(matches!(
            column_index("XFE1"),
            Err(RagError::ProcessingError { .. })
        ));
        assert!(column_index("AAAAAAAAAAAAAAAAAAAAAAAAAAAA1").is_err());

        let xml = r#"<worksheet><sheetData>
            <row r="1"><c r="AAAAAAAAAAAAAAAAAAAAAAAAAAAA1"><v>1</v></c></row>
        </sheetData></worksheet>"#;
        assert!(matches!(
            parse_sheet_rows(xml, &[]),
            Err(RagError::ProcessingError { .. })
        ));

        let empty_cell = r#"<worksheet><sheetData>
            <row r="1"><c r="A1"><v>1</v></c><c r="ZZZZZZ1"/></row>
        </sheetData></worksheet>"#;
        assert!(parse_sheet_rows(empty_cell, &[]).is_err());
    }
}
