//! Multi-format text extraction (PDF, DOCX, XLSX, plain text).
//!
//! The format is chosen from the file extension; this module turns raw file
//! bytes into plain UTF-8 text plus a page count. PDF page boundaries are
//! kept in the text as form feeds so fragments can be attributed to pages.

use std::io::Read;
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;

/// Maximum sheets to process in an xlsx.
const XLSX_MAX_SHEETS: usize = 100;
/// Maximum cells to process per sheet (avoids unbounded memory).
const XLSX_MAX_CELLS_PER_SHEET: usize = 100_000;
/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

const PAGE_BREAK: char = docqa_core::chunk::PAGE_BREAK;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Xlsx,
    Txt,
}

impl DocumentFormat {
    /// Detect the format from a file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Result<Self, ExtractError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "pdf" => Ok(Self::Pdf),
            "docx" => Ok(Self::Docx),
            "xlsx" => Ok(Self::Xlsx),
            "txt" => Ok(Self::Txt),
            _ => Err(ExtractError::UnsupportedFormat(if ext.is_empty() {
                path.display().to_string()
            } else {
                format!(".{}", ext)
            })),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Xlsx => "xlsx",
            Self::Txt => "txt",
        }
    }
}

/// Text extracted from a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub text: String,
    /// Number of pages; `1` for formats without pages.
    pub pages: u32,
}

/// Extraction error. Never a panic; the caller reports and stops.
#[derive(Debug)]
pub enum ExtractError {
    UnsupportedFormat(String),
    Pdf(String),
    Ooxml(String),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::UnsupportedFormat(ext) => write!(
                f,
                "unsupported file format: {} (expected .pdf, .docx, .xlsx or .txt)",
                ext
            ),
            ExtractError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
            ExtractError::Ooxml(e) => write!(f, "OOXML extraction failed: {}", e),
        }
    }
}

impl std::error::Error for ExtractError {}

/// Extract plain text from `bytes` of the given format.
pub fn extract_text(bytes: &[u8], format: DocumentFormat) -> Result<Extracted, ExtractError> {
    match format {
        DocumentFormat::Pdf => {
            let text = extract_pdf(bytes)?;
            let pages = page_count(&text);
            Ok(Extracted { text, pages })
        }
        DocumentFormat::Docx => Ok(Extracted {
            text: extract_docx(bytes)?,
            pages: 1,
        }),
        DocumentFormat::Xlsx => Ok(Extracted {
            text: extract_xlsx(bytes)?,
            pages: 1,
        }),
        DocumentFormat::Txt => {
            let text = String::from_utf8_lossy(bytes).into_owned();
            let pages = page_count(&text);
            Ok(Extracted { text, pages })
        }
    }
}

/// Pages separated by form feeds; a trailing form feed does not open a page.
fn page_count(text: &str) -> u32 {
    let breaks = text.trim_end_matches(PAGE_BREAK).matches(PAGE_BREAK).count();
    u32::try_from(breaks + 1).unwrap_or(u32::MAX)
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

type Archive<'a> = zip::ZipArchive<std::io::Cursor<&'a [u8]>>;

fn open_archive(bytes: &[u8]) -> Result<Archive<'_>, ExtractError> {
    zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(|e| ExtractError::Ooxml(e.to_string()))
}

fn read_zip_entry_bounded(
    archive: &mut Archive<'_>,
    name: &str,
    max_bytes: u64,
) -> Result<Vec<u8>, ExtractError> {
    let entry = archive
        .by_name(name)
        .map_err(|e| ExtractError::Ooxml(format!("{}: {}", name, e)))?;
    let mut out = Vec::new();
    entry
        .take(max_bytes)
        .read_to_end(&mut out)
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    if out.len() as u64 >= max_bytes {
        return Err(ExtractError::Ooxml(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, max_bytes
        )));
    }
    Ok(out)
}

fn xml_error(e: quick_xml::Error) -> ExtractError {
    ExtractError::Ooxml(e.to_string())
}

// ============ DOCX ============

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = open_archive(bytes)?;
    let xml = read_zip_entry_bounded(&mut archive, "word/document.xml", MAX_XML_ENTRY_BYTES)?;
    extract_docx_paragraphs(&xml)
}

/// Concatenate `<w:t>` runs, one line per `<w:p>` paragraph.
fn extract_docx_paragraphs(xml: &[u8]) -> Result<String, ExtractError> {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf).map_err(xml_error)? {
            Event::Start(e) if e.local_name().as_ref() == b"t" => in_text = true,
            Event::Text(te) if in_text => {
                current.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Event::Empty(e) => match e.local_name().as_ref() {
                b"tab" => current.push('\t'),
                b"br" | b"cr" => current.push('\n'),
                _ => {}
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => lines.push(std::mem::take(&mut current)),
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    if !current.is_empty() {
        lines.push(current);
    }
    Ok(lines.join("\n"))
}

// ============ XLSX ============

fn extract_xlsx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = open_archive(bytes)?;
    let has_shared_strings = archive.file_names().any(|n| n == "xl/sharedStrings.xml");
    let shared_strings = if has_shared_strings {
        let xml = read_zip_entry_bounded(&mut archive, "xl/sharedStrings.xml", MAX_XML_ENTRY_BYTES)?;
        read_shared_strings(&xml)?
    } else {
        Vec::new()
    };

    let mut sections = Vec::new();
    for (idx, sheet) in list_sheets(&mut archive)?
        .into_iter()
        .take(XLSX_MAX_SHEETS)
        .enumerate()
    {
        let sheet_xml = read_zip_entry_bounded(&mut archive, &sheet.path, MAX_XML_ENTRY_BYTES)?;
        let rows = extract_xlsx_sheet_rows(&sheet_xml, &shared_strings)?;
        let mut section = match &sheet.name {
            Some(name) => format!("--- Sheet: {} ---", name),
            None => format!("--- Sheet {} ---", idx + 1),
        };
        for row in rows {
            section.push('\n');
            section.push_str(&row);
        }
        sections.push(section);
    }
    Ok(sections.join("\n\n"))
}

struct SheetRef {
    name: Option<String>,
    path: String,
}

/// Sheets in workbook order, labelled with their names from `xl/workbook.xml`.
///
/// Each sheet's part is resolved through `xl/_rels/workbook.xml.rels`. A
/// sheet the relationships do not resolve takes the worksheet part at the
/// same position. Without a workbook part, every `xl/worksheets/sheetN.xml`
/// is listed unnamed.
fn list_sheets(archive: &mut Archive<'_>) -> Result<Vec<SheetRef>, ExtractError> {
    let parts = list_worksheet_names(archive);
    if !archive.file_names().any(|n| n == "xl/workbook.xml") {
        return Ok(parts
            .into_iter()
            .map(|path| SheetRef { name: None, path })
            .collect());
    }

    let workbook = read_zip_entry_bounded(archive, "xl/workbook.xml", MAX_XML_ENTRY_BYTES)?;
    let declared = read_workbook_sheets(&workbook)?;
    if declared.is_empty() {
        return Ok(parts
            .into_iter()
            .map(|path| SheetRef { name: None, path })
            .collect());
    }
    let targets = if archive.file_names().any(|n| n == "xl/_rels/workbook.xml.rels") {
        let rels = read_zip_entry_bounded(archive, "xl/_rels/workbook.xml.rels", MAX_XML_ENTRY_BYTES)?;
        read_relationship_targets(&rels)?
    } else {
        Vec::new()
    };

    let mut sheets = Vec::with_capacity(declared.len());
    for (position, (name, rel_id)) in declared.into_iter().enumerate() {
        let resolved = rel_id
            .and_then(|id| targets.iter().find(|(rid, _)| *rid == id))
            .map(|(_, target)| resolve_part(target))
            .filter(|path| parts.contains(path))
            .or_else(|| parts.get(position).cloned());
        if let Some(path) = resolved {
            sheets.push(SheetRef {
                name: name.filter(|n| !n.trim().is_empty()),
                path,
            });
        }
    }
    Ok(sheets)
}

/// `(name, r:id)` of every `<sheet>` in `xl/workbook.xml`, in order.
fn read_workbook_sheets(xml: &[u8]) -> Result<Vec<(Option<String>, Option<String>)>, ExtractError> {
    let mut sheets = Vec::new();
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf).map_err(xml_error)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                let mut name = None;
                let mut rel_id = None;
                for attr in e.attributes().flatten() {
                    let value = attr.unescape_value().map_err(xml_error)?.into_owned();
                    match (attr.key.prefix().is_some(), attr.key.local_name().as_ref()) {
                        (false, b"name") => name = Some(value),
                        (true, b"id") => rel_id = Some(value),
                        _ => {}
                    }
                }
                sheets.push((name, rel_id));
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(sheets)
}

/// `(Id, Target)` of every `<Relationship>`.
fn read_relationship_targets(xml: &[u8]) -> Result<Vec<(String, String)>, ExtractError> {
    let mut targets = Vec::new();
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf).map_err(xml_error)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                let mut id = None;
                let mut target = None;
                for attr in e.attributes().flatten() {
                    match attr.key.local_name().as_ref() {
                        b"Id" => id = Some(attr.unescape_value().map_err(xml_error)?.into_owned()),
                        b"Target" => {
                            target = Some(attr.unescape_value().map_err(xml_error)?.into_owned())
                        }
                        _ => {}
                    }
                }
                if let (Some(id), Some(target)) = (id, target) {
                    targets.push((id, target));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(targets)
}

/// Relationship targets are relative to `xl/` unless absolute.
fn resolve_part(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{}", target.trim_start_matches("./")),
    }
}

/// Each `<si>` item becomes one string; rich-text runs are concatenated.
fn read_shared_strings(xml: &[u8]) -> Result<Vec<String>, ExtractError> {
    let mut strings = Vec::new();
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut current: Option<String> = None;
    let mut in_text = false;
    loop {
        match reader.read_event_into(&mut buf).map_err(xml_error)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"t" => in_text = true,
                _ => {}
            },
            Event::Text(te) if in_text => {
                if let Some(s) = current.as_mut() {
                    s.push_str(te.unescape().unwrap_or_default().as_ref());
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"si" => strings.extend(current.take()),
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

fn list_worksheet_names(archive: &Archive<'_>) -> Vec<String> {
    let mut names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with("xl/worksheets/sheet") && n.ends_with(".xml"))
        .map(|s| s.to_string())
        .collect();
    names.sort_by_key(|name| {
        name.trim_start_matches("xl/worksheets/sheet")
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });
    names
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum CellKind {
    Shared,
    Inline,
    Value,
}

/// One tab-separated line per non-empty `<row>`.
fn extract_xlsx_sheet_rows(xml: &[u8], shared_strings: &[String]) -> Result<Vec<String>, ExtractError> {
    let mut rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut cell = String::new();
    let mut kind = CellKind::Value;
    let mut in_value = false;
    let mut cell_count = 0usize;
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    loop {
        if cell_count >= XLSX_MAX_CELLS_PER_SHEET {
            break;
        }
        match reader.read_event_into(&mut buf).map_err(xml_error)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"c" => {
                    cell.clear();
                    kind = CellKind::Value;
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"t" {
                            kind = match attr.value.as_ref() {
                                b"s" => CellKind::Shared,
                                b"inlineStr" => CellKind::Inline,
                                _ => CellKind::Value,
                            };
                        }
                    }
                }
                b"v" => in_value = true,
                b"t" if kind == CellKind::Inline => in_value = true,
                _ => {}
            },
            Event::Text(te) if in_value => {
                let raw = te.unescape().unwrap_or_default();
                match kind {
                    CellKind::Shared => {
                        if let Some(s) = raw
                            .trim()
                            .parse::<usize>()
                            .ok()
                            .and_then(|i| shared_strings.get(i))
                        {
                            cell.push_str(s);
                        }
                    }
                    CellKind::Inline | CellKind::Value => cell.push_str(raw.as_ref()),
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"c" => {
                    let value = cell.trim();
                    if !value.is_empty() {
                        row.push(value.to_string());
                        cell_count += 1;
                    }
                }
                b"row" => {
                    if !row.is_empty() {
                        rows.push(row.join("\t"));
                    }
                    row.clear();
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    if !row.is_empty() {
        rows.push(row.join("\t"));
    }
    Ok(rows)
}
