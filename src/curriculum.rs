use crate::error::PlanError;
use rusqlite::{params, Connection, Transaction, TransactionBehavior};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{info, warn};
use uuid::Uuid;

const ID_NAMESPACE: Uuid = Uuid::from_u128(0x5d1c_82e4_7a0b_4c39_9f2e_61b4_d7a3_0c58);

const REQUIRED_COLUMNS: [&str; 3] = ["provider", "class_code", "title"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LessonRow {
    pub provider: String,
    pub class_code: String,
    pub class_name: String,
    pub sequence_index: i64,
    pub source_lesson_code: Option<String>,
    pub title: String,
    pub objective: String,
    pub standards: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedRow {
    pub line: usize,
    pub reason: String,
}

#[derive(Clone, Debug, Default)]
pub struct ImportSummary {
    pub libraries: usize,
    pub lessons: usize,
    pub standards: usize,
    pub skipped: Vec<SkippedRow>,
}

pub fn library_id(provider: &str, class_code: &str) -> String {
    stable_id(&["library", provider, class_code])
}

pub fn lesson_id(provider: &str, class_code: &str, sequence_index: i64) -> String {
    stable_id(&["lesson", provider, class_code, &sequence_index.to_string()])
}

fn standard_id(code: &str) -> String {
    stable_id(&["standard", code])
}

fn stable_id(parts: &[&str]) -> String {
    Uuid::new_v5(&ID_NAMESPACE, parts.join("|").as_bytes()).to_string()
}

/// Groups physical lines into CSV records, joining lines while a quoted
/// field is open. Each record carries the 1-based line it starts on.
fn csv_records(text: &str) -> Vec<(usize, String)> {
    let mut out = Vec::new();
    let mut current: Option<(usize, String)> = None;
    let mut in_quotes = false;
    for (idx, line) in text.lines().enumerate() {
        match current.as_mut() {
            Some((_, buf)) => {
                buf.push('\n');
                buf.push_str(line);
            }
            None if line.trim().is_empty() => continue,
            None => current = Some((idx + 1, line.to_string())),
        }
        // `""` escapes toggle twice and cancel out.
        if line.chars().filter(|c| *c == '"').count() % 2 == 1 {
            in_quotes = !in_quotes;
        }
        if !in_quotes {
            out.extend(current.take());
        }
    }
    // An unterminated quote keeps whatever was read.
    out.extend(current);
    out
}

fn parse_csv_record(line: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut buf = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                buf.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => out.push(std::mem::take(&mut buf)),
            _ => buf.push(ch),
        }
    }
    out.push(buf);
    out
}

/// Trims and collapses internal whitespace runs to a single space.
pub fn norm_text(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn looks_like_standard_code(s: &str) -> bool {
    let body = s.strip_suffix("(+)").unwrap_or(s);
    let mut segments = body.split('.');
    let Some(head) = segments.next() else {
        return false;
    };
    let mut head_chars = head.chars();
    if !head_chars.next().is_some_and(|c| c.is_ascii_uppercase()) {
        return false;
    }
    if !head_chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-') {
        return false;
    }
    segments.all(|seg| {
        !seg.is_empty() && seg.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
    })
}

/// Splits a standards cell on `,`/`;`, uppercases, drops blanks, `-` and
/// anything that is not shaped like a standard code, and dedups in order.
pub fn normalize_standards(raw: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    for piece in raw.split([',', ';']) {
        let code: String = norm_text(piece).to_uppercase().replace(' ', "");
        if code.is_empty() || code == "-" || !looks_like_standard_code(&code) {
            continue;
        }
        if seen.insert(code.clone()) {
            out.push(code);
        }
    }
    out
}

/// Pulls a lesson code such as `2.3` or `Review 1.1-1.4` off the front of a title.
pub fn extract_lesson_code(title: &str) -> Option<String> {
    let t = norm_text(title);
    if let Some(code) = leading_dotted_number(&t) {
        return Some(code.to_string());
    }
    if t.get(..7).is_some_and(|p| p.eq_ignore_ascii_case("review ")) {
        let rest = &t[7..];
        let first = leading_dotted_number(rest)?;
        let mut end = 7 + first.len();
        if let Some(tail) = rest[first.len()..].strip_prefix('-') {
            if let Some(second) = leading_dotted_number(tail) {
                end += 1 + second.len();
            }
        }
        return Some(t[..end].to_string());
    }
    None
}

fn leading_dotted_number(s: &str) -> Option<&str> {
    let major = s.chars().take_while(|c| c.is_ascii_digit()).count();
    if major == 0 || s[major..].chars().next() != Some('.') {
        return None;
    }
    let minor = s[major + 1..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .count();
    if minor == 0 {
        return None;
    }
    Some(&s[..major + 1 + minor])
}

/// Parses a curriculum CSV. Rows that cannot be used are reported, not fatal.
pub fn parse_lessons_csv(text: &str) -> Result<(Vec<LessonRow>, Vec<SkippedRow>), PlanError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut records = csv_records(text).into_iter();
    let Some((_, header_line)) = records.next() else {
        return Err(PlanError::Validation("curriculum CSV is empty".to_string()));
    };
    let header: HashMap<String, usize> = parse_csv_record(&header_line)
        .iter()
        .enumerate()
        .map(|(i, h)| (norm_text(h).to_ascii_lowercase(), i))
        .collect();
    for col in REQUIRED_COLUMNS {
        if !header.contains_key(col) {
            return Err(PlanError::Validation(format!(
                "curriculum CSV missing column: {}",
                col
            )));
        }
    }

    let mut rows = Vec::new();
    let mut skipped = Vec::new();
    let mut next_seq: HashMap<(String, String), i64> = HashMap::new();

    let mut keys = HashSet::new();

    for (line_no, record) in records {
        let fields = parse_csv_record(&record);
        let cell = |name: &str| -> String {
            header
                .get(name)
                .and_then(|i| fields.get(*i))
                .map(|v| norm_text(v))
                .unwrap_or_default()
        };

        let provider = cell("provider");
        let class_code = cell("class_code");
        let title = cell("title");
        if provider.is_empty() || class_code.is_empty() {
            skipped.push(SkippedRow {
                line: line_no,
                reason: "missing provider or class_code".to_string(),
            });
            continue;
        }
        if title.is_empty() {
            skipped.push(SkippedRow {
                line: line_no,
                reason: "missing title".to_string(),
            });
            continue;
        }

        let key = (provider.clone(), class_code.clone());
        let seq_raw = cell("sequence_index");
        let sequence_index = if seq_raw.is_empty() {
            next_seq.get(&key).copied().unwrap_or(1)
        } else {
            match seq_raw.parse::<i64>() {
                Ok(v) => v,
                Err(_) => {
                    skipped.push(SkippedRow {
                        line: line_no,
                        reason: format!("sequence_index is not an integer: {}", seq_raw),
                    });
                    continue;
                }
            }
        };
        next_seq.insert(key.clone(), sequence_index + 1);
        if !keys.insert((key, sequence_index)) {
            skipped.push(SkippedRow {
                line: line_no,
                reason: format!("duplicate sequence_index {} for {}/{}", sequence_index, provider, class_code),
            });
            continue;
        }

        let class_name = Some(cell("class_name"))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| class_code.clone());
        let source_lesson_code = Some(cell("lesson_code"))
            .filter(|s| !s.is_empty())
            .or_else(|| extract_lesson_code(&title));

        rows.push(LessonRow {
            provider,
            class_code,
            class_name,
            sequence_index,
            source_lesson_code,
            title,
            objective: cell("objective"),
            standards: normalize_standards(&cell("standards")),
        });
    }
    Ok((rows, skipped))
}

/// Writes parsed rows in one transaction. Re-importing updates lessons in place by
/// `(library, sequence_index)` and replaces their standard links.
pub fn import_rows(conn: &Connection, rows: &[LessonRow]) -> Result<ImportSummary, PlanError> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let mut libraries = HashSet::new();
    let mut standards = HashSet::new();

    for row in rows {
        let lib_id = library_id(&row.provider, &row.class_code);
        if libraries.insert(lib_id.clone()) {
            tx.execute(
                "INSERT INTO curriculum_libraries(id, provider, class_code, class_name)
                 VALUES(?, ?, ?, ?)
                 ON CONFLICT(provider, class_code) DO UPDATE SET class_name = excluded.class_name",
                params![lib_id, row.provider, row.class_code, row.class_name],
            )?;
        }

        let les_id = lesson_id(&row.provider, &row.class_code, row.sequence_index);
        tx.execute(
            "INSERT INTO curriculum_lessons(id, library_id, sequence_index, source_lesson_code, title, objective)
             VALUES(?, ?, ?, ?, ?, ?)
             ON CONFLICT(library_id, sequence_index) DO UPDATE SET
               source_lesson_code = excluded.source_lesson_code,
               title = excluded.title,
               objective = excluded.objective",
            params![
                les_id,
                lib_id,
                row.sequence_index,
                row.source_lesson_code,
                row.title,
                row.objective
            ],
        )?;

        tx.execute(
            "DELETE FROM curriculum_lesson_standards WHERE lesson_id = ?",
            [&les_id],
        )?;
        for (order, code) in row.standards.iter().enumerate() {
            let std_id = standard_id(code);
            if standards.insert(std_id.clone()) {
                tx.execute(
                    "INSERT INTO standards(id, code) VALUES(?, ?) ON CONFLICT(code) DO NOTHING",
                    params![std_id, code],
                )?;
            }
            tx.execute(
                "INSERT INTO curriculum_lesson_standards(lesson_id, standard_id, link_order)
                 SELECT ?, id, ? FROM standards WHERE code = ?",
                params![les_id, order as i64, code],
            )?;
        }
    }
    tx.commit()?;

    Ok(ImportSummary {
        libraries: libraries.len(),
        lessons: rows.len(),
        standards: standards.len(),
        skipped: Vec::new(),
    })
}

pub fn import_csv_file(conn: &Connection, path: &Path) -> Result<ImportSummary, PlanError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        PlanError::Validation(format!("failed to read {}: {}", path.to_string_lossy(), e))
    })?;
    let (rows, skipped) = parse_lessons_csv(&text)?;
    let mut summary = import_rows(conn, &rows)?;
    if !skipped.is_empty() {
        warn!(skipped = skipped.len(), path = %path.to_string_lossy(), "curriculum rows skipped");
    }
    summary.skipped = skipped;
    info!(
        libraries = summary.libraries,
        lessons = summary.lessons,
        standards = summary.standards,
        "curriculum imported"
    );
    Ok(summary)
}
