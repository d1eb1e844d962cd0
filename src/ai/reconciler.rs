// Turns raw model text into validated tasks / categorizations
//
// Extraction runs an ordered list of text repairs, re-parsing after each one.
// Validation replaces anything outside the schema with defaults and counts
// the records that needed it. Malformed model output never produces an error.
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::ai::categorizer::{infer_category, infer_theme};
use crate::model::{
    Categorization, EmailItem, Priority, Schema, StructuredRecord, Task, TaskStatus, TaskType,
    Theme,
};

/// Field names accepted as the link back to the source email
const SOURCE_ID_FIELDS: &[&str] = &[
    "emailId",
    "email_id",
    "sourceItemId",
    "source_item_id",
    "sourceEmailId",
    "source_email_id",
];

/// Reconciliation output plus diagnostics for the caller
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reconciled<T> {
    pub records: Vec<T>,
    /// Records that needed at least one defaulted field
    pub fallback_count: usize,
    /// False when no JSON could be recovered from the model text
    pub extracted: bool,
}

impl<T> Reconciled<T> {
    pub fn empty() -> Self {
        Self {
            records: Vec::new(),
            fallback_count: 0,
            extracted: true,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Reconciled<U> {
        Reconciled {
            records: self.records.into_iter().map(f).collect(),
            fallback_count: self.fallback_count,
            extracted: self.extracted,
        }
    }

    /// Append the result of another batch
    pub fn merge(&mut self, other: Reconciled<T>) {
        self.records.extend(other.records);
        self.fallback_count += other.fallback_count;
        self.extracted &= other.extracted;
    }
}

// === Extraction ===

type Repair = fn(&str) -> String;

/// Applied cumulatively, in order; parsing is retried after each step
const REPAIRS: &[(&str, Repair)] = &[
    ("slice_array", slice_array),
    ("strip_code_fences", strip_code_fences),
    ("normalize_single_quotes", normalize_single_quotes),
    ("remove_trailing_commas", remove_trailing_commas),
    ("slice_object", slice_object),
];

static CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)```").expect("fence pattern"));

/// Recover a JSON array from model text, or `None` if every repair failed.
///
/// The repair chain runs on the raw text, then on the text with fences
/// removed, then from each later `[` so brackets in leading prose can't
/// swallow the real array. An array holding objects is preferred over one
/// that only holds scalars.
pub fn extract_json_array(text: &str) -> Option<Vec<Value>> {
    if let Some(values) = parse_array(text) {
        return Some(values);
    }

    let mut scalar_only = None;
    for candidate in candidates(text) {
        let Some(values) = run_repairs(&candidate) else {
            continue;
        };
        if values.is_empty() || values.iter().any(Value::is_object) {
            return Some(values);
        }
        if scalar_only.is_none() {
            scalar_only = Some(values);
        }
    }
    scalar_only
}

fn candidates(text: &str) -> impl Iterator<Item = String> + '_ {
    let unfenced = Some(strip_code_fences(text)).filter(|unfenced| unfenced != text);
    std::iter::once(text.to_string()).chain(unfenced).chain(
        text.match_indices('[')
            .skip(1)
            .map(move |(start, _)| text[start..].to_string()),
    )
}

fn run_repairs(text: &str) -> Option<Vec<Value>> {
    let mut current = text.to_string();
    for (name, repair) in REPAIRS {
        current = repair(&current);
        if let Some(values) = parse_array(&current) {
            tracing::debug!(repair = name, elements = values.len(), "model output parsed after repair");
            return Some(values);
        }
    }
    None
}

fn parse_array(text: &str) -> Option<Vec<Value>> {
    match serde_json::from_str::<Value>(text.trim()).ok()? {
        Value::Array(values) => Some(values),
        Value::Object(map) => Some(unwrap_object(map)),
        _ => None,
    }
}

/// Keys checked first when the model wraps its array in an object
const WRAPPER_KEYS: &[&str] = &["tasks", "categorizations", "categories", "results", "items", "data"];

fn object_array(value: &Value) -> Option<Vec<Value>> {
    match value {
        Value::Array(items) if !items.is_empty() && items.iter().all(Value::is_object) => {
            Some(items.clone())
        }
        _ => None,
    }
}

/// `{"tasks": [...]}` yields the inner array, any other object is one element
fn unwrap_object(map: Map<String, Value>) -> Vec<Value> {
    let wrapped = WRAPPER_KEYS
        .iter()
        .find_map(|key| map.get(*key).and_then(object_array))
        .or_else(|| map.values().find_map(object_array));
    wrapped.unwrap_or_else(|| vec![Value::Object(map)])
}

fn slice_array(text: &str) -> String {
    match (text.find('['), text.rfind(']')) {
        (Some(start), Some(end)) if end > start => text[start..=end].to_string(),
        _ => text.to_string(),
    }
}

fn slice_object(text: &str) -> String {
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if end > start => text[start..=end].to_string(),
        _ => text.to_string(),
    }
}

fn strip_code_fences(text: &str) -> String {
    if let Some(caps) = CODE_FENCE.captures(text) {
        return caps[1].trim().to_string();
    }
    text.replace("```", "")
}

/// A single quote closes a string only when followed by a JSON delimiter,
/// so apostrophes inside single-quoted content survive.
fn closes_single_quoted(chars: &[char], from: usize) -> bool {
    chars[from..]
        .iter()
        .find(|c| !c.is_whitespace())
        .map_or(true, |c| matches!(c, ',' | ':' | '}' | ']'))
}

fn normalize_single_quotes(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '"' => {
                // double-quoted strings are copied untouched
                out.push('"');
                i += 1;
                while i < chars.len() {
                    let ch = chars[i];
                    out.push(ch);
                    i += 1;
                    if ch == '\\' {
                        if let Some(&next) = chars.get(i) {
                            out.push(next);
                            i += 1;
                        }
                    } else if ch == '"' {
                        break;
                    }
                }
            }
            '\'' => {
                out.push('"');
                i += 1;
                while i < chars.len() {
                    let ch = chars[i];
                    if ch == '\\' {
                        match chars.get(i + 1) {
                            Some('\'') => out.push('\''),
                            Some(&next) => {
                                out.push('\\');
                                out.push(next);
                            }
                            None => out.push('\\'),
                        }
                        i += 2;
                        continue;
                    }
                    if ch == '\'' && closes_single_quoted(&chars, i + 1) {
                        i += 1;
                        break;
                    }
                    if ch == '"' {
                        out.push_str("\\\"");
                    } else {
                        out.push(ch);
                    }
                    i += 1;
                }
                out.push('"');
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

fn remove_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                if !matches!(next, Some(']') | Some('}')) {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }
    out
}

// === Field helpers ===

fn field<'a>(obj: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .find_map(|name| obj.get(*name))
        .filter(|v| !v.is_null())
}

fn string_field(obj: &Map<String, Value>, names: &[&str]) -> Option<String> {
    field(obj, names).and_then(Value::as_str).map(|s| s.trim().to_string())
}

fn enum_field<T>(obj: &Map<String, Value>, names: &[&str], parse: fn(&str) -> Option<T>) -> Option<T> {
    field(obj, names).and_then(Value::as_str).and_then(parse)
}

fn parse_due_date(value: &str) -> Option<String> {
    let value = value.trim();
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(value).ok().map(|dt| dt.date_naive()))
        .or_else(|| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })?;
    Some(date.format("%Y-%m-%d").to_string())
}

fn explicit_source_index(obj: &Map<String, Value>, items: &[EmailItem]) -> Option<usize> {
    let id = match field(obj, SOURCE_ID_FIELDS)? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    items.iter().position(|item| item.id == id)
}

fn explicit_source<'a>(obj: &Map<String, Value>, items: &'a [EmailItem]) -> Option<&'a EmailItem> {
    explicit_source_index(obj, items).map(|i| &items[i])
}

fn placeholder_title(item: &EmailItem) -> String {
    format!("Review: {}", item.subject)
}

// === Tasks ===

fn validate_task(value: &Value, items: &[EmailItem], positional: &EmailItem) -> (Task, bool) {
    let empty = Map::new();
    let (obj, mut defaulted) = match value.as_object() {
        Some(obj) => (obj, false),
        None => (&empty, true),
    };

    let source = match explicit_source(obj, items) {
        Some(item) => item,
        None => {
            defaulted = true;
            positional
        }
    };

    // a bare string element is taken as the title
    let bare_title = value.as_str().map(str::trim).filter(|s| !s.is_empty());
    let title = match string_field(obj, &["title"]).filter(|t| !t.is_empty()) {
        Some(title) => title,
        None => {
            defaulted = true;
            bare_title
                .map(str::to_string)
                .unwrap_or_else(|| placeholder_title(source))
        }
    };

    let mut text_or_default = |names: &[&str]| -> String {
        string_field(obj, names).unwrap_or_else(|| {
            defaulted = true;
            String::new()
        })
    };
    let description = text_or_default(&["description", "details"]);
    let assigned_to = text_or_default(&["assignedTo", "assigned_to", "assignee"]);

    let task_type = enum_field(obj, &["type", "taskType", "task_type"], TaskType::parse)
        .unwrap_or_else(|| {
            defaulted = true;
            TaskType::default()
        });
    let priority = enum_field(obj, &["priority"], Priority::parse).unwrap_or_else(|| {
        defaulted = true;
        Priority::default()
    });

    let due_date = match field(obj, &["dueDate", "due_date", "due"]) {
        None => None,
        Some(Value::String(s)) => {
            let parsed = parse_due_date(s);
            if parsed.is_none() {
                defaulted = true;
            }
            parsed
        }
        Some(_) => {
            defaulted = true;
            None
        }
    };

    let task = Task {
        title,
        description,
        task_type,
        priority,
        assigned_to,
        due_date,
        source_item_id: source.id.clone(),
        status: TaskStatus::Pending,
    };
    (task, defaulted)
}

/// Tasks keep whatever count the model produced. Elements without a usable
/// email id are mapped proportionally onto the batch.
pub fn reconcile_tasks(text: &str, items: &[EmailItem]) -> Reconciled<Task> {
    if items.is_empty() {
        return Reconciled::empty();
    }

    let Some(elements) = extract_json_array(text) else {
        tracing::warn!(emails = items.len(), "no JSON recovered from task response");
        return Reconciled {
            records: Vec::new(),
            fallback_count: items.len(),
            extracted: false,
        };
    };

    let count = elements.len();
    let mut fallback_count = 0;
    let records = elements
        .iter()
        .enumerate()
        .map(|(i, element)| {
            let position = (i * items.len() / count).min(items.len() - 1);
            let (task, defaulted) = validate_task(element, items, &items[position]);
            if defaulted {
                fallback_count += 1;
            }
            task
        })
        .collect();

    Reconciled {
        records,
        fallback_count,
        extracted: true,
    }
}

// === Categorization ===

fn keyword_text(obj: &Map<String, Value>) -> String {
    ["title", "description", "summary", "subject", "theme", "category"]
        .iter()
        .filter_map(|key| obj.get(*key).and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

fn validate_categorization(value: &Value, item: &EmailItem) -> (Categorization, bool) {
    let Some(obj) = value.as_object() else {
        // "finance" or some prose instead of an object
        return match value.as_str() {
            Some(text) => (
                Categorization {
                    source_item_id: item.id.clone(),
                    theme: Theme::parse(text).unwrap_or_else(|| infer_theme(text)),
                    category: infer_category(text).to_string(),
                },
                true,
            ),
            None => (Categorization::fallback(&item.id), true),
        };
    };

    let theme = enum_field(obj, &["theme"], Theme::parse);
    let category = string_field(obj, &["category"]).filter(|c| !c.is_empty());

    match (theme, category) {
        (Some(theme), Some(category)) => (
            Categorization {
                source_item_id: item.id.clone(),
                theme,
                category,
            },
            false,
        ),
        (theme, category) => {
            let hint = keyword_text(obj);
            (
                Categorization {
                    source_item_id: item.id.clone(),
                    theme: theme.unwrap_or_else(|| infer_theme(&hint)),
                    category: category.unwrap_or_else(|| infer_category(&hint).to_string()),
                },
                true,
            )
        }
    }
}

/// Pair each email with at most one element. Elements naming a batch email
/// claim it first; the rest fill the unclaimed emails in order.
fn align_categories<'a>(elements: &'a [Value], items: &[EmailItem]) -> Vec<Option<&'a Value>> {
    let mut slots: Vec<Option<&Value>> = vec![None; items.len()];
    let mut unlinked = Vec::new();

    for element in elements {
        let linked = element
            .as_object()
            .and_then(|obj| explicit_source_index(obj, items));
        match linked {
            Some(i) if slots[i].is_none() => slots[i] = Some(element),
            _ => unlinked.push(element),
        }
    }

    let mut unlinked = unlinked.into_iter();
    for slot in slots.iter_mut().filter(|slot| slot.is_none()) {
        *slot = unlinked.next();
    }
    slots
}

/// Exactly one record per email: linked by email id when the model names
/// one, by position otherwise.
pub fn reconcile_categories(text: &str, items: &[EmailItem]) -> Reconciled<Categorization> {
    let parsed = extract_json_array(text);
    let extracted = parsed.is_some();
    let elements = parsed.unwrap_or_default();

    if !extracted {
        tracing::warn!(emails = items.len(), "no JSON recovered from categorization response");
    }
    if elements.len() > items.len() {
        tracing::debug!(
            surplus = elements.len() - items.len(),
            "ignoring extra categorization elements"
        );
    }

    let mut fallback_count = 0;
    let records = items
        .iter()
        .zip(align_categories(&elements, items))
        .map(|(item, element)| {
            let (record, defaulted) = match element {
                Some(element) => validate_categorization(element, item),
                None => (Categorization::fallback(&item.id), true),
            };
            if defaulted {
                fallback_count += 1;
            }
            record
        })
        .collect();

    Reconciled {
        records,
        fallback_count,
        extracted,
    }
}

pub fn reconcile(text: &str, items: &[EmailItem], schema: Schema) -> Reconciled<StructuredRecord> {
    match schema {
        Schema::Tasks => reconcile_tasks(text, items).map(StructuredRecord::Task),
        Schema::Categorization => {
            reconcile_categories(text, items).map(StructuredRecord::Categorization)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email(id: &str, subject: &str) -> EmailItem {
        EmailItem {
            id: id.to_string(),
            subject: subject.to_string(),
            sender: "bob@example.com".to_string(),
            snippet: "snippet".to_string(),
            ..EmailItem::default()
        }
    }

    fn batch() -> Vec<EmailItem> {
        vec![email("e1", "Invoice due"), email("e2", "Team sync")]
    }

    const WELL_FORMED_TASKS: &str = r#"[
        {"title": "Pay invoice", "description": "Pay by Friday", "type": "action", "priority": "high", "assignedTo": "self", "dueDate": "2024-05-10", "emailId": "e1"},
        {"title": "Reply to vendor", "description": "Confirm payment", "type": "response", "priority": "medium", "assignedTo": "self", "dueDate": null, "emailId": "e1"},
        {"title": "Book room", "description": "For the sync", "type": "team-workflow", "priority": "low", "assignedTo": "ops", "emailId": "e2"}
    ]"#;

    #[test]
    fn test_well_formed_tasks_need_no_fallback() {
        let result = reconcile_tasks(WELL_FORMED_TASKS, &batch());
        assert!(result.extracted);
        assert_eq!(result.fallback_count, 0);
        assert_eq!(result.records.len(), 3);

        let first = &result.records[0];
        assert_eq!(first.title, "Pay invoice");
        assert_eq!(first.task_type, TaskType::Action);
        assert_eq!(first.priority, Priority::High);
        assert_eq!(first.due_date.as_deref(), Some("2024-05-10"));
        assert_eq!(first.source_item_id, "e1");
        assert_eq!(first.status, TaskStatus::Pending);

        assert_eq!(result.records[1].due_date, None);
        assert_eq!(result.records[2].assigned_to, "ops");
        assert_eq!(result.records[2].source_item_id, "e2");
    }

    #[test]
    fn test_well_formed_categories_need_no_fallback() {
        let text = r#"[{"emailId":"e1","theme":"finance","category":"payment"},{"emailId":"e2","theme":"work","category":"meeting"}]"#;
        let result = reconcile_categories(text, &batch());
        assert_eq!(result.fallback_count, 0);
        assert_eq!(
            result.records,
            vec![
                Categorization {
                    source_item_id: "e1".into(),
                    theme: Theme::Finance,
                    category: "payment".into()
                },
                Categorization {
                    source_item_id: "e2".into(),
                    theme: Theme::Work,
                    category: "meeting".into()
                },
            ]
        );
    }

    #[test]
    fn test_fenced_and_prose_wrapped_output_matches_plain() {
        let plain = reconcile_tasks(WELL_FORMED_TASKS, &batch());

        let fenced = format!("```json\n{}\n```", WELL_FORMED_TASKS);
        assert_eq!(reconcile_tasks(&fenced, &batch()), plain);

        let prose = format!(
            "Sure! Here are the tasks you asked for:\n\n{}\n\nLet me know if you need more.",
            WELL_FORMED_TASKS
        );
        assert_eq!(reconcile_tasks(&prose, &batch()), plain);
    }

    #[test]
    fn test_bracketed_prose_before_array() {
        let plain = r#"[{"theme":"finance","category":"payment"},{"theme":"work","category":"meeting"}]"#;
        let prose = format!("Here are the categories for emails [e1, e2]:\n{}", plain);

        let expected = reconcile_categories(plain, &batch());
        let result = reconcile_categories(&prose, &batch());
        assert_eq!(result, expected);
        assert_eq!(result.fallback_count, 0);
        assert_eq!(result.records[0].theme, Theme::Finance);
        assert_eq!(result.records[1].category, "meeting");
    }

    #[test]
    fn test_bracketed_prose_before_fenced_array() {
        let text = "Tasks [draft]:\n```json\n[{\"title\": \"a\", \"emailId\": \"e1\"}, {\"title\": \"b\", \"emailId\": \"e2\"}]\n```";
        let result = reconcile_tasks(text, &batch());

        assert!(result.extracted);
        let titles: Vec<&str> = result.records.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["a", "b"]);
        assert_eq!(result.records[1].source_item_id, "e2");
    }

    #[test]
    fn test_numeric_prose_brackets_do_not_hide_objects() {
        let text = r#"Scores [1, 2] then [{"theme":"travel","category":"flight"}]"#;
        let values = extract_json_array(text).unwrap();
        assert_eq!(values.len(), 1);
        assert!(values[0].is_object());
    }

    #[test]
    fn test_single_quotes_and_trailing_commas_are_repaired() {
        let text = "[{'title': 'Pay invoice', 'description': 'Pay by Friday', 'type': 'action', \
                    'priority': 'high', 'assignedTo': 'self', 'emailId': 'e1',},]";
        let result = reconcile_tasks(text, &batch());
        assert!(result.extracted);
        assert_eq!(result.fallback_count, 0);
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].title, "Pay invoice");
    }

    #[test]
    fn test_apostrophes_in_content_survive_repair() {
        let text = r#"[{"title": "Don't forget the invoice", 'description': 'It's due Friday', "type": "action", "priority": "urgent", "assignedTo": "self", "emailId": "e1",}]"#;
        let result = reconcile_tasks(text, &batch());
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].title, "Don't forget the invoice");
        assert_eq!(result.records[0].description, "It's due Friday");
        assert_eq!(result.records[0].priority, Priority::Urgent);
    }

    #[test]
    fn test_commas_inside_strings_are_kept() {
        let repaired = remove_trailing_commas(r#"[{"title": "a, }", "x": 1,}]"#);
        assert_eq!(repaired, r#"[{"title": "a, }", "x": 1}]"#);
    }

    #[test]
    fn test_prose_refusal_yields_no_tasks() {
        let result = reconcile_tasks("not sure, I can't help with that", &batch());
        assert!(result.records.is_empty());
        assert!(!result.extracted);
        assert_eq!(result.fallback_count, 2);
    }

    #[test]
    fn test_reordered_categorization_follows_email_ids() {
        let text = r#"[{"emailId":"e2","theme":"work","category":"meeting"},{"emailId":"e1","theme":"finance","category":"payment"}]"#;
        let result = reconcile_categories(text, &batch());

        assert_eq!(result.fallback_count, 0);
        assert_eq!(result.records[0].source_item_id, "e1");
        assert_eq!(result.records[0].theme, Theme::Finance);
        assert_eq!(result.records[1].source_item_id, "e2");
        assert_eq!(result.records[1].category, "meeting");
    }

    #[test]
    fn test_unlinked_categorizations_fill_remaining_emails() {
        let items = vec![email("e1", "a"), email("e2", "b"), email("e3", "c")];
        let text = r#"[
            {"emailId":"e3","theme":"travel","category":"flight"},
            {"theme":"finance","category":"bill"},
            {"emailId":"e3","theme":"work","category":"meeting"}
        ]"#;
        let result = reconcile_categories(text, &items);

        assert_eq!(result.records[2].theme, Theme::Travel);
        assert_eq!(result.records[0].category, "bill");
        // the duplicate claim on e3 falls back to position
        assert_eq!(result.records[1].category, "meeting");
        assert_eq!(result.fallback_count, 0);
    }

    #[test]
    fn test_short_categorization_is_padded_with_defaults() {
        let items = vec![email("e1", "a"), email("e2", "b"), email("e3", "c")];
        let text = r#"[{"theme":"travel","category":"flight"}]"#;
        let result = reconcile_categories(text, &items);

        assert_eq!(result.records.len(), 3);
        assert_eq!(result.records[0].theme, Theme::Travel);
        assert_eq!(result.records[1], Categorization::fallback("e2"));
        assert_eq!(result.records[2], Categorization::fallback("e3"));
        assert_eq!(result.fallback_count, 2);
    }

    #[test]
    fn test_surplus_categorizations_are_ignored() {
        let items = vec![email("e1", "a")];
        let text = r#"[{"theme":"work","category":"meeting"},{"theme":"finance","category":"bill"}]"#;
        let result = reconcile_categories(text, &items);
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].theme, Theme::Work);
    }

    #[test]
    fn test_task_shaped_categorization_uses_keywords() {
        let items = vec![email("e1", "Sync")];
        let text = r#"[{"title": "Prepare agenda", "description": "Weekly Meeting with the team", "type": "action"}]"#;
        let result = reconcile_categories(text, &items);
        assert_eq!(result.records[0].theme, Theme::Work);
        assert_eq!(result.records[0].category, "meeting");
        assert_eq!(result.fallback_count, 1);
    }

    #[test]
    fn test_invalid_theme_keeps_valid_category() {
        let items = vec![email("e1", "x")];
        let text = r#"[{"theme": "money", "category": "payment"}]"#;
        let result = reconcile_categories(text, &items);
        assert_eq!(result.records[0].theme, Theme::Finance);
        assert_eq!(result.records[0].category, "payment");
        assert_eq!(result.fallback_count, 1);
    }

    #[test]
    fn test_task_source_ids_always_belong_to_batch() {
        let items = batch();
        let text = r#"[
            {"title": "a", "emailId": "e2"},
            {"title": "b"},
            {"title": "c", "emailId": "unknown"},
            {"title": "d"}
        ]"#;
        let result = reconcile_tasks(text, &items);
        let ids: Vec<&str> = result.records.iter().map(|t| t.source_item_id.as_str()).collect();

        // explicit id wins, otherwise index 1 of 4 -> item 0, index 2 -> item 1, index 3 -> item 1
        assert_eq!(ids, vec!["e2", "e1", "e2", "e2"]);
        assert!(result
            .records
            .iter()
            .all(|t| items.iter().any(|i| i.id == t.source_item_id)));
    }

    #[test]
    fn test_invalid_fields_are_defaulted() {
        let items = vec![email("e1", "Invoice due")];
        let text = r#"[{"title": 42, "type": "chore", "priority": "asap", "dueDate": "next friday", "emailId": "e1"}]"#;
        let result = reconcile_tasks(text, &items);
        let task = &result.records[0];

        assert_eq!(task.title, "Review: Invoice due");
        assert_eq!(task.description, "");
        assert_eq!(task.assigned_to, "");
        assert_eq!(task.task_type, TaskType::Action);
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(task.due_date, None);
        assert_eq!(result.fallback_count, 1);
    }

    #[test]
    fn test_timestamp_due_date_is_reduced_to_date() {
        assert_eq!(parse_due_date("2024-03-01T10:00:00Z").as_deref(), Some("2024-03-01"));
        assert_eq!(parse_due_date("2024-03-01T10:00:00").as_deref(), Some("2024-03-01"));
        assert_eq!(parse_due_date("2024-13-01"), None);
    }

    #[test]
    fn test_wrapped_object_is_unwrapped() {
        let text = r#"{"tasks": [{"title": "a", "description": "", "type": "action", "priority": "low", "assignedTo": "self", "emailId": "e1"}]}"#;
        let result = reconcile_tasks(text, &batch());
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.fallback_count, 0);
    }

    #[test]
    fn test_known_wrapper_key_wins_over_other_arrays() {
        let text = r#"{"notes": [{"text": "fyi"}], "tasks": [{"title": "a", "emailId": "e2"}]}"#;
        let result = reconcile_tasks(text, &batch());
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].title, "a");
        assert_eq!(result.records[0].source_item_id, "e2");
    }

    #[test]
    fn test_reconciliation_is_idempotent() {
        let text = "Here:\n[{'title':'x'}, {'theme':'work'}, 'loose',]";
        let items = batch();
        assert_eq!(reconcile_tasks(text, &items), reconcile_tasks(text, &items));
        assert_eq!(
            reconcile_categories(text, &items),
            reconcile_categories(text, &items)
        );
    }

    #[test]
    fn test_end_to_end_invoice_categorization() {
        let items = vec![EmailItem {
            id: "e1".to_string(),
            subject: "Invoice due".to_string(),
            snippet: "Please pay the attached invoice by Friday".to_string(),
            ..EmailItem::default()
        }];
        let text = "Here you go:\n[{'theme':'finance','category':'payment'}]";
        let result = reconcile_categories(text, &items);

        assert_eq!(
            result.records,
            vec![Categorization {
                source_item_id: "e1".into(),
                theme: Theme::Finance,
                category: "payment".into()
            }]
        );
        assert_eq!(result.fallback_count, 0);
    }

    #[test]
    fn test_end_to_end_refusal_categorization() {
        let items = vec![email("e1", "Invoice due")];
        let result = reconcile_categories("not sure, I can't help with that", &items);
        assert_eq!(result.records, vec![Categorization::fallback("e1")]);
        assert_eq!(result.fallback_count, 1);
        assert!(!result.extracted);
    }

    #[test]
    fn test_empty_batch_yields_nothing() {
        assert!(reconcile_tasks(WELL_FORMED_TASKS, &[]).records.is_empty());
        assert!(reconcile_categories("[]", &[]).records.is_empty());
    }

    #[test]
    fn test_dispatch_by_schema() {
        let result = reconcile("[]", &batch(), Schema::Categorization);
        assert_eq!(result.records.len(), 2);
        assert!(result
            .records
            .iter()
            .all(|r| matches!(r, StructuredRecord::Categorization(_))));

        let tasks = reconcile(WELL_FORMED_TASKS, &batch(), Schema::Tasks);
        assert_eq!(tasks.records[2].source_item_id(), "e2");
    }
}
