// Prompt assembly for categorization, task generation, replies and the assistant
use crate::error::{AppError, Result};
use crate::model::{EmailItem, Priority, Schema, TaskType, Theme};

/// Characters of body text embedded per email
const BODY_BUDGET: usize = 1500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Formal,
    Informal,
    Professional,
    Friendly,
    Casual,
}

impl Default for Tone {
    fn default() -> Self {
        Tone::Professional
    }
}

impl Tone {
    /// Unknown tones fall back to professional; tone only affects wording.
    pub fn parse_or_default(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "formal" => Tone::Formal,
            "informal" => Tone::Informal,
            "professional" => Tone::Professional,
            "friendly" => Tone::Friendly,
            "casual" => Tone::Casual,
            _ => Tone::Professional,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Formal => "formal",
            Tone::Informal => "informal",
            Tone::Professional => "professional",
            Tone::Friendly => "friendly",
            Tone::Casual => "casual",
        }
    }
}

const TASKS_SYSTEM_PROMPT: &str = "You are an assistant that turns emails into actionable tasks. \
You always answer with a single JSON array and nothing else.";

const CATEGORIZE_SYSTEM_PROMPT: &str = "You are an email classifier. \
You always answer with a single JSON array and nothing else.";

pub const ASSISTANT_SYSTEM_PROMPT: &str = "You are a helpful email assistant. \
Answer questions about the user's inbox using only the emails provided as context. \
If the answer is not in the emails, say so.";

pub fn system_prompt(schema: Schema) -> &'static str {
    match schema {
        Schema::Tasks => TASKS_SYSTEM_PROMPT,
        Schema::Categorization => CATEGORIZE_SYSTEM_PROMPT,
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

fn quoted_list(values: impl IntoIterator<Item = &'static str>) -> String {
    values
        .into_iter()
        .map(|v| format!("\"{}\"", v))
        .collect::<Vec<_>>()
        .join(" | ")
}

fn render_email(index: usize, item: &EmailItem) -> String {
    let mut block = format!(
        "Email {}:\nemailId: {}\nSubject: {}\nFrom: {}\nExcerpt: {}\n",
        index + 1,
        item.id,
        item.subject,
        item.sender,
        item.snippet
    );
    if let Some(body) = item.body.as_deref().filter(|b| !b.trim().is_empty()) {
        block.push_str(&format!("Body:\n{}\n", truncate_chars(body.trim(), BODY_BUDGET)));
    }
    block
}

/// Emails rendered as prompt context, in batch order
pub fn build_context(items: &[EmailItem]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| render_email(i, item))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the user prompt for one batch.
pub fn build_prompt(items: &[EmailItem], schema: Schema, tone: &str) -> Result<String> {
    if items.is_empty() {
        return Err(AppError::InvalidInput(
            "at least one email is required to build a prompt".to_string(),
        ));
    }
    let tone = Tone::parse_or_default(tone);
    let emails = build_context(items);

    let prompt = match schema {
        Schema::Tasks => format!(
            r#"Create 2-4 tasks for EACH of the following {count} emails.
Write titles and descriptions in a {tone} tone.

{emails}
Each task must be a JSON object with exactly these fields:
- "title": short task title
- "description": one or two sentences
- "type": one of {types}
- "priority": one of {priorities}
- "assignedTo": "self" or a team name
- "dueDate": "YYYY-MM-DD" or null
- "emailId": the emailId of the email the task belongs to

Respond ONLY with a JSON array of these objects. No prose, no markdown, no code fences."#,
            count = items.len(),
            tone = tone.as_str(),
            emails = emails,
            types = quoted_list(TaskType::ALL.iter().map(|t| t.as_str())),
            priorities = quoted_list(Priority::ALL.iter().map(|p| p.as_str())),
        ),
        Schema::Categorization => format!(
            r#"Categorize each of the following {count} emails. Return exactly one object per email, in the same order.

{emails}
Each object must have exactly these fields:
- "emailId": the emailId of the email
- "theme": one of {themes}
- "category": a short lowercase label such as "meeting", "payment" or "newsletter"

Respond ONLY with a JSON array of {count} objects. No prose, no markdown, no code fences."#,
            count = items.len(),
            emails = emails,
            themes = quoted_list(Theme::ALL.iter().map(|t| t.as_str())),
        ),
    };

    Ok(prompt)
}

/// Prompt for drafting a reply to a single email
pub fn build_reply_prompt(item: &EmailItem, tone: &str, instructions: Option<&str>) -> String {
    let tone = Tone::parse_or_default(tone);
    let mut prompt = format!(
        "Draft a reply to the following email in a {} tone.\n\n{}\n",
        tone.as_str(),
        render_email(0, item)
    );
    if let Some(extra) = instructions.map(str::trim).filter(|s| !s.is_empty()) {
        prompt.push_str(&format!("Additional instructions: {}\n", extra));
    }
    prompt.push_str("Respond only with the reply text, without a subject line.");
    prompt
}

pub fn reply_system_prompt() -> &'static str {
    "You write clear, concise email replies on behalf of the user."
}
