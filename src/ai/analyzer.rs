// Email pipeline - batches emails through prompt, provider and reconciler
use crate::ai::prompt::{
    build_context, build_prompt, build_reply_prompt, reply_system_prompt, system_prompt,
    ASSISTANT_SYSTEM_PROMPT,
};
use crate::ai::provider::{chat, AIMessage, AIProvider};
use crate::ai::reconciler::{reconcile_categories, reconcile_tasks, Reconciled};
use crate::error::{AppError, Result};
use crate::model::{Categorization, EmailItem, Schema, Task};

/// Emails per model call unless configured otherwise
pub const DEFAULT_BATCH_SIZE: usize = 10;

type ReconcileFn<T> = fn(&str, &[EmailItem]) -> Reconciled<T>;

async fn run_batches<T>(
    provider: &dyn AIProvider,
    items: &[EmailItem],
    schema: Schema,
    tone: &str,
    batch_size: usize,
    reconcile: ReconcileFn<T>,
) -> Result<Reconciled<T>> {
    if items.is_empty() {
        return Err(AppError::InvalidInput("no emails provided".to_string()));
    }
    let batch_size = if batch_size == 0 { DEFAULT_BATCH_SIZE } else { batch_size };
    let total_batches = items.len().div_ceil(batch_size);

    let mut combined = Reconciled::empty();
    for (index, batch) in items.chunks(batch_size).enumerate() {
        tracing::info!(
            "Processing {:?} batch {}/{} ({} emails) with {}",
            schema,
            index + 1,
            total_batches,
            batch.len(),
            provider.name()
        );

        let prompt = build_prompt(batch, schema, tone)?;
        let reply = chat(provider, system_prompt(schema), &[], &prompt).await?;
        let result = reconcile(&reply, batch);

        if !result.extracted {
            tracing::warn!("Batch {} returned no usable JSON", index + 1);
        } else if result.fallback_count > 0 {
            tracing::warn!(
                "Batch {}: {} record(s) needed default values",
                index + 1,
                result.fallback_count
            );
        }
        combined.merge(result);
    }

    Ok(combined)
}

/// One categorization per email, in input order
pub async fn categorize_emails(
    provider: &dyn AIProvider,
    items: &[EmailItem],
    batch_size: usize,
) -> Result<Reconciled<Categorization>> {
    run_batches(
        provider,
        items,
        Schema::Categorization,
        "",
        batch_size,
        reconcile_categories,
    )
    .await
}

/// Suggested tasks for a set of emails
pub async fn generate_tasks(
    provider: &dyn AIProvider,
    items: &[EmailItem],
    tone: &str,
    batch_size: usize,
) -> Result<Reconciled<Task>> {
    run_batches(provider, items, Schema::Tasks, tone, batch_size, reconcile_tasks).await
}

/// Draft a reply to one email; returns plain text
pub async fn draft_reply(
    provider: &dyn AIProvider,
    item: &EmailItem,
    tone: &str,
    instructions: Option<&str>,
) -> Result<String> {
    let prompt = build_reply_prompt(item, tone, instructions);
    let reply = chat(provider, reply_system_prompt(), &[], &prompt).await?;
    Ok(reply.trim().to_string())
}

/// Answer a question about the given emails, continuing an earlier conversation
pub async fn ask_assistant(
    provider: &dyn AIProvider,
    history: &[AIMessage],
    question: &str,
    context: &[EmailItem],
) -> Result<String> {
    if question.trim().is_empty() {
        return Err(AppError::InvalidInput("question must not be empty".to_string()));
    }

    let system = if context.is_empty() {
        ASSISTANT_SYSTEM_PROMPT.to_string()
    } else {
        format!("{}\n\nEmails:\n{}", ASSISTANT_SYSTEM_PROMPT, build_context(context))
    };

    let reply = chat(provider, &system, history, question).await?;
    Ok(reply.trim().to_string())
}
