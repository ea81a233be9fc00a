//! Summarization pipeline.
//!
//! Picks a bounded, priority-ordered excerpt of the repository's files,
//! asks the LLM for a JSON summary, and stores the tolerant parse of its
//! reply. A malformed reply still yields a stored summary; an unreachable
//! LLM fails the run.

use anyhow::{bail, Context, Result};

use repolens_core::models::Summary;
use repolens_core::summary::{parse_summary_response, select_important_files};

use crate::context::Services;
use crate::llm::LlmMessage;

/// Build the summary request around the selected repository text.
pub fn summary_prompt(repo_text: &str) -> String {
    format!(
        r#"Respond ONLY with one valid JSON object, NO extra text, markdown, headers, or multiple blocks.
{{
  "summary": "...",
  "architecture": "...",
  "complexity": "Low" | "Medium" | "High",
  "potentialIssues": ["...", "..."]
}}
Repository code:
{}
"#,
        repo_text
    )
}

/// Generate, store and link the AI summary of a repository.
pub async fn summarize(services: &Services, repo_id: &str) -> Result<Summary> {
    services.repository(repo_id).await?;
    let cfg = &services.config.summary;

    tracing::info!(repo_id, "summarization started");

    let files = services.store.list_file_records(repo_id).await?;
    if files.is_empty() {
        bail!("No files to summarize for repository {}", repo_id);
    }

    let repo_text = select_important_files(&files, cfg.max_chars, cfg.max_file_size);
    tracing::debug!(repo_id, chars = repo_text.chars().count(), "selected summary input");

    let reply = services
        .llm
        .complete(
            &[LlmMessage::user(summary_prompt(&repo_text))],
            services.config.llm.summary_temperature,
        )
        .await
        .context("LLM failed to generate the summary")?;

    let summary = Summary::from_fields(repo_id, parse_summary_response(&reply));
    services.store.insert_summary(&summary).await?;
    services.store.set_summary_ref(repo_id, &summary.id).await?;

    tracing::info!(
        repo_id,
        summary_id = %summary.id,
        complexity = %summary.complexity,
        issues = summary.potential_issues.len(),
        "summarization finished"
    );
    Ok(summary)
}
