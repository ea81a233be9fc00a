//! Retrieval-augmented chat over one repository.
//!
//! A turn runs classify → (short-circuit | retrieve → synthesize) and, on
//! success, appends the question and the answer to the repository's chat
//! session. Nothing about a turn's state survives between turns apart from
//! that session history.

use anyhow::{Context, Result};

use repolens_core::error::RepolensError;
use repolens_core::models::{ChatAnswer, ChatMessage, ChatSession, Intent, RetrievalHit, Role};
use repolens_core::search::retrieve;

use crate::context::Services;
use crate::llm::LlmMessage;

pub const GREETING_ANSWER: &str =
    "Hi! I'm Repolens. Excited to help you explore and understand your repository.";
pub const ACKNOWLEDGEMENT_ANSWER: &str =
    "Thanks for acknowledging! Just let me know what you’d like to explore next.";

/// Temperature of the intent classification call.
const CLASSIFY_TEMPERATURE: f32 = 0.0;

fn classify_prompt(question: &str) -> String {
    format!(
        r#"
You have to classify the following message into one of these intents ONLY: GREETING, ACKNOWLEDGEMENT, QUERY.

Examples of GREETING: hi, hello, hey, greetings
Examples of ACKNOWLEDGEMENT: ok, thanks, got it, thank you
Examples of QUERY: all other messages including questions and mixed messages

Message: "{}"

Return just the intent label in uppercase.
"#,
        question
    )
}

/// Render retrieval hits as the numbered context block of the answer prompt.
pub fn build_context(hits: &[RetrievalHit]) -> String {
    hits.iter()
        .enumerate()
        .map(|(i, hit)| {
            format!(
                "File {}: {}\nContent Preview:\n{}\n\n",
                i + 1,
                hit.path,
                hit.preview
            )
        })
        .collect()
}

fn answer_prompt(context: &str, question: &str) -> String {
    format!(
        r#"
You are an AI assistant analyzing a GitHub repository.
Use the provided context (code + metadata) to answer clearly and concisely in plain English.

Context:
{}

Question: "{}"

If it concerns code, focus on the most relevant snippets.
If the question concerns metadata (repo name, owner, contributors, languages), use REPO_METADATA.
"#,
        context, question
    )
}

/// Ask the LLM for the intent label of `question`.
pub async fn classify(services: &Services, question: &str) -> Result<Intent> {
    let label = services
        .llm
        .complete(
            &[LlmMessage::user(classify_prompt(question))],
            CLASSIFY_TEMPERATURE,
        )
        .await
        .context("Intent classification failed")?;

    let intent = Intent::from_label(&label);
    if intent == Intent::Query && label.trim().to_uppercase() != "QUERY" {
        tracing::warn!(label = %label, "unexpected intent label, treating as QUERY");
    }
    Ok(intent)
}

/// Answer one question about a repository.
pub async fn chat(services: &Services, repo_id: &str, question: &str) -> Result<ChatAnswer> {
    if question.trim().is_empty() {
        return Err(RepolensError::Validation("question must not be empty".into()).into());
    }
    services.repository(repo_id).await?;

    let intent = classify(services, question).await?;
    tracing::debug!(repo_id, ?intent, "classified question");

    let answer = match intent {
        Intent::Greeting => ChatAnswer {
            answer: GREETING_ANSWER.to_string(),
            sources: Vec::new(),
        },
        Intent::Acknowledgement => ChatAnswer {
            answer: ACKNOWLEDGEMENT_ANSWER.to_string(),
            sources: Vec::new(),
        },
        Intent::Query => answer_query(services, repo_id, question).await?,
    };

    services
        .store
        .append_chat_turn(
            repo_id,
            &ChatMessage::new(Role::User, question),
            &ChatMessage::new(Role::Assistant, &answer.answer),
        )
        .await?;

    Ok(answer)
}

async fn answer_query(services: &Services, repo_id: &str, question: &str) -> Result<ChatAnswer> {
    let query = services
        .embedder
        .embed(question)
        .await
        .context("Failed to embed the question")?;

    let hits = retrieve(
        services.store.as_ref(),
        repo_id,
        &query,
        services.config.retrieval.top_k,
    )
    .await?;
    tracing::debug!(repo_id, hits = hits.len(), "retrieved context");

    let prompt = answer_prompt(&build_context(&hits), question);
    let answer = services
        .llm
        .complete(
            &[LlmMessage::user(prompt)],
            services.config.llm.answer_temperature,
        )
        .await
        .context("LLM failed to answer the question")?;

    Ok(ChatAnswer {
        answer: answer.trim().to_string(),
        sources: hits.into_iter().map(|h| h.path).collect(),
    })
}

/// Stored chat history of a repository; empty before the first turn.
pub async fn history(services: &Services, repo_id: &str) -> Result<Vec<ChatMessage>> {
    services.repository(repo_id).await?;
    Ok(services
        .store
        .get_chat_session(repo_id)
        .await?
        .map(|s: ChatSession| s.messages)
        .unwrap_or_default())
}
