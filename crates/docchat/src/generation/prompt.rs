//! Prompt templates for grounded answers

use crate::retrieval::SearchResult;
use crate::types::PromptMessage;

/// Fixed system instruction: answer from context only
pub const SYSTEM_PROMPT: &str = "Use the following context to answer a users question. \
If you cannot find the answer in the context, say you don't know the answer.";

/// Prompt builder for retrieval-augmented questions
pub struct PromptBuilder;

impl PromptBuilder {
    /// Concatenate passages in ranked order, each followed by a newline
    pub fn build_context(results: &[SearchResult]) -> String {
        let mut context = String::new();
        for result in results {
            context.push_str(&result.text);
            context.push('\n');
        }
        context
    }

    /// User message carrying the context block and the verbatim question
    pub fn build_user_prompt(question: &str, context: &str) -> String {
        format!(
            "Context:\n{context}\n\nQuestion:\n{question}\n",
            context = context,
            question = question
        )
    }

    /// System + user messages for one question
    pub fn build_messages(question: &str, context: &str) -> Vec<PromptMessage> {
        vec![
            PromptMessage::system(SYSTEM_PROMPT),
            PromptMessage::user(Self::build_user_prompt(question, context)),
        ]
    }
}
