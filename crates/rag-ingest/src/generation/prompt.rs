//! Prompt templates for RAG generation

use crate::retrieval::ScoredChunk;

/// Separator between context blocks
const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Prompt builder for RAG queries
pub struct PromptBuilder;

impl PromptBuilder {
    /// Build context from search results
    pub fn build_context(results: &[ScoredChunk]) -> String {
        if results.is_empty() {
            return "No relevant documents were found.".to_string();
        }

        results
            .iter()
            .enumerate()
            .map(|(i, result)| {
                format!(
                    "[Source {}: {} - Relevance: {:.2}]\n{}",
                    i + 1,
                    Self::format_source_ref(result),
                    result.score,
                    result.text
                )
            })
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR)
    }

    /// Display name of a chunk's document, with its page when known
    pub fn format_source_ref(result: &ScoredChunk) -> String {
        let name = ["original_filename", "source"]
            .iter()
            .find_map(|key| result.metadata.get(*key).and_then(|v| v.as_str()))
            .filter(|name| !name.is_empty())
            .unwrap_or("unknown");

        match result.metadata.get("page_number").and_then(|v| v.as_u64()) {
            Some(page) => format!("{} (Page {})", name, page),
            None => name.to_string(),
        }
    }

    /// Distinct document names among the results, in rank order
    pub fn source_names(results: &[ScoredChunk]) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for result in results {
            let name = Self::format_source_ref(result);
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Build the full RAG prompt with conversation history
    pub fn build_rag_prompt(question: &str, context: &str, history: &str) -> String {
        format!(
            r#"You are a helpful assistant that answers questions using the context retrieved from uploaded documents.

INSTRUCTIONS:
1. Answer ONLY with information found in the context below
2. If the context does not hold enough information, reply: "I don't have enough information in the provided documents to answer that question."
3. Be specific and refer to the relevant sources when answering
4. If asked about something outside the context, explain that you can only answer from the uploaded documents
5. Keep answers clear, concise and well structured
6. When several passages are relevant, combine them into one coherent answer

Context from documents:
{context}

Chat History:
{history}

User Question: {question}

Answer:"#,
            context = context,
            history = history,
            question = question.trim(),
        )
    }
}
