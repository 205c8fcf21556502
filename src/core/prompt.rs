use crate::core::{RetrievedChunk, RetrievedContext};

pub fn build_prompt(query: &str, context: &str) -> String {
    format!(
        "You are an expert. Answer the question using the provided context:\n\n\
         Context: {}\n\n\
         Question: {}\n\n\
         Answer:",
        context, query
    )
}

/// Joins retrieved chunks in rank order with a single space.
pub fn join_context(chunks: Vec<RetrievedChunk>) -> RetrievedContext {
    let text = chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    RetrievedContext { chunks, text }
}
