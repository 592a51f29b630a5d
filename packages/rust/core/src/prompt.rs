//! Grounded-prompt composition.
//!
//! Retrieved chunk texts are concatenated newline-separated in rank order
//! into a context block, then placed with the literal question into a
//! fixed instructional template.

/// Build the completion prompt for `question` grounded in `contexts`,
/// which must be in retrieval rank order (nearest first).
pub fn compose_prompt(contexts: &[String], question: &str) -> String {
    let context = contexts.join("\n");
    format!(
        "Based on the following context, answer the question:\n\n\
         Context: {context}\n\nQuestion: {question}"
    )
}

/// Build the prompt asking for a question set covering one chunk.
pub fn compose_question_prompt(chunk_text: &str) -> String {
    format!(
        "List the questions a user could answer by reading the following \
         documentation excerpt. Output one question per line.\n\n{chunk_text}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contexts_appear_in_rank_order() {
        let contexts = vec!["first chunk".to_string(), "second chunk".to_string()];
        let prompt = compose_prompt(&contexts, "what is docqa?");

        assert!(prompt.contains("Context: first chunk\nsecond chunk"));
        assert!(prompt.ends_with("Question: what is docqa?"));
        let first = prompt.find("first chunk").unwrap();
        let second = prompt.find("second chunk").unwrap();
        assert!(first < second);
    }

    #[test]
    fn empty_context_still_carries_the_question() {
        let prompt = compose_prompt(&[], "anything?");
        assert!(prompt.contains("Question: anything?"));
    }

    #[test]
    fn question_prompt_embeds_chunk_text() {
        let prompt = compose_question_prompt("# Setup\nInstall the tool.");
        assert!(prompt.contains("Install the tool."));
    }
}
