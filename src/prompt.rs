//! The fixed RAG prompt.

pub const PROMPT_TEMPLATE: &str = "
Human: You are a helpful assistant. Use the context below to answer the question.
If you don't know the answer, say you don't know. Don't make up an answer.

<context>
{context}
</context>

<question>
{question}
</question>

Assistant:";

/// Substitute `context` and `question` into [`PROMPT_TEMPLATE`].
///
/// Placeholders are only expanded in the template itself, never inside the
/// substituted text.
pub fn assemble_prompt(context: &str, question: &str) -> String {
    let (head, tail) = PROMPT_TEMPLATE
        .split_once("{question}")
        .unwrap_or((PROMPT_TEMPLATE, ""));
    let mut prompt = head.replace("{context}", context);
    prompt.push_str(question);
    prompt.push_str(tail);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_both_slots() {
        let prompt = assemble_prompt("the minoans lived on crete", "Where did the Minoans live?");
        assert!(prompt.contains("<context>\nthe minoans lived on crete\n</context>"));
        assert!(prompt.contains("<question>\nWhere did the Minoans live?\n</question>"));
        assert!(prompt.contains("say you don't know"));
        assert!(prompt.trim_end().ends_with("Assistant:"));
        assert!(!prompt.contains("{context}"));
        assert!(!prompt.contains("{question}"));
    }

    #[test]
    fn placeholders_inside_inputs_are_not_expanded() {
        let prompt = assemble_prompt("ctx mentions {question}", "what is {context}?");
        assert!(prompt.contains("ctx mentions {question}"));
        assert!(prompt.contains("what is {context}?"));
    }

    #[test]
    fn deterministic() {
        assert_eq!(assemble_prompt("a", "b"), assemble_prompt("a", "b"));
    }
}
