//! Grounded prompt construction.

use aurelia_llm::Message;

/// Reply the model is told to give when the retrieved code does not contain the answer.
pub const NOT_FOUND_ANSWER: &str = "I cannot find that information.";

pub const SYSTEM_PROMPT: &str = "You are a helpful Software Engineering Assistant. \
You answer questions about a codebase using only the source files you are given.";

/// Build the message list for one grounded question.
#[must_use]
pub fn grounded_messages(context: &str, question: &str) -> Vec<Message> {
    vec![
        Message::system(SYSTEM_PROMPT),
        Message::user(grounded_prompt(context, question)),
    ]
}

#[must_use]
pub fn grounded_prompt(context: &str, question: &str) -> String {
    let context = if context.is_empty() {
        "(no source files matched)"
    } else {
        context
    };
    format!(
        "Analyze the following source code and answer the question.\n\n\
         CONTEXT (Source Code):\n{context}\n\n\
         QUESTION: {question}\n\n\
         Answer based ONLY on the code provided. \
         If the answer is not in the code, reply exactly: \"{NOT_FOUND_ANSWER}\""
    )
}
