use crate::models::MemoryPayload;

pub const TITLE_MIN_CHARS: usize = 1;
pub const TITLE_MAX_CHARS: usize = 20;

pub const TITLE_MESSAGE: &str = "Title must over 1 less 20 characters";
pub const CONTENT_MESSAGE: &str = "Content is required";

/// Check a memory payload, returning one message per invalid field in declaration order
pub fn validate_memory(payload: &MemoryPayload) -> Vec<String> {
    let mut messages = Vec::new();

    let title_len = payload.title.chars().count();
    if !(TITLE_MIN_CHARS..=TITLE_MAX_CHARS).contains(&title_len) {
        messages.push(TITLE_MESSAGE.to_string());
    }

    if payload.content.is_empty() {
        messages.push(CONTENT_MESSAGE.to_string());
    }

    messages
}
