use duelchat_core::ChatReply;

/// Turns raw backend output into a [`ChatReply`].
///
/// Two explicit paths: a strict JSON parse into `{speech, emotion}`
/// (tolerating a ```json code fence around the object), and a fallback that
/// treats the whole raw text as speech with the default emotion.
pub fn parse_reply(raw: &str) -> ChatReply {
    let candidate = strip_code_fence(raw);
    match serde_json::from_str::<ChatReply>(candidate) {
        Ok(reply) if !reply.speech.is_empty() => reply,
        _ => ChatReply::new(raw.trim(), ChatReply::DEFAULT_EMOTION),
    }
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening fence line.
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
