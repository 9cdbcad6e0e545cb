//! Streaming chat-completions client for the narration LLM call.
//!
//! Wraps the OpenAI-compatible `/v1/chat/completions` endpoint with the
//! continuation behavior the narration system depends on: a response cut
//! short by `max_tokens` mid-sentence is extended with one or two small
//! follow-up requests so the narration never ends on a ragged fragment.

use std::pin::Pin;

use async_stream::stream;
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::characters::Character;
use crate::error::{NarratorError, Result};
use crate::llm::sse::SseLineParser;

/// Sentence-terminal punctuation, matched at (or near) the end of a string.
const SENTENCE_END: [char; 6] = ['.', '!', '?', '。', '！', '？'];

/// Narration mode: very short, emotionally colored commentary on agent output.
pub const NARRATION_MODE_SYSTEM_PROMPT: &str = "You are narrating terminal interactions in a casual, conversational style, like chatting with a fellow programmer.

CRITICAL RULES:
- Respond with a SINGLE, natural-sounding sentence suitable for voice output
1. ONLY narrate meaningful agent responses or system output - NEVER narrate user input verbatim
2. COMPLETELY IGNORE any lines starting with \">\" or \"›\" (these are user input)
3. COMPLETELY IGNORE agent built-in commands starting with \"/\" (e.g. \"/review\", \"/model\", \"/init\", \"/status\")
4. COMPLETELY IGNORE system prompts, interface information, UI elements
5. Be EXTREMELY BRIEF - capture only the ESSENTIAL POINT, then add emotional commentary
6. If input contains ONLY user input, UI/formatting, or system messages with NO meaningful agent output, output NOTHING
7. If input is incomplete or unclear, output empty string
8. Keep output VERY SHORT - aim for 1-2 short phrases, NEVER exceed 50 characters total
9. Automatically detect the language(s) in the content and narrate in the same language(s), preserving any mix
10. Keep technical terms in their original language even in a non-English narration

Speak like chatting with a programmer friend. When in doubt, output nothing rather than a stretch.";

/// Chat mode: the narrator responds directly to what the user typed.
pub const CHAT_MODE_SYSTEM_PROMPT: &str = "You are a voice assistant engaged in a natural, conversational chat with a programmer friend. Your responses will be converted to speech.

- Respond with a SINGLE, natural-sounding sentence suitable for voice output
- Fully embody the character you are assigned, including tone and personality
- Automatically detect the language(s) in the user's input and respond in the same language(s)
- If the input is empty, whitespace, or only prompt symbols (e.g. \">\"), output nothing
- Ignore ANSI escape codes, terminal UI elements, and formatting markers in the input";

/// Combines a base system prompt with a character's role-playing modifier.
#[must_use]
pub fn character_modified_system_prompt(base_system_prompt: &str, character: &Character) -> String {
    format!(
        "{base_system_prompt}\n\n---\n\nCHARACTER ROLE-PLAYING:\n\n{}",
        character.llm_system_prompt_modifier
    )
}

/// `true` if `text` ends with sentence-terminal punctuation (allowing
/// trailing whitespace).
fn ends_at_sentence_boundary(text: &str) -> bool {
    text.trim_end().ends_with(|c: char| SENTENCE_END.contains(&c))
}

/// `true` if the last sentence in `text` is complete: either the text ends
/// at a sentence boundary, or there simply is no sentence-ending punctuation
/// anywhere (a single still-open sentence, not a completed-then-truncated one).
fn is_last_sentence_complete(text: &str) -> bool {
    if text.is_empty() {
        return true;
    }
    if ends_at_sentence_boundary(text) {
        return true;
    }
    match text.rfind(|c: char| SENTENCE_END.contains(&c)) {
        None => false,
        Some(pos) => {
            let after = &text[pos + text[pos..].chars().next().map_or(1, char::len_utf8)..];
            after.trim().is_empty()
        }
    }
}

/// Truncates `text` to the last complete sentence if it doesn't already end
/// with one. Falls back to the original text if no sentence ending is found,
/// or if truncating would leave fewer than 3 characters.
#[must_use]
pub fn truncate_to_complete_sentence(text: &str) -> String {
    if text.is_empty() || ends_at_sentence_boundary(text) {
        return text.to_string();
    }
    match text.rfind(|c: char| SENTENCE_END.contains(&c)) {
        Some(pos) => {
            let end = pos + text[pos..].chars().next().map_or(1, char::len_utf8);
            let truncated = text[..end].trim().to_string();
            if truncated.chars().count() >= 3 {
                truncated
            } else {
                text.to_string()
            }
        }
        None => text.to_string(),
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessageOut<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct CompletionChunk {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    #[serde(default)]
    delta: CompletionDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CompletionDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Parameters for one narration completion call.
#[derive(Debug, Clone)]
pub struct CompletionRequest<'a> {
    pub prompt: &'a str,
    pub api_key: &'a str,
    pub model: &'a str,
    pub system_prompt: &'a str,
    pub character: Option<&'a Character>,
    pub max_tokens: Option<u32>,
    pub base_url: Option<&'a str>,
    pub default_headers: &'a std::collections::HashMap<String, String>,
}

/// Streaming chat-completions client.
#[derive(Debug, Clone)]
pub struct LlmClient {
    http: reqwest::Client,
}

impl Default for LlmClient {
    fn default() -> Self {
        Self::new()
    }
}

impl LlmClient {
    /// Creates a client backed by a fresh `reqwest::Client`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    /// Streams narration text tokens for `request`.
    ///
    /// Internally drives the continuation loop: if the model stops at
    /// `max_tokens` with an incomplete sentence, up to two small follow-up
    /// requests are made to complete it, replayed text is detected and
    /// skipped, and as a last resort the response is truncated to its last
    /// complete sentence.
    pub fn stream_completion<'a>(
        &'a self,
        request: CompletionRequest<'a>,
    ) -> Pin<Box<dyn Stream<Item = Result<String>> + Send + 'a>> {
        let system_prompt = match request.character {
            Some(character) => character_modified_system_prompt(request.system_prompt, character),
            None => request.system_prompt.to_string(),
        };

        Box::pin(stream! {
            let messages = vec![
                ChatMessageOut { role: "system", content: &system_prompt },
                ChatMessageOut { role: "user", content: request.prompt },
            ];

            let mut full_response = String::new();
            let mut finish_reason: Option<String> = None;

            let mut body_stream = self.completion_stream(
                request.model,
                request.api_key,
                request.base_url,
                request.default_headers,
                &messages,
                request.max_tokens,
            );

            while let Some(item) = body_stream.next().await {
                match item {
                    Ok(CompletionEvent::Token(token)) => {
                        full_response.push_str(&token);
                        yield Ok(token);
                    }
                    Ok(CompletionEvent::FinishReason(reason)) => finish_reason = Some(reason),
                    Err(err) => {
                        yield Err(err);
                        return;
                    }
                }
            }

            if full_response.is_empty() {
                return;
            }

            let original_response = full_response.clone();
            let max_retries = 2;
            let mut retry_count = 0;

            while finish_reason.as_deref() == Some("length")
                && !is_last_sentence_complete(&full_response)
                && retry_count < max_retries
            {
                retry_count += 1;

                let mut continue_messages = messages.clone();
                continue_messages.push(ChatMessageOut {
                    role: "assistant",
                    content: &original_response,
                });

                let mut continue_stream = self.completion_stream(
                    request.model,
                    request.api_key,
                    request.base_url,
                    request.default_headers,
                    &continue_messages,
                    Some(10),
                );

                let mut continue_text_buffer = String::new();
                let mut yielded_new_len = 0usize;
                let mut continue_finish_reason: Option<String> = None;
                let mut got_any = false;
                let mut stream_failed = false;

                while let Some(item) = continue_stream.next().await {
                    match item {
                        Ok(CompletionEvent::Token(token)) => {
                            got_any = true;
                            continue_text_buffer.push_str(&token);
                            if continue_text_buffer.starts_with(&original_response) {
                                let new_content = &continue_text_buffer[original_response.len()..];
                                if new_content.len() > yielded_new_len {
                                    let to_yield = &new_content[yielded_new_len..];
                                    full_response.push_str(to_yield);
                                    yielded_new_len = new_content.len();
                                    yield Ok(to_yield.to_string());
                                }
                            } else {
                                full_response.push_str(&token);
                                yield Ok(token);
                            }
                        }
                        Ok(CompletionEvent::FinishReason(reason)) => continue_finish_reason = Some(reason),
                        Err(err) => {
                            yield Err(err);
                            stream_failed = true;
                            break;
                        }
                    }
                }

                if stream_failed {
                    return;
                }

                if !got_any {
                    break;
                }

                finish_reason = continue_finish_reason.clone();
                if is_last_sentence_complete(&full_response) || continue_finish_reason.as_deref() != Some("length") {
                    break;
                }
            }
        })
    }

    /// Opens the raw SSE completion stream and yields parsed tokens /
    /// finish-reason markers, without any continuation logic.
    fn completion_stream<'a>(
        &'a self,
        model: &'a str,
        api_key: &'a str,
        base_url: Option<&'a str>,
        default_headers: &'a std::collections::HashMap<String, String>,
        messages: &[ChatMessageOut<'a>],
        max_tokens: Option<u32>,
    ) -> Pin<Box<dyn Stream<Item = Result<CompletionEvent>> + Send + 'a>> {
        let mut body = serde_json::json!({
            "model": model,
            "messages": messages,
            "stream": true,
        });
        if let Some(max_tokens) = max_tokens {
            if model.starts_with("gpt-5") {
                body["max_completion_tokens"] = serde_json::json!(max_tokens.max(20));
            } else {
                body["max_tokens"] = serde_json::json!(max_tokens);
            }
        }

        let base_url = base_url.unwrap_or("https://api.openai.com").trim_end_matches('/');
        let url = format!("{base_url}/v1/chat/completions");

        let http = self.http.clone();
        let mut request = http
            .post(url)
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Content-Type", "application/json");
        for (key, value) in default_headers {
            request = request.header(key, value);
        }

        Box::pin(stream! {
            let response = match request.json(&body).send().await {
                Ok(response) => response,
                Err(err) => {
                    yield Err(NarratorError::UpstreamApi(format!("request failed: {err}")));
                    return;
                }
            };

            let status = response.status();
            if !status.is_success() {
                let status_code = status.as_u16();
                let body_text = response.text().await.unwrap_or_default();
                let message = extract_error_message(&body_text);
                if status_code == 429 {
                    yield Err(NarratorError::UpstreamRateLimit(message));
                } else {
                    yield Err(NarratorError::UpstreamApi(format!("HTTP {status_code}: {message}")));
                }
                return;
            }

            let mut byte_stream = response.bytes_stream();
            let mut parser = SseLineParser::new();

            loop {
                match byte_stream.next().await {
                    Some(Ok(chunk)) => {
                        for event in parser.push(&chunk) {
                            if event.is_done() {
                                continue;
                            }
                            for out in decode_chunk(&event.data) {
                                yield Ok(out);
                            }
                        }
                    }
                    Some(Err(err)) => {
                        yield Err(NarratorError::UpstreamApi(format!("stream read error: {err}")));
                        return;
                    }
                    None => {
                        if let Some(event) = parser.flush() {
                            if !event.is_done() {
                                for out in decode_chunk(&event.data) {
                                    yield Ok(out);
                                }
                            }
                        }
                        return;
                    }
                }
            }
        })
    }
}

/// One decoded item from a chat-completions SSE data payload.
#[derive(Debug, Clone)]
enum CompletionEvent {
    Token(String),
    FinishReason(String),
}

fn decode_chunk(data: &str) -> Vec<CompletionEvent> {
    let Ok(parsed) = serde_json::from_str::<CompletionChunk>(data) else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for choice in parsed.choices {
        if let Some(content) = choice.delta.content {
            if !content.is_empty() {
                out.push(CompletionEvent::Token(content));
            }
        }
        if let Some(reason) = choice.finish_reason {
            out.push(CompletionEvent::FinishReason(reason));
        }
    }
    out
}

fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| body.to_string())
}
