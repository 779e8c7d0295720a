//! Session-scoped state shared across exchanges with one backend.

use serde::{Deserialize, Serialize};

use crate::plugin::PluginDescriptor;

/// Cookie carrying the Framework session id.
pub const SESSION_COOKIE: &str = "ECSESSION";

/// Number of most recent turns sent with each request.
pub const HISTORY_WINDOW: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One conversation turn in the shape chat APIs expect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Bounded conversation history.
///
/// Holds at most [`HISTORY_WINDOW`] turns, and drops the oldest turn while
/// the total character count exceeds half the token budget. The newest turn
/// is always kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationHistory {
    entries: Vec<ChatMessage>,
    max_tokens: u32,
    pending: bool,
}

impl ConversationHistory {
    pub fn new(max_tokens: u32) -> Self {
        Self {
            entries: Vec::new(),
            max_tokens,
            pending: false,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a user turn is waiting for its answer.
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Total length of all turns, in characters.
    pub fn total_chars(&self) -> usize {
        self.entries.iter().map(|m| m.content.chars().count()).sum()
    }

    /// Appends the user turn of a new exchange and trims to budget.
    ///
    /// A still-pending turn from an exchange that never finished is replaced.
    pub fn begin_exchange(&mut self, question: impl Into<String>) {
        if self.pending {
            self.abort_exchange();
        }
        self.entries.push(ChatMessage::user(question));
        self.pending = true;
        self.trim();
    }

    /// Records the assistant answer for the pending exchange.
    pub fn complete_exchange(&mut self, answer: impl Into<String>) {
        if !self.pending {
            return;
        }
        self.pending = false;
        self.entries.push(ChatMessage::assistant(answer));
    }

    /// Drops the pending user turn of a failed or cancelled exchange.
    pub fn abort_exchange(&mut self) {
        if !self.pending {
            return;
        }
        self.pending = false;
        if self
            .entries
            .last()
            .is_some_and(|last| last.role == Role::User)
        {
            self.entries.pop();
        }
    }

    fn trim(&mut self) {
        if self.entries.len() > HISTORY_WINDOW {
            let excess = self.entries.len() - HISTORY_WINDOW;
            self.entries.drain(..excess);
        }

        let budget = (self.max_tokens / 2) as usize;
        while self.entries.len() > 1 && self.total_chars() > budget {
            self.entries.remove(0);
        }
    }
}

/// Transport-level identifiers kept across the exchanges of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    /// Session token, refreshed from response cookies.
    pub session_id: Option<String>,
    pub conversation_id: Option<String>,
    /// Plugins offered by the backend.
    pub plugins: Vec<PluginDescriptor>,
    pub history: ConversationHistory,
}

impl SessionContext {
    pub fn new(max_tokens: u32) -> Self {
        Self {
            session_id: None,
            conversation_id: None,
            plugins: Vec::new(),
            history: ConversationHistory::new(max_tokens),
        }
    }

    /// Applies a session id found in response headers, if any.
    pub fn refresh_session<'a>(&mut self, set_cookie: impl IntoIterator<Item = &'a str>) {
        if let Some(id) = session_id_from_headers(set_cookie) {
            tracing::debug!("session cookie refreshed");
            self.session_id = Some(id);
        }
    }
}

/// Extracts the session id from `Set-Cookie` header values.
///
/// The last `ECSESSION` cookie with a non-empty value wins.
pub fn session_id_from_headers<'a>(set_cookie: impl IntoIterator<Item = &'a str>) -> Option<String> {
    set_cookie
        .into_iter()
        .filter_map(|header| {
            let pair = header.split(';').next()?;
            let (name, value) = pair.split_once('=')?;
            (name.trim() == SESSION_COOKIE && !value.trim().is_empty())
                .then(|| value.trim().to_string())
        })
        .last()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_keeps_last_five() {
        let mut history = ConversationHistory::new(10_000);
        for i in 0..4 {
            history.begin_exchange(format!("q{i}"));
            history.complete_exchange(format!("a{i}"));
        }
        history.begin_exchange("q4");
        assert_eq!(history.len(), HISTORY_WINDOW);
        assert_eq!(history.messages().last().unwrap().content, "q4");
        assert_eq!(history.messages()[0].content, "q2");
    }

    #[test]
    fn test_budget_trims_oldest_first() {
        let mut history = ConversationHistory::new(20);
        history.begin_exchange("0123456789");
        history.complete_exchange("abcdef");
        history.begin_exchange("xyz");
        // budget is 10 characters: "abcdef" + "xyz" fits once the first turn is gone
        assert_eq!(history.len(), 2);
        assert_eq!(history.messages()[0].content, "abcdef");
    }

    #[test]
    fn test_newest_turn_survives_tiny_budget() {
        let mut history = ConversationHistory::new(2);
        history.begin_exchange("a question longer than the budget");
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_abort_removes_pending_user_turn() {
        let mut history = ConversationHistory::new(1000);
        history.begin_exchange("first");
        history.complete_exchange("answer");
        history.begin_exchange("second");
        history.abort_exchange();
        assert_eq!(history.len(), 2);
        assert!(!history.is_pending());
        // no assistant turn after an abort
        history.complete_exchange("late");
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_session_id_from_headers() {
        let headers = [
            "other=1; Path=/",
            "ECSESSION=abc123; Path=/; HttpOnly",
        ];
        assert_eq!(session_id_from_headers(headers).as_deref(), Some("abc123"));
        assert_eq!(session_id_from_headers(["ECSESSION=; Path=/"]), None);
        assert_eq!(session_id_from_headers(std::iter::empty()), None);
    }

    #[test]
    fn test_refresh_session_keeps_old_id_without_cookie() {
        let mut ctx = SessionContext::new(2048);
        ctx.session_id = Some("old".into());
        ctx.refresh_session(["theme=dark"]);
        assert_eq!(ctx.session_id.as_deref(), Some("old"));
        ctx.refresh_session(["ECSESSION=new"]);
        assert_eq!(ctx.session_id.as_deref(), Some("new"));
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&ChatMessage::assistant("hi")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
    }
}
