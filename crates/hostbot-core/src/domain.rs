use std::fmt;

/// Telegram chat id (numeric). Used for authorization and as alert destination.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// Telegram message id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

/// A stable reference to a Telegram message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

/// Number of leading characters of a container id used for display and callbacks.
pub const CONTAINER_ID_LEN: usize = 12;

/// Container id, always stored in its short (12 character) form.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ContainerId(String);

impl ContainerId {
    /// Normalizes `raw` to its first 12 characters. Shorter ids are kept as-is.
    pub fn new(raw: &str) -> Self {
        Self(raw.chars().take(CONTAINER_ID_LEN).collect())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Something the dispatcher can act on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResourceRef {
    Container(ContainerId),
    Service(String),
}
