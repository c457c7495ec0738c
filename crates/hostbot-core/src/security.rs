use crate::domain::ChatId;

// ============== Authorization ==============

/// Static set of chats allowed to talk to the bot. Loaded once, never mutated.
#[derive(Clone, Debug, Default)]
pub struct AllowList {
    chats: Vec<ChatId>,
}

impl AllowList {
    pub fn new(chats: impl IntoIterator<Item = i64>) -> Self {
        Self {
            chats: chats.into_iter().map(ChatId).collect(),
        }
    }

    pub fn is_authorized(&self, chat: ChatId) -> bool {
        self.chats.contains(&chat)
    }

    /// First configured chat; used as the fallback alert destination.
    pub fn first(&self) -> Option<ChatId> {
        self.chats.first().copied()
    }

    pub fn len(&self) -> usize {
        self.chats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chats.is_empty()
    }
}
