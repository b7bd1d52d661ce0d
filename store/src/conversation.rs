use newhealth_core::{Role, Turn};

use crate::kv::KeyValueStoreRef;

/// Logical key holding the persisted conversation history.
pub const HISTORY_KEY: &str = "nh_chat_history";

/// Greeting seeded into a brand-new conversation.
pub const WELCOME_GREETING: &str = "Welcome to New-Health Pharmacy. I am your Clinical AI Assistant. I can help with drug information, check our local stock, or analyze clinical images. How can I assist your health journey today?";

/// Greeting left behind after an explicit clear.
pub const CLEARED_GREETING: &str = "Chat history cleared. How can I assist you now?";

/// Ordered sequence of chat turns, persisted to the key-value store so a
/// restart restores exact state.
///
/// Turns are only ever appended; the whole sequence is replaced only by
/// `clear`. Every in-memory mutation is written through to the store before
/// the mutating call returns. Persistence failures degrade to in-memory
/// operation with a warning rather than failing the conversation.
#[derive(Debug)]
pub struct ConversationStore {
    store: KeyValueStoreRef,
    turns: Vec<Turn>,
    persist_writes: bool,
}

impl ConversationStore {
    /// Restore a conversation from the store, seeding the fixed greeting
    /// when no (or unreadable) history is present.
    pub async fn load(store: KeyValueStoreRef) -> Self {
        let turns = match store.get(HISTORY_KEY).await {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<Turn>>(&raw) {
                Ok(turns) if !turns.is_empty() => turns,
                Ok(_) => vec![Turn::model_text(WELCOME_GREETING)],
                Err(e) => {
                    tracing::warn!("failed to parse persisted history, starting fresh: {}", e);
                    vec![Turn::model_text(WELCOME_GREETING)]
                }
            },
            Ok(None) => vec![Turn::model_text(WELCOME_GREETING)],
            Err(e) => {
                tracing::warn!("failed to read persisted history, starting fresh: {}", e);
                vec![Turn::model_text(WELCOME_GREETING)]
            }
        };
        Self {
            store,
            turns,
            persist_writes: true,
        }
    }

    /// Disable (or re-enable) history writes. Existing history is still
    /// loaded, and `clear` still erases the persisted copy.
    pub fn with_persistence(mut self, enabled: bool) -> Self {
        self.persist_writes = enabled;
        self
    }

    /// Append one turn and write the updated sequence through.
    pub async fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
        self.persist().await;
    }

    /// Replace the conversation with the single cleared-greeting turn and
    /// erase the persisted copy.
    pub async fn clear(&mut self) {
        self.turns = vec![Turn::model_text(CLEARED_GREETING)];
        if let Err(e) = self.store.remove(HISTORY_KEY).await {
            tracing::warn!("failed to erase persisted history: {}", e);
        }
    }

    /// Snapshot of the turn sequence for rendering.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Last turn's role, used by transcript-style consumers.
    pub fn last_role(&self) -> Option<Role> {
        self.turns.last().map(|t| t.role)
    }

    async fn persist(&self) {
        if !self.persist_writes {
            return;
        }
        let serialized = match serde_json::to_string(&self.turns) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!("failed to serialize history: {}", e);
                return;
            }
        };
        if let Err(e) = self.store.put(HISTORY_KEY, serialized).await {
            tracing::warn!("failed to persist history: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryStore;
    use newhealth_core::Part;
    use std::sync::Arc;

    #[tokio::test]
    async fn fresh_conversation_starts_with_greeting() {
        let store = Arc::new(MemoryStore::new());
        let convo = ConversationStore::load(store).await;
        assert_eq!(convo.len(), 1);
        assert_eq!(convo.turns()[0].role, Role::Model);
        assert_eq!(convo.turns()[0].text(), WELCOME_GREETING);
    }

    #[tokio::test]
    async fn append_persists_and_reload_restores() {
        let store: KeyValueStoreRef = Arc::new(MemoryStore::new());
        {
            let mut convo = ConversationStore::load(Arc::clone(&store)).await;
            convo.append(Turn::user_text("hello")).await;
            convo.append(Turn::model_text("hi")).await;
        }
        let reloaded = ConversationStore::load(store).await;
        assert_eq!(reloaded.len(), 3);
        assert_eq!(reloaded.turns()[1].text(), "hello");
        assert_eq!(reloaded.turns()[2].text(), "hi");
    }

    #[tokio::test]
    async fn clear_leaves_single_model_greeting_and_erases_store() {
        let store: KeyValueStoreRef = Arc::new(MemoryStore::new());
        let mut convo = ConversationStore::load(Arc::clone(&store)).await;
        convo.append(Turn::user_text("hello")).await;
        convo.append(Turn::model_text("hi")).await;
        convo.clear().await;

        assert_eq!(convo.len(), 1);
        assert_eq!(convo.turns()[0].role, Role::Model);
        assert_eq!(convo.turns()[0].text(), CLEARED_GREETING);

        let persisted = store.get(HISTORY_KEY).await.unwrap();
        assert!(persisted.is_none(), "persisted history should be erased");
    }

    #[tokio::test]
    async fn corrupt_history_falls_back_to_greeting() {
        let store: KeyValueStoreRef = Arc::new(MemoryStore::new());
        store
            .put(HISTORY_KEY, "not json".to_string())
            .await
            .unwrap();
        let convo = ConversationStore::load(store).await;
        assert_eq!(convo.len(), 1);
        assert_eq!(convo.turns()[0].text(), WELCOME_GREETING);
    }

    #[tokio::test]
    async fn disabled_persistence_keeps_the_store_untouched() {
        let store: KeyValueStoreRef = Arc::new(MemoryStore::new());
        let mut convo = ConversationStore::load(Arc::clone(&store))
            .await
            .with_persistence(false);
        convo.append(Turn::user_text("hello")).await;
        convo.append(Turn::model_text("hi")).await;

        assert_eq!(convo.len(), 3);
        assert!(store.get(HISTORY_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn multi_part_turns_survive_round_trip() {
        let store: KeyValueStoreRef = Arc::new(MemoryStore::new());
        {
            let mut convo = ConversationStore::load(Arc::clone(&store)).await;
            let turn = Turn::new(
                Role::User,
                vec![
                    Part::inline_data("image/jpeg", "Zm9v"),
                    Part::text("what is this?"),
                ],
            )
            .unwrap();
            convo.append(turn).await;
        }
        let reloaded = ConversationStore::load(store).await;
        assert_eq!(reloaded.turns()[1].parts.len(), 2);
    }
}
