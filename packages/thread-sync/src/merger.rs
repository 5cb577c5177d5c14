//! Thread state merging.
//!
//! One ordered list per open thread, fed by three paths: a wholesale seed
//! from the snapshot, live appends from the router, and local appends from
//! the send pipeline. Entries keep arrival order; nothing is re-sorted.

use std::collections::HashSet;

use crate::message::{Message, MessageId, ThreadId};

/// Authoritative message list of the open thread.
#[derive(Debug, Clone)]
pub struct ThreadState {
    thread_id: ThreadId,
    messages: Vec<Message>,
    /// Ids already in `messages`.
    ids: HashSet<MessageId>,
}

impl ThreadState {
    pub fn new(thread_id: ThreadId) -> Self {
        Self {
            thread_id,
            messages: Vec::new(),
            ids: HashSet::new(),
        }
    }

    pub fn thread_id(&self) -> &ThreadId {
        &self.thread_id
    }

    /// Replace the whole list with a snapshot.
    ///
    /// Seeding twice with the same history leaves one copy of it.
    pub fn seed(&mut self, messages: Vec<Message>) {
        self.messages.clear();
        self.ids.clear();
        for message in messages {
            self.push(message);
        }
        tracing::debug!(
            "Seeded thread {} with {} messages",
            self.thread_id,
            self.messages.len()
        );
    }

    /// Append a message delivered by the live transport.
    ///
    /// Returns `false` when the message belongs to another thread or its id
    /// is already present.
    pub fn append_live(&mut self, message: Message) -> bool {
        self.append(message, "live")
    }

    /// Append a locally synthesized message after a successful send.
    pub fn append_local(&mut self, message: Message) -> bool {
        self.append(message, "local")
    }

    fn append(&mut self, message: Message, source: &str) -> bool {
        if message.thread_id != self.thread_id {
            tracing::warn!(
                "Refusing {} message {} for thread {} (open: {})",
                source,
                message.id,
                message.thread_id,
                self.thread_id
            );
            return false;
        }
        if self.ids.contains(&message.id) {
            tracing::debug!("Skipping duplicate {} message {}", source, message.id);
            return false;
        }
        self.push(message)
    }

    fn push(&mut self, message: Message) -> bool {
        if !self.ids.insert(message.id.clone()) {
            return false;
        }
        self.messages.push(message);
        true
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.ids.contains(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::SenderRole;
    use chrono::{TimeZone, Utc};

    fn msg(id: MessageId, thread: &str, role: SenderRole, minute: u32) -> Message {
        Message {
            id,
            thread_id: ThreadId::from(thread),
            sender_role: role,
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 9, minute, 0).unwrap(),
            content: Some(format!("m{}", minute)),
            media: None,
        }
    }

    fn history() -> Vec<Message> {
        vec![
            msg(MessageId::Server("1".into()), "t1", SenderRole::Own, 0),
            msg(MessageId::Server("2".into()), "t1", SenderRole::Counterpart, 1),
        ]
    }

    #[test]
    fn test_seed_equals_history() {
        let mut state = ThreadState::new(ThreadId::from("t1"));
        state.seed(history());
        assert_eq!(state.messages(), history().as_slice());
    }

    #[test]
    fn test_reseed_replaces() {
        let mut state = ThreadState::new(ThreadId::from("t1"));
        state.seed(history());
        state.append_live(msg(MessageId::Server("3".into()), "t1", SenderRole::Counterpart, 2));
        state.seed(history());

        assert_eq!(state.len(), 2);
        assert!(!state.contains(&MessageId::Server("3".into())));
    }

    #[test]
    fn test_appends_keep_arrival_order() {
        let mut state = ThreadState::new(ThreadId::from("t1"));
        state.seed(history());

        assert!(state.append_live(msg(MessageId::Server("3".into()), "t1", SenderRole::Counterpart, 2)));
        assert_eq!(state.len(), 3);
        assert_eq!(state.last().unwrap().sender_role, SenderRole::Counterpart);

        assert!(state.append_local(msg(MessageId::Local(1_714_554_180_000), "t1", SenderRole::Own, 3)));
        assert_eq!(state.len(), 4);
        assert_eq!(state.last().unwrap().sender_role, SenderRole::Own);

        let contents: Vec<_> = state.messages().iter().filter_map(|m| m.content.clone()).collect();
        assert_eq!(contents, vec!["m0", "m1", "m2", "m3"]);
    }

    #[test]
    fn test_duplicate_server_id_is_not_appended() {
        let mut state = ThreadState::new(ThreadId::from("t1"));
        state.seed(history());

        assert!(!state.append_live(msg(MessageId::Server("2".into()), "t1", SenderRole::Counterpart, 5)));
        assert_eq!(state.len(), 2);
    }

    #[test]
    fn test_local_and_server_ids_do_not_collide() {
        let mut state = ThreadState::new(ThreadId::from("t1"));
        assert!(state.append_live(msg(MessageId::Server("7".into()), "t1", SenderRole::Counterpart, 0)));
        assert!(state.append_local(msg(MessageId::Local(7), "t1", SenderRole::Own, 1)));
        assert_eq!(state.len(), 2);
    }

    #[test]
    fn test_other_thread_is_refused() {
        let mut state = ThreadState::new(ThreadId::from("t1"));
        state.seed(history());

        assert!(!state.append_live(msg(MessageId::Server("9".into()), "t2", SenderRole::Counterpart, 4)));
        assert_eq!(state.len(), 2);
    }

    #[test]
    fn test_seed_collapses_duplicate_history_ids() {
        let mut state = ThreadState::new(ThreadId::from("t1"));
        let mut duplicated = history();
        duplicated.push(history()[0].clone());

        state.seed(duplicated);
        assert_eq!(state.len(), 2);
    }
}
