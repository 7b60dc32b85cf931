use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use parley_types::api::SidebarRow;
use parley_types::events::GatewayEvent;
use parley_types::models::Message;

/// Loading status of an independently-fetched piece of session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading,
    Ready,
}

/// Work the caller must do after feeding state in — the session itself never
/// performs I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEffect {
    /// Conversation summaries changed server-side; re-fetch the sidebar.
    RefetchUsers,
}

/// Client-side cache of users, visible messages, unread counts and presence,
/// reconciled from both request/response calls and pushed gateway events.
///
/// The users list and the selected conversation load independently, each
/// walking Idle -> Loading -> Ready. A pushed message needs no store
/// round-trip: it either lands in the visible pane (sender is the selected
/// counterpart) or bumps that sender's local unread counter.
pub struct ChatSession {
    self_id: Uuid,
    users: Vec<SidebarRow>,
    users_state: LoadState,
    selected: Option<Uuid>,
    messages: Vec<Message>,
    messages_state: LoadState,
    unread_counts: HashMap<Uuid, i64>,
    online: HashSet<Uuid>,
}

impl ChatSession {
    pub fn new(self_id: Uuid) -> Self {
        Self {
            self_id,
            users: Vec::new(),
            users_state: LoadState::Idle,
            selected: None,
            messages: Vec::new(),
            messages_state: LoadState::Idle,
            unread_counts: HashMap::new(),
            online: HashSet::new(),
        }
    }

    // -- Sidebar --

    pub fn begin_users_fetch(&mut self) {
        self.users_state = LoadState::Loading;
    }

    /// Install a fresh sidebar response. Unread counters are re-seeded from
    /// the rows, which makes a sidebar fetch the reconciliation point for any
    /// pushes missed while disconnected.
    pub fn users_loaded(&mut self, rows: Vec<SidebarRow>) {
        self.unread_counts = rows
            .iter()
            .map(|row| (row.user.id, row.unread_count))
            .collect();
        self.users = rows;
        self.users_state = LoadState::Ready;
    }

    // -- Conversation pane --

    /// Select a conversation counterpart. The caller fetches history and
    /// issues the mark-as-read call, then feeds the results back through
    /// [`messages_loaded`](Self::messages_loaded) and
    /// [`mark_read_acked`](Self::mark_read_acked).
    pub fn select_user(&mut self, user: Uuid) {
        self.selected = Some(user);
        self.messages.clear();
        self.messages_state = LoadState::Loading;
    }

    pub fn messages_loaded(&mut self, messages: Vec<Message>) {
        self.messages = messages;
        self.messages_state = LoadState::Ready;
    }

    /// The server acknowledged mark-as-read for this counterpart.
    pub fn mark_read_acked(&mut self, user: Uuid) {
        self.unread_counts.insert(user, 0);
    }

    // -- Pushed events --

    pub fn apply_event(&mut self, event: GatewayEvent) -> Option<SessionEffect> {
        match event {
            GatewayEvent::NewMessage { message } => {
                self.apply_new_message(message);
                None
            }
            GatewayEvent::RefreshUsers => Some(SessionEffect::RefetchUsers),
            GatewayEvent::PresenceChanged { online } => {
                self.online = online.into_iter().collect();
                None
            }
            GatewayEvent::Ready { .. } => None,
        }
    }

    fn apply_new_message(&mut self, message: Message) {
        if message.receiver_id != self.self_id {
            return;
        }

        if self.selected == Some(message.sender_id) {
            self.messages.push(message);
        } else {
            *self.unread_counts.entry(message.sender_id).or_insert(0) += 1;
        }
    }

    // -- Accessors --

    pub fn users(&self) -> &[SidebarRow] {
        &self.users
    }

    pub fn users_state(&self) -> LoadState {
        self.users_state
    }

    pub fn selected(&self) -> Option<Uuid> {
        self.selected
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn messages_state(&self) -> LoadState {
        self.messages_state
    }

    pub fn unread_count(&self, user: Uuid) -> i64 {
        self.unread_counts.get(&user).copied().unwrap_or(0)
    }

    pub fn is_online(&self, user: Uuid) -> bool {
        self.online.contains(&user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use parley_types::models::{MessageBody, User};

    fn message(sender: Uuid, receiver: Uuid, text: &str) -> Message {
        Message {
            id: Uuid::new_v4(),
            sender_id: sender,
            receiver_id: receiver,
            body: MessageBody::Text { text: text.into() },
            created_at: DateTime::UNIX_EPOCH,
            is_read: false,
        }
    }

    fn sidebar_row(user: Uuid, username: &str, unread: i64) -> SidebarRow {
        SidebarRow {
            user: User {
                id: user,
                username: username.into(),
                created_at: DateTime::<Utc>::UNIX_EPOCH,
            },
            last_message_at: DateTime::UNIX_EPOCH,
            unread_count: unread,
        }
    }

    #[test]
    fn users_fetch_walks_load_states_and_seeds_counts() {
        let me = Uuid::new_v4();
        let alice = Uuid::new_v4();
        let mut session = ChatSession::new(me);

        assert_eq!(session.users_state(), LoadState::Idle);
        session.begin_users_fetch();
        assert_eq!(session.users_state(), LoadState::Loading);

        session.users_loaded(vec![sidebar_row(alice, "alice", 3)]);
        assert_eq!(session.users_state(), LoadState::Ready);
        assert_eq!(session.unread_count(alice), 3);
    }

    #[test]
    fn push_from_selected_counterpart_appends_to_pane() {
        let me = Uuid::new_v4();
        let alice = Uuid::new_v4();
        let mut session = ChatSession::new(me);

        session.select_user(alice);
        session.messages_loaded(vec![]);

        let effect = session.apply_event(GatewayEvent::NewMessage {
            message: message(alice, me, "hi"),
        });

        assert_eq!(effect, None);
        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.unread_count(alice), 0);
    }

    #[test]
    fn push_from_other_user_bumps_their_counter_only() {
        let me = Uuid::new_v4();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let mut session = ChatSession::new(me);

        session.select_user(alice);
        session.messages_loaded(vec![]);

        session.apply_event(GatewayEvent::NewMessage {
            message: message(bob, me, "psst"),
        });
        session.apply_event(GatewayEvent::NewMessage {
            message: message(bob, me, "hey"),
        });

        assert!(session.messages().is_empty());
        assert_eq!(session.unread_count(bob), 2);
        assert_eq!(session.unread_count(alice), 0);
    }

    #[test]
    fn message_addressed_to_someone_else_is_ignored() {
        let me = Uuid::new_v4();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let mut session = ChatSession::new(me);

        session.apply_event(GatewayEvent::NewMessage {
            message: message(alice, bob, "not for us"),
        });

        assert!(session.messages().is_empty());
        assert_eq!(session.unread_count(alice), 0);
    }

    #[test]
    fn selecting_a_user_resets_the_pane() {
        let me = Uuid::new_v4();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let mut session = ChatSession::new(me);

        session.select_user(alice);
        session.messages_loaded(vec![message(alice, me, "old")]);
        assert_eq!(session.messages_state(), LoadState::Ready);

        session.select_user(bob);
        assert_eq!(session.selected(), Some(bob));
        assert!(session.messages().is_empty());
        assert_eq!(session.messages_state(), LoadState::Loading);
    }

    #[test]
    fn mark_read_ack_zeroes_the_counter() {
        let me = Uuid::new_v4();
        let alice = Uuid::new_v4();
        let mut session = ChatSession::new(me);

        session.users_loaded(vec![sidebar_row(alice, "alice", 5)]);
        session.select_user(alice);
        session.messages_loaded(vec![]);
        session.mark_read_acked(alice);

        assert_eq!(session.unread_count(alice), 0);
    }

    #[test]
    fn refresh_event_requests_a_sidebar_refetch() {
        let mut session = ChatSession::new(Uuid::new_v4());
        assert_eq!(
            session.apply_event(GatewayEvent::RefreshUsers),
            Some(SessionEffect::RefetchUsers)
        );
    }

    #[test]
    fn presence_event_replaces_the_online_set() {
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let mut session = ChatSession::new(Uuid::new_v4());

        session.apply_event(GatewayEvent::PresenceChanged { online: vec![alice, bob] });
        assert!(session.is_online(alice));
        assert!(session.is_online(bob));

        session.apply_event(GatewayEvent::PresenceChanged { online: vec![bob] });
        assert!(!session.is_online(alice));
        assert!(session.is_online(bob));
    }

    #[test]
    fn sidebar_refetch_overwrites_locally_accumulated_counts() {
        let me = Uuid::new_v4();
        let alice = Uuid::new_v4();
        let mut session = ChatSession::new(me);

        session.apply_event(GatewayEvent::NewMessage {
            message: message(alice, me, "one"),
        });
        assert_eq!(session.unread_count(alice), 1);

        // Server-side truth wins on the next sidebar fetch
        session.users_loaded(vec![sidebar_row(alice, "alice", 4)]);
        assert_eq!(session.unread_count(alice), 4);
    }
}
