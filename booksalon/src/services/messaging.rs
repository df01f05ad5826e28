//! Direct messages between two users.
//!
//! A room's id is the canonical key of its participant pair, so concurrent
//! "start chat" requests from both sides converge on one document. The key
//! carries the length of the first uid, so uids containing the separator
//! cannot produce the same key for different pairs. Rooms created before
//! canonical ids are still found through a participant scan.

use futures_util::future::try_join_all;
use log::{debug, info, warn};

use crate::{
    auth::Session,
    binding::LiveQuery,
    errors::{SalonError, ValidationError, Validator},
    id::generate_document_id,
    keys::{self, CHAT_ROOMS},
    models::{ChatRoom, Message, MessageType, NotificationType},
    store::{DocumentStore, FieldOp, Filter, Query, Saga, SortOrder},
    timestamp::Timestamp,
};

use super::{
    excerpt,
    notifications::{NewNotification, NotificationService},
    require_profile, to_value,
};

pub const MESSAGE_MAX_CHARS: usize = 1_000;

/// Order-independent room id for a pair of users: `{len(first)}_{first}_{second}`
/// with the pair sorted.
pub fn chat_room_key(a: &str, b: &str) -> String {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    format!("{}_{first}_{second}", first.len())
}

fn is_room_of(room: &ChatRoom, a: &str, b: &str) -> bool {
    room.participants.len() == 2
        && room.participants.iter().any(|uid| uid == a)
        && room.participants.iter().any(|uid| uid == b)
}

fn participant_rooms(uid: &str) -> Query {
    Query::collection(CHAT_ROOMS).filter(Filter::array_contains("participants", uid))
}

fn messages_query(room_id: &str) -> Query {
    Query::collection(keys::messages(room_id)).order_by("createdAt", SortOrder::Asc)
}

#[derive(Clone)]
pub struct MessagingService<S> {
    store: S,
}

impl<S: DocumentStore> MessagingService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the room shared with `other_uid`, creating it when none exists.
    pub async fn get_or_create_chat_room(&self, session: &Session, other_uid: &str) -> Result<ChatRoom, SalonError> {
        let identity = session.require()?;
        if identity.uid == other_uid {
            return Err(ValidationError::single("otherUid", "validation.self_chat", "cannot chat with yourself").into());
        }
        require_profile(&self.store, other_uid).await?;

        let uid = identity.uid.as_str();
        let key = chat_room_key(uid, other_uid);
        let mut key_taken = false;
        if let Some(room) = self.store.fetch::<ChatRoom>(CHAT_ROOMS, &key).await? {
            if is_room_of(&room, uid, other_uid) {
                return Ok(room);
            }
            warn!("chat room {key} belongs to another pair");
            key_taken = true;
        }

        let legacy: Vec<ChatRoom> = self.store.fetch_all(&participant_rooms(uid)).await?;
        if let Some(room) = legacy.into_iter().find(|room| is_room_of(room, uid, other_uid)) {
            debug!("reusing legacy room {}", room.id);
            return Ok(room);
        }

        let mut participants = vec![uid.to_string(), other_uid.to_string()];
        participants.sort();
        let mut room = ChatRoom {
            id: if key_taken { generate_document_id() } else { key.clone() },
            unread_count: participants.iter().map(|uid| (uid.clone(), 0)).collect(),
            participants,
            last_message: String::new(),
            last_message_at: None,
            created_at: Some(Timestamp::now()),
        };
        match self.store.create(CHAT_ROOMS, &room.id, to_value(&room)?).await {
            Ok(()) => {
                info!("created chat room {}", room.id);
                Ok(room)
            }
            Err(SalonError::AlreadyExists { .. }) => {
                let existing = self.require_room(&room.id).await?;
                if is_room_of(&existing, uid, other_uid) {
                    return Ok(existing);
                }
                room.id = generate_document_id();
                self.store.create(CHAT_ROOMS, &room.id, to_value(&room)?).await?;
                info!("created chat room {} beside foreign {}", room.id, existing.id);
                Ok(room)
            }
            Err(err) => Err(err),
        }
    }

    async fn require_room(&self, room_id: &str) -> Result<ChatRoom, SalonError> {
        self.store
            .fetch(CHAT_ROOMS, room_id)
            .await?
            .ok_or_else(|| SalonError::not_found("chat room", room_id))
    }

    async fn member_room(&self, uid: &str, room_id: &str) -> Result<ChatRoom, SalonError> {
        let room = self.require_room(room_id).await?;
        if !room.participants.iter().any(|participant| participant == uid) {
            return Err(SalonError::OwnershipViolation {
                entity: "chat room",
                id: room_id.to_string(),
            });
        }
        Ok(room)
    }

    /// Writes the message and the room summary together; the receiver's
    /// unread counter moves in the same document update as `lastMessage`.
    pub async fn send_message(
        &self,
        session: &Session,
        receiver_uid: &str,
        content: &str,
        message_type: MessageType,
    ) -> Result<Message, SalonError> {
        let identity = session.require()?;
        Validator::new().text("content", content, 1, MESSAGE_MAX_CHARS).finish()?;
        let room = self.get_or_create_chat_room(session, receiver_uid).await?;
        let room_id = room.id.as_str();
        let receiver = receiver_uid.to_string();

        let message = Message {
            id: generate_document_id(),
            sender_id: identity.uid.clone(),
            receiver_id: receiver.clone(),
            content: content.trim().to_string(),
            created_at: Timestamp::now(),
            read_at: None,
            message_type,
        };
        let unread_path = format!("unreadCount.{receiver}");
        let previous_at = room.last_message_at.map(|at| at.to_value()).unwrap_or_default();
        Saga::new(&self.store, "send_message")
            .create(keys::messages(room_id), message.id.as_str(), to_value(&message)?)
            .update(
                CHAT_ROOMS,
                room_id,
                vec![
                    FieldOp::set("lastMessage", message.content.as_str()),
                    FieldOp::set("lastMessageAt", message.created_at.to_value()),
                    FieldOp::increment(unread_path.as_str(), 1),
                ],
                vec![
                    FieldOp::set("lastMessage", room.last_message.as_str()),
                    FieldOp::set("lastMessageAt", previous_at),
                    FieldOp::increment(unread_path.as_str(), -1),
                ],
            )
            .run()
            .await?;

        NotificationService::new(self.store.clone())
            .notify(
                NewNotification::new(
                    receiver.as_str(),
                    NotificationType::Message,
                    "새 메시지",
                    format!("{}: {}", identity.email, excerpt(&message.content, 40)),
                )
                .with("roomId", room_id)
                .with("senderId", identity.uid.as_str()),
            )
            .await?;
        Ok(message)
    }

    /// Rooms of `uid`, most recent activity first. Rooms without messages sort by creation.
    pub async fn chat_rooms(&self, uid: &str) -> Result<Vec<ChatRoom>, SalonError> {
        let mut rooms: Vec<ChatRoom> = self.store.fetch_all(&participant_rooms(uid)).await?;
        rooms.sort_by(|a, b| {
            b.last_message_at
                .or(b.created_at)
                .cmp(&a.last_message_at.or(a.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(rooms)
    }

    /// The newest `limit` messages of a room in chronological order.
    pub async fn messages(&self, session: &Session, room_id: &str, limit: usize) -> Result<Vec<Message>, SalonError> {
        let identity = session.require()?;
        self.member_room(&identity.uid, room_id).await?;
        let query = Query::collection(keys::messages(room_id))
            .order_by("createdAt", SortOrder::Desc)
            .limit(limit);
        let mut messages: Vec<Message> = self.store.fetch_all(&query).await?;
        messages.reverse();
        Ok(messages)
    }

    /// Clears the caller's unread counter and stamps `readAt` on received messages.
    pub async fn mark_room_read(&self, session: &Session, room_id: &str) -> Result<usize, SalonError> {
        let identity = session.require()?;
        self.member_room(&identity.uid, room_id).await?;
        let collection = keys::messages(room_id);
        let unread: Vec<Message> = self
            .store
            .fetch_all(&Query::collection(collection.as_str()).filter(Filter::eq("receiverId", identity.uid.as_str())))
            .await?;
        let unread: Vec<Message> = unread.into_iter().filter(|message| message.read_at.is_none()).collect();
        let read_at = [FieldOp::set("readAt", Timestamp::now().to_value())];
        try_join_all(unread.iter().map(|message| self.store.update(&collection, &message.id, &read_at))).await?;

        self.store
            .update(CHAT_ROOMS, room_id, &[FieldOp::set(format!("unreadCount.{}", identity.uid), 0)])
            .await?;
        Ok(unread.len())
    }

    pub async fn total_unread(&self, uid: &str) -> Result<i64, SalonError> {
        let rooms = self.chat_rooms(uid).await?;
        Ok(rooms.iter().map(|room| room.unread_for(uid)).sum())
    }

    pub async fn watch_messages(&self, session: &Session, room_id: &str) -> Result<LiveQuery<Message, S>, SalonError> {
        let identity = session.require()?;
        self.member_room(&identity.uid, room_id).await?;
        LiveQuery::mount(&self.store, messages_query(room_id)).await
    }

    /// Live room list; ordering is applied by the caller since rooms without
    /// `lastMessageAt` must stay visible.
    pub async fn watch_rooms(&self, uid: &str) -> Result<LiveQuery<ChatRoom, S>, SalonError> {
        LiveQuery::mount(&self.store, participant_rooms(uid)).await
    }
}
