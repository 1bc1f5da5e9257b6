//! channel - message transport between peers
//!
//! the game only needs broadcast, private send and a view of who else is
//! connected. `LocalHub` provides that in-process over tokio mpsc queues;
//! a networked transport implements the same `Channel` trait.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use rand::Rng;
use tokio::sync::mpsc;

use crate::protocol::{Message, UserId};

/// inbound side of a channel, fed to `Game::handle_channel_event`
#[derive(Clone, Debug, PartialEq)]
pub enum ChannelEvent {
    UserJoin(UserId),
    UserLeave(UserId),
    /// raw json payload and the user who sent it
    Message { payload: String, sender: UserId },
}

/// outbound side of a channel
pub trait Channel {
    /// channel id other peers connect with
    fn id(&self) -> &str;
    fn user_id(&self) -> &UserId;
    /// everyone else currently connected, in join order
    fn other_user_ids(&self) -> Vec<UserId>;
    /// send to every other user
    fn send(&mut self, message: &Message);
    fn send_privately(&mut self, user: &UserId, message: &Message);
}

/// who an outgoing message is for
#[derive(Clone, Debug, PartialEq)]
pub enum Recipient {
    Everyone,
    User(UserId),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Outgoing {
    pub recipient: Recipient,
    pub message: Message,
}

/// messages queued by protocol handlers until the game flushes them
#[derive(Debug, Default)]
pub struct Outbox {
    queue: Vec<Outgoing>,
}

impl Outbox {
    pub fn broadcast(&mut self, message: Message) {
        self.queue.push(Outgoing {
            recipient: Recipient::Everyone,
            message,
        });
    }

    pub fn send_privately(&mut self, user: UserId, message: Message) {
        self.queue.push(Outgoing {
            recipient: Recipient::User(user),
            message,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn take(&mut self) -> Vec<Outgoing> {
        std::mem::take(&mut self.queue)
    }

    /// write everything queued to `channel`, in order
    pub fn flush_to<C: Channel + ?Sized>(&mut self, channel: &mut C) {
        for outgoing in self.queue.drain(..) {
            match &outgoing.recipient {
                Recipient::Everyone => channel.send(&outgoing.message),
                Recipient::User(user) => channel.send_privately(user, &outgoing.message),
            }
        }
    }
}

/// channel errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("channel {0} does not exist")]
    UnknownChannel(String),
    #[error("user {0} is already connected")]
    DuplicateUser(UserId),
}

#[derive(Debug)]
struct Member {
    user_id: UserId,
    inbound: mpsc::UnboundedSender<ChannelEvent>,
}

#[derive(Debug, Default)]
struct HubState {
    channels: HashMap<String, Vec<Member>>,
}

impl HubState {
    fn deliver(&self, channel_id: &str, to: Option<&UserId>, from: &UserId, event: ChannelEvent) {
        let Some(members) = self.channels.get(channel_id) else {
            return;
        };
        for member in members {
            if &member.user_id == from || to.is_some_and(|to| to != &member.user_id) {
                continue;
            }
            if member.inbound.send(event.clone()).is_err() {
                tracing::debug!("dropping event for closed receiver {}", member.user_id);
            }
        }
    }
}

/// in-process rendezvous for any number of channels
#[derive(Clone, Debug, Default)]
pub struct LocalHub {
    state: Arc<Mutex<HubState>>,
}

impl LocalHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn join(
        &self,
        channel_id: String,
        user_id: UserId,
        create: bool,
    ) -> Result<(LocalChannel, mpsc::UnboundedReceiver<ChannelEvent>), ChannelError> {
        let mut state = self.state.lock();
        if !create && !state.channels.contains_key(&channel_id) {
            return Err(ChannelError::UnknownChannel(channel_id));
        }

        let members = state.channels.entry(channel_id.clone()).or_default();
        if members.iter().any(|m| m.user_id == user_id) {
            return Err(ChannelError::DuplicateUser(user_id));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        members.push(Member {
            user_id: user_id.clone(),
            inbound: tx,
        });
        state.deliver(&channel_id, None, &user_id, ChannelEvent::UserJoin(user_id.clone()));
        tracing::debug!("{} joined channel {}", user_id, channel_id);

        let channel = LocalChannel {
            hub: self.clone(),
            channel_id,
            user_id,
        };
        Ok((channel, rx))
    }
}

/// one user's handle on a `LocalHub` channel
///
/// dropping it leaves the channel and notifies the others.
#[derive(Debug)]
pub struct LocalChannel {
    hub: LocalHub,
    channel_id: String,
    user_id: UserId,
}

impl LocalChannel {
    fn send_event(&self, to: Option<&UserId>, message: &Message) {
        let payload = match message.to_json() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!("not sending {}: {}", message.kind(), e);
                return;
            }
        };
        let event = ChannelEvent::Message {
            payload,
            sender: self.user_id.clone(),
        };
        self.hub
            .state
            .lock()
            .deliver(&self.channel_id, to, &self.user_id, event);
    }
}

impl Channel for LocalChannel {
    fn id(&self) -> &str {
        &self.channel_id
    }

    fn user_id(&self) -> &UserId {
        &self.user_id
    }

    fn other_user_ids(&self) -> Vec<UserId> {
        let state = self.hub.state.lock();
        state
            .channels
            .get(&self.channel_id)
            .map(|members| {
                members
                    .iter()
                    .filter(|m| m.user_id != self.user_id)
                    .map(|m| m.user_id.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn send(&mut self, message: &Message) {
        self.send_event(None, message);
    }

    fn send_privately(&mut self, user: &UserId, message: &Message) {
        self.send_event(Some(user), message);
    }
}

impl Drop for LocalChannel {
    fn drop(&mut self) {
        let mut state = self.hub.state.lock();
        let now_empty = match state.channels.get_mut(&self.channel_id) {
            Some(members) => {
                members.retain(|m| m.user_id != self.user_id);
                members.is_empty()
            }
            None => return,
        };
        if now_empty {
            state.channels.remove(&self.channel_id);
        } else {
            state.deliver(
                &self.channel_id,
                None,
                &self.user_id,
                ChannelEvent::UserLeave(self.user_id.clone()),
            );
        }
    }
}

/// channel ids are a random u32 in base 36
fn random_channel_id() -> String {
    let mut value: u32 = rand::thread_rng().gen();
    if value == 0 {
        return "0".into();
    }
    let mut digits = Vec::new();
    while value > 0 {
        let digit = (value % 36) as u8;
        digits.push(if digit < 10 { b'0' + digit } else { b'a' + digit - 10 });
        value /= 36;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

/// entry point for one user: host a new channel or join an existing one
#[derive(Clone)]
pub struct Connection {
    hub: LocalHub,
    user_id: UserId,
}

impl Connection {
    pub fn new(hub: LocalHub, user_id: impl Into<UserId>) -> Self {
        Self {
            hub,
            user_id: user_id.into(),
        }
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// host a fresh channel
    pub fn open(&self) -> Result<(LocalChannel, mpsc::UnboundedReceiver<ChannelEvent>), ChannelError> {
        loop {
            let channel_id = random_channel_id();
            if self.hub.state.lock().channels.contains_key(&channel_id) {
                continue;
            }
            return self.hub.join(channel_id, self.user_id.clone(), true);
        }
    }

    /// join a channel someone else opened
    pub fn connect(
        &self,
        channel_id: &str,
    ) -> Result<(LocalChannel, mpsc::UnboundedReceiver<ChannelEvent>), ChannelError> {
        self.hub.join(channel_id.to_owned(), self.user_id.clone(), false)
    }
}
