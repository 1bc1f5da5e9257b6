//! game - owns every deck, die and piece and routes messages to them
//!
//! the host opens a channel and calls `start`, which fixes the roster and
//! seats everyone. decks created before that shuffle automatically once
//! the game starts. messages for decks that do not exist yet are parked
//! until the deck is created.
//!
//! plain decks are numbered in creation order, which every peer shares.
//! die decks are created by whoever rolls, so each player numbers them in
//! its own residue class above `DIE_DECK_BASE`: player p's k-th roll uses
//! `DIE_DECK_BASE + k * N + p`.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Instant;

use crate::channel::{Channel, ChannelEvent, Outbox};
use crate::config::{ConfigError, GameConfig};
use crate::deck::{Deck, DeckError, Seating, TableContext};
use crate::die::{Die, DieReaction};
use crate::face::{valid_face_count, DieFaces, Face};
use crate::piece::Piece;
use crate::protocol::{DeckId, DeckMessage, DieId, Message, PieceId, Routed, UserId};
use crate::signal::Signal;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("connection not started")]
    ConnectionNotStarted,
    #[error("game has not started")]
    NotStarted,
    #[error("game has already started")]
    AlreadyStarted,
    #[error("no deck ids left")]
    DeckIdsExhausted,
    #[error("card faces must have 2-52 elements, got {0}")]
    InvalidFaceCount(usize),
    #[error("unknown deck {0}")]
    UnknownDeck(DeckId),
    #[error("unknown die {0}")]
    UnknownDie(DieId),
    #[error("unknown piece {0}")]
    UnknownPiece(PieceId),
    #[error("session closed")]
    SessionClosed,
    #[error(transparent)]
    Deck(#[from] DeckError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, GameError>;

/// first deck id used for die rolls
pub const DIE_DECK_BASE: DeckId = 1 << 31;

/// deck id of `player`'s `seq`-th roll at a table of `players`
pub fn die_deck_id(player: usize, seq: u32, players: usize) -> Option<DeckId> {
    let player = DeckId::try_from(player).ok()?;
    let players = DeckId::try_from(players).ok()?;
    seq.checked_mul(players)?
        .checked_add(player)?
        .checked_add(DIE_DECK_BASE)
}

#[derive(Debug)]
pub struct GameSignals {
    pub player_join: Signal<UserId>,
    pub player_leave: Signal<UserId>,
    /// remembers that the game started, late listeners fire immediately
    pub start: Signal<()>,
}

impl Default for GameSignals {
    fn default() -> Self {
        Self {
            player_join: Signal::new(),
            player_leave: Signal::new(),
            start: Signal::memorizing(),
        }
    }
}

/// current time on the tokio clock, so paused test time applies
pub(crate) fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

pub struct Game<C> {
    config: GameConfig,
    channel: Option<C>,
    seating: Option<Seating>,
    outbox: Outbox,
    decks: BTreeMap<DeckId, Deck>,
    next_deck_id: DeckId,
    /// rolls this peer started
    die_rolls: u32,
    /// decks that shuffle as soon as the game starts
    auto_shuffle: Vec<DeckId>,
    die_decks: HashMap<DeckId, DieId>,
    dice: HashMap<DieId, Die>,
    pieces: HashMap<PieceId, Piece>,
    parked: BTreeMap<DeckId, Vec<(UserId, DeckMessage)>>,
    /// rolls we refused to follow, their messages are dropped
    rejected: BTreeSet<DeckId>,
    /// everything received before we were seated
    early: Vec<(UserId, Message)>,
    pub on: GameSignals,
}

impl<C: Channel> Game<C> {
    pub fn new(config: GameConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            channel: None,
            seating: None,
            outbox: Outbox::default(),
            decks: BTreeMap::new(),
            next_deck_id: 0,
            die_rolls: 0,
            auto_shuffle: Vec::new(),
            die_decks: HashMap::new(),
            dice: HashMap::new(),
            pieces: HashMap::new(),
            parked: BTreeMap::new(),
            rejected: BTreeSet::new(),
            early: Vec::new(),
            on: GameSignals::default(),
        })
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn start_connection(&mut self, channel: C) {
        tracing::info!("connected to channel {} as {}", channel.id(), channel.user_id());
        self.channel = Some(channel);
    }

    pub fn channel(&self) -> Option<&C> {
        self.channel.as_ref()
    }

    /// invitation link: `base` with the channel id as fragment
    pub fn url(&self, base: &str) -> Result<String> {
        let channel = self.channel.as_ref().ok_or(GameError::ConnectionNotStarted)?;
        let base = base.split('#').next().unwrap_or(base);
        Ok(format!("{}#{}", base, channel.id()))
    }

    /// everyone connected, including us
    pub fn number_of_players(&self) -> Result<usize> {
        let channel = self.channel.as_ref().ok_or(GameError::ConnectionNotStarted)?;
        Ok(1 + channel.other_user_ids().len())
    }

    pub fn is_started(&self) -> bool {
        self.seating.is_some()
    }

    pub fn player_number(&self) -> Option<usize> {
        self.seating.as_ref().map(|s| s.player_number)
    }

    pub fn players(&self) -> Option<&[UserId]> {
        self.seating.as_ref().map(|s| s.players.as_slice())
    }

    /// fix the roster to everyone currently connected and tell them
    pub fn start(&mut self) -> Result<()> {
        let channel = self.channel.as_ref().ok_or(GameError::ConnectionNotStarted)?;
        if self.seating.is_some() {
            return Err(GameError::AlreadyStarted);
        }
        if self
            .auto_shuffle
            .iter()
            .filter_map(|id| self.decks.get(id))
            .any(|deck| !deck.has_error_sink())
        {
            return Err(DeckError::NoErrorListener.into());
        }

        let user_id = channel.user_id().clone();
        let mut players = vec![user_id.clone()];
        players.extend(channel.other_user_ids());

        self.outbox.broadcast(Message::Start {
            user_ids: players.clone(),
        });
        if let Some(seating) = Seating::new(user_id, players) {
            self.seat(seating);
        }
        self.after_update();
        Ok(())
    }

    pub fn handle_channel_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::UserJoin(user) => {
                tracing::info!("{} joined", user);
                self.on.player_join.dispatch(user);
            }
            ChannelEvent::UserLeave(user) => {
                tracing::info!("{} left", user);
                self.on.player_leave.dispatch(user);
            }
            ChannelEvent::Message { payload, sender } => match Message::from_json(&payload) {
                Ok(message) => self.handle_message(sender, message),
                Err(e) => tracing::warn!("dropping message from {}: {}", sender, e),
            },
        }
        self.after_update();
    }

    fn handle_message(&mut self, sender: UserId, message: Message) {
        if self.seating.is_none() && !matches!(message, Message::Start { .. }) {
            tracing::debug!("holding {} from {} until the game starts", message.kind(), sender);
            self.early.push((sender, message));
            return;
        }

        match message.route() {
            Routed::Start { user_ids } => self.on_start(user_ids),
            Routed::Deck { deck_id, message } => self.deliver_to_deck(sender, deck_id, message),
            Routed::Die { die_id, deck_id } => self.on_roll_start(sender, die_id, deck_id),
            Routed::Piece { piece_id, x, y } => match self.pieces.get_mut(&piece_id) {
                Some(piece) => piece.moved(x, y),
                None => tracing::warn!("move for unknown piece {}", piece_id),
            },
        }
    }

    fn on_start(&mut self, user_ids: Vec<UserId>) {
        if self.seating.is_some() {
            tracing::debug!("ignoring repeated start");
            return;
        }
        let Some(channel) = self.channel.as_ref() else {
            return;
        };
        match Seating::new(channel.user_id().clone(), user_ids) {
            Some(seating) => self.seat(seating),
            None => tracing::warn!("started without us in the roster"),
        }
    }

    fn seat(&mut self, seating: Seating) {
        tracing::info!(
            "game started, player {} of {}",
            seating.player_number,
            seating.number_of_players()
        );
        self.seating = Some(seating);
        self.on.start.dispatch(());

        for deck_id in std::mem::take(&mut self.auto_shuffle) {
            if let Err(e) = self.with_deck(deck_id, |deck, ctx| deck.shuffle(ctx)) {
                tracing::warn!("deck {} not shuffled: {}", deck_id, e);
            }
        }
        for (sender, message) in std::mem::take(&mut self.early) {
            self.handle_message(sender, message);
        }
    }

    fn deliver_to_deck(&mut self, sender: UserId, deck_id: DeckId, message: DeckMessage) {
        if self.rejected.contains(&deck_id) {
            tracing::debug!("dropping {} for rejected deck {}", message.kind(), deck_id);
            return;
        }
        let (Some(seating), Some(deck)) = (self.seating.as_ref(), self.decks.get_mut(&deck_id)) else {
            tracing::debug!("parking {} for unknown deck {}", message.kind(), deck_id);
            self.parked.entry(deck_id).or_default().push((sender, message));
            return;
        };
        let mut ctx = TableContext {
            seating,
            outbox: &mut self.outbox,
            now: now(),
        };
        deck.handle_message(sender, message, &mut ctx);
    }

    fn release_parked(&mut self, deck_id: DeckId) {
        for (sender, message) in self.parked.remove(&deck_id).unwrap_or_default() {
            self.deliver_to_deck(sender, deck_id, message);
        }
    }

    /// messages waiting for decks that do not exist yet
    pub fn parked_count(&self) -> usize {
        self.parked.values().map(Vec::len).sum()
    }

    fn on_roll_start(&mut self, sender: UserId, die_id: DieId, deck_id: DeckId) {
        // a bad claim leaves the deck id to its rightful roller
        if let Err(reason) = self.check_roll_start(&sender, deck_id) {
            tracing::warn!("ignoring roll of die {} from {}: {}", die_id, sender, reason);
            return;
        }
        let Some(faces) = self.dice.get(&die_id).map(|die| die.faces().to_vec()) else {
            tracing::warn!("roll for unknown die {}", die_id);
            self.reject_deck(deck_id);
            return;
        };
        if let Err(e) = self.insert_die_deck(deck_id, &die_id, faces) {
            tracing::warn!("die {} cannot follow roll: {}", die_id, e);
            self.reject_deck(deck_id);
            return;
        }
        if let Some(die) = self.dice.get_mut(&die_id) {
            die.begin_roll(deck_id, false);
        }
        if let Err(e) = self.with_deck(deck_id, |deck, ctx| deck.shuffle(ctx)) {
            tracing::warn!("deck {} not shuffled: {}", deck_id, e);
        }
        self.release_parked(deck_id);
    }

    fn check_roll_start(&self, sender: &UserId, deck_id: DeckId) -> std::result::Result<(), String> {
        if self.decks.contains_key(&deck_id) || self.rejected.contains(&deck_id) {
            return Err(format!("deck {} is taken", deck_id));
        }
        let seating = self.seating.as_ref().ok_or("not seated")?;
        let roller = seating
            .player_number_of(sender)
            .ok_or("sender is not seated")?;
        let owned = deck_id
            .checked_sub(DIE_DECK_BASE)
            .zip(DeckId::try_from(seating.number_of_players()).ok())
            .is_some_and(|(offset, n)| usize::try_from(offset % n).ok() == Some(roller));
        if !owned {
            return Err(format!("deck {} is not player {}'s to roll on", deck_id, roller));
        }
        Ok(())
    }

    fn reject_deck(&mut self, deck_id: DeckId) {
        if let Some(parked) = self.parked.remove(&deck_id) {
            tracing::warn!("dropping {} parked messages for deck {}", parked.len(), deck_id);
        }
        self.rejected.insert(deck_id);
    }

    fn insert_deck(&mut self, id: DeckId, faces: Vec<Face>) -> Result<DeckId> {
        let deck = Deck::new(id, faces, self.config.protocol_timeout)?;
        self.decks.insert(id, deck);
        Ok(id)
    }

    fn insert_die_deck(&mut self, id: DeckId, die_id: &str, faces: Vec<Face>) -> Result<DeckId> {
        let id = self.insert_deck(id, faces)?;
        if let Some(deck) = self.decks.get_mut(&id) {
            deck.forward_errors();
        }
        self.die_decks.insert(id, die_id.to_owned());
        Ok(id)
    }

    /// new deck with the given faces, 2-52 of them
    ///
    /// before the game starts the deck shuffles automatically on start;
    /// afterwards call `shuffle_deck` once its error listener is in place.
    pub fn create_deck<F: Into<Face>>(&mut self, faces: impl IntoIterator<Item = F>) -> Result<&mut Deck> {
        let faces: Vec<Face> = faces.into_iter().map(Into::into).collect();
        if !valid_face_count(faces.len()) {
            return Err(GameError::InvalidFaceCount(faces.len()));
        }
        if self.next_deck_id >= DIE_DECK_BASE {
            return Err(GameError::DeckIdsExhausted);
        }
        let id = self.insert_deck(self.next_deck_id, faces)?;
        self.next_deck_id += 1;
        if self.seating.is_none() {
            self.auto_shuffle.push(id);
        }
        self.decks.get_mut(&id).ok_or(GameError::UnknownDeck(id))
    }

    pub fn deck(&self, id: DeckId) -> Option<&Deck> {
        self.decks.get(&id)
    }

    pub fn deck_mut(&mut self, id: DeckId) -> Option<&mut Deck> {
        self.decks.get_mut(&id)
    }

    pub fn shuffle_deck(&mut self, deck_id: DeckId) -> Result<()> {
        self.with_deck(deck_id, |deck, ctx| deck.shuffle(ctx))??;
        self.release_parked(deck_id);
        self.after_update();
        Ok(())
    }

    /// draw `card_id` or a random card, returns the card drawn
    pub fn draw_card(&mut self, deck_id: DeckId, card_id: Option<usize>) -> Result<usize> {
        let card_id = self.with_deck(deck_id, |deck, ctx| deck.draw_card(card_id, ctx))??;
        self.after_update();
        Ok(card_id)
    }

    pub fn flip_card(&mut self, deck_id: DeckId, card_id: usize) -> Result<()> {
        self.with_deck(deck_id, |deck, ctx| deck.flip_card(card_id, ctx))??;
        self.after_update();
        Ok(())
    }

    /// new die, replacing any die with the same id
    pub fn create_die(&mut self, id: impl Into<DieId>, faces: DieFaces) -> Result<&mut Die> {
        if !valid_face_count(faces.len()) {
            return Err(GameError::InvalidFaceCount(faces.len()));
        }
        let id = id.into();
        let die = Die::new(id.clone(), faces.into_faces());
        match self.dice.entry(id) {
            Entry::Occupied(mut entry) => {
                tracing::debug!("replacing die {}", entry.key());
                entry.insert(die);
                Ok(entry.into_mut())
            }
            Entry::Vacant(entry) => Ok(entry.insert(die)),
        }
    }

    pub fn die(&self, id: &str) -> Option<&Die> {
        self.dice.get(id)
    }

    pub fn die_mut(&mut self, id: &str) -> Option<&mut Die> {
        self.dice.get_mut(id)
    }

    /// roll a die on a fresh deck
    ///
    /// returns false without doing anything while the die is still rolling.
    pub fn roll(&mut self, die_id: &str) -> Result<bool> {
        let die = self
            .dice
            .get(die_id)
            .ok_or_else(|| GameError::UnknownDie(die_id.to_owned()))?;
        if !die.has_error_listener() {
            return Err(DeckError::NoErrorListener.into());
        }
        let seating = self.seating.as_ref().ok_or(GameError::NotStarted)?;
        if die.is_rolling() {
            tracing::debug!("die {} is already rolling", die_id);
            return Ok(false);
        }

        let deck_id = die_deck_id(seating.player_number, self.die_rolls, seating.number_of_players())
            .ok_or(GameError::DeckIdsExhausted)?;
        let faces = die.faces().to_vec();
        self.die_rolls += 1;
        let deck_id = self.insert_die_deck(deck_id, die_id, faces)?;
        if let Some(die) = self.dice.get_mut(die_id) {
            die.begin_roll(deck_id, true);
        }
        self.outbox.broadcast(Message::RollStart {
            die_id: die_id.to_owned(),
            deck_id,
        });
        self.with_deck(deck_id, |deck, ctx| deck.shuffle(ctx))??;
        self.release_parked(deck_id);
        self.after_update();
        Ok(true)
    }

    pub fn create_piece(&mut self, id: impl Into<PieceId>) -> &mut Piece {
        let id = id.into();
        self.pieces
            .entry(id.clone())
            .or_insert_with(|| Piece::new(id))
    }

    pub fn piece(&self, id: &str) -> Option<&Piece> {
        self.pieces.get(id)
    }

    pub fn piece_mut(&mut self, id: &str) -> Option<&mut Piece> {
        self.pieces.get_mut(id)
    }

    pub fn move_piece(&mut self, piece_id: &str, x: f64, y: f64) -> Result<()> {
        if self.channel.is_none() {
            return Err(GameError::ConnectionNotStarted);
        }
        let piece = self
            .pieces
            .get_mut(piece_id)
            .ok_or_else(|| GameError::UnknownPiece(piece_id.to_owned()))?;
        self.outbox.broadcast(Message::PieceMoved {
            piece_id: piece_id.to_owned(),
            x,
            y,
        });
        piece.moved(x, y);
        self.after_update();
        Ok(())
    }

    /// surface waits on other peers that lasted longer than the protocol timeout
    pub fn check_timeouts(&mut self, now: Instant) {
        for deck in self.decks.values_mut() {
            deck.check_timeouts(now);
        }
        self.after_update();
    }

    fn with_deck<R>(
        &mut self,
        deck_id: DeckId,
        f: impl FnOnce(&mut Deck, &mut TableContext<'_>) -> R,
    ) -> Result<R> {
        let seating = self.seating.as_ref().ok_or(GameError::NotStarted)?;
        let deck = self
            .decks
            .get_mut(&deck_id)
            .ok_or(GameError::UnknownDeck(deck_id))?;
        let mut ctx = TableContext {
            seating,
            outbox: &mut self.outbox,
            now: now(),
        };
        Ok(f(deck, &mut ctx))
    }

    /// send what the decks queued, then let dice react to deck events
    fn after_update(&mut self) {
        loop {
            self.flush();

            let mut reactions = Vec::new();
            for (deck_id, deck) in self.decks.iter_mut() {
                let events = deck.take_events();
                let Some(die) = self
                    .die_decks
                    .get(deck_id)
                    .and_then(|die_id| self.dice.get_mut(die_id))
                else {
                    continue;
                };
                for event in events {
                    let reaction = die.handle_deck_event(*deck_id, event);
                    if reaction != DieReaction::Nothing {
                        reactions.push((*deck_id, reaction));
                    }
                }
            }
            if reactions.is_empty() {
                return;
            }

            for (deck_id, reaction) in reactions {
                let outcome = match reaction {
                    DieReaction::DrawCard => self
                        .with_deck(deck_id, |deck, ctx| deck.draw_card(None, ctx).map(|_| ())),
                    DieReaction::FlipCard(card_id) => {
                        self.with_deck(deck_id, |deck, ctx| deck.flip_card(card_id, ctx))
                    }
                    DieReaction::Nothing => Ok(Ok(())),
                };
                if let Err(e) = outcome.and_then(|r| r.map_err(GameError::from)) {
                    self.die_failed(deck_id, e);
                }
            }
        }
    }

    fn die_failed(&mut self, deck_id: DeckId, error: GameError) {
        tracing::warn!("die on deck {}: {}", deck_id, error);
        let die = self
            .die_decks
            .get(&deck_id)
            .and_then(|die_id| self.dice.get_mut(die_id));
        if let (Some(die), GameError::Deck(error)) = (die, error) {
            die.fail(deck_id, error);
        }
    }

    fn flush(&mut self) {
        if self.outbox.is_empty() {
            return;
        }
        match self.channel.as_mut() {
            Some(channel) => self.outbox.flush_to(channel),
            None => {
                tracing::warn!("dropping {} messages, no connection", self.outbox.len());
                self.outbox.take();
            }
        }
    }
}
