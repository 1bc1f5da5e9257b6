//! deck - one card deck shuffled jointly by every player
//!
//! the protocol advances only on received messages and local calls:
//!
//! ```text
//! shuffle()        everyone broadcasts deck/playerdetails
//! all details in   player 0 sends deck/initial, shuffles, deck/shuffled{next=1}
//! shuffled{me}     shuffle and pass on; player 0 starts locking on wrap-around
//! locked{me}       lock and pass on; the last player leaves out nextPlayer
//! locked{}         shuffle finished
//! draw             others answer privately with deck/cardsecret
//! flip             everyone broadcasts their secret for the card
//! ```
//!
//! messages that arrive before the state they build on are deferred and
//! replayed once that state exists.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::time::{Duration, Instant};

use curve25519_dalek::ristretto::RistrettoPoint;
use mental_poker::codec::{decode_scalar, encode_scalar};
use mental_poker::{
    deck_commitment, max_fair_identity, DeckPayload, MentalPokerError, MentalPokerGame,
    MentalPokerPlayer, Phase, PlayerDetails, SecretInsert, DECK_SIZE,
};
use rand::rngs::OsRng;

use crate::channel::Outbox;
use crate::face::{valid_face_count, Face};
use crate::protocol::{DeckId, DeckMessage, UserId};
use crate::signal::Signal;

/// who plays, and which seat is ours
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Seating {
    pub user_id: UserId,
    pub players: Vec<UserId>,
    pub player_number: usize,
}

impl Seating {
    /// None if `user_id` is not in the roster
    pub fn new(user_id: UserId, players: Vec<UserId>) -> Option<Self> {
        let player_number = players.iter().position(|p| *p == user_id)?;
        Some(Self {
            user_id,
            players,
            player_number,
        })
    }

    pub fn number_of_players(&self) -> usize {
        self.players.len()
    }

    pub fn player_number_of(&self, user: &UserId) -> Option<usize> {
        self.players.iter().position(|p| p == user)
    }
}

/// what a deck handler may touch outside the deck
pub struct TableContext<'a> {
    pub seating: &'a Seating,
    pub outbox: &'a mut Outbox,
    pub now: Instant,
}

/// remote progress a deck can be stuck waiting for
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WaitStage {
    PlayerDetails,
    Shuffle,
    CardSecrets(usize),
}

impl fmt::Display for WaitStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PlayerDetails => f.write_str("player details"),
            Self::Shuffle => f.write_str("shuffle and lock round"),
            Self::CardSecrets(card) => write!(f, "secrets for card {}", card),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeckError {
    #[error("no error listener registered")]
    NoErrorListener,
    #[error("a deck needs 2-52 faces, got {0}")]
    InvalidFaceCount(usize),
    #[error("deck has not finished shuffling")]
    NotShuffled,
    #[error("no pickable cards left")]
    NoPickableCards,
    #[error("card {0} is not pickable")]
    CardNotPickable(usize),
    #[error("card {0} was not drawn by this player")]
    NotOwnCard(usize),
    #[error("face of card {0} is not known yet")]
    FaceUnknown(usize),
    #[error("card {card_id} could not be decrypted")]
    Decryption { card_id: usize },
    #[error("initial deck does not match the players' codewords")]
    InvalidInitialDeck,
    #[error("player {player} sent a conflicting secret for card {card_id}")]
    ConflictingSecret { card_id: usize, player: usize },
    #[error("timed out waiting for {stage}")]
    Timeout { stage: WaitStage },
    #[error("malformed {kind} message: {reason}")]
    Malformed { kind: &'static str, reason: String },
    #[error("message from {0}, who is not seated")]
    UnknownSender(UserId),
    #[error(transparent)]
    Crypto(#[from] MentalPokerError),
}

/// everything a deck reports, in the order it happened
#[derive(Clone, Debug, PartialEq)]
pub enum DeckEvent {
    ShuffleFinish,
    Drawn { card_id: usize, player: usize },
    /// only this peer knows the face
    SecretlyKnownFace { card_id: usize, face: Face },
    /// every peer knows the face
    PublicKnownFace { card_id: usize, face: Face },
    Error(DeckError),
}

#[derive(Debug, Default)]
pub struct DeckSignals {
    pub error: Signal<DeckError>,
    pub shuffle_finish: Signal<()>,
    /// (card id, player number)
    pub drawn: Signal<(usize, usize)>,
    pub secretly_known_face: Signal<(usize, Face)>,
    pub public_known_face: Signal<(usize, Face)>,
}

#[derive(Debug)]
pub struct Deck {
    id: DeckId,
    faces: Vec<Face>,
    timeout: Duration,
    players: Vec<Option<MentalPokerPlayer>>,
    game: Option<MentalPokerGame>,
    known_faces: BTreeMap<usize, Face>,
    own_cards: BTreeSet<usize>,
    deferred: VecDeque<(UserId, DeckMessage)>,
    waits: BTreeMap<WaitStage, Instant>,
    shuffling: bool,
    shuffled: bool,
    errors_forwarded: bool,
    events: Vec<DeckEvent>,
    pub on: DeckSignals,
}

impl Deck {
    pub fn new(id: DeckId, faces: Vec<Face>, timeout: Duration) -> Result<Self, DeckError> {
        if !valid_face_count(faces.len()) {
            return Err(DeckError::InvalidFaceCount(faces.len()));
        }
        Ok(Self {
            id,
            faces,
            timeout,
            players: Vec::new(),
            game: None,
            known_faces: BTreeMap::new(),
            own_cards: BTreeSet::new(),
            deferred: VecDeque::new(),
            waits: BTreeMap::new(),
            shuffling: false,
            shuffled: false,
            errors_forwarded: false,
            events: Vec::new(),
            on: DeckSignals::default(),
        })
    }

    pub fn id(&self) -> DeckId {
        self.id
    }

    pub fn card_faces(&self) -> &[Face] {
        &self.faces
    }

    pub fn known_face(&self, card_id: usize) -> Option<&Face> {
        self.known_faces.get(&card_id)
    }

    /// cards this peer drew itself
    pub fn own_cards(&self) -> &BTreeSet<usize> {
        &self.own_cards
    }

    pub fn is_shuffled(&self) -> bool {
        self.shuffled
    }

    pub fn pickable_count(&self) -> usize {
        self.game
            .as_ref()
            .map_or(DECK_SIZE, MentalPokerGame::pickable_count)
    }

    /// messages waiting for state that does not exist yet
    pub fn deferred_count(&self) -> usize {
        self.deferred.len()
    }

    /// errors are handled by an owner that drains `take_events`
    pub(crate) fn forward_errors(&mut self) {
        self.errors_forwarded = true;
    }

    pub(crate) fn has_error_sink(&self) -> bool {
        self.errors_forwarded || self.on.error.num_listeners() > 0
    }

    pub fn take_events(&mut self) -> Vec<DeckEvent> {
        std::mem::take(&mut self.events)
    }

    /// join the shuffle by announcing fresh key material
    pub fn shuffle(&mut self, ctx: &mut TableContext<'_>) -> Result<(), DeckError> {
        if !self.has_error_sink() {
            return Err(DeckError::NoErrorListener);
        }
        if self.shuffling {
            return Ok(());
        }

        let me = ctx.seating.player_number;
        let mut player = MentalPokerPlayer::new();
        player.generate_points(&mut OsRng);
        player.generate_secrets(&mut OsRng);
        let player_details = player.to_details();

        self.players = vec![None; ctx.seating.number_of_players()];
        self.players[me] = Some(player);
        self.shuffling = true;
        self.waits.insert(WaitStage::PlayerDetails, ctx.now);

        tracing::debug!("deck {} sending player details as player {}", self.id, me);
        self.send(
            ctx,
            DeckMessage::PlayerDetails {
                player_number: me,
                player_details,
            },
        );

        self.check_all_player_details(ctx);
        self.replay(ctx);
        Ok(())
    }

    /// draw `card_id`, or a random pickable card
    pub fn draw_card(
        &mut self,
        card_id: Option<usize>,
        ctx: &mut TableContext<'_>,
    ) -> Result<usize, DeckError> {
        if !self.has_error_sink() {
            return Err(DeckError::NoErrorListener);
        }
        if !self.shuffled {
            return Err(DeckError::NotShuffled);
        }
        let game = self.game.as_mut().ok_or(DeckError::NotShuffled)?;

        let card_id = match card_id {
            Some(card_id) if game.is_pickable(card_id) => card_id,
            Some(card_id) => return Err(DeckError::CardNotPickable(card_id)),
            None => game
                .random_pickable_card_index(&mut OsRng)
                .ok_or(DeckError::NoPickableCards)?,
        };
        game.mark_unpickable(card_id);
        let me = game.local_player_number();
        self.own_cards.insert(card_id);

        tracing::debug!("deck {} drawing card {}", self.id, card_id);
        self.send(ctx, DeckMessage::Draw { card_id });
        self.emit(DeckEvent::Drawn {
            card_id,
            player: me,
        });
        self.waits.insert(WaitStage::CardSecrets(card_id), ctx.now);
        self.check_all_card_secrets(card_id, ctx);
        Ok(card_id)
    }

    /// reveal an own card to every player
    pub fn flip_card(&mut self, card_id: usize, ctx: &mut TableContext<'_>) -> Result<(), DeckError> {
        if !self.own_cards.contains(&card_id) {
            return Err(DeckError::NotOwnCard(card_id));
        }
        let face = self
            .known_faces
            .get(&card_id)
            .cloned()
            .ok_or(DeckError::FaceUnknown(card_id))?;
        let (me, secret) = self.own_secret(card_id)?;

        tracing::debug!("deck {} flipping card {}", self.id, card_id);
        self.send(ctx, DeckMessage::CardFlip { card_id });
        self.send(
            ctx,
            DeckMessage::CardSecret {
                card_id,
                player_number: me,
                secret,
            },
        );
        self.emit(DeckEvent::PublicKnownFace { card_id, face });
        Ok(())
    }

    pub fn handle_message(
        &mut self,
        sender: UserId,
        message: DeckMessage,
        ctx: &mut TableContext<'_>,
    ) {
        self.deferred.push_back((sender, message));
        self.replay(ctx);
    }

    /// report every wait that started at least one timeout before `now`
    pub fn check_timeouts(&mut self, now: Instant) {
        let expired: Vec<WaitStage> = self
            .waits
            .iter()
            .filter(|(_, since)| now.saturating_duration_since(**since) >= self.timeout)
            .map(|(stage, _)| *stage)
            .collect();

        for stage in expired {
            self.waits.remove(&stage);
            self.fault(DeckError::Timeout { stage });
        }
    }

    fn replay(&mut self, ctx: &mut TableContext<'_>) {
        loop {
            let mut progressed = false;
            for (sender, message) in std::mem::take(&mut self.deferred) {
                match self.try_handle(sender, message, ctx) {
                    None => progressed = true,
                    Some(pending) => self.deferred.push_back(pending),
                }
            }
            if !progressed || self.deferred.is_empty() {
                break;
            }
        }
    }

    /// hands the message back if the deck is not ready for it
    fn try_handle(
        &mut self,
        sender: UserId,
        message: DeckMessage,
        ctx: &mut TableContext<'_>,
    ) -> Option<(UserId, DeckMessage)> {
        let has_game = self.game.is_some();
        let has_initial = self
            .game
            .as_ref()
            .is_some_and(|g| g.deck_at(0).is_some());
        let locked = self.game.as_ref().is_some_and(MentalPokerGame::is_locked);

        let ready = match &message {
            DeckMessage::PlayerDetails { .. } => self.shuffling,
            DeckMessage::Initial { .. } | DeckMessage::Draw { .. } | DeckMessage::CardFlip { .. } => {
                has_game
            }
            DeckMessage::Shuffled { .. } | DeckMessage::Locked { .. } => has_initial,
            DeckMessage::CardSecret { .. } => locked,
        };
        if !ready {
            tracing::debug!("deck {} deferring {} from {}", self.id, message.kind(), sender);
            return Some((sender, message));
        }

        match message {
            DeckMessage::PlayerDetails {
                player_number,
                player_details,
            } => self.on_player_details(player_number, player_details, ctx),
            DeckMessage::Initial { deck } => self.on_initial(deck),
            DeckMessage::Shuffled { deck, next_player } => self.on_shuffled(deck, next_player, ctx),
            DeckMessage::Locked { deck, next_player } => self.on_locked(deck, next_player, ctx),
            DeckMessage::Draw { card_id } => self.on_draw(sender, card_id, ctx),
            DeckMessage::CardSecret {
                card_id,
                player_number,
                secret,
            } => self.on_card_secret(card_id, player_number, &secret, ctx),
            DeckMessage::CardFlip { card_id } => self.on_card_flip(card_id, ctx),
        }
        None
    }

    fn on_player_details(
        &mut self,
        player_number: usize,
        details: PlayerDetails,
        ctx: &mut TableContext<'_>,
    ) {
        if player_number >= self.players.len() {
            self.fault(MentalPokerError::UnknownPlayer(player_number).into());
            return;
        }
        if self.game.is_some() || self.players[player_number].is_some() {
            tracing::debug!(
                "deck {} ignoring repeated details for player {}",
                self.id,
                player_number
            );
            return;
        }

        match MentalPokerPlayer::from_details(&details) {
            Ok(player) => self.players[player_number] = Some(player),
            Err(e) => {
                self.fault(DeckError::Malformed {
                    kind: "deck/playerdetails",
                    reason: e.to_string(),
                });
                return;
            }
        }
        self.check_all_player_details(ctx);
    }

    fn check_all_player_details(&mut self, ctx: &mut TableContext<'_>) {
        if self.game.is_some() || self.players.iter().any(Option::is_none) {
            return;
        }

        let me = ctx.seating.player_number;
        let players = self.players.iter_mut().filter_map(Option::take).collect();
        match MentalPokerGame::new(players, me) {
            Ok(game) => self.game = Some(game),
            Err(e) => {
                self.fault(e.into());
                return;
            }
        }
        self.waits.remove(&WaitStage::PlayerDetails);
        self.waits.insert(WaitStage::Shuffle, ctx.now);
        tracing::debug!("deck {} has every player's details", self.id);

        if me != 0 {
            return;
        }
        let initial = match self.game.as_mut().map(|g| g.generate_initial_deck().map(DeckPayload::encode)) {
            Some(Ok(deck)) => deck,
            Some(Err(e)) => {
                self.fault(e.into());
                return;
            }
            None => return,
        };
        self.send(ctx, DeckMessage::Initial { deck: initial });
        self.do_shuffle(ctx);
    }

    fn on_initial(&mut self, deck: DeckPayload) {
        let outcome = self.decode(&deck, "deck/initial").and_then(|points| {
            let game = self.game.as_mut().ok_or(DeckError::NotShuffled)?;
            if !game.is_initial_deck(&points) {
                return Err(DeckError::InvalidInitialDeck);
            }
            game.add_deck_to_sequence(0, points)?;
            Ok(())
        });
        if let Err(e) = outcome {
            self.fault(e);
        }
    }

    fn on_shuffled(&mut self, deck: DeckPayload, next_player: usize, ctx: &mut TableContext<'_>) {
        let n = self.number_of_players();
        if next_player >= n {
            self.fault(MentalPokerError::UnknownPlayer(next_player).into());
            return;
        }
        let contributor = (next_player + n - 1) % n;
        if !self.store(Phase::Shuffle, contributor, &deck, "deck/shuffled") {
            return;
        }

        let me = ctx.seating.player_number;
        if next_player == me {
            if me > 0 {
                self.do_shuffle(ctx);
            } else {
                self.do_lock(ctx);
            }
        }
    }

    fn on_locked(&mut self, deck: DeckPayload, next_player: Option<usize>, ctx: &mut TableContext<'_>) {
        let n = self.number_of_players();
        let contributor = match next_player {
            None => n - 1,
            Some(next) if next > 0 && next < n => next - 1,
            Some(next) => {
                self.fault(DeckError::Malformed {
                    kind: "deck/locked",
                    reason: format!("nextPlayer {} out of range", next),
                });
                return;
            }
        };
        if !self.store(Phase::Lock, contributor, &deck, "deck/locked") {
            return;
        }

        match next_player {
            Some(next) if next == ctx.seating.player_number => self.do_lock(ctx),
            None => self.finish_shuffle(),
            Some(_) => {}
        }
    }

    fn on_draw(&mut self, sender: UserId, card_id: usize, ctx: &mut TableContext<'_>) {
        if card_id >= DECK_SIZE {
            self.fault(MentalPokerError::CardIndexOutOfRange(card_id).into());
            return;
        }
        let Some(player) = ctx.seating.player_number_of(&sender) else {
            self.fault(DeckError::UnknownSender(sender));
            return;
        };
        if let Some(game) = self.game.as_mut() {
            game.mark_unpickable(card_id);
        }

        match self.own_secret(card_id) {
            Ok((me, secret)) => {
                tracing::debug!("deck {} sending secret for card {} to {}", self.id, card_id, sender);
                ctx.outbox.send_privately(
                    sender,
                    DeckMessage::CardSecret {
                        card_id,
                        player_number: me,
                        secret,
                    }
                    .into_message(self.id),
                );
            }
            Err(e) => self.fault(e),
        }
        self.emit(DeckEvent::Drawn { card_id, player });
    }

    fn on_card_secret(
        &mut self,
        card_id: usize,
        player_number: usize,
        secret: &str,
        ctx: &mut TableContext<'_>,
    ) {
        if card_id >= DECK_SIZE {
            self.fault(MentalPokerError::CardIndexOutOfRange(card_id).into());
            return;
        }
        let scalar = match decode_scalar(secret) {
            Ok(scalar) => scalar,
            Err(e) => {
                self.fault(DeckError::Malformed {
                    kind: "deck/cardsecret",
                    reason: e.to_string(),
                });
                return;
            }
        };

        let Some(game) = self.game.as_mut() else {
            return;
        };
        if player_number == game.local_player_number() {
            return;
        }
        let inserted = match game.player_mut(player_number) {
            Some(player) => player.add_secret(card_id, scalar),
            None => Err(MentalPokerError::UnknownPlayer(player_number)),
        };

        match inserted {
            Ok(SecretInsert::Inserted) => self.check_all_card_secrets(card_id, ctx),
            Ok(SecretInsert::Duplicate) => {
                tracing::debug!(
                    "deck {} already has player {}'s secret for card {}",
                    self.id,
                    player_number,
                    card_id
                );
            }
            Err(MentalPokerError::ConflictingSecret(_)) => self.fault(DeckError::ConflictingSecret {
                card_id,
                player: player_number,
            }),
            Err(e) => self.fault(e.into()),
        }
    }

    fn on_card_flip(&mut self, card_id: usize, ctx: &mut TableContext<'_>) {
        if card_id >= DECK_SIZE {
            self.fault(MentalPokerError::CardIndexOutOfRange(card_id).into());
            return;
        }
        match self.own_secret(card_id) {
            Ok((me, secret)) => self.send(
                ctx,
                DeckMessage::CardSecret {
                    card_id,
                    player_number: me,
                    secret,
                },
            ),
            Err(e) => {
                self.fault(e);
                return;
            }
        }
        if !self.known_faces.contains_key(&card_id) {
            self.waits
                .entry(WaitStage::CardSecrets(card_id))
                .or_insert(ctx.now);
        }
    }

    fn do_shuffle(&mut self, ctx: &mut TableContext<'_>) {
        let Some(game) = self.game.as_mut() else {
            return;
        };
        let me = game.local_player_number();
        let next_player = (me + 1) % game.number_of_players();
        let deck = match game.shuffle_deck(&mut OsRng).map(DeckPayload::encode) {
            Ok(deck) => deck,
            Err(e) => {
                self.fault(e.into());
                return;
            }
        };

        tracing::debug!("deck {} shuffled by player {}, next {}", self.id, me, next_player);
        self.send(ctx, DeckMessage::Shuffled { deck, next_player });
        if next_player == me {
            self.do_lock(ctx);
        }
    }

    fn do_lock(&mut self, ctx: &mut TableContext<'_>) {
        let Some(game) = self.game.as_mut() else {
            return;
        };
        let me = game.local_player_number();
        let n = game.number_of_players();
        let deck = match game.lock_deck().map(DeckPayload::encode) {
            Ok(deck) => deck,
            Err(e) => {
                self.fault(e.into());
                return;
            }
        };

        tracing::debug!("deck {} locked by player {}", self.id, me);
        if me + 1 < n {
            self.send(
                ctx,
                DeckMessage::Locked {
                    deck,
                    next_player: Some(me + 1),
                },
            );
        } else {
            self.send(
                ctx,
                DeckMessage::Locked {
                    deck,
                    next_player: None,
                },
            );
            self.finish_shuffle();
        }
    }

    fn finish_shuffle(&mut self) {
        if self.shuffled {
            return;
        }
        self.shuffled = true;
        self.waits.remove(&WaitStage::Shuffle);

        if let Some(deck) = self.game.as_ref().and_then(MentalPokerGame::final_deck) {
            let commitment = deck_commitment(deck);
            tracing::info!(
                "deck {} shuffled, final deck {}",
                self.id,
                hex::encode(&commitment[..8])
            );
        }
        self.emit(DeckEvent::ShuffleFinish);
    }

    fn check_all_card_secrets(&mut self, card_id: usize, ctx: &mut TableContext<'_>) {
        if self.known_faces.contains_key(&card_id) {
            return;
        }
        let Some(game) = self.game.as_mut() else {
            return;
        };
        if !game.is_locked() || !game.has_all_secrets(card_id) {
            return;
        }

        match game.draw_card(card_id) {
            Ok(Some(identity)) => self.resolve(card_id, identity, ctx),
            Ok(None) => {
                self.waits.remove(&WaitStage::CardSecrets(card_id));
                self.fault(DeckError::Decryption { card_id });
            }
            Err(e) => self.fault(e.into()),
        }
    }

    fn resolve(&mut self, card_id: usize, identity: usize, ctx: &mut TableContext<'_>) {
        self.waits.remove(&WaitStage::CardSecrets(card_id));

        if identity > max_fair_identity(self.faces.len()) {
            // excess region: the card stays burned and an owner draws again
            let was_own = self.own_cards.remove(&card_id);
            tracing::debug!(
                "deck {} card {} decrypted to unfair identity {}",
                self.id,
                card_id,
                identity
            );
            if was_own {
                if let Err(e) = self.draw_card(None, ctx) {
                    self.fault(e);
                }
            }
            return;
        }

        let face = self.faces[identity % self.faces.len()].clone();
        self.known_faces.insert(card_id, face.clone());
        if self.own_cards.contains(&card_id) {
            self.emit(DeckEvent::SecretlyKnownFace { card_id, face });
        } else {
            self.emit(DeckEvent::PublicKnownFace { card_id, face });
        }
    }

    fn own_secret(&self, card_id: usize) -> Result<(usize, String), DeckError> {
        let game = self.game.as_ref().ok_or(DeckError::NotShuffled)?;
        let me = game.local_player_number();
        let secret = game
            .player(me)
            .and_then(|p| p.secret(card_id))
            .ok_or(MentalPokerError::MissingKeys)?;
        Ok((me, encode_scalar(secret)))
    }

    /// store a received deck at the contributor's slot
    ///
    /// returns true if the deck is new and the round should continue.
    fn store(&mut self, phase: Phase, contributor: usize, deck: &DeckPayload, kind: &'static str) -> bool {
        let outcome = self.decode(deck, kind).and_then(|points| {
            let game = self.game.as_mut().ok_or(DeckError::NotShuffled)?;
            let position = game.position(phase, contributor);
            Ok(game.add_deck_to_sequence(position, points)?)
        });
        match outcome {
            Ok(fresh) => fresh,
            Err(e) => {
                self.fault(e);
                false
            }
        }
    }

    fn decode(&self, deck: &DeckPayload, kind: &'static str) -> Result<Vec<RistrettoPoint>, DeckError> {
        deck.decode().map_err(|e| DeckError::Malformed {
            kind,
            reason: e.to_string(),
        })
    }

    fn number_of_players(&self) -> usize {
        self.game
            .as_ref()
            .map_or(self.players.len(), MentalPokerGame::number_of_players)
    }

    fn send(&self, ctx: &mut TableContext<'_>, message: DeckMessage) {
        ctx.outbox.broadcast(message.into_message(self.id));
    }

    fn fault(&mut self, error: DeckError) {
        tracing::warn!("deck {}: {}", self.id, error);
        self.emit(DeckEvent::Error(error));
    }

    fn emit(&mut self, event: DeckEvent) {
        match &event {
            DeckEvent::ShuffleFinish => self.on.shuffle_finish.dispatch(()),
            DeckEvent::Drawn { card_id, player } => self.on.drawn.dispatch((*card_id, *player)),
            DeckEvent::SecretlyKnownFace { card_id, face } => {
                self.on.secretly_known_face.dispatch((*card_id, face.clone()))
            }
            DeckEvent::PublicKnownFace { card_id, face } => {
                self.on.public_known_face.dispatch((*card_id, face.clone()))
            }
            DeckEvent::Error(error) => self.on.error.dispatch(error.clone()),
        }
        self.events.push(event);
    }
}
