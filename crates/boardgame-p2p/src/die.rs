//! die - a fair n-sided die rolled on a fresh one-card deck
//!
//! the roller creates a deck, waits for it to shuffle, draws one card and
//! flips it as soon as it knows the face. everyone else learns the face
//! from the flip. the game drives these reactions from the deck's events.

use crate::deck::{DeckError, DeckEvent};
use crate::face::Face;
use crate::protocol::{DeckId, DieId};
use crate::signal::Signal;

#[derive(Debug, Default)]
pub struct DieSignals {
    pub error: Signal<DeckError>,
    pub roll_start: Signal<()>,
    pub roll_finish: Signal<Face>,
}

/// what the game should do with the die's deck after an event
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum DieReaction {
    Nothing,
    DrawCard,
    FlipCard(usize),
}

#[derive(Debug)]
pub struct Die {
    id: DieId,
    faces: Vec<Face>,
    rolling: bool,
    roll: Option<Roll>,
    pub on: DieSignals,
}

#[derive(Clone, Copy, Debug)]
struct Roll {
    deck_id: DeckId,
    /// this peer started the roll and draws the card
    roller: bool,
}

impl Die {
    pub fn new(id: DieId, faces: Vec<Face>) -> Self {
        Self {
            id,
            faces,
            rolling: false,
            roll: None,
            on: DieSignals::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    pub fn is_rolling(&self) -> bool {
        self.rolling
    }

    /// deck of the roll in progress or last finished
    pub fn deck_id(&self) -> Option<DeckId> {
        self.roll.map(|r| r.deck_id)
    }

    pub(crate) fn has_error_listener(&self) -> bool {
        self.on.error.num_listeners() > 0
    }

    pub(crate) fn begin_roll(&mut self, deck_id: DeckId, roller: bool) {
        self.rolling = true;
        self.roll = Some(Roll { deck_id, roller });
        self.on.roll_start.dispatch(());
    }

    /// react to an event of deck `deck_id`
    pub(crate) fn handle_deck_event(&mut self, deck_id: DeckId, event: DeckEvent) -> DieReaction {
        let Some(roll) = self.roll.filter(|r| r.deck_id == deck_id) else {
            return DieReaction::Nothing;
        };

        match event {
            DeckEvent::Error(error) => {
                self.fail(deck_id, error);
                DieReaction::Nothing
            }
            DeckEvent::ShuffleFinish if roll.roller => DieReaction::DrawCard,
            // the roller finishes on the public face its own flip produces
            DeckEvent::SecretlyKnownFace { card_id, .. } if roll.roller && self.rolling => {
                DieReaction::FlipCard(card_id)
            }
            DeckEvent::PublicKnownFace { face, .. } if self.rolling => {
                self.finish(face);
                DieReaction::Nothing
            }
            _ => DieReaction::Nothing,
        }
    }

    /// report a fault of deck `deck_id`. faults that leave the roll
    /// without a face end it, so the die can be rolled again.
    pub(crate) fn fail(&mut self, deck_id: DeckId, error: DeckError) {
        let current = self.roll.is_some_and(|r| r.deck_id == deck_id);
        if current && self.rolling && ends_roll(&error) {
            tracing::warn!("die {} roll on deck {} aborted: {}", self.id, deck_id, error);
            self.rolling = false;
            self.roll = None;
        }
        self.on.error.dispatch(error);
    }

    fn finish(&mut self, face: Face) {
        self.rolling = false;
        tracing::info!("die {} rolled {}", self.id, face);
        self.on.roll_finish.dispatch(face);
    }
}

fn ends_roll(error: &DeckError) -> bool {
    matches!(
        error,
        DeckError::Timeout { .. }
            | DeckError::Decryption { .. }
            | DeckError::InvalidInitialDeck
            | DeckError::NoPickableCards
    )
}
