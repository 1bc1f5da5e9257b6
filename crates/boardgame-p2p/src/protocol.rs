//! protocol - board game wire messages
//!
//! every message is a json object tagged by `type`. the tag prefix decides
//! which component handles it:
//!
//! ```text
//! deck/*   one Deck, selected by deckID
//! die/*    one Die, selected by dieID
//! piece/*  one Piece, selected by pieceID
//! start    the game itself
//! ```

use std::fmt;

use mental_poker::{DeckPayload, PlayerDetails};
use serde::{Deserialize, Serialize};

/// opaque peer identity handed out by the channel
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// per-game deck number, allocated in creation order
pub type DeckId = u32;
/// caller-chosen die name
pub type DieId = String;
/// caller-chosen piece name
pub type PieceId = String;

/// everything peers send each other
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    #[serde(rename = "deck/playerdetails")]
    PlayerDetails {
        #[serde(rename = "deckID")]
        deck_id: DeckId,
        #[serde(rename = "playerNumber")]
        player_number: usize,
        #[serde(rename = "playerDetails")]
        player_details: PlayerDetails,
    },
    #[serde(rename = "deck/initial")]
    Initial {
        #[serde(rename = "deckID")]
        deck_id: DeckId,
        deck: DeckPayload,
    },
    #[serde(rename = "deck/shuffled")]
    Shuffled {
        #[serde(rename = "deckID")]
        deck_id: DeckId,
        deck: DeckPayload,
        #[serde(rename = "nextPlayer")]
        next_player: usize,
    },
    /// a missing `nextPlayer` ends the lock round
    #[serde(rename = "deck/locked")]
    Locked {
        #[serde(rename = "deckID")]
        deck_id: DeckId,
        deck: DeckPayload,
        #[serde(
            rename = "nextPlayer",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        next_player: Option<usize>,
    },
    #[serde(rename = "deck/draw")]
    Draw {
        #[serde(rename = "deckID")]
        deck_id: DeckId,
        #[serde(rename = "cardID")]
        card_id: usize,
    },
    #[serde(rename = "deck/cardsecret")]
    CardSecret {
        #[serde(rename = "deckID")]
        deck_id: DeckId,
        #[serde(rename = "cardID")]
        card_id: usize,
        #[serde(rename = "playerNumber")]
        player_number: usize,
        secret: String,
    },
    #[serde(rename = "deck/cardflip")]
    CardFlip {
        #[serde(rename = "deckID")]
        deck_id: DeckId,
        #[serde(rename = "cardID")]
        card_id: usize,
    },
    #[serde(rename = "die/rollstart")]
    RollStart {
        #[serde(rename = "dieID")]
        die_id: DieId,
        #[serde(rename = "deckID")]
        deck_id: DeckId,
    },
    #[serde(rename = "piece/moved")]
    PieceMoved {
        #[serde(rename = "pieceID")]
        piece_id: PieceId,
        x: f64,
        y: f64,
    },
    #[serde(rename = "start")]
    Start {
        #[serde(rename = "userIDs")]
        user_ids: Vec<UserId>,
    },
}

/// the part of a deck message a Deck cares about
#[derive(Clone, Debug, PartialEq)]
pub enum DeckMessage {
    PlayerDetails {
        player_number: usize,
        player_details: PlayerDetails,
    },
    Initial {
        deck: DeckPayload,
    },
    Shuffled {
        deck: DeckPayload,
        next_player: usize,
    },
    Locked {
        deck: DeckPayload,
        next_player: Option<usize>,
    },
    Draw {
        card_id: usize,
    },
    CardSecret {
        card_id: usize,
        player_number: usize,
        secret: String,
    },
    CardFlip {
        card_id: usize,
    },
}

/// a message split by the component that handles it
#[derive(Clone, Debug, PartialEq)]
pub enum Routed {
    Deck { deck_id: DeckId, message: DeckMessage },
    Die { die_id: DieId, deck_id: DeckId },
    Piece { piece_id: PieceId, x: f64, y: f64 },
    Start { user_ids: Vec<UserId> },
}

/// protocol errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(String),
    #[error("failed to encode message: {0}")]
    Encode(String),
}

impl Message {
    /// wire tag, handy for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PlayerDetails { .. } => "deck/playerdetails",
            Self::Initial { .. } => "deck/initial",
            Self::Shuffled { .. } => "deck/shuffled",
            Self::Locked { .. } => "deck/locked",
            Self::Draw { .. } => "deck/draw",
            Self::CardSecret { .. } => "deck/cardsecret",
            Self::CardFlip { .. } => "deck/cardflip",
            Self::RollStart { .. } => "die/rollstart",
            Self::PieceMoved { .. } => "piece/moved",
            Self::Start { .. } => "start",
        }
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(json).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }

    /// split into the component that owns this message
    pub fn route(self) -> Routed {
        match self {
            Self::PlayerDetails {
                deck_id,
                player_number,
                player_details,
            } => Routed::Deck {
                deck_id,
                message: DeckMessage::PlayerDetails {
                    player_number,
                    player_details,
                },
            },
            Self::Initial { deck_id, deck } => Routed::Deck {
                deck_id,
                message: DeckMessage::Initial { deck },
            },
            Self::Shuffled {
                deck_id,
                deck,
                next_player,
            } => Routed::Deck {
                deck_id,
                message: DeckMessage::Shuffled { deck, next_player },
            },
            Self::Locked {
                deck_id,
                deck,
                next_player,
            } => Routed::Deck {
                deck_id,
                message: DeckMessage::Locked { deck, next_player },
            },
            Self::Draw { deck_id, card_id } => Routed::Deck {
                deck_id,
                message: DeckMessage::Draw { card_id },
            },
            Self::CardSecret {
                deck_id,
                card_id,
                player_number,
                secret,
            } => Routed::Deck {
                deck_id,
                message: DeckMessage::CardSecret {
                    card_id,
                    player_number,
                    secret,
                },
            },
            Self::CardFlip { deck_id, card_id } => Routed::Deck {
                deck_id,
                message: DeckMessage::CardFlip { card_id },
            },
            Self::RollStart { die_id, deck_id } => Routed::Die { die_id, deck_id },
            Self::PieceMoved { piece_id, x, y } => Routed::Piece { piece_id, x, y },
            Self::Start { user_ids } => Routed::Start { user_ids },
        }
    }
}

impl DeckMessage {
    /// attach the deck id again for sending
    pub fn into_message(self, deck_id: DeckId) -> Message {
        match self {
            Self::PlayerDetails {
                player_number,
                player_details,
            } => Message::PlayerDetails {
                deck_id,
                player_number,
                player_details,
            },
            Self::Initial { deck } => Message::Initial { deck_id, deck },
            Self::Shuffled { deck, next_player } => Message::Shuffled {
                deck_id,
                deck,
                next_player,
            },
            Self::Locked { deck, next_player } => Message::Locked {
                deck_id,
                deck,
                next_player,
            },
            Self::Draw { card_id } => Message::Draw { deck_id, card_id },
            Self::CardSecret {
                card_id,
                player_number,
                secret,
            } => Message::CardSecret {
                deck_id,
                card_id,
                player_number,
                secret,
            },
            Self::CardFlip { card_id } => Message::CardFlip { deck_id, card_id },
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::PlayerDetails { .. } => "deck/playerdetails",
            Self::Initial { .. } => "deck/initial",
            Self::Shuffled { .. } => "deck/shuffled",
            Self::Locked { .. } => "deck/locked",
            Self::Draw { .. } => "deck/draw",
            Self::CardSecret { .. } => "deck/cardsecret",
            Self::CardFlip { .. } => "deck/cardflip",
        }
    }
}
