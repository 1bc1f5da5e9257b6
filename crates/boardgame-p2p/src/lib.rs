//! boardgame-p2p: board game primitives for peers without a trusted dealer
//!
//! decks are shuffled jointly with mental poker, so no peer learns a card
//! until its owner draws it, and a die is a one-card draw from a fresh deck.
//! peers talk over a `Channel`; `LocalHub` connects peers in-process.
//!
//! ## game flow
//!
//! ```text
//! host:   Connection::open() → channel id → Game::url(base)
//! guest:  Connection::connect(id)
//! host:   Game::start() → start{userIDs} → every deck created so far shuffles
//! anyone: draw / flip / roll / move, results arrive through signals
//! ```
//!
//! the game is sans-io: feed it `ChannelEvent`s and it writes to its channel.
//! `Session` drives one game from a tokio task and checks timeouts.

pub mod channel;
pub mod config;
pub mod deck;
pub mod die;
pub mod face;
pub mod game;
pub mod piece;
pub mod protocol;
pub mod session;
pub mod signal;

pub use channel::{Channel, ChannelError, ChannelEvent, Connection, LocalChannel, LocalHub};
pub use config::{ConfigError, GameConfig};
pub use deck::{Deck, DeckError, DeckEvent, WaitStage};
pub use die::Die;
pub use face::{DieFaces, Face};
pub use game::{die_deck_id, Game, GameError, DIE_DECK_BASE};
pub use piece::Piece;
pub use protocol::{DeckId, DieId, Message, PieceId, ProtocolError, UserId};
pub use session::{Session, SessionHandle};
pub use signal::{ListenerId, Signal};
