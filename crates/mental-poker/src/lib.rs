//! mental-poker: commutative-encryption card engine over ristretto255
//!
//! every player blinds the whole deck with their own scalar keys. because
//! scalar multiplication commutes, N players can jointly shuffle, lock and
//! later reveal single cards without a trusted dealer:
//!
//! ```text
//! E_k(P) = k * P          D_k(Q) = k^-1 * Q
//! D_a(D_b(E_b(E_a(P)))) = P   (in any order)
//! ```
//!
//! ## deck sequence
//!
//! ```text
//! [0]          initial deck (sum of every player's codeword fragments)
//! [1 ..= N]    shuffle phase, one entry per player (permute + shuffle key)
//! [N+1 ..= 2N] lock phase, one entry per player (remove shuffle key,
//!              apply per-card lock secret)
//! ```
//!
//! revealing card j needs every player's lock secret for position j.

pub mod codec;
pub mod game;
pub mod player;


pub use codec::{DeckPayload, PlayerDetails};
pub use game::{deck_commitment, MentalPokerGame, Phase};
pub use player::{MentalPokerPlayer, SecretInsert};

/// number of card positions in every mental poker deck
pub const DECK_SIZE: usize = 52;

/// mental poker engine errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MentalPokerError {
    #[error("deck size mismatch: expected {expected}, got {got}")]
    DeckSizeMismatch { expected: usize, got: usize },
    #[error("invalid permutation: not a bijection")]
    InvalidPermutation,
    #[error("card index {0} out of range")]
    CardIndexOutOfRange(usize),
    #[error("player {0} does not exist")]
    UnknownPlayer(usize),
    #[error("need at least one player")]
    NoPlayers,
    #[error("only player 0 generates the initial deck")]
    NotInitiator,
    #[error("deck sequence has no slot {0}")]
    InvalidSequencePosition(usize),
    #[error("deck sequence slot {0} is missing")]
    MissingDeckState(usize),
    #[error("deck sequence slot {0} already holds a different deck")]
    DeckStateConflict(usize),
    #[error("local player keys have not been generated")]
    MissingKeys,
    #[error("codeword {0} is not a distinct card encoding")]
    DegenerateCodeword(usize),
    #[error("player {player} has not revealed a secret for card {index}")]
    MissingSecret { player: usize, index: usize },
    #[error("conflicting secret for card {0}")]
    ConflictingSecret(usize),
    #[error("deck is not locked yet")]
    NotLocked,
    #[error("invalid hex encoding: {0}")]
    InvalidHex(String),
    #[error("invalid point encoding")]
    InvalidPoint,
    #[error("invalid scalar encoding")]
    InvalidScalar,
}

pub type Result<T> = core::result::Result<T, MentalPokerError>;

/// a permutation of indices 0..n
#[derive(Clone, Debug)]
pub struct Permutation {
    mapping: Vec<usize>,
}

impl Permutation {
    /// create a new permutation from a mapping
    pub fn new(mapping: Vec<usize>) -> Result<Self> {
        let n = mapping.len();
        let mut seen = vec![false; n];

        for &idx in &mapping {
            if idx >= n || seen[idx] {
                return Err(MentalPokerError::InvalidPermutation);
            }
            seen[idx] = true;
        }

        Ok(Self { mapping })
    }

    /// create a random permutation using fisher-yates
    pub fn random<R: rand::Rng + ?Sized>(rng: &mut R, n: usize) -> Self {
        let mut mapping: Vec<usize> = (0..n).collect();
        for i in (1..n).rev() {
            let j = rng.gen_range(0..=i);
            mapping.swap(i, j);
        }
        Self { mapping }
    }

    /// apply permutation: output[i] = input[perm[i]]
    pub fn apply<T: Clone>(&self, input: &[T]) -> Result<Vec<T>> {
        if input.len() != self.mapping.len() {
            return Err(MentalPokerError::DeckSizeMismatch {
                expected: self.mapping.len(),
                got: input.len(),
            });
        }
        Ok(self.mapping.iter().map(|&i| input[i].clone()).collect())
    }

    /// length of permutation
    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    /// check if empty
    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }
}

/// highest card identity that still maps evenly onto `face_count` faces
///
/// identities above this bound fall in the excess region when `face_count`
/// does not divide the deck size and must be redrawn.
pub fn max_fair_identity(face_count: usize) -> usize {
    DECK_SIZE - 1 - (DECK_SIZE % face_count.max(1))
}
