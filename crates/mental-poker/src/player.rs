//! per-player key material
//!
//! a player owns:
//! - 52 public codeword fragments (summed across players into the plaintext deck)
//! - one private shuffle key, applied to every card during the shuffle phase
//! - 52 private lock secrets, one per deck position, revealed card by card
//!
//! remote players start with fragments only; their lock secrets arrive one
//! at a time as cards are drawn or flipped.

use curve25519_dalek::{ristretto::RistrettoPoint, scalar::Scalar};
use rand::{CryptoRng, RngCore};

use crate::codec::{decode_point, decode_scalar, encode_point, encode_scalar, PlayerDetails};
use crate::{MentalPokerError, Result, DECK_SIZE};

/// outcome of adding a revealed secret
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SecretInsert {
    /// secret was unknown and is now stored
    Inserted,
    /// identical secret was already stored
    Duplicate,
}

/// one player's view of a mental poker participant
#[derive(Clone, Debug, Default)]
pub struct MentalPokerPlayer {
    points: Vec<RistrettoPoint>,
    shuffle_key: Option<Scalar>,
    secrets: Vec<Option<Scalar>>,
}

/// sample a scalar that is guaranteed to be invertible
pub(crate) fn random_nonzero_scalar<R: RngCore + CryptoRng>(rng: &mut R) -> Scalar {
    loop {
        let s = Scalar::random(&mut *rng);
        if s != Scalar::ZERO {
            return s;
        }
    }
}

impl MentalPokerPlayer {
    /// empty player, keys not generated yet
    pub fn new() -> Self {
        Self::default()
    }

    /// generate this player's public codeword fragments
    pub fn generate_points<R: RngCore + CryptoRng>(&mut self, rng: &mut R) {
        self.points = (0..DECK_SIZE).map(|_| RistrettoPoint::random(&mut *rng)).collect();
    }

    /// generate the private shuffle key and one lock secret per deck position
    pub fn generate_secrets<R: RngCore + CryptoRng>(&mut self, rng: &mut R) {
        self.shuffle_key = Some(random_nonzero_scalar(&mut *rng));
        self.secrets = (0..DECK_SIZE).map(|_| Some(random_nonzero_scalar(&mut *rng))).collect();
    }

    /// rebuild a remote player from its wire form
    pub fn from_details(details: &PlayerDetails) -> Result<Self> {
        if details.points.len() != DECK_SIZE {
            return Err(MentalPokerError::DeckSizeMismatch {
                expected: DECK_SIZE,
                got: details.points.len(),
            });
        }
        if details.secrets.len() > DECK_SIZE {
            return Err(MentalPokerError::DeckSizeMismatch {
                expected: DECK_SIZE,
                got: details.secrets.len(),
            });
        }

        let points = details
            .points
            .iter()
            .map(|p| decode_point(p))
            .collect::<Result<Vec<_>>>()?;

        let mut secrets = vec![None; DECK_SIZE];
        for (index, secret) in details.secrets.iter().enumerate() {
            if let Some(encoded) = secret {
                secrets[index] = Some(decode_scalar(encoded)?);
            }
        }

        Ok(Self {
            points,
            shuffle_key: None,
            secrets,
        })
    }

    /// wire-safe form: fragments plus secrets that are already public
    pub fn to_details(&self) -> PlayerDetails {
        let secrets = if self.is_local() {
            vec![None; self.secrets.len()]
        } else {
            self.secrets
                .iter()
                .map(|s| s.as_ref().map(encode_scalar))
                .collect()
        };

        PlayerDetails {
            points: self.points.iter().map(encode_point).collect(),
            secrets,
        }
    }

    /// true for the player whose private keys live in this process
    pub fn is_local(&self) -> bool {
        self.shuffle_key.is_some()
    }

    /// store a revealed lock secret
    ///
    /// re-delivery of the same value is a no-op. a different value for a
    /// position that already has one is rejected and the first value kept.
    pub fn add_secret(&mut self, index: usize, secret: Scalar) -> Result<SecretInsert> {
        if index >= DECK_SIZE {
            return Err(MentalPokerError::CardIndexOutOfRange(index));
        }
        if self.secrets.len() < DECK_SIZE {
            self.secrets.resize(DECK_SIZE, None);
        }

        match self.secrets[index] {
            Some(existing) if existing == secret => Ok(SecretInsert::Duplicate),
            Some(_) => Err(MentalPokerError::ConflictingSecret(index)),
            None => {
                self.secrets[index] = Some(secret);
                Ok(SecretInsert::Inserted)
            }
        }
    }

    pub fn secret(&self, index: usize) -> Option<&Scalar> {
        self.secrets.get(index).and_then(|s| s.as_ref())
    }

    pub fn has_secret(&self, index: usize) -> bool {
        self.secret(index).is_some()
    }

    pub fn points(&self) -> &[RistrettoPoint] {
        &self.points
    }

    pub(crate) fn shuffle_key(&self) -> Option<&Scalar> {
        self.shuffle_key.as_ref()
    }
}
