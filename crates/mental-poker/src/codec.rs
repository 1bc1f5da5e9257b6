//! wire encoding for points, scalars and player details
//!
//! points travel as hex of the 32-byte compressed ristretto encoding,
//! scalars as hex of their canonical little-endian bytes.

use curve25519_dalek::{
    ristretto::{CompressedRistretto, RistrettoPoint},
    scalar::Scalar,
};
use serde::{Deserialize, Serialize};

use crate::{MentalPokerError, Result};

/// encode a point as lowercase hex
pub fn encode_point(point: &RistrettoPoint) -> String {
    hex::encode(point.compress().as_bytes())
}

/// decode a hex point, rejecting anything that is not a valid ristretto encoding
pub fn decode_point(encoded: &str) -> Result<RistrettoPoint> {
    let bytes = hex::decode(encoded).map_err(|e| MentalPokerError::InvalidHex(e.to_string()))?;
    CompressedRistretto::from_slice(&bytes)
        .map_err(|_| MentalPokerError::InvalidPoint)?
        .decompress()
        .ok_or(MentalPokerError::InvalidPoint)
}

/// encode a scalar as lowercase hex
pub fn encode_scalar(scalar: &Scalar) -> String {
    hex::encode(scalar.as_bytes())
}

/// decode a hex scalar, rejecting non-canonical encodings
pub fn decode_scalar(encoded: &str) -> Result<Scalar> {
    let bytes = hex::decode(encoded).map_err(|e| MentalPokerError::InvalidHex(e.to_string()))?;
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|_| MentalPokerError::InvalidScalar)?;
    Option::<Scalar>::from(Scalar::from_canonical_bytes(bytes)).ok_or(MentalPokerError::InvalidScalar)
}

/// one deck state as sent over the wire
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeckPayload {
    pub points: Vec<String>,
}

impl DeckPayload {
    pub fn encode(points: &[RistrettoPoint]) -> Self {
        Self {
            points: points.iter().map(encode_point).collect(),
        }
    }

    pub fn decode(&self) -> Result<Vec<RistrettoPoint>> {
        self.points.iter().map(|p| decode_point(p)).collect()
    }
}

/// public half of a player's key material
///
/// `secrets` holds only lock secrets that have already been revealed;
/// a local player's own secrets are never part of this form.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerDetails {
    pub points: Vec<String>,
    #[serde(default)]
    pub secrets: Vec<Option<String>>,
}
