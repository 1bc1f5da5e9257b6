//! one deck's worth of mental poker state
//!
//! the deck sequence has a fixed slot per contribution so that decks
//! arriving from different senders in any order land in the right place:
//!
//! ```text
//! slot 0        initial deck (codewords)
//! slot 1+p      player p's shuffle output
//! slot 1+N+p    player p's lock output
//! ```
//!
//! player p shuffles slot p and locks slot N+p. slot 2N is the final deck
//! every draw decrypts from.

use std::collections::{BTreeSet, HashMap};

use blake2::{Blake2s256, Digest};
use curve25519_dalek::{ristretto::RistrettoPoint, scalar::Scalar, traits::Identity};
use rand::{seq::SliceRandom, CryptoRng, Rng, RngCore};

use crate::player::MentalPokerPlayer;
use crate::{MentalPokerError, Permutation, Result, DECK_SIZE};

const DECK_COMMITMENT_DOMAIN_SEP: &[u8] = b"mental-poker.deck.v1";

/// the two encryption rounds every player contributes to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// permute and apply the shuffle key
    Shuffle,
    /// swap the shuffle key for per-card lock secrets
    Lock,
}

/// commutative-encryption engine for a single deck
#[derive(Clone, Debug)]
pub struct MentalPokerGame {
    players: Vec<MentalPokerPlayer>,
    local: usize,
    codewords: Vec<RistrettoPoint>,
    codeword_index: HashMap<[u8; 32], usize>,
    deck_sequence: Vec<Option<Vec<RistrettoPoint>>>,
    unpickable: BTreeSet<usize>,
}

impl MentalPokerGame {
    /// build the engine once every player's fragments are known
    ///
    /// `local` must be the player holding private keys.
    pub fn new(players: Vec<MentalPokerPlayer>, local: usize) -> Result<Self> {
        if players.is_empty() {
            return Err(MentalPokerError::NoPlayers);
        }
        if local >= players.len() {
            return Err(MentalPokerError::UnknownPlayer(local));
        }
        if !players[local].is_local() {
            return Err(MentalPokerError::MissingKeys);
        }
        for player in &players {
            if player.points().len() != DECK_SIZE {
                return Err(MentalPokerError::DeckSizeMismatch {
                    expected: DECK_SIZE,
                    got: player.points().len(),
                });
            }
        }

        let codewords: Vec<RistrettoPoint> = (0..DECK_SIZE)
            .map(|j| players.iter().map(|p| p.points()[j]).sum())
            .collect();
        // fragments are chosen by the players, so a late one could merge two
        // identities or cancel a card to the identity point
        let mut codeword_index = HashMap::with_capacity(DECK_SIZE);
        for (j, codeword) in codewords.iter().enumerate() {
            if *codeword == RistrettoPoint::identity() {
                return Err(MentalPokerError::DegenerateCodeword(j));
            }
            if codeword_index
                .insert(codeword.compress().to_bytes(), j)
                .is_some()
            {
                return Err(MentalPokerError::DegenerateCodeword(j));
            }
        }

        let slots = 2 * players.len() + 1;
        Ok(Self {
            players,
            local,
            codewords,
            codeword_index,
            deck_sequence: vec![None; slots],
            unpickable: BTreeSet::new(),
        })
    }

    pub fn number_of_players(&self) -> usize {
        self.players.len()
    }

    pub fn local_player_number(&self) -> usize {
        self.local
    }

    pub fn player(&self, number: usize) -> Option<&MentalPokerPlayer> {
        self.players.get(number)
    }

    pub fn player_mut(&mut self, number: usize) -> Option<&mut MentalPokerPlayer> {
        self.players.get_mut(number)
    }

    /// plaintext encoding of every card identity
    pub fn codewords(&self) -> &[RistrettoPoint] {
        &self.codewords
    }

    /// sequence slot holding `player`'s output for `phase`
    pub fn position(&self, phase: Phase, player: usize) -> usize {
        match phase {
            Phase::Shuffle => 1 + player,
            Phase::Lock => 1 + self.players.len() + player,
        }
    }

    /// slot of the fully locked deck
    pub fn final_position(&self) -> usize {
        2 * self.players.len()
    }

    pub fn deck_at(&self, position: usize) -> Option<&[RistrettoPoint]> {
        self.deck_sequence.get(position)?.as_deref()
    }

    pub fn is_initial_deck(&self, deck: &[RistrettoPoint]) -> bool {
        deck == self.codewords.as_slice()
    }

    /// put the codewords into slot 0. only player 0 starts a deck.
    pub fn generate_initial_deck(&mut self) -> Result<&[RistrettoPoint]> {
        if self.local != 0 {
            return Err(MentalPokerError::NotInitiator);
        }
        let initial = self.codewords.clone();
        self.store(0, initial)
    }

    /// record a deck received from another player
    ///
    /// returns false when the slot already holds this exact deck.
    pub fn add_deck_to_sequence(
        &mut self,
        position: usize,
        deck: Vec<RistrettoPoint>,
    ) -> Result<bool> {
        if position >= self.deck_sequence.len() {
            return Err(MentalPokerError::InvalidSequencePosition(position));
        }
        if deck.len() != DECK_SIZE {
            return Err(MentalPokerError::DeckSizeMismatch {
                expected: DECK_SIZE,
                got: deck.len(),
            });
        }
        match &self.deck_sequence[position] {
            Some(existing) if *existing == deck => Ok(false),
            Some(_) => Err(MentalPokerError::DeckStateConflict(position)),
            None => {
                self.deck_sequence[position] = Some(deck);
                Ok(true)
            }
        }
    }

    /// permute the local shuffle input and blind it with the shuffle key
    pub fn shuffle_deck<R: RngCore + CryptoRng>(&mut self, rng: &mut R) -> Result<&[RistrettoPoint]> {
        let input = self.input(self.local)?;
        let key = *self.players[self.local]
            .shuffle_key()
            .ok_or(MentalPokerError::MissingKeys)?;

        let permutation = Permutation::random(rng, DECK_SIZE);
        let shuffled = permutation
            .apply(&input)?
            .into_iter()
            .map(|point| key * point)
            .collect();

        let position = self.position(Phase::Shuffle, self.local);
        self.store(position, shuffled)
    }

    /// replace the shuffle key with one lock secret per position
    pub fn lock_deck(&mut self) -> Result<&[RistrettoPoint]> {
        let input = self.input(self.players.len() + self.local)?;
        let player = &self.players[self.local];
        let unshuffle = player
            .shuffle_key()
            .ok_or(MentalPokerError::MissingKeys)?
            .invert();

        let locked = input
            .into_iter()
            .enumerate()
            .map(|(j, point)| {
                let secret = player.secret(j).ok_or(MentalPokerError::MissingKeys)?;
                Ok(secret * unshuffle * point)
            })
            .collect::<Result<Vec<_>>>()?;

        let position = self.position(Phase::Lock, self.local);
        self.store(position, locked)
    }

    pub fn is_locked(&self) -> bool {
        self.final_deck().is_some()
    }

    pub fn final_deck(&self) -> Option<&[RistrettoPoint]> {
        self.deck_at(self.final_position())
    }

    /// decrypt the card at `index` with every player's lock secret
    ///
    /// `Ok(None)` means the secrets did not strip the deck down to a known
    /// codeword, i.e. somebody sent a bad secret or a bad deck.
    pub fn draw_card(&mut self, index: usize) -> Result<Option<usize>> {
        if index >= DECK_SIZE {
            return Err(MentalPokerError::CardIndexOutOfRange(index));
        }
        let point = self.final_deck().ok_or(MentalPokerError::NotLocked)?[index];

        let mut unlock = Scalar::ONE;
        for (number, player) in self.players.iter().enumerate() {
            let secret = player
                .secret(index)
                .ok_or(MentalPokerError::MissingSecret { player: number, index })?;
            unlock *= secret.invert();
        }

        let plain = (unlock * point).compress().to_bytes();
        let identity = self.codeword_index.get(&plain).copied();
        if identity.is_some() {
            self.unpickable.insert(index);
        }
        Ok(identity)
    }

    /// true once every player has revealed a secret for `index`
    pub fn has_all_secrets(&self, index: usize) -> bool {
        self.players.iter().all(|p| p.has_secret(index))
    }

    /// uniformly pick an index nobody has drawn yet
    pub fn random_pickable_card_index<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<usize> {
        let pickable: Vec<usize> = (0..DECK_SIZE).filter(|i| self.is_pickable(*i)).collect();
        pickable.choose(rng).copied()
    }

    /// returns false if the index was already unpickable
    pub fn mark_unpickable(&mut self, index: usize) -> bool {
        index < DECK_SIZE && self.unpickable.insert(index)
    }

    pub fn is_pickable(&self, index: usize) -> bool {
        index < DECK_SIZE && !self.unpickable.contains(&index)
    }

    pub fn pickable_count(&self) -> usize {
        DECK_SIZE - self.unpickable.len()
    }

    fn input(&self, position: usize) -> Result<Vec<RistrettoPoint>> {
        self.deck_sequence
            .get(position)
            .cloned()
            .flatten()
            .ok_or(MentalPokerError::MissingDeckState(position))
    }

    fn store(&mut self, position: usize, deck: Vec<RistrettoPoint>) -> Result<&[RistrettoPoint]> {
        let slot = self
            .deck_sequence
            .get_mut(position)
            .ok_or(MentalPokerError::InvalidSequencePosition(position))?;
        if slot.is_some() {
            return Err(MentalPokerError::DeckStateConflict(position));
        }
        Ok(slot.insert(deck).as_slice())
    }
}

/// blake2s digest of a deck state, short enough to compare between peers
pub fn deck_commitment(deck: &[RistrettoPoint]) -> [u8; 32] {
    let mut hasher = Blake2s256::new();
    hasher.update(DECK_COMMITMENT_DOMAIN_SEP);
    hasher.update((deck.len() as u64).to_le_bytes());
    for point in deck {
        hasher.update(point.compress().as_bytes());
    }
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_point, encode_point};
    use rand::rngs::OsRng;

    fn local_player() -> MentalPokerPlayer {
        let mut player = MentalPokerPlayer::new();
        player.generate_points(&mut OsRng);
        player.generate_secrets(&mut OsRng);
        player
    }

    #[test]
    fn test_new_validates_players() {
        assert_eq!(
            MentalPokerGame::new(vec![], 0).unwrap_err(),
            MentalPokerError::NoPlayers
        );
        assert_eq!(
            MentalPokerGame::new(vec![local_player()], 1).unwrap_err(),
            MentalPokerError::UnknownPlayer(1)
        );

        let remote = MentalPokerPlayer::from_details(&local_player().to_details()).unwrap();
        assert_eq!(
            MentalPokerGame::new(vec![remote], 0).unwrap_err(),
            MentalPokerError::MissingKeys
        );
    }

    #[test]
    fn test_new_rejects_colliding_codewords() {
        let honest = local_player();
        let points = honest.points();

        // a late player who saw the honest fragments folds card 1 onto card 0
        let mut forged = local_player().to_details();
        let evil0 = decode_point(&forged.points[0]).unwrap();
        forged.points[1] = encode_point(&(evil0 + points[0] - points[1]));
        let evil = MentalPokerPlayer::from_details(&forged).unwrap();
        assert_eq!(
            MentalPokerGame::new(vec![honest.clone(), evil], 0).unwrap_err(),
            MentalPokerError::DegenerateCodeword(1)
        );

        // or cancels card 5 out entirely
        let mut forged = local_player().to_details();
        forged.points[5] = encode_point(&-points[5]);
        let evil = MentalPokerPlayer::from_details(&forged).unwrap();
        assert_eq!(
            MentalPokerGame::new(vec![honest, evil], 0).unwrap_err(),
            MentalPokerError::DegenerateCodeword(5)
        );
    }

    #[test]
    fn test_only_player_zero_initiates() {
        let p0 = local_player();
        let p1 = local_player();
        let details = vec![
            MentalPokerPlayer::from_details(&p0.to_details()).unwrap(),
            p1,
        ];
        let mut game = MentalPokerGame::new(details, 1).unwrap();
        assert_eq!(
            game.generate_initial_deck().unwrap_err(),
            MentalPokerError::NotInitiator
        );
    }

    #[test]
    fn test_codewords_are_sum_of_fragments() {
        let p0 = local_player();
        let p1 = MentalPokerPlayer::from_details(&local_player().to_details()).unwrap();
        let expected = p0.points()[5] + p1.points()[5];

        let game = MentalPokerGame::new(vec![p0, p1], 0).unwrap();
        assert_eq!(game.codewords()[5], expected);
        assert!(game.is_initial_deck(&game.codewords().to_vec()));
    }

    #[test]
    fn test_single_player_round_trip() {
        let mut game = MentalPokerGame::new(vec![local_player()], 0).unwrap();
        game.generate_initial_deck().unwrap();
        game.shuffle_deck(&mut OsRng).unwrap();
        assert!(!game.is_locked());
        game.lock_deck().unwrap();
        assert!(game.is_locked());

        let mut seen: Vec<usize> = (0..DECK_SIZE)
            .map(|i| game.draw_card(i).unwrap().unwrap())
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..DECK_SIZE).collect::<Vec<_>>());
        assert_eq!(game.pickable_count(), 0);
        assert_eq!(game.random_pickable_card_index(&mut OsRng), None);
    }

    #[test]
    fn test_shuffle_twice_conflicts() {
        let mut game = MentalPokerGame::new(vec![local_player()], 0).unwrap();
        game.generate_initial_deck().unwrap();
        game.shuffle_deck(&mut OsRng).unwrap();
        assert_eq!(
            game.shuffle_deck(&mut OsRng).unwrap_err(),
            MentalPokerError::DeckStateConflict(1)
        );
    }

    #[test]
    fn test_lock_needs_shuffled_input() {
        let mut game = MentalPokerGame::new(vec![local_player()], 0).unwrap();
        game.generate_initial_deck().unwrap();
        assert_eq!(
            game.lock_deck().unwrap_err(),
            MentalPokerError::MissingDeckState(1)
        );
    }

    #[test]
    fn test_add_deck_to_sequence() {
        let mut game = MentalPokerGame::new(vec![local_player()], 0).unwrap();
        let deck = game.codewords().to_vec();

        assert!(game.add_deck_to_sequence(0, deck.clone()).unwrap());
        assert!(!game.add_deck_to_sequence(0, deck.clone()).unwrap());

        let mut other = deck.clone();
        other.swap(0, 1);
        assert_eq!(
            game.add_deck_to_sequence(0, other).unwrap_err(),
            MentalPokerError::DeckStateConflict(0)
        );
        assert_eq!(
            game.add_deck_to_sequence(3, deck.clone()).unwrap_err(),
            MentalPokerError::InvalidSequencePosition(3)
        );
        assert_eq!(
            game.add_deck_to_sequence(1, deck[..3].to_vec()).unwrap_err(),
            MentalPokerError::DeckSizeMismatch { expected: DECK_SIZE, got: 3 }
        );
    }

    #[test]
    fn test_draw_before_lock() {
        let mut game = MentalPokerGame::new(vec![local_player()], 0).unwrap();
        assert_eq!(game.draw_card(0).unwrap_err(), MentalPokerError::NotLocked);
        assert_eq!(
            game.draw_card(DECK_SIZE).unwrap_err(),
            MentalPokerError::CardIndexOutOfRange(DECK_SIZE)
        );
    }

    #[test]
    fn test_pickable_bookkeeping() {
        let mut game = MentalPokerGame::new(vec![local_player()], 0).unwrap();
        assert_eq!(game.pickable_count(), DECK_SIZE);

        assert!(game.mark_unpickable(4));
        assert!(!game.mark_unpickable(4));
        assert!(!game.mark_unpickable(DECK_SIZE));
        assert!(!game.is_pickable(4));
        assert_eq!(game.pickable_count(), DECK_SIZE - 1);

        for _ in 0..100 {
            let index = game.random_pickable_card_index(&mut OsRng).unwrap();
            assert_ne!(index, 4);
        }
    }

    #[test]
    fn test_deck_commitment_binds_order() {
        let game = MentalPokerGame::new(vec![local_player()], 0).unwrap();
        let deck = game.codewords().to_vec();
        let mut swapped = deck.clone();
        swapped.swap(10, 11);

        assert_eq!(deck_commitment(&deck), deck_commitment(&deck));
        assert_ne!(deck_commitment(&deck), deck_commitment(&swapped));
    }
}
