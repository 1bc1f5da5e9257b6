//! card and die faces

use std::fmt;

use mental_poker::DECK_SIZE;
use serde::{Deserialize, Serialize};

/// smallest number of faces a deck or die may have
pub const MIN_FACES: usize = 2;
/// largest number of faces, one per card position
pub const MAX_FACES: usize = DECK_SIZE;

/// what a card shows once revealed
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Face {
    Number(u32),
    Label(String),
}

impl fmt::Display for Face {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Label(label) => f.write_str(label),
        }
    }
}

impl From<u32> for Face {
    fn from(n: u32) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for Face {
    fn from(label: &str) -> Self {
        Self::Label(label.to_owned())
    }
}

impl From<String> for Face {
    fn from(label: String) -> Self {
        Self::Label(label)
    }
}

/// faces of a die: numbered 1..=n or a custom list
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DieFaces {
    Count(usize),
    Custom(Vec<Face>),
}

impl Default for DieFaces {
    fn default() -> Self {
        Self::Count(6)
    }
}

impl DieFaces {
    pub fn len(&self) -> usize {
        match self {
            Self::Count(n) => *n,
            Self::Custom(faces) => faces.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_faces(self) -> Vec<Face> {
        match self {
            Self::Count(n) => (1..=n as u32).map(Face::Number).collect(),
            Self::Custom(faces) => faces,
        }
    }
}

/// true if `count` faces fit a deck
pub fn valid_face_count(count: usize) -> bool {
    (MIN_FACES..=MAX_FACES).contains(&count)
}
