//! Fingerprint algorithm selection.

use std::fmt;
use std::str::FromStr;

use rusty_chromaprint::Configuration;
use serde::{Deserialize, Serialize};

/// Selects the transform variant used to compute a fingerprint.
///
/// The integer ids are stable and match the ids written into the header
/// of a compact fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    Test1 = 0,
    #[serde(alias = "default")]
    Test2 = 1,
    Test3 = 2,
    Test4 = 3,
}

impl Algorithm {
    /// The algorithm used when none is specified (AcoustID compatible).
    pub const DEFAULT: Algorithm = Algorithm::Test2;

    /// All selectable algorithms, in id order.
    pub const ALL: [Algorithm; 4] = [
        Algorithm::Test1,
        Algorithm::Test2,
        Algorithm::Test3,
        Algorithm::Test4,
    ];

    /// Returns the stable integer id of this algorithm.
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Looks up an algorithm by its integer id.
    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.id() == id)
    }

    /// Returns the engine configuration preset for this algorithm.
    pub(crate) fn configuration(self) -> Configuration {
        match self {
            Algorithm::Test1 => Configuration::preset_test1(),
            Algorithm::Test2 => Configuration::preset_test2(),
            Algorithm::Test3 => Configuration::preset_test3(),
            Algorithm::Test4 => Configuration::preset_test4(),
        }
    }
}

impl Default for Algorithm {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Test1 => write!(f, "test1"),
            Self::Test2 => write!(f, "test2"),
            Self::Test3 => write!(f, "test3"),
            Self::Test4 => write!(f, "test4"),
        }
    }
}

impl FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "test1" | "0" => Ok(Self::Test1),
            "test2" | "1" | "default" => Ok(Self::Test2),
            "test3" | "2" => Ok(Self::Test3),
            "test4" | "3" => Ok(Self::Test4),
            other => Err(format!("unknown algorithm {other:?}")),
        }
    }
}
