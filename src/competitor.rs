use crate::constants::*;
use crate::error::{LedgerError, Result};
use chrono::NaiveDateTime;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Singles,
    Doubles,
}

impl Mode {
    pub fn default_file(self) -> &'static str {
        match self {
            Mode::Singles => SINGLES_FILE,
            Mode::Doubles => DOUBLES_FILE,
        }
    }

    pub fn competitor_sheet(self) -> &'static str {
        match self {
            Mode::Singles => PLAYERS_SHEET,
            Mode::Doubles => DUOS_SHEET,
        }
    }

    /// Number of name cells an identity occupies in the competitor sheet.
    pub fn name_columns(self) -> usize {
        match self {
            Mode::Singles => 1,
            Mode::Doubles => 2,
        }
    }

    pub fn competitor_header(self) -> Vec<&'static str> {
        let names: &[&str] = match self {
            Mode::Singles => &["Name"],
            Mode::Doubles => &["Player 1", "Player 2"],
        };
        let mut header = names.to_vec();
        header.extend(["ELO Rating", "Match History", "Match Count"]);
        header
    }

    pub fn match_header(self) -> Vec<&'static str> {
        let sides = match self {
            Mode::Singles => ["Player 1", "Player 2"],
            Mode::Doubles => ["Duo 1", "Duo 2"],
        };
        let mut header = sides.to_vec();
        header.extend([
            "Score 1",
            "Score 2",
            "ELO 1 Before",
            "ELO 1 After",
            "ELO 2 Before",
            "ELO 2 After",
            "Recorded At",
        ]);
        header
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Singles => f.write_str("singles"),
            Mode::Doubles => f.write_str("doubles"),
        }
    }
}

/// A competitor key. Duos are stored with their names in sorted order, so
/// both orderings of the same two players build equal identities.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Identity {
    Player(String),
    Duo(String, String),
}

fn check_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(LedgerError::InvalidName {
            reason: "name is empty".to_string(),
        });
    }
    // a duo cell splits at its first separator only if no name can lend it half of one
    let joiner = DUO_SEPARATOR.trim();
    if name.contains(DUO_SEPARATOR) || name.starts_with(joiner) || name.ends_with(joiner) {
        return Err(LedgerError::InvalidName {
            reason: format!("{name:?} clashes with the duo separator {DUO_SEPARATOR:?}"),
        });
    }
    Ok(name.to_string())
}

impl Identity {
    pub fn player(name: &str) -> Result<Self> {
        Ok(Identity::Player(check_name(name)?))
    }

    pub fn duo(first: &str, second: &str) -> Result<Self> {
        let first = check_name(first)?;
        let second = check_name(second)?;
        if first == second {
            return Err(LedgerError::InvalidName {
                reason: format!("{first:?} cannot partner themselves"),
            });
        }
        Ok(if first <= second {
            Identity::Duo(first, second)
        } else {
            Identity::Duo(second, first)
        })
    }

    /// Parses the single-cell rendering produced by `Display`.
    pub fn parse(mode: Mode, cell: &str) -> Result<Self> {
        match mode {
            Mode::Singles => Identity::player(cell),
            Mode::Doubles => match cell.split_once(DUO_SEPARATOR) {
                Some((a, b)) => Identity::duo(a, b),
                None => Err(LedgerError::InvalidName {
                    reason: format!("{cell:?} is not a duo"),
                }),
            },
        }
    }

    pub fn mode(&self) -> Mode {
        match self {
            Identity::Player(_) => Mode::Singles,
            Identity::Duo(..) => Mode::Doubles,
        }
    }

    pub fn names(&self) -> Vec<&str> {
        match self {
            Identity::Player(name) => vec![name.as_str()],
            Identity::Duo(a, b) => vec![a.as_str(), b.as_str()],
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Player(name) => f.write_str(name),
            Identity::Duo(a, b) => write!(f, "{a}{DUO_SEPARATOR}{b}"),
        }
    }
}

/// Append-only, human-readable log of the matches a competitor played.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct History(String);

impl History {
    pub fn push(&mut self, opponent: &Identity, own: u32, theirs: u32) {
        if !self.0.is_empty() {
            self.0.push(' ');
        }
        self.0.push_str(&format!("vs {opponent} ({own}-{theirs})"));
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for History {
    fn from(text: String) -> Self {
        Self(text)
    }
}

impl fmt::Display for History {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Competitor {
    pub identity: Identity,
    pub rating: f64,
    pub history: History,
    pub matches: u32,
}

impl Competitor {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            rating: ELO_BASE,
            history: History::default(),
            matches: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchRecord {
    pub a: Identity,
    pub b: Identity,
    pub score_a: u32,
    pub score_b: u32,
    pub a_before: f64,
    pub a_after: f64,
    pub b_before: f64,
    pub b_after: f64,
    pub recorded_at: Option<NaiveDateTime>,
}
