pub const ELO_BASE: f64 = 1500.0;
pub const ELO_STEP: f64 = 400.0;
pub const K_FACTOR: f64 = 32.0;

pub const SINGLES_FILE: &str = "badminton_league.json";
pub const DOUBLES_FILE: &str = "badminton_doubles.json";

pub const PLAYERS_SHEET: &str = "Players";
pub const DUOS_SHEET: &str = "Duos";
pub const MATCHES_SHEET: &str = "Match History";

/// Joins the two names of a duo wherever it is rendered as a single cell.
pub const DUO_SEPARATOR: &str = " & ";

pub const TIME_FORMAT: &str = "%F %T";
