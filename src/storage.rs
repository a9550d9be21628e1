use crate::competitor::{Competitor, History, Identity, MatchRecord, Mode};
use crate::constants::*;
use crate::error::StorageError;
use chrono::{Local, NaiveDateTime};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Reverse;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Everything the ledger persists. Competitors are kept in table order.
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub mode: Mode,
    pub competitors: Vec<Competitor>,
    pub matches: Vec<MatchRecord>,
}

impl State {
    pub fn empty(mode: Mode) -> Self {
        Self {
            mode,
            competitors: Vec::new(),
            matches: Vec::new(),
        }
    }
}

pub trait Storage {
    fn load(&mut self, mode: Mode) -> Result<State, StorageError>;

    fn save(&mut self, state: &State) -> Result<(), StorageError>;
}

/// Test backend: keeps the last saved state in memory and counts saves.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    pub state: Option<State>,
    pub saves: usize,
    #[cfg(test)]
    pub fail_saves: bool,
}

impl Storage for MemoryStorage {
    fn load(&mut self, mode: Mode) -> Result<State, StorageError> {
        Ok(self.state.clone().unwrap_or_else(|| State::empty(mode)))
    }

    fn save(&mut self, state: &State) -> Result<(), StorageError> {
        #[cfg(test)]
        if self.fail_saves {
            return Err(StorageError::Unavailable);
        }
        self.state = Some(state.clone());
        self.saves += 1;
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Workbook {
    sheets: Vec<Sheet>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Sheet {
    name: String,
    header: Vec<String>,
    #[serde(default)]
    rows: Vec<Vec<Value>>,
}

impl Sheet {
    fn new(name: &str, header: Vec<&str>) -> Self {
        Self {
            name: name.to_string(),
            header: header.into_iter().map(String::from).collect(),
            rows: Vec::new(),
        }
    }
}

impl Workbook {
    fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StorageError {
    let path = path.to_path_buf();
    move |source| StorageError::Io { path, source }
}

fn cell<'a>(row: &'a [Value], i: usize) -> &'a Value {
    row.get(i).unwrap_or(&Value::Null)
}

fn cell_str(row: &[Value], i: usize) -> Option<&str> {
    cell(row, i).as_str().filter(|s| !s.trim().is_empty())
}

fn cell_f64(row: &[Value], i: usize) -> Option<f64> {
    cell(row, i).as_f64()
}

fn cell_u32(row: &[Value], i: usize) -> Option<u32> {
    let v = cell(row, i);
    v.as_u64()
        .or_else(|| v.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
        .and_then(|n| u32::try_from(n).ok())
}

fn competitor_row(c: &Competitor) -> Vec<Value> {
    let mut row: Vec<Value> = c.identity.names().into_iter().map(Value::from).collect();
    row.push(Value::from(c.rating));
    row.push(Value::from(c.history.as_str()));
    row.push(Value::from(c.matches));
    row
}

fn match_row(m: &MatchRecord) -> Vec<Value> {
    vec![
        Value::from(m.a.to_string()),
        Value::from(m.b.to_string()),
        Value::from(m.score_a),
        Value::from(m.score_b),
        Value::from(m.a_before),
        Value::from(m.a_after),
        Value::from(m.b_before),
        Value::from(m.b_after),
        m.recorded_at
            .map(|t| Value::from(t.format(TIME_FORMAT).to_string()))
            .unwrap_or(Value::Null),
    ]
}

fn parse_competitor(mode: Mode, row: &[Value]) -> Option<Competitor> {
    let identity = match mode {
        Mode::Singles => Identity::player(cell_str(row, 0)?),
        Mode::Doubles => Identity::duo(cell_str(row, 0)?, cell_str(row, 1)?),
    }
    .ok()?;
    let n = mode.name_columns();
    Some(Competitor {
        identity,
        rating: cell_f64(row, n).unwrap_or(ELO_BASE),
        history: History::from(cell_str(row, n + 1).unwrap_or_default().to_string()),
        matches: cell_u32(row, n + 2).unwrap_or(0),
    })
}

fn parse_match(mode: Mode, row: &[Value]) -> Option<MatchRecord> {
    Some(MatchRecord {
        a: Identity::parse(mode, cell_str(row, 0)?).ok()?,
        b: Identity::parse(mode, cell_str(row, 1)?).ok()?,
        score_a: cell_u32(row, 2).unwrap_or(0),
        score_b: cell_u32(row, 3).unwrap_or(0),
        a_before: cell_f64(row, 4).unwrap_or(ELO_BASE),
        a_after: cell_f64(row, 5).unwrap_or(ELO_BASE),
        b_before: cell_f64(row, 6).unwrap_or(ELO_BASE),
        b_after: cell_f64(row, 7).unwrap_or(ELO_BASE),
        recorded_at: cell_str(row, 8)
            .and_then(|s| NaiveDateTime::parse_from_str(s, TIME_FORMAT).ok()),
    })
}

/// A JSON workbook with a competitor sheet and a match sheet, plus optional
/// CSV and HTML leaderboard exports written beside it.
#[derive(Debug, Clone)]
pub struct WorkbookStorage {
    path: PathBuf,
    export: bool,
}

impl WorkbookStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            export: true,
        }
    }

    pub fn with_export(mut self, export: bool) -> Self {
        self.export = export;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn csv_path(&self) -> PathBuf {
        self.path.with_extension("csv")
    }

    pub fn html_path(&self) -> PathBuf {
        self.path.with_extension("html")
    }

    fn tmp_path(&self) -> PathBuf {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }

    fn malformed(&self, reason: String) -> StorageError {
        StorageError::Malformed {
            path: self.path.clone(),
            reason,
        }
    }

    fn read_workbook(&self) -> Result<Workbook, StorageError> {
        let file = File::open(&self.path).map_err(io_err(&self.path))?;
        serde_json::from_reader(BufReader::new(file)).map_err(|source| StorageError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    fn write_workbook(&self, state: &State) -> Result<(), StorageError> {
        let mut players = Sheet::new(
            state.mode.competitor_sheet(),
            state.mode.competitor_header(),
        );
        players.rows = state.competitors.iter().map(competitor_row).collect();
        let mut matches = Sheet::new(MATCHES_SHEET, state.mode.match_header());
        matches.rows = state.matches.iter().map(match_row).collect();
        let workbook = Workbook {
            sheets: vec![players, matches],
        };

        // the old workbook stays intact until the new one is fully on disk
        let tmp = self.tmp_path();
        let file = File::create(&tmp).map_err(io_err(&tmp))?;
        let mut buf = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut buf, &workbook).map_err(|source| {
            StorageError::Parse {
                path: tmp.clone(),
                source,
            }
        })?;
        buf.into_inner()
            .map_err(|e| e.into_error())
            .and_then(|file| file.sync_all())
            .map_err(io_err(&tmp))?;
        fs::rename(&tmp, &self.path).map_err(io_err(&self.path))
    }

    fn write_csv(&self, state: &State) -> Result<(), StorageError> {
        let path = self.csv_path();
        let file = File::create(&path).map_err(io_err(&path))?;
        let mut buf = BufWriter::new(file);
        let names = match state.mode {
            Mode::Singles => "name",
            Mode::Doubles => "player1,player2",
        };
        let mut write = || -> std::io::Result<()> {
            writeln!(buf, "rank,{names},rating,matches")?;
            for (rank, c) in leaderboard(&state.competitors).into_iter().enumerate() {
                let names = c
                    .identity
                    .names()
                    .into_iter()
                    .map(csv_field)
                    .collect::<Vec<_>>()
                    .join(",");
                writeln!(buf, "{},{},{:.2},{}", rank + 1, names, c.rating, c.matches)?;
            }
            buf.flush()
        };
        write().map_err(io_err(&path))
    }

    fn write_html(&self, state: &State) -> Result<(), StorageError> {
        let path = self.html_path();
        let file = File::create(&path).map_err(io_err(&path))?;
        let mut buf = BufWriter::new(file);
        let title = match state.mode {
            Mode::Singles => "League Ranking",
            Mode::Doubles => "Doubles Ranking",
        };
        let mut write = || -> std::io::Result<()> {
            write!(
                buf,
                r#"<!DOCTYPE html>
<html>

<head>
  <title>{title}</title>
  <style>
    table {{ border-collapse: collapse; margin-top: 1rem; }}
    th, td {{ padding: 10px; border: 1px solid #ddd; }}
    th {{ background-color: #f5f5f5; font-weight: bold; }}
  </style>
</head>

<body>
  <h2>{title}</h2>
  <div>Last updated {}</div>
  <table>
    <tr>
      <th>#</th>
      <th>{}</th>
      <th>Elo</th>
      <th title="Matches played">#M</th>
      <th>History</th>
    </tr>"#,
                Local::now().format(TIME_FORMAT),
                match state.mode {
                    Mode::Singles => "Player",
                    Mode::Doubles => "Duo",
                },
            )?;
            for (rank, c) in leaderboard(&state.competitors).into_iter().enumerate() {
                write!(
                    buf,
                    r#"
    <tr>
      <td>{}</td><td>{}</td><td {}>{:.2}</td><td>{}</td><td>{}</td>
    </tr>"#,
                    rank + 1,
                    escape_html(&c.identity.to_string()),
                    rating_color(c.rating),
                    c.rating,
                    c.matches,
                    escape_html(c.history.as_str()),
                )?;
            }
            writeln!(
                buf,
                r#"
  </table>
</body>

</html>"#
            )?;
            buf.flush()
        };
        write().map_err(io_err(&path))
    }
}

impl Storage for WorkbookStorage {
    fn load(&mut self, mode: Mode) -> Result<State, StorageError> {
        if !self.path.exists() {
            info!(path = %self.path.display(), "creating empty workbook");
            let state = State::empty(mode);
            self.write_workbook(&state)?;
            return Ok(state);
        }

        let workbook = self.read_workbook()?;
        let players = workbook.sheet(mode.competitor_sheet()).ok_or_else(|| {
            self.malformed(format!("no {:?} sheet for {mode} play", mode.competitor_sheet()))
        })?;
        let matches = workbook
            .sheet(MATCHES_SHEET)
            .ok_or_else(|| self.malformed(format!("no {MATCHES_SHEET:?} sheet")))?;

        let mut state = State::empty(mode);
        let mut seen = HashSet::new();
        for (i, row) in players.rows.iter().enumerate() {
            let Some(competitor) = parse_competitor(mode, row) else {
                warn!(row = i + 2, "skipping row without a valid competitor");
                continue;
            };
            if !seen.insert(competitor.identity.clone()) {
                warn!(row = i + 2, competitor = %competitor.identity, "skipping duplicate competitor");
                continue;
            }
            state.competitors.push(competitor);
        }
        for (i, row) in matches.rows.iter().enumerate() {
            match parse_match(mode, row) {
                Some(m) => state.matches.push(m),
                None => warn!(row = i + 2, "skipping unreadable match row"),
            }
        }

        debug!(
            path = %self.path.display(),
            competitors = state.competitors.len(),
            matches = state.matches.len(),
            "loaded workbook"
        );
        Ok(state)
    }

    fn save(&mut self, state: &State) -> Result<(), StorageError> {
        self.write_workbook(state)?;
        if self.export {
            // the workbook is already saved, so a stale export must not fail the save
            for result in [self.write_csv(state), self.write_html(state)] {
                if let Err(e) = result {
                    warn!("skipping leaderboard export: {e}");
                }
            }
        }
        debug!(path = %self.path.display(), "saved workbook");
        Ok(())
    }
}

/// Competitors by descending rating. The sort is stable, so equal ratings
/// keep their table order.
pub fn leaderboard(competitors: &[Competitor]) -> Vec<&Competitor> {
    let mut sorted: Vec<_> = competitors.iter().collect();
    sorted.sort_by_key(|c| Reverse(OrderedFloat(c.rating)));
    sorted
}

fn csv_field(s: &str) -> String {
    if s.contains([',', '"', '\n']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

// https://github.com/vfleaking/uoj/blob/04061436e53ac7390b34aac6760e03fc6ad6b39f/web/public/js/uoj.js#L146
fn rating_color(rating: f64) -> String {
    let rating = rating.clamp(300.0, 2500.0);
    let (h, s, v) = if rating < 1500.0 {
        const H: f64 = 300.0 - (1500.0 - 850.0) * 300.0 / 1650.0;
        const S: f64 = 30.0 + (1500.0 - 850.0) * 70.0 / 1650.0;
        const V: f64 = 50.0 + (1500.0 - 850.0) * 50.0 / 1650.0;
        let k = (rating - 300.0) / 1200.0;
        (
            H + (300.0 - H) * (1.0 - k),
            30.0 + (S - 30.0) * k,
            50.0 + (V - 50.0) * k,
        )
    } else {
        let k = (rating - 850.0) / 1650.0;
        (300.0 - 300.0 * k, 30.0 + 70.0 * k, 50.0 + 50.0 * k)
    };
    let l = v - v * s / 200.0;
    let m = l.min(100.0 - l);
    let s = if m < 0.1 { 0.0 } else { 100.0 * (v - l) / m };
    format!(
        r#"style="font-weight: bold; color: hsl({:.1} {:.1}% {:.1}%);""#,
        h, s, l
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn alice() -> Identity {
        Identity::player("Alice").unwrap()
    }

    #[test]
    fn missing_file_creates_headers() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("league.json");
        let mut storage = WorkbookStorage::new(&path);

        let state = storage.load(Mode::Doubles).unwrap();
        assert!(state.competitors.is_empty());
        assert!(path.exists());

        let workbook: Workbook =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        let duos = workbook.sheet(DUOS_SHEET).unwrap();
        assert_eq!(duos.header, Mode::Doubles.competitor_header());
        assert!(duos.rows.is_empty());
        assert_eq!(
            workbook.sheet(MATCHES_SHEET).unwrap().header,
            Mode::Doubles.match_header()
        );
    }

    #[test]
    fn state_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("league.json");
        let bob = Identity::player("Bob").unwrap();
        let mut a = Competitor::new(alice());
        a.rating = 1516.0;
        a.history.push(&bob, 21, 15);
        a.matches = 1;
        let mut b = Competitor::new(bob.clone());
        b.rating = 1484.0;
        b.history.push(&alice(), 15, 21);
        b.matches = 1;
        let state = State {
            mode: Mode::Singles,
            competitors: vec![a, b],
            matches: vec![MatchRecord {
                a: alice(),
                b: bob,
                score_a: 21,
                score_b: 15,
                a_before: 1500.0,
                a_after: 1516.0,
                b_before: 1500.0,
                b_after: 1484.0,
                recorded_at: NaiveDateTime::parse_from_str("2024-05-01 18:30:00", TIME_FORMAT)
                    .ok(),
            }],
        };

        WorkbookStorage::new(&path).save(&state).unwrap();
        let loaded = WorkbookStorage::new(&path).load(Mode::Singles).unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn lenient_cells_fall_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("league.json");
        fs::write(
            &path,
            r#"{"sheets": [
                {"name": "Duos", "header": [], "rows": [
                    ["Bob", "Alice", "n/a", null, "three"],
                    ["Carol", null, 1600, "", 2],
                    ["Alice", "Bob", 1700, "", 9],
                    ["Dan", "Erin", 1550.5]
                ]},
                {"name": "Match History", "header": []}
            ]}"#,
        )
        .unwrap();

        let state = WorkbookStorage::new(&path).load(Mode::Doubles).unwrap();
        assert_eq!(state.competitors.len(), 2);
        let first = &state.competitors[0];
        assert_eq!(first.identity, Identity::duo("Alice", "Bob").unwrap());
        assert_eq!(first.rating, ELO_BASE);
        assert_eq!(first.matches, 0);
        assert!(first.history.is_empty());
        assert_eq!(state.competitors[1].rating, 1550.5);
        assert!(state.matches.is_empty());
    }

    #[test]
    fn wrong_mode_is_malformed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("league.json");
        WorkbookStorage::new(&path).load(Mode::Singles).unwrap();
        let err = WorkbookStorage::new(&path).load(Mode::Doubles).unwrap_err();
        assert!(matches!(err, StorageError::Malformed { .. }));
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("league.json");
        fs::write(&path, "not json").unwrap();
        let err = WorkbookStorage::new(&path).load(Mode::Singles).unwrap_err();
        assert!(matches!(err, StorageError::Parse { .. }));
    }

    #[test]
    fn exports_follow_the_leaderboard() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("league.json");
        let mut low = Competitor::new(alice());
        low.rating = 1490.0;
        let mut high = Competitor::new(Identity::player("Smith, J").unwrap());
        high.rating = 1510.0;
        let state = State {
            mode: Mode::Singles,
            competitors: vec![low, high],
            matches: Vec::new(),
        };

        let mut storage = WorkbookStorage::new(&path);
        storage.save(&state).unwrap();

        let csv = fs::read_to_string(storage.csv_path()).unwrap();
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(
            lines,
            [
                "rank,name,rating,matches",
                "1,\"Smith, J\",1510.00,0",
                "2,Alice,1490.00,0",
            ]
        );
        let html = fs::read_to_string(storage.html_path()).unwrap();
        assert!(html.contains("<th>Elo</th>"));
        assert!(html.find("Smith, J").unwrap() < html.find("Alice").unwrap());
    }

    #[test]
    fn failed_export_does_not_fail_the_save() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("league.json");
        let mut storage = WorkbookStorage::new(&path);
        fs::create_dir(storage.html_path()).unwrap();

        let mut state = State::empty(Mode::Singles);
        state.competitors.push(Competitor::new(alice()));
        storage.save(&state).unwrap();

        assert_eq!(storage.load(Mode::Singles).unwrap(), state);
        assert!(storage.csv_path().exists());
    }

    #[test]
    fn save_replaces_the_workbook_whole() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("league.json");
        let mut storage = WorkbookStorage::new(&path).with_export(false);
        storage.load(Mode::Singles).unwrap();

        let mut state = State::empty(Mode::Singles);
        state.competitors.push(Competitor::new(alice()));
        storage.save(&state).unwrap();

        assert!(!storage.tmp_path().exists());
        assert_eq!(storage.load(Mode::Singles).unwrap(), state);
    }

    #[test]
    fn unwritable_workbook_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("league.json");
        fs::create_dir(&path).unwrap();
        let err = WorkbookStorage::new(&path)
            .with_export(false)
            .save(&State::empty(Mode::Singles))
            .unwrap_err();
        assert!(matches!(err, StorageError::Io { .. }));
    }

    #[test]
    fn exports_can_be_disabled() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("league.json");
        let mut storage = WorkbookStorage::new(&path).with_export(false);
        storage.save(&State::empty(Mode::Singles)).unwrap();
        assert!(path.exists());
        assert!(!storage.csv_path().exists());
        assert!(!storage.html_path().exists());
    }

    #[test]
    fn leaderboard_is_stable() {
        let mut a = Competitor::new(alice());
        a.rating = 1500.0;
        let b = Competitor::new(Identity::player("Bob").unwrap());
        let mut c = Competitor::new(Identity::player("Carol").unwrap());
        c.rating = 1600.0;
        let all = [a, b, c];
        let names: Vec<_> = leaderboard(&all)
            .iter()
            .map(|c| c.identity.to_string())
            .collect();
        assert_eq!(names, ["Carol", "Alice", "Bob"]);
    }
}
