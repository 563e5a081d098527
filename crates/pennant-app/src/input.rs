// League table loading from CSV (standings, team batting, team pitching).
//
// Column headers follow the league's published team-stat pages. English
// headers are canonical; the Korean headers used by the KBO site are
// accepted as aliases.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use pennant_core::{BattingLine, LeagueInput, PitchingLine, StandingsRow};

use crate::config::{Config, DataPaths};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("validation error: {0}")]
    Validation(String),
}

// ---------------------------------------------------------------------------
// Raw CSV serde structs (private)
// ---------------------------------------------------------------------------

/// Standings row. Counts stay signed so that a negative value reaches the
/// analysis layer and is reported against the team instead of being dropped
/// here as a parse failure.
#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct RawStandings {
    #[serde(alias = "팀명")]
    Team: String,
    #[serde(alias = "승")]
    W: i64,
    #[serde(alias = "패")]
    L: i64,
    #[serde(default, alias = "무")]
    T: i64,
    #[serde(alias = "득점")]
    RS: i64,
    #[serde(alias = "실점")]
    RA: i64,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct RawBatting {
    #[serde(alias = "팀명")]
    Team: String,
    AB: u32,
    H: u32,
    BB: u32,
    #[serde(default)]
    HBP: u32,
    #[serde(default)]
    SF: u32,
    TB: u32,
}

/// Pitching row. IP is kept as text because box scores write partial
/// innings as either `123 2/3` or `123.2`.
#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct RawPitching {
    #[serde(alias = "팀명")]
    Team: String,
    IP: String,
    ER: u32,
    H: u32,
    BB: u32,
}

// ---------------------------------------------------------------------------
// Innings-pitched notation
// ---------------------------------------------------------------------------

/// Parse an innings-pitched figure into true decimal innings.
///
/// Accepts `123 2/3`, the box-score shorthand `123.1` / `123.2` (outs, not
/// tenths), and plain numbers. Any other single decimal digit is read as an
/// ordinary decimal. Returns `None` for blank or unparseable input.
pub fn parse_innings_pitched(text: &str) -> Option<f64> {
    let s = text.trim();
    if s.is_empty() {
        return None;
    }

    if let Some((whole, frac)) = s.split_once(char::is_whitespace) {
        let whole: u32 = whole.parse().ok()?;
        let outs = match frac.trim() {
            "0/3" => 0,
            "1/3" => 1,
            "2/3" => 2,
            _ => return None,
        };
        return Some(whole as f64 + outs as f64 / 3.0);
    }

    if let Some((whole, digit)) = s.split_once('.') {
        if let (Ok(w), Ok(outs @ (1 | 2))) = (whole.parse::<u32>(), digit.parse::<u32>()) {
            if digit.len() == 1 {
                return Some(w as f64 + outs as f64 / 3.0);
            }
        }
    }

    s.parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0)
}

// ---------------------------------------------------------------------------
// Reader-based loaders (private, enable testing without temp files)
// ---------------------------------------------------------------------------

fn load_standings_from_reader<R: Read>(rdr: R) -> Result<Vec<StandingsRow>, csv::Error> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut rows = Vec::new();
    for result in reader.deserialize::<RawStandings>() {
        match result {
            Ok(raw) => rows.push(StandingsRow {
                team: raw.Team.trim().to_string(),
                wins: raw.W,
                losses: raw.L,
                ties: raw.T,
                runs_scored: raw.RS,
                runs_allowed: raw.RA,
            }),
            Err(e) => {
                warn!("skipping malformed standings row: {}", e);
            }
        }
    }
    Ok(rows)
}

fn load_batting_from_reader<R: Read>(rdr: R) -> Result<BTreeMap<String, BattingLine>, csv::Error> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut map = BTreeMap::new();
    for result in reader.deserialize::<RawBatting>() {
        match result {
            Ok(raw) => {
                let name = raw.Team.trim().to_string();
                let line = BattingLine {
                    at_bats: raw.AB,
                    hits: raw.H,
                    walks: raw.BB,
                    hit_by_pitch: raw.HBP,
                    sacrifice_flies: raw.SF,
                    total_bases: raw.TB,
                };
                if map.insert(name.clone(), line).is_some() {
                    warn!("duplicate batting entry for '{}', using latest value", name);
                }
            }
            Err(e) => {
                warn!("skipping malformed batting row: {}", e);
            }
        }
    }
    Ok(map)
}

fn load_pitching_from_reader<R: Read>(
    rdr: R,
) -> Result<BTreeMap<String, PitchingLine>, csv::Error> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut map = BTreeMap::new();
    for result in reader.deserialize::<RawPitching>() {
        match result {
            Ok(raw) => {
                let name = raw.Team.trim().to_string();
                // Zero innings leaves ERA and WHIP undefined for this team only.
                let innings_pitched = parse_innings_pitched(&raw.IP).unwrap_or_else(|| {
                    warn!("unreadable IP '{}' for '{}', treating as 0 innings", raw.IP, name);
                    0.0
                });
                let line = PitchingLine {
                    innings_pitched,
                    earned_runs: raw.ER,
                    hits_allowed: raw.H,
                    walks_allowed: raw.BB,
                };
                if map.insert(name.clone(), line).is_some() {
                    warn!("duplicate pitching entry for '{}', using latest value", name);
                }
            }
            Err(e) => {
                warn!("skipping malformed pitching row: {}", e);
            }
        }
    }
    Ok(map)
}

// ---------------------------------------------------------------------------
// Public path-based loaders
// ---------------------------------------------------------------------------

fn open(path: &Path) -> Result<std::fs::File, InputError> {
    std::fs::File::open(path).map_err(|e| InputError::Io {
        path: path.display().to_string(),
        source: e,
    })
}

fn csv_error(path: &Path) -> impl FnOnce(csv::Error) -> InputError + '_ {
    move |e| InputError::Csv {
        path: path.display().to_string(),
        source: e,
    }
}

pub fn load_standings(path: &Path) -> Result<Vec<StandingsRow>, InputError> {
    load_standings_from_reader(open(path)?).map_err(csv_error(path))
}

pub fn load_batting(path: &Path) -> Result<BTreeMap<String, BattingLine>, InputError> {
    load_batting_from_reader(open(path)?).map_err(csv_error(path))
}

pub fn load_pitching(path: &Path) -> Result<BTreeMap<String, PitchingLine>, InputError> {
    load_pitching_from_reader(open(path)?).map_err(csv_error(path))
}

/// Load all three tables using paths from the config.
pub fn load_all(config: &Config) -> Result<LeagueInput, InputError> {
    load_all_from_paths(&config.data_paths)
}

/// Load all three tables from explicit paths.
pub fn load_all_from_paths(paths: &DataPaths) -> Result<LeagueInput, InputError> {
    let standings = load_standings(Path::new(&paths.standings))?;
    let batting = load_batting(Path::new(&paths.batting))?;
    let pitching = load_pitching(Path::new(&paths.pitching))?;

    if standings.is_empty() {
        return Err(InputError::Validation(
            "standings CSV produced zero valid rows".into(),
        ));
    }

    Ok(LeagueInput {
        standings,
        batting,
        pitching,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    // -- Innings-pitched notation --

    #[test]
    fn ip_fraction_notation() {
        assert!(approx_eq(parse_innings_pitched("123 2/3").unwrap(), 123.0 + 2.0 / 3.0));
        assert!(approx_eq(parse_innings_pitched("7 1/3").unwrap(), 7.0 + 1.0 / 3.0));
        assert_eq!(parse_innings_pitched("9 0/3"), Some(9.0));
    }

    #[test]
    fn ip_box_score_shorthand_counts_outs() {
        assert!(approx_eq(parse_innings_pitched("123.1").unwrap(), 123.0 + 1.0 / 3.0));
        assert!(approx_eq(parse_innings_pitched("123.2").unwrap(), 123.0 + 2.0 / 3.0));
    }

    #[test]
    fn ip_plain_numbers() {
        assert_eq!(parse_innings_pitched("1287"), Some(1287.0));
        assert_eq!(parse_innings_pitched(" 45.0 "), Some(45.0));
        assert_eq!(parse_innings_pitched("45.5"), Some(45.5));
        assert_eq!(parse_innings_pitched("45.25"), Some(45.25));
    }

    #[test]
    fn ip_rejects_garbage() {
        assert_eq!(parse_innings_pitched(""), None);
        assert_eq!(parse_innings_pitched("   "), None);
        assert_eq!(parse_innings_pitched("abc"), None);
        assert_eq!(parse_innings_pitched("12 4/3"), None);
        assert_eq!(parse_innings_pitched("-3"), None);
    }

    // -- Standings --

    #[test]
    fn standings_csv_english_headers() {
        let csv_data = "\
Team,W,L,T,RS,RA
LG,58,38,2,520,410
Hanwha,56,39,1,470,400";

        let rows = load_standings_from_reader(csv_data.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], {
            let mut r = StandingsRow::new("LG", 58, 38, 520, 410);
            r.ties = 2;
            r
        });
        assert_eq!(rows[1].team, "Hanwha");
        assert_eq!(rows[1].ties, 1);
    }

    #[test]
    fn standings_csv_korean_headers_and_missing_ties() {
        let csv_data = "\
팀명,승,패,득점,실점
 롯데 ,51,44,480,470";

        let rows = load_standings_from_reader(csv_data.as_bytes()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].team, "롯데");
        assert_eq!(rows[0].wins, 51);
        assert_eq!(rows[0].ties, 0);
    }

    #[test]
    fn standings_negative_count_is_kept_for_validation() {
        let csv_data = "\
Team,W,L,T,RS,RA
KT,-1,47,0,430,440";

        let rows = load_standings_from_reader(csv_data.as_bytes()).unwrap();
        assert_eq!(rows[0].wins, -1);
    }

    #[test]
    fn standings_non_numeric_row_is_skipped() {
        let csv_data = "\
Team,W,L,T,RS,RA
KT,forty,47,0,430,440
NC,44,48,0,440,455";

        let rows = load_standings_from_reader(csv_data.as_bytes()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].team, "NC");
    }

    // -- Batting --

    #[test]
    fn batting_csv_extra_columns_ignored() {
        let csv_data = "\
Team,AVG,G,AB,H,HR,BB,HBP,SF,TB,OPS
LG,0.278,96,3300,918,80,330,40,25,1300,0.771";

        let map = load_batting_from_reader(csv_data.as_bytes()).unwrap();
        let lg = map["LG"];
        assert_eq!(lg.at_bats, 3300);
        assert_eq!(lg.hits, 918);
        assert_eq!(lg.walks, 330);
        assert_eq!(lg.hit_by_pitch, 40);
        assert_eq!(lg.sacrifice_flies, 25);
        assert_eq!(lg.total_bases, 1300);
    }

    #[test]
    fn batting_duplicate_uses_latest() {
        let csv_data = "\
Team,AB,H,BB,TB
SSG,100,20,5,30
SSG,200,50,10,70";

        let map = load_batting_from_reader(csv_data.as_bytes()).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map["SSG"].at_bats, 200);
        assert_eq!(map["SSG"].hit_by_pitch, 0);
    }

    // -- Pitching --

    #[test]
    fn pitching_csv_parses_ip_notations() {
        let csv_data = "\
Team,ERA,IP,H,BB,ER
LG,3.62,850 1/3,820,300,342
KIA,4.10,849.2,870,310,387";

        let map = load_pitching_from_reader(csv_data.as_bytes()).unwrap();
        assert!(approx_eq(map["LG"].innings_pitched, 850.0 + 1.0 / 3.0));
        assert!(approx_eq(map["KIA"].innings_pitched, 849.0 + 2.0 / 3.0));
        assert_eq!(map["LG"].earned_runs, 342);
        assert_eq!(map["KIA"].walks_allowed, 310);
    }

    #[test]
    fn pitching_unreadable_ip_keeps_team_with_undefined_rates() {
        let csv_data = "\
Team,IP,H,BB,ER
LG,n/a,820,300,342
KT,,800,290,330
NC,840,860,320,380";

        let map = load_pitching_from_reader(csv_data.as_bytes()).unwrap();
        assert_eq!(map.len(), 3);
        assert_eq!(map["LG"].innings_pitched, 0.0);
        assert_eq!(map["LG"].earned_runs, 342);
        assert_eq!(map["KT"].innings_pitched, 0.0);

        let lg = pennant_core::metrics::pitching_rates(&map["LG"]);
        assert_eq!(lg.era, None);
        assert_eq!(lg.whip, None);
        assert!(pennant_core::metrics::pitching_rates(&map["NC"]).era.is_some());
    }

    // -- Path-based loading --

    #[test]
    fn load_all_reports_missing_file() {
        let paths = DataPaths {
            standings: "/nonexistent/standings.csv".into(),
            batting: "/nonexistent/batting.csv".into(),
            pitching: "/nonexistent/pitching.csv".into(),
        };
        match load_all_from_paths(&paths) {
            Err(InputError::Io { path, .. }) => assert!(path.ends_with("standings.csv")),
            other => panic!("expected Io error, got {other:?}"),
        }
    }

    #[test]
    fn load_all_rejects_empty_standings() {
        let dir = std::env::temp_dir().join("pennant_input_empty_standings");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("s.csv"), "Team,W,L,T,RS,RA\n").unwrap();
        std::fs::write(dir.join("b.csv"), "Team,AB,H,BB,TB\n").unwrap();
        std::fs::write(dir.join("p.csv"), "Team,IP,H,BB,ER\n").unwrap();

        let paths = DataPaths {
            standings: dir.join("s.csv").display().to_string(),
            batting: dir.join("b.csv").display().to_string(),
            pitching: dir.join("p.csv").display().to_string(),
        };
        assert!(matches!(
            load_all_from_paths(&paths),
            Err(InputError::Validation(_))
        ));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
