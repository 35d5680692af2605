//! Structural validation of raw contest records.
//!
//! Records arrive as loosely-typed JSON. Every accessor below either yields a typed value or a
//! [`ValidationError`] carrying the dotted path of the offending field, e.g.
//! `odds.markets[1].values[0].odd`. Object keys are checked against a fixed set wherever the
//! record layout is known; league meta objects are read leniently since their providers attach
//! assorted extra statistics.
//!
//! The only coercion performed is numeric strings to numbers for prices, ratings and player ids.

use std::path::Path;

use anyhow::bail;
use chrono::DateTime;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use sdm::file::{find_files, read_json};

use crate::data::{
    Contest, LeagueMeta, OddsMarket, OddsOutcome, OddsPayload, PlayerRating, PlayerRef, RosterContext, Team,
};
use crate::domain::Sided;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationReason {
    #[error("missing")]
    Missing,

    #[error("expected {0}")]
    WrongType(&'static str),

    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{path}: {reason}")]
pub struct ValidationError {
    pub path: String,
    pub reason: ValidationReason,
}

const ROOT: &str = "$";

#[derive(Clone, Copy)]
struct Node<'a> {
    value: &'a Value,
    path: &'a str,
}

struct Field<'a> {
    value: &'a Value,
    path: String,
}
impl<'a> Field<'a> {
    fn node(&self) -> Node<'_> {
        Node {
            value: self.value,
            path: &self.path,
        }
    }
}

impl<'a> Node<'a> {
    fn error(&self, reason: ValidationReason) -> ValidationError {
        ValidationError {
            path: self.path.to_string(),
            reason,
        }
    }

    fn child_path(&self, key: &str) -> String {
        if self.path == ROOT {
            key.to_string()
        } else {
            format!("{}.{key}", self.path)
        }
    }

    /// An object read through the `known` keys. Any other key is skipped.
    fn object(&self, known: &[&str]) -> Result<&'a Map<String, Value>, ValidationError> {
        let map = self.loose_object()?;
        for key in map.keys().filter(|key| !known.contains(&key.as_str())) {
            debug!("ignoring {}", self.child_path(key));
        }
        Ok(map)
    }

    fn loose_object(&self) -> Result<&'a Map<String, Value>, ValidationError> {
        self.value.as_object().ok_or_else(|| self.error(ValidationReason::WrongType("object")))
    }

    /// A present, non-null field.
    fn field(&self, key: &str) -> Option<Field<'a>> {
        match self.value.get(key) {
            None | Some(Value::Null) => None,
            Some(value) => Some(Field {
                value,
                path: self.child_path(key),
            }),
        }
    }

    fn required(&self, key: &str) -> Result<Field<'a>, ValidationError> {
        self.field(key).ok_or_else(|| ValidationError {
            path: self.child_path(key),
            reason: ValidationReason::Missing,
        })
    }

    fn elements(&self) -> Result<Vec<Field<'a>>, ValidationError> {
        let array = self.value.as_array().ok_or_else(|| self.error(ValidationReason::WrongType("array")))?;
        Ok(array
            .iter()
            .enumerate()
            .map(|(index, value)| Field {
                value,
                path: format!("{}[{index}]", self.path),
            })
            .collect())
    }

    fn as_str(&self) -> Result<&'a str, ValidationError> {
        self.value.as_str().ok_or_else(|| self.error(ValidationReason::WrongType("string")))
    }

    fn as_f64(&self) -> Result<f64, ValidationError> {
        self.value.as_f64().ok_or_else(|| self.error(ValidationReason::WrongType("number")))
    }

    fn as_u64(&self) -> Result<u64, ValidationError> {
        self.value
            .as_u64()
            .ok_or_else(|| self.error(ValidationReason::WrongType("non-negative integer")))
    }

    fn as_goals(&self) -> Result<u8, ValidationError> {
        let goals = self.as_u64()?;
        u8::try_from(goals).map_err(|_| self.error(ValidationReason::Invalid(format!("implausible goal count {goals}"))))
    }

    /// Non-negative and no larger than the most goals a side can record.
    fn as_expected_goals(&self) -> Result<f64, ValidationError> {
        let expected = self.as_f64()?;
        if !(0.0..=u8::MAX as f64).contains(&expected) {
            return Err(self.error(ValidationReason::Invalid(format!("implausible expected goals {expected}"))));
        }
        Ok(expected)
    }

    /// A number, or a string holding one.
    fn as_numeric(&self) -> Result<f64, ValidationError> {
        match self.value {
            Value::Number(_) => self.as_f64(),
            Value::String(text) => text
                .trim()
                .parse::<f64>()
                .map_err(|_| self.error(ValidationReason::Invalid(format!("'{text}' is not numeric")))),
            _ => Err(self.error(ValidationReason::WrongType("number or numeric string"))),
        }
    }

    fn as_id(&self) -> Result<u64, ValidationError> {
        match self.value {
            Value::String(text) => text
                .trim()
                .parse::<u64>()
                .map_err(|_| self.error(ValidationReason::Invalid(format!("'{text}' is not an id")))),
            _ => self.as_u64(),
        }
    }
}

fn optional<T>(
    node: Node<'_>,
    key: &str,
    f: impl FnOnce(Node<'_>) -> Result<T, ValidationError>,
) -> Result<Option<T>, ValidationError> {
    match node.field(key) {
        None => Ok(None),
        Some(field) => f(field.node()).map(Some),
    }
}

fn required<T>(node: Node<'_>, key: &str, f: impl FnOnce(Node<'_>) -> Result<T, ValidationError>) -> Result<T, ValidationError> {
    let field = node.required(key)?;
    f(field.node())
}

fn list<T>(node: Node<'_>, key: &str, mut f: impl FnMut(Node<'_>) -> Result<T, ValidationError>) -> Result<Vec<T>, ValidationError> {
    match node.field(key) {
        None => Ok(vec![]),
        Some(field) => field.node().elements()?.iter().map(|element| f(element.node())).collect(),
    }
}

fn parse_team(node: Node<'_>) -> Result<Team, ValidationError> {
    node.object(&["id", "name"])?;
    Ok(Team {
        id: required(node, "id", |node| node.as_u64())?,
        name: required(node, "name", |node| node.as_str().map(str::to_string))?,
    })
}

fn parse_outcome(node: Node<'_>) -> Result<OddsOutcome, ValidationError> {
    node.object(&["value", "name", "odd", "price", "odds"])?;
    let value = optional(node, "value", |node| node.as_str().map(str::to_string))?;
    let name = optional(node, "name", |node| node.as_str().map(str::to_string))?;
    let mut price = None;
    for key in ["odd", "price", "odds"] {
        if let Some(parsed) = optional(node, key, |node| node.as_numeric())? {
            price.get_or_insert(parsed);
        }
    }
    Ok(OddsOutcome {
        name: value.or(name).unwrap_or_default(),
        price,
    })
}

fn parse_market(node: Node<'_>, allowed: &[&str]) -> Result<OddsMarket, ValidationError> {
    node.object(allowed)?;
    let mut outcomes = list(node, "values", parse_outcome)?;
    if outcomes.is_empty() {
        outcomes = list(node, "outcomes", parse_outcome)?;
    }
    Ok(OddsMarket {
        name: required(node, "name", |node| node.as_str().map(str::to_string))?,
        outcomes,
    })
}

pub fn parse_odds(node_value: &Value, path: &str) -> Result<OddsPayload, ValidationError> {
    let node = Node { value: node_value, path };
    node.object(&["markets", "bookmakers"])?;
    let mut markets = list(node, "markets", |node| parse_market(node, &["name", "values", "outcomes"]))?;
    let bookmakers = list(node, "bookmakers", |bookmaker| {
        bookmaker.object(&["name", "bets"])?;
        optional(bookmaker, "name", |node| node.as_str().map(str::to_string))?;
        list(bookmaker, "bets", |bet| {
            optional(bet, "id", |node| node.as_u64())?;
            parse_market(bet, &["id", "name", "values", "outcomes"])
        })
    })?;
    markets.extend(bookmakers.into_iter().flatten());
    Ok(OddsPayload { markets })
}

fn parse_player_ref(node: Node<'_>) -> Result<PlayerRef, ValidationError> {
    node.loose_object()?;
    let name = match optional(node, "player_name", |node| node.as_str().map(str::to_string))? {
        Some(name) => Some(name),
        None => optional(node, "name", |node| node.as_str().map(str::to_string))?,
    };
    let id = match optional(node, "player_id", |node| node.as_id())? {
        Some(id) => Some(id),
        None => optional(node, "id", |node| node.as_id())?,
    };
    Ok(PlayerRef { id, name })
}

fn parse_player_rating(node: Node<'_>) -> Result<PlayerRating, ValidationError> {
    node.loose_object()?;
    Ok(PlayerRating {
        id: required(node, "id", |node| node.as_id())?,
        name: optional(node, "name", |node| node.as_str().map(str::to_string))?,
        rating: optional(node, "rating", |node| node.as_numeric())?,
    })
}

fn parse_context(node: Node<'_>) -> Result<Sided<RosterContext>, ValidationError> {
    node.object(&[
        "injuries_home",
        "injuries_away",
        "player_ratings_home",
        "player_ratings_away",
    ])?;
    Ok(Sided::new(
        RosterContext {
            absences: list(node, "injuries_home", parse_player_ref)?,
            ratings: list(node, "player_ratings_home", parse_player_rating)?,
        },
        RosterContext {
            absences: list(node, "injuries_away", parse_player_ref)?,
            ratings: list(node, "player_ratings_away", parse_player_rating)?,
        },
    ))
}

fn parse_meta(node: Node<'_>) -> Result<LeagueMeta, ValidationError> {
    node.loose_object()?;
    Ok(LeagueMeta {
        top_scorers: list(node, "top_scorers", parse_player_ref)?,
        top_assists: list(node, "top_assists", parse_player_ref)?,
        top_defenders: list(node, "top_defenders", parse_player_ref)?,
        top_goalkeepers: list(node, "top_goalkeepers", parse_player_ref)?,
    })
}

fn parse_expected_goals(node: Node<'_>) -> Result<Option<f64>, ValidationError> {
    node.object(&["expected_goals"])?;
    optional(node, "expected_goals", |node| node.as_expected_goals())
}

impl Contest {
    pub fn from_value(value: &Value) -> Result<Self, ValidationError> {
        let root = Node { value, path: ROOT };
        root.object(&[
            "fixture", "league", "teams", "goals", "stats", "odds", "context", "metaHome", "metaAway",
        ])?;

        let fixture = root.required("fixture")?;
        let fixture = fixture.node();
        fixture.object(&["id", "date", "status"])?;
        let id = required(fixture, "id", |node| node.as_u64())?;
        let date = required(fixture, "date", |node| {
            let text = node.as_str()?;
            DateTime::parse_from_rfc3339(text)
                .map_err(|err| node.error(ValidationReason::Invalid(format!("'{text}' is not an RFC 3339 date: {err}"))))
        })?;
        let status = optional(fixture, "status", |node| {
            node.object(&["short"])?;
            optional(node, "short", |node| node.as_str().map(str::to_string))
        })?
        .flatten();

        let league = root.required("league")?;
        let league = league.node();
        league.object(&["id", "round"])?;
        let league_id = required(league, "id", |node| node.as_u64())?;
        let round = optional(league, "round", |node| node.as_str().map(str::to_string))?;

        let teams = root.required("teams")?;
        let teams = teams.node();
        teams.object(&["home", "away"])?;
        let teams = Sided::new(required(teams, "home", parse_team)?, required(teams, "away", parse_team)?);

        let goals = root.required("goals")?;
        let goals = goals.node();
        goals.object(&["home", "away"])?;
        let goals = Sided::new(
            optional(goals, "home", |node| node.as_goals())?,
            optional(goals, "away", |node| node.as_goals())?,
        );

        let expected_goals = optional(root, "stats", |stats| {
            stats.object(&["home", "away"])?;
            Ok(Sided::new(
                optional(stats, "home", parse_expected_goals)?.flatten(),
                optional(stats, "away", parse_expected_goals)?.flatten(),
            ))
        })?
        .unwrap_or_default();

        let odds = match root.field("odds") {
            None => None,
            Some(field) => Some(parse_odds(field.value, &field.path)?),
        };

        Ok(Self {
            id,
            date,
            status,
            league: league_id,
            round,
            teams,
            goals,
            expected_goals,
            context: optional(root, "context", parse_context)?,
            meta: Sided::new(optional(root, "metaHome", parse_meta)?, optional(root, "metaAway", parse_meta)?),
            odds,
        })
    }
}

/// A record that failed validation, identified by its position in the input batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("record {index}: {error}")]
pub struct Rejection {
    pub index: usize,
    pub error: ValidationError,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub contests: Vec<Contest>,
    pub rejections: Vec<Rejection>,
}
impl Dataset {
    pub fn from_values<'a>(values: impl IntoIterator<Item = &'a Value>) -> Self {
        let mut dataset = Self::default();
        dataset.extend(values);
        dataset
    }

    fn extend<'a>(&mut self, values: impl IntoIterator<Item = &'a Value>) {
        let offset = self.contests.len() + self.rejections.len();
        for (index, value) in values.into_iter().enumerate() {
            match Contest::from_value(value) {
                Ok(contest) => self.contests.push(contest),
                Err(error) => {
                    debug!("rejected record {}: {error}", offset + index);
                    self.rejections.push(Rejection {
                        index: offset + index,
                        error,
                    });
                }
            }
        }
    }

    /// Loads a file holding either an array of records or an object with a `response` array.
    pub fn read_json_file(path: impl AsRef<Path>) -> Result<Self, anyhow::Error> {
        let mut dataset = Self::default();
        dataset.append_file(path.as_ref())?;
        Ok(dataset)
    }

    /// Loads every `*.json` file under `path`, in sorted path order. Files whose top level is
    /// not a record array are skipped.
    pub fn read_json_dir(path: impl AsRef<Path>) -> Result<Self, anyhow::Error> {
        let mut dataset = Self::default();
        for file in find_files(path, "json")? {
            if let Err(err) = dataset.append_file(&file) {
                warn!("skipping {}: {err}", file.display());
            }
        }
        Ok(dataset)
    }

    fn append_file(&mut self, path: &Path) -> Result<(), anyhow::Error> {
        let value: Value = read_json(path)?;
        match value {
            Value::Array(records) => self.extend(&records),
            Value::Object(mut map) => match map.remove("response") {
                Some(Value::Array(records)) => self.extend(&records),
                _ => bail!("no record array in {}", path.display()),
            },
            _ => bail!("no record array in {}", path.display()),
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.contests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contests.is_empty()
    }
}
