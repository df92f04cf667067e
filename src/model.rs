//! Typed views of the TFT API payloads.
//!
//! Every field the loader needs is required: a payload missing one fails to
//! decode at the API boundary instead of surfacing later during flattening.
//! Fields the destination tables do not carry are ignored.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::cmp::Reverse;
use std::fmt;

use crate::error::ApiError;

/// A loosely typed JSON scalar. The API is not consistent about whether a
/// value is a number or a string, and every destination column is text, so
/// both are accepted and rendered later.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int(value) => write!(f, "{}", value),
            // Whole floats keep a fractional digit so 12.0 stays "12.0".
            Scalar::Float(value) if value.is_finite() && value.fract() == 0.0 => {
                write!(f, "{:.1}", value)
            }
            Scalar::Float(value) => write!(f, "{}", value),
            Scalar::Text(value) => f.write_str(value),
            Scalar::Bool(true) => f.write_str("True"),
            Scalar::Bool(false) => f.write_str("False"),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Float(value)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatchRecord {
    pub metadata: MatchMetadata,
    pub info: MatchInfo,
}

impl MatchRecord {
    pub fn match_id(&self) -> &str {
        &self.metadata.match_id
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatchMetadata {
    pub match_id: String,
    pub data_version: Scalar,
    pub participants: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatchInfo {
    pub game_datetime: Scalar,
    pub game_length: Scalar,
    pub game_version: String,
    pub participants: Vec<PlayerParticipant>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlayerParticipant {
    pub puuid: String,
    pub gold_left: Scalar,
    pub last_round: Scalar,
    pub level: Scalar,
    pub placement: Scalar,
    pub players_eliminated: Scalar,
    pub time_eliminated: Scalar,
    pub total_damage_to_players: Scalar,
    pub companion: Companion,
    pub traits: Vec<Trait>,
    pub units: Vec<Unit>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Companion {
    #[serde(rename = "content_ID")]
    pub content_id: Scalar,
    #[serde(rename = "skin_ID")]
    pub skin_id: Scalar,
    pub species: Scalar,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Trait {
    pub name: String,
    pub num_units: Scalar,
    #[serde(default)]
    pub style: Option<Scalar>,
    #[serde(default)]
    pub tier_current: Option<Scalar>,
    #[serde(default)]
    pub tier_total: Option<Scalar>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "RawUnit")]
pub struct Unit {
    pub character_id: String,
    pub items: Vec<Scalar>,
    pub name: Option<String>,
    pub rarity: Option<Scalar>,
    pub tier: Scalar,
}

// Older payloads carry numeric `items`, newer ones `itemNames`; some carry both.
#[derive(Deserialize)]
struct RawUnit {
    character_id: String,
    #[serde(default)]
    items: Option<Vec<Scalar>>,
    #[serde(default, rename = "itemNames")]
    item_names: Option<Vec<Scalar>>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    rarity: Option<Scalar>,
    tier: Scalar,
}

impl TryFrom<RawUnit> for Unit {
    type Error = String;

    fn try_from(raw: RawUnit) -> Result<Self, Self::Error> {
        let items = raw
            .items
            .or(raw.item_names)
            .ok_or_else(|| format!("unit {} has no items field", raw.character_id))?;

        Ok(Self {
            character_id: raw.character_id,
            items,
            name: raw.name,
            rarity: raw.rarity,
            tier: raw.tier,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeagueList {
    pub entries: Vec<LeagueEntry>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeagueEntry {
    #[serde(default)]
    pub summoner_id: Option<String>,
    #[serde(default)]
    pub puuid: Option<String>,
    pub league_points: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Summoner {
    pub puuid: String,
}

/// Highest league points first; ties keep their API order.
pub fn top_entries(mut entries: Vec<LeagueEntry>, count: usize) -> Vec<LeagueEntry> {
    entries.sort_by_key(|entry| Reverse(entry.league_points));
    entries.truncate(count);
    entries
}

pub fn decode<T: DeserializeOwned>(resource: &str, body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|source| ApiError::Malformed {
        resource: resource.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNIT_WITH_NAMES: &str = r#"{"character_id":"TFT9_Ahri","itemNames":["TFT_Item_JeweledGauntlet"],"name":"","rarity":4,"tier":2}"#;

    #[test]
    fn scalar_text_matches_python_str() {
        assert_eq!(Scalar::Int(42).to_string(), "42");
        assert_eq!(Scalar::Float(12.0).to_string(), "12.0");
        assert_eq!(Scalar::Float(1234.56).to_string(), "1234.56");
        assert_eq!(Scalar::from("TFT9_Ahri").to_string(), "TFT9_Ahri");
        assert_eq!(Scalar::Bool(true).to_string(), "True");
    }

    #[test]
    fn floats_are_never_written_in_exponent_form() {
        assert_eq!(Scalar::Float(1e16).to_string(), "10000000000000000.0");
        assert_eq!(Scalar::Float(0.00001).to_string(), "0.00001");
        assert_eq!(Scalar::Float(-2.5).to_string(), "-2.5");
    }

    #[test]
    fn scalar_accepts_numbers_and_strings() {
        let values: Vec<Scalar> = serde_json::from_str(r#"[3, 3.5, "3"]"#).unwrap();
        assert_eq!(
            values,
            vec![Scalar::Int(3), Scalar::Float(3.5), Scalar::from("3")]
        );
    }

    #[test]
    fn unit_reads_item_names_when_items_absent() {
        let unit: Unit = serde_json::from_str(UNIT_WITH_NAMES).unwrap();
        assert_eq!(unit.items, vec![Scalar::from("TFT_Item_JeweledGauntlet")]);
        assert_eq!(unit.tier, Scalar::Int(2));
    }

    #[test]
    fn unit_prefers_legacy_items() {
        let unit: Unit = serde_json::from_str(
            r#"{"character_id":"TFT5_Garen","items":[44,16],"itemNames":["a","b"],"tier":1}"#,
        )
        .unwrap();
        assert_eq!(unit.items, vec![Scalar::Int(44), Scalar::Int(16)]);
    }

    #[test]
    fn unit_without_any_items_is_rejected() {
        let err = serde_json::from_str::<Unit>(r#"{"character_id":"TFT5_Garen","tier":1}"#)
            .unwrap_err();
        assert!(err.to_string().contains("TFT5_Garen"));
    }

    #[test]
    fn decode_names_the_resource_on_missing_field() {
        let err = decode::<MatchRecord>("match NA1_1", br#"{"metadata":{}}"#).unwrap_err();
        match err {
            ApiError::Malformed { resource, .. } => assert_eq!(resource, "match NA1_1"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn top_entries_sorts_by_league_points() {
        let entry = |id: &str, lp| LeagueEntry {
            summoner_id: Some(id.to_string()),
            puuid: None,
            league_points: lp,
        };
        let top = top_entries(
            vec![entry("a", 100), entry("b", 900), entry("c", 500), entry("d", 900)],
            3,
        );
        let ids: Vec<_> = top.iter().map(|e| e.summoner_id.as_deref().unwrap()).collect();
        assert_eq!(ids, vec!["b", "d", "c"]);
    }

    #[test]
    fn league_entry_reads_camel_case() {
        let list: LeagueList = serde_json::from_str(
            r#"{"tier":"CHALLENGER","entries":[{"summonerId":"s1","leaguePoints":812,"wins":40}]}"#,
        )
        .unwrap();
        assert_eq!(list.entries[0].summoner_id.as_deref(), Some("s1"));
        assert_eq!(list.entries[0].puuid, None);
        assert_eq!(list.entries[0].league_points, 812);
    }
}
