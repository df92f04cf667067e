//! Projections of one match record into the four destination row sets.
//!
//! The match id is not part of the nested participant, unit or trait data;
//! each projection stamps it onto every row it emits.

use crate::error::SchemaError;
use crate::model::{MatchRecord, Scalar};
use crate::normalize::{Field, Fragment, Row, normalize};
use crate::schema::TableName;

#[derive(Debug, Clone, PartialEq)]
pub struct MatchDataRow {
    pub match_id: String,
    pub match_datetime: Scalar,
    pub match_length: Scalar,
    pub game_version: String,
    pub data_version: Scalar,
    pub participants: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerMetadataRow {
    pub puuid: String,
    pub match_id: String,
    pub gold_left: Scalar,
    pub last_round: Scalar,
    pub level: Scalar,
    pub placement: Scalar,
    pub players_eliminated: Scalar,
    pub time_eliminated: Scalar,
    pub total_damage_to_players: Scalar,
    pub companion_content_id: Scalar,
    pub companion_skin_id: Scalar,
    pub companion_species: Scalar,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerUnitRow {
    pub puuid: String,
    pub match_id: String,
    pub character_id: String,
    pub items: Vec<Scalar>,
    pub tier: Scalar,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerTraitRow {
    pub puuid: String,
    pub match_id: String,
    pub name: String,
    pub num_units: Scalar,
}

// Field order below is not the table layout; the normalizer owns that.

impl Row for MatchDataRow {
    const TABLE: TableName = TableName::MatchData;

    fn fields(&self) -> Vec<(&'static str, Field)> {
        vec![
            ("data_version", Field::from(&self.data_version)),
            ("match_id", Field::from(self.match_id.as_str())),
            (
                "participants",
                Field::List(
                    self.participants
                        .iter()
                        .map(|puuid| Scalar::from(puuid.as_str()))
                        .collect(),
                ),
            ),
            ("match_datetime", Field::from(&self.match_datetime)),
            ("match_length", Field::from(&self.match_length)),
            ("game_version", Field::from(self.game_version.as_str())),
        ]
    }
}

impl Row for PlayerMetadataRow {
    const TABLE: TableName = TableName::PlayerMetadata;

    fn fields(&self) -> Vec<(&'static str, Field)> {
        vec![
            ("gold_left", Field::from(&self.gold_left)),
            ("last_round", Field::from(&self.last_round)),
            ("level", Field::from(&self.level)),
            ("placement", Field::from(&self.placement)),
            ("players_eliminated", Field::from(&self.players_eliminated)),
            ("puuid", Field::from(self.puuid.as_str())),
            ("time_eliminated", Field::from(&self.time_eliminated)),
            (
                "total_damage_to_players",
                Field::from(&self.total_damage_to_players),
            ),
            ("companion.content_ID", Field::from(&self.companion_content_id)),
            ("companion.skin_ID", Field::from(&self.companion_skin_id)),
            ("companion.species", Field::from(&self.companion_species)),
            ("match_id", Field::from(self.match_id.as_str())),
        ]
    }
}

impl Row for PlayerUnitRow {
    const TABLE: TableName = TableName::PlayerUnits;

    fn fields(&self) -> Vec<(&'static str, Field)> {
        vec![
            ("character_id", Field::from(self.character_id.as_str())),
            ("items", Field::List(self.items.clone())),
            ("tier", Field::from(&self.tier)),
            ("puuid", Field::from(self.puuid.as_str())),
            ("match_id", Field::from(self.match_id.as_str())),
        ]
    }
}

impl Row for PlayerTraitRow {
    const TABLE: TableName = TableName::PlayerTraits;

    fn fields(&self) -> Vec<(&'static str, Field)> {
        vec![
            ("name", Field::from(self.name.as_str())),
            ("num_units", Field::from(&self.num_units)),
            ("puuid", Field::from(self.puuid.as_str())),
            ("match_id", Field::from(self.match_id.as_str())),
        ]
    }
}

pub fn match_data(record: &MatchRecord) -> MatchDataRow {
    MatchDataRow {
        match_id: record.metadata.match_id.clone(),
        match_datetime: record.info.game_datetime.clone(),
        match_length: record.info.game_length.clone(),
        game_version: record.info.game_version.clone(),
        data_version: record.metadata.data_version.clone(),
        participants: record.metadata.participants.clone(),
    }
}

/// One row per participant; traits and units are left to their own tables.
pub fn player_metadata(record: &MatchRecord) -> Vec<PlayerMetadataRow> {
    let match_id = record.match_id();

    record
        .info
        .participants
        .iter()
        .map(|participant| PlayerMetadataRow {
            puuid: participant.puuid.clone(),
            match_id: match_id.to_string(),
            gold_left: participant.gold_left.clone(),
            last_round: participant.last_round.clone(),
            level: participant.level.clone(),
            placement: participant.placement.clone(),
            players_eliminated: participant.players_eliminated.clone(),
            time_eliminated: participant.time_eliminated.clone(),
            total_damage_to_players: participant.total_damage_to_players.clone(),
            companion_content_id: participant.companion.content_id.clone(),
            companion_skin_id: participant.companion.skin_id.clone(),
            companion_species: participant.companion.species.clone(),
        })
        .collect()
}

/// One row per fielded unit. Display name and rarity are dropped.
pub fn player_units(record: &MatchRecord) -> Vec<PlayerUnitRow> {
    let match_id = record.match_id();

    record
        .info
        .participants
        .iter()
        .flat_map(|participant| {
            participant.units.iter().map(|unit| PlayerUnitRow {
                puuid: participant.puuid.clone(),
                match_id: match_id.to_string(),
                character_id: unit.character_id.clone(),
                items: unit.items.clone(),
                tier: unit.tier.clone(),
            })
        })
        .collect()
}

/// One row per activated trait. Style and tier progress are dropped.
pub fn player_traits(record: &MatchRecord) -> Vec<PlayerTraitRow> {
    let match_id = record.match_id();

    record
        .info
        .participants
        .iter()
        .flat_map(|participant| {
            participant.traits.iter().map(|trait_| PlayerTraitRow {
                puuid: participant.puuid.clone(),
                match_id: match_id.to_string(),
                name: trait_.name.clone(),
                num_units: trait_.num_units.clone(),
            })
        })
        .collect()
}

/// The four normalized fragments produced from one match.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchFragments {
    pub match_data: Fragment,
    pub player_metadata: Fragment,
    pub player_units: Fragment,
    pub player_traits: Fragment,
}

impl MatchFragments {
    pub fn get(&self, table: TableName) -> &Fragment {
        match table {
            TableName::MatchData => &self.match_data,
            TableName::PlayerMetadata => &self.player_metadata,
            TableName::PlayerUnits => &self.player_units,
            TableName::PlayerTraits => &self.player_traits,
        }
    }

    /// Fragments in load order.
    pub fn iter(&self) -> impl Iterator<Item = &Fragment> {
        TableName::ALL.into_iter().map(move |table| self.get(table))
    }
}

pub fn flatten(record: &MatchRecord) -> Result<MatchFragments, SchemaError> {
    Ok(MatchFragments {
        match_data: normalize(&[match_data(record)])?,
        player_metadata: normalize(&player_metadata(record))?,
        player_units: normalize(&player_units(record))?,
        player_traits: normalize(&player_traits(record))?,
    })
}
