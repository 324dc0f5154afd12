//! Unit catalog client and ship-name heuristic
//!
//! Bulk sync walks the full unit catalog fetched from the upstream game
//! data API. The catalog usually reports a combat type (1 = character,
//! 2 = ship); when it does not, unit ids are classified by a fixed set of
//! name-pattern rules. The heuristic is approximate by design: a wrong
//! guess only changes which source template is tried first, never whether
//! resolution succeeds.

use regex::Regex;
use std::time::Duration;
use tracing::info;

use crate::errors::SyncError;
use crate::models::{CatalogUnit, UnitType};

const SHIP_COMBAT_TYPE: u8 = 2;

/// Name-pattern rules for ship ids. Upstream ship keys follow a handful of
/// naming conventions (capital ships, fighter designations, named hulls).
const SHIP_PATTERNS: &[&str] = &[
    r"^CAPITAL",
    r"(FIGHTER|BOMBER|INTERCEPTOR)$",
    r"^(TIE|XWING|YWING|UWING|ARC170|EBONHAWK)",
    r"(MILLENNIUMFALCON|SLAVE1|HOUNDSTOOTH|GHOST|PHANTOM|OUTRIDER|RAZORCREST)",
    r"_SHIP$",
];

pub struct ShipNameMatcher {
    patterns: Vec<Regex>,
}

impl ShipNameMatcher {
    pub fn new() -> Self {
        let patterns = SHIP_PATTERNS
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect();
        Self { patterns }
    }

    pub fn is_ship(&self, game_id: &str) -> bool {
        let id = game_id.to_uppercase();
        self.patterns.iter().any(|p| p.is_match(&id))
    }

    /// Classify a catalog unit, preferring the authoritative combat type
    /// over the name heuristic.
    pub fn unit_type_for(&self, unit: &CatalogUnit) -> UnitType {
        match unit.combat_type {
            Some(t) if t == SHIP_COMBAT_TYPE => UnitType::Ship,
            Some(_) => UnitType::Character,
            None => {
                if self.is_ship(&unit.base_id) {
                    UnitType::Ship
                } else {
                    UnitType::Character
                }
            }
        }
    }
}

impl Default for ShipNameMatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub struct CatalogClient {
    client: reqwest::Client,
    url: String,
}

impl CatalogClient {
    pub fn new(url: String, timeout: Duration, user_agent: &str) -> Result<Self, SyncError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| SyncError::catalog(format!("client build failed: {e}")))?;
        Ok(Self { client, url })
    }

    /// Fetch the full unit list. Accepts either a bare JSON array or the
    /// `{"data": [...]}` envelope some mirrors wrap it in.
    pub async fn fetch_units(&self) -> Result<Vec<CatalogUnit>, SyncError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| SyncError::catalog(format!("{}: {e}", self.url)))?;

        if !response.status().is_success() {
            return Err(SyncError::catalog(format!(
                "{}: HTTP {}",
                self.url,
                response.status()
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| SyncError::catalog(format!("invalid catalog JSON: {e}")))?;

        let list = body
            .get("data")
            .cloned()
            .unwrap_or(body);

        let units: Vec<CatalogUnit> = serde_json::from_value(list)
            .map_err(|e| SyncError::catalog(format!("unexpected catalog shape: {e}")))?;

        info!("Fetched unit catalog: {} units", units.len());
        Ok(units)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(base_id: &str, combat_type: Option<u8>) -> CatalogUnit {
        CatalogUnit {
            base_id: base_id.to_string(),
            name: base_id.to_string(),
            combat_type,
        }
    }

    #[test]
    fn combat_type_wins_over_name() {
        let matcher = ShipNameMatcher::new();
        // Name looks ship-like but catalog says character
        assert_eq!(
            matcher.unit_type_for(&unit("TIEADVANCED", Some(1))),
            UnitType::Character
        );
        assert_eq!(
            matcher.unit_type_for(&unit("HOUNDSTOOTH", Some(2))),
            UnitType::Ship
        );
    }

    #[test]
    fn heuristic_matches_known_conventions() {
        let matcher = ShipNameMatcher::new();
        assert!(matcher.is_ship("CAPITALCHIMAERA"));
        assert!(matcher.is_ship("MILLENNIUMFALCON"));
        assert!(matcher.is_ship("JEDISTARFIGHTER"));
        assert!(matcher.is_ship("UMBARANSTARFIGHTER_SHIP"));
        assert!(!matcher.is_ship("DARTHVADER"));
        assert!(!matcher.is_ship("GRANDMASTERYODA"));
    }

    #[test]
    fn heuristic_is_case_insensitive() {
        let matcher = ShipNameMatcher::new();
        assert!(matcher.is_ship("capitalexecutor"));
    }

    #[test]
    fn missing_combat_type_falls_back_to_heuristic() {
        let matcher = ShipNameMatcher::new();
        assert_eq!(
            matcher.unit_type_for(&unit("CAPITALMALEVOLENCE", None)),
            UnitType::Ship
        );
        assert_eq!(
            matcher.unit_type_for(&unit("DARTHVADER", None)),
            UnitType::Character
        );
    }
}
