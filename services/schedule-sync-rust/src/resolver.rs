//! Maps feed team codes to internal team records, creating or backfilling
//! them as needed.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::error::{SyncError, SyncResult};
use crate::feed::FeedTeam;
use crate::model::{SyncMode, Team, TeamDescriptor, UNKNOWN};
use crate::storage::GameStore;

const BUNDLED_ALIASES: &str = include_str!("../data/team_aliases.json");

/// Feed abbreviation -> canonical code. Keys and values are upper-cased.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasTable {
    aliases: HashMap<String, String>,
}

impl AliasTable {
    /// The table shipped with the service.
    pub fn bundled() -> Result<Self> {
        Self::from_json(BUNDLED_ALIASES).context("bundled team_aliases.json is invalid")
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let raw: HashMap<String, String> = serde_json::from_str(json)?;
        Ok(Self {
            aliases: raw
                .into_iter()
                .map(|(k, v)| (k.trim().to_ascii_uppercase(), v.trim().to_ascii_uppercase()))
                .collect(),
        })
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read alias table {:?}", path.as_ref()))?;
        let table = Self::from_json(&contents)
            .with_context(|| format!("Failed to parse alias table {:?}", path.as_ref()))?;
        info!("Loaded {} team aliases from {:?}", table.len(), path.as_ref());
        Ok(table)
    }

    pub fn canonical(&self, code: &str) -> String {
        let upper = code.trim().to_ascii_uppercase();
        self.aliases.get(&upper).cloned().unwrap_or(upper)
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

pub struct TeamResolver {
    aliases: AliasTable,
}

impl TeamResolver {
    pub fn new(aliases: AliasTable) -> Self {
        Self { aliases }
    }

    /// Resolve a competitor to a stored team.
    ///
    /// Full sync creates missing teams and fills blank color/logo fields from
    /// the feed; values already stored are kept. Score-only sync never writes
    /// and yields `None` for teams it has not seen.
    pub async fn resolve<S: GameStore>(
        &self,
        store: &S,
        feed: &FeedTeam,
        mode: SyncMode,
    ) -> SyncResult<Option<Team>> {
        if feed.code.trim().is_empty() {
            return Err(SyncError::TeamResolution(format!(
                "competitor '{}' has no team code",
                feed.name
            )));
        }
        if feed.name.trim().is_empty() {
            return Err(SyncError::TeamResolution(format!(
                "team '{}' has no name",
                feed.code
            )));
        }

        let code = self.aliases.canonical(&feed.code);
        let existing = store.get_team_by_code(&code).await?;

        match (existing, mode) {
            (existing, SyncMode::ScoresOnly) => Ok(existing),
            (Some(team), SyncMode::Full) => {
                let Some(backfilled) = backfill(&team, feed) else {
                    return Ok(Some(team));
                };
                debug!("Backfilling colors/logo for team {}", code);
                Ok(Some(store.create_or_update_team(&backfilled).await?))
            }
            (None, SyncMode::Full) => {
                let descriptor = TeamDescriptor {
                    code: code.clone(),
                    name: feed.name.trim().to_string(),
                    city: feed.city.trim().to_string(),
                    conference: UNKNOWN.to_string(),
                    division: UNKNOWN.to_string(),
                    primary_color: feed.primary_color.clone(),
                    secondary_color: feed.secondary_color.clone(),
                    logo_url: feed.logo_url.clone(),
                };
                let team = store.create_or_update_team(&descriptor).await?;
                info!("Created team {} ({} {})", team.code, team.city, team.name);
                Ok(Some(team))
            }
        }
    }
}

/// Descriptor with blank color/logo fields filled from the feed, or `None`
/// when nothing would change.
fn backfill(team: &Team, feed: &FeedTeam) -> Option<TeamDescriptor> {
    let mut descriptor = TeamDescriptor::from(team);
    let mut changed = false;

    for (slot, incoming) in [
        (&mut descriptor.primary_color, &feed.primary_color),
        (&mut descriptor.secondary_color, &feed.secondary_color),
        (&mut descriptor.logo_url, &feed.logo_url),
    ] {
        if slot.as_deref().map_or(true, |s| s.trim().is_empty()) && incoming.is_some() {
            *slot = incoming.clone();
            changed = true;
        }
    }

    changed.then_some(descriptor)
}
