use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::GameStore;
use crate::model::{Game, GameKey, GameUpdate, NewGame, Season, Team, TeamDescriptor};

#[derive(Default)]
struct Tables {
    seasons: Vec<Season>,
    teams: HashMap<Uuid, Team>,
    games: Vec<Game>,
}

/// In-process store for tests and dry runs. Cloning shares the same tables.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_season(&self, season: Season) {
        let mut tables = self.inner.write().await;
        if season.is_current {
            for s in tables.seasons.iter_mut() {
                s.is_current = false;
            }
        }
        tables.seasons.push(season);
    }

    pub async fn teams(&self) -> Vec<Team> {
        let tables = self.inner.read().await;
        let mut teams: Vec<Team> = tables.teams.values().cloned().collect();
        teams.sort_by(|a, b| a.code.cmp(&b.code));
        teams
    }

    /// Games in insertion order.
    pub async fn games(&self) -> Vec<Game> {
        self.inner.read().await.games.clone()
    }

    pub async fn team_count(&self) -> usize {
        self.inner.read().await.teams.len()
    }

    pub async fn game_count(&self) -> usize {
        self.inner.read().await.games.len()
    }
}

impl GameStore for MemoryStore {
    async fn get_team_by_code(&self, code: &str) -> Result<Option<Team>> {
        let tables = self.inner.read().await;
        Ok(tables.teams.values().find(|t| t.code == code).cloned())
    }

    async fn create_or_update_team(&self, descriptor: &TeamDescriptor) -> Result<Team> {
        let mut tables = self.inner.write().await;
        let existing = tables
            .teams
            .values()
            .find(|t| t.code == descriptor.code)
            .map(|t| t.id);
        let id = existing.unwrap_or_else(Uuid::new_v4);
        let team = Team {
            id,
            code: descriptor.code.clone(),
            name: descriptor.name.clone(),
            city: descriptor.city.clone(),
            conference: descriptor.conference.clone(),
            division: descriptor.division.clone(),
            primary_color: descriptor.primary_color.clone(),
            secondary_color: descriptor.secondary_color.clone(),
            logo_url: descriptor.logo_url.clone(),
        };
        tables.teams.insert(id, team.clone());
        Ok(team)
    }

    async fn find_football_game(&self, key: &GameKey) -> Result<Option<Game>> {
        let tables = self.inner.read().await;
        Ok(tables.games.iter().find(|g| g.key() == *key).cloned())
    }

    async fn create_football_game(&self, fields: &NewGame) -> Result<Game> {
        let mut tables = self.inner.write().await;
        if let Some(existing) = tables.games.iter().find(|g| g.key() == fields.key) {
            return Ok(existing.clone());
        }
        let game = Game {
            id: Uuid::new_v4(),
            season_id: fields.key.season_id,
            week: fields.key.week,
            season_type: fields.season_type,
            home_team_id: fields.key.home_team_id,
            away_team_id: fields.key.away_team_id,
            home_score: fields.home_score,
            away_score: fields.away_score,
            status: fields.status,
            game_date: fields.game_date,
            start_time: fields.start_time,
            scores_updated_at: Some(fields.scores_updated_at),
        };
        tables.games.push(game.clone());
        Ok(game)
    }

    async fn update_football_game(&self, id: Uuid, fields: &GameUpdate) -> Result<()> {
        let mut tables = self.inner.write().await;
        let game = tables
            .games
            .iter_mut()
            .find(|g| g.id == id)
            .ok_or_else(|| anyhow!("game {} not found", id))?;
        fields.apply_to(game);
        Ok(())
    }

    async fn get_current_season(&self) -> Result<Option<Season>> {
        let tables = self.inner.read().await;
        Ok(tables.seasons.iter().find(|s| s.is_current).cloned())
    }

    async fn get_season(&self, id: Uuid) -> Result<Option<Season>> {
        let tables = self.inner.read().await;
        Ok(tables.seasons.iter().find(|s| s.id == id).cloned())
    }
}
