use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use super::GameStore;
use crate::model::{
    Game, GameKey, GameStatus, GameUpdate, NewGame, Season, SeasonType, Team, TeamDescriptor,
};

const GAME_COLUMNS: &str = "id, season_id, week, season_type, home_team_id, away_team_id, \
     home_score, away_score, status, game_date, start_time, scores_updated_at";
const TEAM_COLUMNS: &str =
    "id, code, name, city, conference, division, primary_color, secondary_color, logo_url";

/// Postgres-backed store. The unique matchup constraint on `football_games`
/// keeps concurrent writers from duplicating a game.
#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

#[derive(sqlx::FromRow)]
struct SeasonRow {
    id: Uuid,
    year: i32,
    is_current: bool,
    is_active: bool,
}

impl From<SeasonRow> for Season {
    fn from(row: SeasonRow) -> Self {
        Season {
            id: row.id,
            year: row.year,
            is_current: row.is_current,
            is_active: row.is_active,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TeamRow {
    id: Uuid,
    code: String,
    name: String,
    city: String,
    conference: String,
    division: String,
    primary_color: Option<String>,
    secondary_color: Option<String>,
    logo_url: Option<String>,
}

impl From<TeamRow> for Team {
    fn from(row: TeamRow) -> Self {
        Team {
            id: row.id,
            code: row.code,
            name: row.name,
            city: row.city,
            conference: row.conference,
            division: row.division,
            primary_color: row.primary_color,
            secondary_color: row.secondary_color,
            logo_url: row.logo_url,
        }
    }
}

#[derive(sqlx::FromRow)]
struct GameRow {
    id: Uuid,
    season_id: Uuid,
    week: i16,
    season_type: i16,
    home_team_id: Uuid,
    away_team_id: Uuid,
    home_score: i32,
    away_score: i32,
    status: String,
    game_date: NaiveDate,
    start_time: DateTime<Utc>,
    scores_updated_at: Option<DateTime<Utc>>,
}

impl TryFrom<GameRow> for Game {
    type Error = anyhow::Error;

    fn try_from(row: GameRow) -> Result<Self> {
        let season_type = u8::try_from(row.season_type)
            .ok()
            .and_then(SeasonType::from_code)
            .ok_or_else(|| anyhow!("game {} has invalid season_type {}", row.id, row.season_type))?;
        Ok(Game {
            id: row.id,
            season_id: row.season_id,
            week: u8::try_from(row.week).context("week out of range")?,
            season_type,
            home_team_id: row.home_team_id,
            away_team_id: row.away_team_id,
            home_score: u16::try_from(row.home_score).unwrap_or_default(),
            away_score: u16::try_from(row.away_score).unwrap_or_default(),
            status: GameStatus::parse(&row.status),
            game_date: row.game_date,
            start_time: row.start_time,
            scores_updated_at: row.scores_updated_at,
        })
    }
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn connect_with_retry(url: &str, max_retries: u32) -> Result<Self> {
        let mut attempt = 0;
        loop {
            match PgPoolOptions::new()
                .max_connections(10)
                .acquire_timeout(Duration::from_secs(10))
                .connect(url)
                .await
            {
                Ok(pool) => {
                    info!("Connected to PostgreSQL");
                    return Ok(Self::new(pool));
                }
                Err(e) => {
                    attempt += 1;
                    if attempt >= max_retries {
                        return Err(anyhow!(
                            "Failed to connect to database after {} attempts: {}",
                            max_retries,
                            e
                        ));
                    }
                    warn!("Database connection attempt {} failed: {}. Retrying...", attempt, e);
                    tokio::time::sleep(Duration::from_secs(2u64.pow(attempt))).await;
                }
            }
        }
    }

    /// Apply bundled migrations.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.db)
            .await
            .context("Failed to apply migrations")?;
        Ok(())
    }
}

impl GameStore for PgStore {
    async fn get_team_by_code(&self, code: &str) -> Result<Option<Team>> {
        let row: Option<TeamRow> =
            sqlx::query_as(&format!("SELECT {} FROM teams WHERE code = $1", TEAM_COLUMNS))
                .bind(code)
                .fetch_optional(&self.db)
                .await?;
        Ok(row.map(Team::from))
    }

    async fn create_or_update_team(&self, descriptor: &TeamDescriptor) -> Result<Team> {
        let row: TeamRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO teams (id, code, name, city, conference, division,
                               primary_color, secondary_color, logo_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (code) DO UPDATE SET
                name = EXCLUDED.name,
                city = EXCLUDED.city,
                conference = EXCLUDED.conference,
                division = EXCLUDED.division,
                primary_color = EXCLUDED.primary_color,
                secondary_color = EXCLUDED.secondary_color,
                logo_url = EXCLUDED.logo_url
            RETURNING {}
            "#,
            TEAM_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&descriptor.code)
        .bind(&descriptor.name)
        .bind(&descriptor.city)
        .bind(&descriptor.conference)
        .bind(&descriptor.division)
        .bind(&descriptor.primary_color)
        .bind(&descriptor.secondary_color)
        .bind(&descriptor.logo_url)
        .fetch_one(&self.db)
        .await
        .with_context(|| format!("Failed to upsert team {}", descriptor.code))?;
        Ok(row.into())
    }

    async fn find_football_game(&self, key: &GameKey) -> Result<Option<Game>> {
        let row: Option<GameRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM football_games
            WHERE season_id = $1 AND week = $2 AND home_team_id = $3 AND away_team_id = $4
            "#,
            GAME_COLUMNS
        ))
        .bind(key.season_id)
        .bind(i16::from(key.week))
        .bind(key.home_team_id)
        .bind(key.away_team_id)
        .fetch_optional(&self.db)
        .await?;
        row.map(Game::try_from).transpose()
    }

    async fn create_football_game(&self, fields: &NewGame) -> Result<Game> {
        // IMPORTANT: on conflict do not return the freshly generated id; it
        // never made it into the table.
        let inserted: Option<GameRow> = sqlx::query_as(&format!(
            r#"
            INSERT INTO football_games (id, season_id, week, season_type, home_team_id, away_team_id,
                                        home_score, away_score, status, game_date, start_time,
                                        scores_updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT ON CONSTRAINT football_games_matchup_key DO NOTHING
            RETURNING {}
            "#,
            GAME_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(fields.key.season_id)
        .bind(i16::from(fields.key.week))
        .bind(i16::from(fields.season_type.code()))
        .bind(fields.key.home_team_id)
        .bind(fields.key.away_team_id)
        .bind(i32::from(fields.home_score))
        .bind(i32::from(fields.away_score))
        .bind(fields.status.as_str())
        .bind(fields.game_date)
        .bind(fields.start_time)
        .bind(fields.scores_updated_at)
        .fetch_optional(&self.db)
        .await?;

        match inserted {
            Some(row) => Game::try_from(row),
            None => self
                .find_football_game(&fields.key)
                .await?
                .ok_or_else(|| anyhow!("game insert conflicted but no row found")),
        }
    }

    async fn update_football_game(&self, id: Uuid, fields: &GameUpdate) -> Result<()> {
        // NULL binds keep the stored season type and kickoff.
        let result = sqlx::query(
            r#"
            UPDATE football_games SET
                home_score = $2, away_score = $3, status = $4, scores_updated_at = $5,
                season_type = COALESCE($6, season_type),
                game_date = COALESCE($7, game_date),
                start_time = COALESCE($8, start_time)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(i32::from(fields.home_score))
        .bind(i32::from(fields.away_score))
        .bind(fields.status.as_str())
        .bind(fields.scores_updated_at)
        .bind(fields.season_type.map(|t| i16::from(t.code())))
        .bind(fields.schedule.map(|s| s.game_date))
        .bind(fields.schedule.map(|s| s.start_time))
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(anyhow!("game {} not found", id));
        }
        Ok(())
    }

    async fn get_current_season(&self) -> Result<Option<Season>> {
        let row: Option<SeasonRow> = sqlx::query_as(
            "SELECT id, year, is_current, is_active FROM seasons WHERE is_current ORDER BY year DESC LIMIT 1",
        )
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(Season::from))
    }

    async fn get_season(&self, id: Uuid) -> Result<Option<Season>> {
        let row: Option<SeasonRow> =
            sqlx::query_as("SELECT id, year, is_current, is_active FROM seasons WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.db)
                .await?;
        Ok(row.map(Season::from))
    }
}
