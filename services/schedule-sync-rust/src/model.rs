//! Season, team and game records as the storage contract sees them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Placeholder used for conference/division when the feed does not supply them.
pub const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Season {
    pub id: Uuid,
    pub year: i32,
    pub is_current: bool,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: Uuid,
    /// Canonical code, unique across teams.
    pub code: String,
    pub name: String,
    pub city: String,
    pub conference: String,
    pub division: String,
    pub primary_color: Option<String>,
    pub secondary_color: Option<String>,
    pub logo_url: Option<String>,
}

/// Input to `create_or_update_team`, keyed by `code`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TeamDescriptor {
    pub code: String,
    pub name: String,
    pub city: String,
    pub conference: String,
    pub division: String,
    pub primary_color: Option<String>,
    pub secondary_color: Option<String>,
    pub logo_url: Option<String>,
}

impl From<&Team> for TeamDescriptor {
    fn from(team: &Team) -> Self {
        Self {
            code: team.code.clone(),
            name: team.name.clone(),
            city: team.city.clone(),
            conference: team.conference.clone(),
            division: team.division.clone(),
            primary_color: team.primary_color.clone(),
            secondary_color: team.secondary_color.clone(),
            logo_url: team.logo_url.clone(),
        }
    }
}

/// Upstream season-type codes: 1 = preseason, 2 = regular, 3 = postseason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SeasonType {
    Preseason,
    Regular,
    Postseason,
}

impl SeasonType {
    pub fn code(self) -> u8 {
        match self {
            SeasonType::Preseason => 1,
            SeasonType::Regular => 2,
            SeasonType::Postseason => 3,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(SeasonType::Preseason),
            2 => Some(SeasonType::Regular),
            3 => Some(SeasonType::Postseason),
            _ => None,
        }
    }

    /// Number of weeks synced when no explicit week is requested.
    pub fn week_count(self) -> u8 {
        match self {
            SeasonType::Preseason => 4,
            SeasonType::Regular => 18,
            SeasonType::Postseason => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SeasonType::Preseason => "preseason",
            SeasonType::Regular => "regular",
            SeasonType::Postseason => "postseason",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GameStatus {
    #[default]
    Scheduled,
    InProgress,
    Final,
    Postponed,
    Canceled,
}

impl GameStatus {
    /// Map an upstream status type name. `completed` wins over the name.
    pub fn from_upstream(name: &str, completed: bool) -> Self {
        if completed {
            return GameStatus::Final;
        }
        match name {
            "STATUS_IN_PROGRESS" | "STATUS_HALFTIME" | "STATUS_END_PERIOD" => {
                GameStatus::InProgress
            }
            "STATUS_FINAL" | "STATUS_FINAL_OVERTIME" => GameStatus::Final,
            "STATUS_POSTPONED" => GameStatus::Postponed,
            "STATUS_CANCELED" => GameStatus::Canceled,
            _ => GameStatus::Scheduled,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GameStatus::Scheduled => "scheduled",
            GameStatus::InProgress => "in_progress",
            GameStatus::Final => "final",
            GameStatus::Postponed => "postponed",
            GameStatus::Canceled => "canceled",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "in_progress" => GameStatus::InProgress,
            "final" => GameStatus::Final,
            "postponed" => GameStatus::Postponed,
            "canceled" => GameStatus::Canceled,
            _ => GameStatus::Scheduled,
        }
    }
}

/// At most one game exists per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GameKey {
    pub season_id: Uuid,
    pub week: u8,
    pub home_team_id: Uuid,
    pub away_team_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub id: Uuid,
    pub season_id: Uuid,
    pub week: u8,
    pub season_type: SeasonType,
    pub home_team_id: Uuid,
    pub away_team_id: Uuid,
    pub home_score: u16,
    pub away_score: u16,
    pub status: GameStatus,
    pub game_date: NaiveDate,
    pub start_time: DateTime<Utc>,
    pub scores_updated_at: Option<DateTime<Utc>>,
}

impl Game {
    pub fn key(&self) -> GameKey {
        GameKey {
            season_id: self.season_id,
            week: self.week,
            home_team_id: self.home_team_id,
            away_team_id: self.away_team_id,
        }
    }
}

/// Fields for `create_football_game`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGame {
    pub key: GameKey,
    pub season_type: SeasonType,
    pub home_score: u16,
    pub away_score: u16,
    pub status: GameStatus,
    pub game_date: NaiveDate,
    pub start_time: DateTime<Utc>,
    pub scores_updated_at: DateTime<Utc>,
}

/// Kickoff date and time. Only ever written in full-sync mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleFields {
    pub game_date: NaiveDate,
    pub start_time: DateTime<Utc>,
}

/// Fields for `update_football_game`. `None` leaves the stored season type
/// or kickoff untouched; score-only sync sets neither.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameUpdate {
    pub home_score: u16,
    pub away_score: u16,
    pub status: GameStatus,
    pub scores_updated_at: DateTime<Utc>,
    pub season_type: Option<SeasonType>,
    pub schedule: Option<ScheduleFields>,
}

impl GameUpdate {
    pub fn apply_to(&self, game: &mut Game) {
        game.home_score = self.home_score;
        game.away_score = self.away_score;
        game.status = self.status;
        game.scores_updated_at = Some(self.scores_updated_at);
        if let Some(season_type) = self.season_type {
            game.season_type = season_type;
        }
        if let Some(schedule) = self.schedule {
            game.game_date = schedule.game_date;
            game.start_time = schedule.start_time;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Create games and teams, refresh scheduling metadata and scores.
    Full,
    /// Refresh score and status on existing games only.
    ScoresOnly,
}

impl SyncMode {
    pub fn from_scores_only(scores_only: bool) -> Self {
        if scores_only {
            SyncMode::ScoresOnly
        } else {
            SyncMode::Full
        }
    }

    pub fn is_scores_only(self) -> bool {
        self == SyncMode::ScoresOnly
    }
}
