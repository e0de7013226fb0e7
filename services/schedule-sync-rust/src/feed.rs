//! Normalizes scoreboard events into `FetchedGame`s ready for reconciliation.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::{SyncError, SyncResult};
use crate::espn::{EspnCompetitor, EspnEvent, EspnStatus};
use crate::model::{GameStatus, SeasonType};

/// One competitor's team as the feed describes it, before alias mapping.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FeedTeam {
    pub code: String,
    pub name: String,
    pub city: String,
    pub primary_color: Option<String>,
    pub secondary_color: Option<String>,
    pub logo_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedGame {
    pub external_id: String,
    pub season_type: Option<SeasonType>,
    pub home: FeedTeam,
    pub away: FeedTeam,
    pub home_score: Option<u16>,
    pub away_score: Option<u16>,
    pub status: GameStatus,
    pub status_detail: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
}

/// Convert one event. Fails with `MalformedRecord` when the event lacks two
/// competitors or a distinguishable home/away pair.
pub fn parse_event(event: &EspnEvent) -> SyncResult<FetchedGame> {
    let external_id = event.id.clone().unwrap_or_default();
    let competition = event.competitions.first().ok_or_else(|| {
        SyncError::MalformedRecord(format!("event '{}' has no competition", external_id))
    })?;

    if competition.competitors.len() < 2 {
        return Err(SyncError::MalformedRecord(format!(
            "event '{}' has {} competitor(s)",
            external_id,
            competition.competitors.len()
        )));
    }

    let home = find_side(&competition.competitors, "home").ok_or_else(|| {
        SyncError::MalformedRecord(format!("event '{}' has no home competitor", external_id))
    })?;
    let away = find_side(&competition.competitors, "away").ok_or_else(|| {
        SyncError::MalformedRecord(format!("event '{}' has no away competitor", external_id))
    })?;

    let status = competition.status.as_ref().or(event.status.as_ref());
    let (status, status_detail) = map_status(status);

    let start_time = event
        .date
        .as_deref()
        .or(competition.date.as_deref())
        .and_then(parse_upstream_date);

    Ok(FetchedGame {
        external_id,
        season_type: event
            .season
            .as_ref()
            .and_then(|s| s.season_type)
            .and_then(SeasonType::from_code),
        home: map_team(home),
        away: map_team(away),
        home_score: parse_score(home),
        away_score: parse_score(away),
        status,
        status_detail,
        start_time,
    })
}

fn find_side<'a>(competitors: &'a [EspnCompetitor], side: &str) -> Option<&'a EspnCompetitor> {
    competitors
        .iter()
        .find(|c| c.home_away.as_deref() == Some(side))
}

fn map_team(c: &EspnCompetitor) -> FeedTeam {
    let Some(team) = c.team.as_ref() else {
        return FeedTeam::default();
    };
    let non_empty = |v: &Option<String>| v.as_ref().filter(|s| !s.trim().is_empty()).cloned();

    FeedTeam {
        code: team.abbreviation.clone().unwrap_or_default().trim().to_string(),
        name: team
            .short_display_name
            .clone()
            .or_else(|| team.display_name.clone())
            .unwrap_or_default(),
        city: team.location.clone().unwrap_or_default(),
        primary_color: non_empty(&team.color),
        secondary_color: non_empty(&team.alternate_color),
        logo_url: non_empty(&team.logo),
    }
}

fn parse_score(c: &EspnCompetitor) -> Option<u16> {
    c.score.as_deref().and_then(|s| s.trim().parse::<u16>().ok())
}

fn map_status(status: Option<&EspnStatus>) -> (GameStatus, Option<String>) {
    let Some(status_type) = status.and_then(|s| s.status_type.as_ref()) else {
        return (GameStatus::Scheduled, None);
    };
    let name = status_type.name.as_deref().unwrap_or_default();
    (
        GameStatus::from_upstream(name, status_type.completed.unwrap_or(false)),
        status_type.detail.clone(),
    )
}

/// The upstream writes minute-precision timestamps without seconds
/// ("2024-10-06T17:00Z"); full RFC 3339 is accepted too.
pub fn parse_upstream_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%MZ")
        .ok()
        .map(|naive| naive.and_utc())
}
