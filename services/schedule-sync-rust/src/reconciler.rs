//! Decides create / update / skip for one fetched game.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::SyncResult;
use crate::feed::FetchedGame;
use crate::model::{GameKey, GameUpdate, NewGame, ScheduleFields, SeasonType, SyncMode, Team};
use crate::storage::GameStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Created(Uuid),
    Updated(Uuid),
    Skipped,
}

/// Where a fetched game belongs locally.
#[derive(Debug, Clone, Copy)]
pub struct GameContext {
    pub season_id: Uuid,
    pub week: u8,
    /// Season type the week was requested with; the event's own value wins
    /// when present.
    pub season_type: SeasonType,
    pub mode: SyncMode,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct GameReconciler;

impl GameReconciler {
    pub async fn reconcile<S: GameStore>(
        &self,
        store: &S,
        ctx: GameContext,
        game: &FetchedGame,
        home: &Team,
        away: &Team,
    ) -> SyncResult<ReconcileOutcome> {
        let GameContext { mode, now, .. } = ctx;
        let key = GameKey {
            season_id: ctx.season_id,
            week: ctx.week,
            home_team_id: home.id,
            away_team_id: away.id,
        };
        let season_type = game.season_type.unwrap_or(ctx.season_type);

        if let Some(existing) = store.find_football_game(&key).await? {
            // Missing scores mean "not reported yet"; keep what is stored.
            let update = GameUpdate {
                home_score: game.home_score.unwrap_or(existing.home_score),
                away_score: game.away_score.unwrap_or(existing.away_score),
                status: game.status,
                scores_updated_at: now,
                season_type: match mode {
                    SyncMode::ScoresOnly => None,
                    SyncMode::Full => Some(season_type),
                },
                schedule: match mode {
                    SyncMode::ScoresOnly => None,
                    SyncMode::Full => game.start_time.map(|start_time| ScheduleFields {
                        game_date: start_time.date_naive(),
                        start_time,
                    }),
                },
            };
            store.update_football_game(existing.id, &update).await?;
            debug!(
                "Updated game {} {} @ {}: {}-{} ({})",
                existing.id,
                away.code,
                home.code,
                update.away_score,
                update.home_score,
                update.status.as_str()
            );
            return Ok(ReconcileOutcome::Updated(existing.id));
        }

        if mode.is_scores_only() {
            debug!(
                "No local game for {} @ {} in week {}; score-only sync does not create",
                away.code, home.code, ctx.week
            );
            return Ok(ReconcileOutcome::Skipped);
        }

        let Some(start_time) = game.start_time else {
            warn!(
                "Event {} ({} @ {}) has no kickoff time; not creating",
                game.external_id, away.code, home.code
            );
            return Ok(ReconcileOutcome::Skipped);
        };

        let created = store
            .create_football_game(&NewGame {
                key,
                season_type,
                home_score: game.home_score.unwrap_or(0),
                away_score: game.away_score.unwrap_or(0),
                status: game.status,
                game_date: start_time.date_naive(),
                start_time,
                scores_updated_at: now,
            })
            .await?;
        debug!("Created game {} {} @ {} (week {})", created.id, away.code, home.code, ctx.week);
        Ok(ReconcileOutcome::Created(created.id))
    }
}
