//! Week-by-week fetch and reconcile across a season.

use std::time::Duration;

use chrono::{NaiveDate, Utc, Weekday};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::client::ScheduleClient;
use crate::error::{SyncError, SyncResult};
use crate::feed::parse_event;
use crate::http::Transport;
use crate::lifecycle::LifecycleManager;
use crate::model::{Season, SeasonType, SyncMode};
use crate::reconciler::{GameContext, GameReconciler, ReconcileOutcome};
use crate::resolver::TeamResolver;
use crate::storage::GameStore;

/// Aggregate result of a run. A lower bound: weeks that failed upstream are
/// counted in `failed_weeks`, not retried.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncTotals {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed_weeks: usize,
}

impl SyncTotals {
    fn record(&mut self, outcome: ReconcileOutcome) {
        match outcome {
            ReconcileOutcome::Created(_) => self.created += 1,
            ReconcileOutcome::Updated(_) => self.updated += 1,
            ReconcileOutcome::Skipped => self.skipped += 1,
        }
    }

    fn has_progress(&self) -> bool {
        self.created + self.updated + self.skipped + self.failed_weeks > 0
    }
}

/// Parameters for `update_nfl_games`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncRequest {
    pub season_id: Uuid,
    /// `None` syncs every week of the season (or of `season_type`).
    pub week: Option<u8>,
    pub season_type: Option<SeasonType>,
    pub scores_only: bool,
}

impl SyncRequest {
    pub fn season(season_id: Uuid) -> Self {
        Self {
            season_id,
            week: None,
            season_type: None,
            scores_only: false,
        }
    }

    pub fn week(mut self, week: u8) -> Self {
        self.week = Some(week);
        self
    }

    pub fn season_type(mut self, season_type: SeasonType) -> Self {
        self.season_type = Some(season_type);
        self
    }

    pub fn scores_only(mut self) -> Self {
        self.scores_only = true;
        self
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SyncSettings {
    /// Pause between consecutive weeks.
    pub week_delay: Duration,
    /// Include preseason weeks 1-4 in a full-season sync.
    pub include_preseason: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            week_delay: Duration::from_millis(150),
            include_preseason: true,
        }
    }
}

pub struct SyncService<T, S> {
    client: ScheduleClient<T>,
    store: S,
    resolver: TeamResolver,
    reconciler: GameReconciler,
    lifecycle: LifecycleManager,
    settings: SyncSettings,
}

impl<T: Transport, S: GameStore> SyncService<T, S> {
    pub fn new(client: ScheduleClient<T>, store: S, resolver: TeamResolver, settings: SyncSettings) -> Self {
        Self {
            client,
            store,
            resolver,
            reconciler: GameReconciler,
            lifecycle: LifecycleManager::default(),
            settings,
        }
    }

    pub fn with_lifecycle(mut self, lifecycle: LifecycleManager) -> Self {
        self.lifecycle = lifecycle;
        self
    }

    pub fn client(&self) -> &ScheduleClient<T> {
        &self.client
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Fetch and reconcile one week, or the whole season when no week is given.
    /// Per-week failures are logged and counted; only a missing season or a
    /// cancellation before any progress fails the call.
    pub async fn update_nfl_games(
        &self,
        request: &SyncRequest,
        cancel: &CancellationToken,
    ) -> SyncResult<SyncTotals> {
        self.lifecycle.maybe_cleanup(&self.client);

        let season = self
            .store
            .get_season(request.season_id)
            .await?
            .ok_or(SyncError::SeasonNotFound(request.season_id))?;

        let plan = week_plan(request.week, request.season_type, self.settings.include_preseason);
        let mode = SyncMode::from_scores_only(request.scores_only);
        info!(
            "Starting {} sync for season {} ({} week(s))",
            if mode.is_scores_only() { "score-only" } else { "full" },
            season.year,
            plan.len()
        );
        self.run_weeks(&season, &plan, mode, cancel).await
    }

    /// Score-only sync of the current and preceding week of the season.
    pub async fn update_game_scores(&self, cancel: &CancellationToken) -> SyncResult<SyncTotals> {
        self.update_game_scores_on(Utc::now().date_naive(), cancel).await
    }

    /// `update_game_scores` with an explicit "today".
    pub async fn update_game_scores_on(
        &self,
        today: NaiveDate,
        cancel: &CancellationToken,
    ) -> SyncResult<SyncTotals> {
        self.lifecycle.maybe_cleanup(&self.client);

        let season = self
            .store
            .get_current_season()
            .await?
            .ok_or(SyncError::NoCurrentSeason)?;

        let include_preseason = self.settings.include_preseason;
        let current = season_week(season.year, today, include_preseason);
        let plan: Vec<(SeasonType, u8)> = preceding_week(current, include_preseason)
            .into_iter()
            .chain(std::iter::once(current))
            .collect();
        info!("Refreshing scores for season {} week(s) {:?}", season.year, plan);
        self.run_weeks(&season, &plan, SyncMode::ScoresOnly, cancel).await
    }

    async fn run_weeks(
        &self,
        season: &Season,
        plan: &[(SeasonType, u8)],
        mode: SyncMode,
        cancel: &CancellationToken,
    ) -> SyncResult<SyncTotals> {
        let mut totals = SyncTotals::default();

        for (i, &(season_type, week)) in plan.iter().enumerate() {
            if i > 0 {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return stop_on_cancel(totals),
                    _ = tokio::time::sleep(self.settings.week_delay) => {}
                }
            }
            if cancel.is_cancelled() {
                return stop_on_cancel(totals);
            }

            match self.sync_week(season, season_type, week, mode, cancel, &mut totals).await {
                Ok(()) => {}
                Err(SyncError::Cancelled) => return stop_on_cancel(totals),
                Err(e) => {
                    totals.failed_weeks += 1;
                    error!(
                        "Week {} ({}) of season {} failed: {}",
                        week,
                        season_type.as_str(),
                        season.year,
                        e
                    );
                }
            }

            self.lifecycle.maybe_cleanup(&self.client);
        }

        info!(
            "Sync finished for season {}: {} created, {} updated, {} skipped, {} failed week(s)",
            season.year, totals.created, totals.updated, totals.skipped, totals.failed_weeks
        );
        Ok(totals)
    }

    async fn sync_week(
        &self,
        season: &Season,
        season_type: SeasonType,
        week: u8,
        mode: SyncMode,
        cancel: &CancellationToken,
        totals: &mut SyncTotals,
    ) -> SyncResult<()> {
        let scoreboard = self
            .client
            .fetch_week(season.year, week, season_type, cancel)
            .await?;

        let ctx = GameContext {
            season_id: season.id,
            week,
            season_type,
            mode,
            now: Utc::now(),
        };

        for event in &scoreboard.events {
            if cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }

            let game = match parse_event(event) {
                Ok(game) => game,
                Err(e) => {
                    warn!("Skipping event in week {}: {}", week, e);
                    totals.skipped += 1;
                    continue;
                }
            };

            let home = self.resolver.resolve(&self.store, &game.home, mode).await;
            let away = self.resolver.resolve(&self.store, &game.away, mode).await;
            // Store failures fail the week, whichever side hit them.
            let (home, away) = match (home, away) {
                (Err(e), _) if !is_resolution_failure(&e) => return Err(e),
                (_, Err(e)) if !is_resolution_failure(&e) => return Err(e),
                (Ok(Some(home)), Ok(Some(away))) => (home, away),
                (Err(e), _) | (_, Err(e)) => {
                    warn!("Skipping event {}: {}", game.external_id, e);
                    totals.skipped += 1;
                    continue;
                }
                _ => {
                    totals.skipped += 1;
                    continue;
                }
            };

            // CRITICAL CHECK: home and away must be different teams
            if home.id == away.id {
                warn!(
                    "Skipping event {}: home and away resolved to the same team {}",
                    game.external_id, home.code
                );
                totals.skipped += 1;
                continue;
            }

            let outcome = self
                .reconciler
                .reconcile(&self.store, ctx, &game, &home, &away)
                .await?;
            totals.record(outcome);
        }

        info!(
            "Week {} ({}): {} event(s) processed",
            week,
            season_type.as_str(),
            scoreboard.events.len()
        );
        Ok(())
    }
}

fn is_resolution_failure(err: &SyncError) -> bool {
    matches!(err, SyncError::TeamResolution(_))
}

fn stop_on_cancel(totals: SyncTotals) -> SyncResult<SyncTotals> {
    if totals.has_progress() {
        warn!("Sync cancelled; returning partial totals {:?}", totals);
        Ok(totals)
    } else {
        Err(SyncError::Cancelled)
    }
}

/// Weeks to visit, in order. Week 0 is treated like no week.
pub fn week_plan(
    week: Option<u8>,
    season_type: Option<SeasonType>,
    include_preseason: bool,
) -> Vec<(SeasonType, u8)> {
    match (week.filter(|w| *w > 0), season_type) {
        (Some(week), season_type) => vec![(season_type.unwrap_or(SeasonType::Regular), week)],
        (None, Some(season_type)) => (1..=season_type.week_count())
            .map(|w| (season_type, w))
            .collect(),
        (None, None) => {
            let mut plan = Vec::new();
            if include_preseason {
                plan.extend((1..=SeasonType::Preseason.week_count()).map(|w| (SeasonType::Preseason, w)));
            }
            plan.extend((1..=SeasonType::Regular.week_count()).map(|w| (SeasonType::Regular, w)));
            plan
        }
    }
}

/// Season type and week for `date`, counted in seven-day blocks from the
/// Thursday after Labor Day.
///
/// Regular weeks run 1..=18 from kickoff. Postseason weeks follow week 18
/// and clamp at 5. Before kickoff the dates map to preseason weeks ending
/// at week 4, two blocks before kickoff, with the idle block just before
/// kickoff folded into week 4. Without preseason, those dates fall back to
/// regular week 1.
pub fn season_week(season_year: i32, date: NaiveDate, include_preseason: bool) -> (SeasonType, u8) {
    let Some(kickoff) = season_kickoff(season_year) else {
        return (SeasonType::Regular, 1);
    };

    if date < kickoff {
        if !include_preseason {
            return (SeasonType::Regular, 1);
        }
        let blocks_before = ((kickoff - date).num_days() - 1) / 7 + 1;
        let week = (6 - blocks_before).clamp(1, i64::from(SeasonType::Preseason.week_count()));
        return (SeasonType::Preseason, week as u8);
    }

    let week = (date - kickoff).num_days() / 7 + 1;
    let regular_weeks = i64::from(SeasonType::Regular.week_count());
    if week <= regular_weeks {
        return (SeasonType::Regular, week as u8);
    }
    let postseason = (week - regular_weeks).clamp(1, i64::from(SeasonType::Postseason.week_count()));
    (SeasonType::Postseason, postseason as u8)
}

/// The week before `current`, crossing season-type boundaries. `None` before
/// the first week of the season.
pub fn preceding_week(current: (SeasonType, u8), include_preseason: bool) -> Option<(SeasonType, u8)> {
    match current {
        (season_type, week) if week > 1 => Some((season_type, week - 1)),
        (SeasonType::Postseason, _) => Some((SeasonType::Regular, SeasonType::Regular.week_count())),
        (SeasonType::Regular, _) if include_preseason => {
            Some((SeasonType::Preseason, SeasonType::Preseason.week_count()))
        }
        _ => None,
    }
}

fn season_kickoff(season_year: i32) -> Option<NaiveDate> {
    let labor_day = NaiveDate::from_weekday_of_month_opt(season_year, 9, Weekday::Mon, 1)?;
    labor_day.checked_add_days(chrono::Days::new(3))
}
