#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use schedule_sync::client::ScheduleClient;
use schedule_sync::error::TransportError;
use schedule_sync::http::Transport;
use schedule_sync::model::{Game, GameKey, GameUpdate, NewGame, Season, Team, TeamDescriptor};
use schedule_sync::resolver::{AliasTable, TeamResolver};
use schedule_sync::retry::RetryPolicy;
use schedule_sync::storage::{GameStore, MemoryStore};
use schedule_sync::{SyncService, SyncSettings};
use serde_json::{json, Value};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub const TEAM_CODES: [&str; 28] = [
    "KC", "BAL", "BUF", "MIA", "NE", "NYJ", "PIT", "CLE", "CIN", "HOU", "IND", "JAX", "TEN", "DEN",
    "LV", "LAC", "DAL", "PHI", "NYG", "WAS", "GB", "MIN", "CHI", "DET", "SF", "SEA", "LA", "ARI",
];

pub enum Reply {
    Events(Vec<Value>),
    Status(u16),
}

/// Upstream stand-in keyed by `(seasontype, week)`. Weeks without a script
/// return an empty scoreboard.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<HashMap<(String, String), Reply>>,
    calls: Mutex<Vec<(String, String)>>,
    call_times: Mutex<Vec<Instant>>,
    cancel_on: Mutex<Option<(String, CancellationToken)>>,
    recycles: AtomicU32,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, season_type: u8, week: u8, reply: Reply) -> Self {
        self.replies
            .lock()
            .unwrap()
            .insert((season_type.to_string(), week.to_string()), reply);
        self
    }

    /// Cancel `token` while serving the given regular-season week.
    pub fn cancel_during(self, week: u8, token: CancellationToken) -> Self {
        *self.cancel_on.lock().unwrap() = Some((week.to_string(), token));
        self
    }

    /// `(seasontype, week)` of every request, in order.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    /// When each request arrived, on the tokio clock.
    pub fn call_times(&self) -> Vec<Instant> {
        self.call_times.lock().unwrap().clone()
    }

    pub fn recycles(&self) -> u32 {
        self.recycles.load(Ordering::SeqCst)
    }
}

fn param<'a>(params: &'a [(String, String)], name: &str) -> &'a str {
    params
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
        .unwrap_or_default()
}

impl Transport for ScriptedTransport {
    async fn get_json(
        &self,
        _endpoint: &str,
        params: &[(String, String)],
    ) -> Result<Value, TransportError> {
        let key = (
            param(params, "seasontype").to_string(),
            param(params, "week").to_string(),
        );
        self.calls.lock().unwrap().push(key.clone());
        self.call_times.lock().unwrap().push(Instant::now());

        if let Some((week, token)) = self.cancel_on.lock().unwrap().as_ref() {
            if *week == key.1 {
                token.cancel();
            }
        }

        match self.replies.lock().unwrap().get(&key) {
            Some(Reply::Events(events)) => Ok(json!({ "events": events })),
            Some(Reply::Status(code)) => Err(TransportError::status(*code, "scripted failure")),
            None => Ok(json!({ "events": [] })),
        }
    }

    fn recycle(&self) {
        self.recycles.fetch_add(1, Ordering::SeqCst);
    }
}

/// Build a scoreboard event the way the upstream serializes it.
pub fn event(id: &str, home: &str, away: &str, kickoff: &str, scores: Option<(u16, u16)>, status: &str) -> Value {
    let competitor = |code: &str, side: &str, score: Option<u16>| {
        let mut c = json!({
            "id": format!("{}-{}", id, side),
            "homeAway": side,
            "team": {
                "abbreviation": code,
                "displayName": format!("{} Football Team", code),
                "shortDisplayName": format!("{} Team", code),
                "location": format!("{} City", code),
                "color": "000000",
                "alternateColor": "ffffff",
                "logo": format!("https://a.espncdn.com/i/teamlogos/nfl/500/{}.png", code.to_lowercase())
            }
        });
        if let Some(score) = score {
            c["score"] = json!(score.to_string());
        }
        c
    };

    json!({
        "id": id,
        "name": format!("{} at {}", away, home),
        "date": kickoff,
        "season": { "year": 2024, "type": 2 },
        "competitions": [{
            "date": kickoff,
            "competitors": [
                competitor(home, "home", scores.map(|s| s.0)),
                competitor(away, "away", scores.map(|s| s.1)),
            ],
            "status": { "type": { "name": status, "completed": status == "STATUS_FINAL" } }
        }]
    })
}

/// Relabel events with an upstream season-type code.
pub fn with_season_type(mut events: Vec<Value>, code: u8) -> Vec<Value> {
    for e in events.iter_mut() {
        e["season"]["type"] = json!(code);
    }
    events
}

/// Fourteen games pairing `TEAM_CODES` in order.
pub fn full_slate(kickoff: &str, scores: Option<(u16, u16)>, status: &str) -> Vec<Value> {
    TEAM_CODES
        .chunks(2)
        .enumerate()
        .map(|(i, pair)| event(&format!("40167{:04}", i), pair[0], pair[1], kickoff, scores, status))
        .collect()
}

pub async fn seeded_store(team_codes: &[&str]) -> (MemoryStore, Season) {
    let store = MemoryStore::new();
    let season = Season {
        id: Uuid::new_v4(),
        year: 2024,
        is_current: true,
        is_active: true,
    };
    store.insert_season(season.clone()).await;
    for code in team_codes {
        store
            .create_or_update_team(&TeamDescriptor {
                code: code.to_string(),
                name: format!("{} Team", code),
                city: format!("{} City", code),
                conference: "AFC".into(),
                division: "North".into(),
                ..Default::default()
            })
            .await
            .unwrap();
    }
    (store, season)
}

pub fn service<S: GameStore>(transport: ScriptedTransport, store: S) -> SyncService<ScriptedTransport, S> {
    let client = ScheduleClient::new(transport, RetryPolicy::new(2, Duration::from_millis(10)));
    let resolver = TeamResolver::new(AliasTable::bundled().unwrap());
    let settings = SyncSettings {
        week_delay: Duration::from_millis(100),
        include_preseason: false,
    };
    SyncService::new(client, store, resolver, settings)
}

/// `MemoryStore` whose team lookups fail for one code, as if the database
/// dropped the connection mid-run.
pub struct BrokenLookupStore {
    pub inner: MemoryStore,
    pub broken_code: String,
}

impl GameStore for BrokenLookupStore {
    async fn get_team_by_code(&self, code: &str) -> anyhow::Result<Option<Team>> {
        if code == self.broken_code {
            return Err(anyhow::anyhow!("connection reset while reading team {}", code));
        }
        self.inner.get_team_by_code(code).await
    }

    async fn create_or_update_team(&self, descriptor: &TeamDescriptor) -> anyhow::Result<Team> {
        self.inner.create_or_update_team(descriptor).await
    }

    async fn find_football_game(&self, key: &GameKey) -> anyhow::Result<Option<Game>> {
        self.inner.find_football_game(key).await
    }

    async fn create_football_game(&self, fields: &NewGame) -> anyhow::Result<Game> {
        self.inner.create_football_game(fields).await
    }

    async fn update_football_game(&self, id: Uuid, fields: &GameUpdate) -> anyhow::Result<()> {
        self.inner.update_football_game(id, fields).await
    }

    async fn get_current_season(&self) -> anyhow::Result<Option<Season>> {
        self.inner.get_current_season().await
    }

    async fn get_season(&self, id: Uuid) -> anyhow::Result<Option<Season>> {
        self.inner.get_season(id).await
    }
}
