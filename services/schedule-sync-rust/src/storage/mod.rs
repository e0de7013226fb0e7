//! The narrow storage contract the sync engine writes through.

mod memory;
mod postgres;

use std::future::Future;

use anyhow::Result;
use uuid::Uuid;

use crate::model::{Game, GameKey, GameUpdate, NewGame, Season, Team, TeamDescriptor};

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub trait GameStore: Send + Sync {
    fn get_team_by_code(&self, code: &str) -> impl Future<Output = Result<Option<Team>>> + Send;

    /// Insert or update the team identified by `descriptor.code`.
    fn create_or_update_team(
        &self,
        descriptor: &TeamDescriptor,
    ) -> impl Future<Output = Result<Team>> + Send;

    fn find_football_game(&self, key: &GameKey) -> impl Future<Output = Result<Option<Game>>> + Send;

    /// Create a game. If one already exists for `fields.key` it is returned
    /// unchanged; no second row is ever written for the same key.
    fn create_football_game(&self, fields: &NewGame) -> impl Future<Output = Result<Game>> + Send;

    fn update_football_game(
        &self,
        id: Uuid,
        fields: &GameUpdate,
    ) -> impl Future<Output = Result<()>> + Send;

    fn get_current_season(&self) -> impl Future<Output = Result<Option<Season>>> + Send;

    fn get_season(&self, id: Uuid) -> impl Future<Output = Result<Option<Season>>> + Send;
}
