//! Entity lookup for mention suggestions.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::api::{ApiClient, ApiError};

/// Something a mention can point at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entity {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
}

impl Entity {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Entity {
            id,
            name: name.into(),
            image: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("lookup unavailable: {0}")]
    Unavailable(String),
}

/// How a query is matched against entity names. Matching ignores case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    #[default]
    Prefix,
    Substring,
}

pub const MIN_LIMIT: usize = 5;
pub const MAX_LIMIT: usize = 50;

/// Filter `entities` by `query` and order them by match position, then name,
/// then id. At most `limit` results, with `limit` clamped to 5..=50.
pub fn rank_candidates(entities: Vec<Entity>, query: &str, mode: MatchMode, limit: usize) -> Vec<Entity> {
    let needle = query.to_lowercase();
    let mut ranked: Vec<(usize, String, Entity)> = entities
        .into_iter()
        .filter_map(|entity| {
            let name = entity.name.to_lowercase();
            let at = match mode {
                MatchMode::Prefix => name.starts_with(&needle).then_some(0),
                MatchMode::Substring => name.find(&needle),
            }?;
            Some((at, name, entity))
        })
        .collect();

    ranked.sort_by(|a, b| {
        a.0.cmp(&b.0)
            .then_with(|| a.1.cmp(&b.1))
            .then_with(|| a.2.id.cmp(&b.2.id))
    });
    ranked
        .into_iter()
        .take(limit.clamp(MIN_LIMIT, MAX_LIMIT))
        .map(|(_, _, entity)| entity)
        .collect()
}

/// Source of mention candidates. Calls may overlap; callers discard
/// responses that no longer match what the user typed.
#[async_trait]
pub trait EntityLookup: Send + Sync {
    async fn lookup(&self, query: &str) -> Result<Vec<Entity>, LookupError>;
}

/// A fixed set of entities.
#[derive(Debug, Clone, Default)]
pub struct StaticLookup {
    entities: Vec<Entity>,
    mode: MatchMode,
    limit: usize,
}

impl StaticLookup {
    pub fn new(entities: Vec<Entity>) -> Self {
        StaticLookup {
            entities,
            mode: MatchMode::default(),
            limit: MIN_LIMIT,
        }
    }

    pub fn with_matching(mut self, mode: MatchMode, limit: usize) -> Self {
        self.mode = mode;
        self.limit = limit;
        self
    }
}

#[async_trait]
impl EntityLookup for StaticLookup {
    async fn lookup(&self, query: &str) -> Result<Vec<Entity>, LookupError> {
        Ok(rank_candidates(self.entities.clone(), query, self.mode, self.limit))
    }
}

/// Clubs fetched from the backend. One bounded page is fetched on first use
/// and filtered locally for every query until [`RemoteLookup::refresh`].
pub struct RemoteLookup {
    api: ApiClient,
    page_size: u32,
    mode: MatchMode,
    limit: usize,
    cache: RwLock<Option<Vec<Entity>>>,
}

impl RemoteLookup {
    pub fn new(api: ApiClient, page_size: u32) -> Self {
        RemoteLookup {
            api,
            page_size,
            mode: MatchMode::default(),
            limit: MIN_LIMIT,
            cache: RwLock::new(None),
        }
    }

    pub fn with_matching(mut self, mode: MatchMode, limit: usize) -> Self {
        self.mode = mode;
        self.limit = limit;
        self
    }

    /// Forget the cached page; the next lookup fetches again.
    pub async fn refresh(&self) {
        *self.cache.write().await = None;
    }

    async fn entities(&self) -> Result<Vec<Entity>, LookupError> {
        if let Some(cached) = self.cache.read().await.as_ref() {
            return Ok(cached.clone());
        }

        let mut cache = self.cache.write().await;
        if let Some(cached) = cache.as_ref() {
            return Ok(cached.clone());
        }
        let page = self.api.list_clubs(0, self.page_size).await?;
        if !page.last {
            tracing::debug!(
                total = page.total_elements,
                fetched = page.content.len(),
                "club listing exceeds one page; suggestions cover the first page only"
            );
        }
        let entities: Vec<Entity> = page.content.into_iter().map(Entity::from).collect();
        *cache = Some(entities.clone());
        Ok(entities)
    }
}

#[async_trait]
impl EntityLookup for RemoteLookup {
    async fn lookup(&self, query: &str) -> Result<Vec<Entity>, LookupError> {
        let entities = self.entities().await?;
        Ok(rank_candidates(entities, query, self.mode, self.limit))
    }
}
