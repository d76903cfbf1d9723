//! File-system-backed JSON entity store for GRW game data.
//!
//! Layout: `<root>/<game-slug>/_meta.json` plus one `<entity-type>.json`
//! array per category. Reads serve the wiki pages, writes come from the
//! development-only admin API.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use grw_core::{entity_identity, EventConfigError, GameEvent, GameMeta};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::warn;
use uuid::Uuid;

pub const CRATE_NAME: &str = "grw-storage";

/// Entity type whose records get schedule validation before any write.
pub const EVENTS_ENTITY_TYPE: &str = "events";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("game not found: {0}")]
    GameNotFound(String),
    #[error("entity type not found: {game}/{entity_type}")]
    EntityTypeNotFound { game: String, entity_type: String },
    #[error("entity with id {0} not found")]
    EntityNotFound(String),
    #[error("entity with id {0} already exists")]
    DuplicateId(String),
    #[error("entity with slug {0} already exists")]
    DuplicateSlug(String),
    #[error("entity is missing required identity fields (id, slug, name)")]
    MissingIdentity,
    #[error("invalid event record: {0}")]
    InvalidEvent(String),
    #[error("invalid event recurrence: {0}")]
    InvalidRecurrence(#[from] EventConfigError),
    #[error("malformed json in {path}: {source}")]
    MalformedJson {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Whether the admin CRUD surface is switched on. Off by default; the
/// admin API answers 404 when disabled.
pub fn admin_enabled_from_env() -> bool {
    std::env::var("GRW_ADMIN")
        .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "True"))
        .unwrap_or(false)
}

#[derive(Debug, Clone)]
pub struct DataStore {
    root: PathBuf,
}

impl DataStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn game_dir(&self, game: &str) -> PathBuf {
        self.root.join(game)
    }

    fn entity_file(&self, game: &str, entity_type: &str) -> PathBuf {
        self.game_dir(game).join(format!("{entity_type}.json"))
    }

    /// Scan the data root for game directories, skipping any whose
    /// metadata fails to load.
    pub async fn list_games(&self) -> Result<Vec<GameMeta>, StoreError> {
        let mut games = Vec::new();
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(games),
            Err(err) => return Err(err.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let slug = entry.file_name().to_string_lossy().to_string();
            match self.load_game_meta(&slug).await {
                Ok(meta) => games.push(meta),
                Err(err) => warn!(game = %slug, error = %err, "skipping game with unreadable metadata"),
            }
        }
        games.sort_by(|a, b| a.slug.cmp(&b.slug));
        Ok(games)
    }

    pub async fn load_game_meta(&self, game: &str) -> Result<GameMeta, StoreError> {
        let path = self.game_dir(game).join("_meta.json");
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::GameNotFound(game.to_string()))
            }
            Err(err) => return Err(err.into()),
        };
        serde_json::from_str(&content).map_err(|source| StoreError::MalformedJson {
            path: path.display().to_string(),
            source,
        })
    }

    pub async fn game_exists(&self, game: &str) -> bool {
        self.load_game_meta(game).await.is_ok()
    }

    /// Load all records of an entity type; a missing file is an error
    /// for page rendering (the category is advertised in `_meta.json`).
    pub async fn load_entities(
        &self,
        game: &str,
        entity_type: &str,
    ) -> Result<Vec<JsonValue>, StoreError> {
        let path = self.entity_file(game, entity_type);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::EntityTypeNotFound {
                    game: game.to_string(),
                    entity_type: entity_type.to_string(),
                })
            }
            Err(err) => return Err(err.into()),
        };
        serde_json::from_str(&content).map_err(|source| StoreError::MalformedJson {
            path: path.display().to_string(),
            source,
        })
    }

    /// CRUD view of an entity file: a missing file reads as empty so the
    /// first create in a fresh category works.
    pub async fn read_entities(
        &self,
        game: &str,
        entity_type: &str,
    ) -> Result<Vec<JsonValue>, StoreError> {
        match self.load_entities(game, entity_type).await {
            Ok(entities) => Ok(entities),
            Err(StoreError::EntityTypeNotFound { .. }) => Ok(Vec::new()),
            Err(err) => Err(err),
        }
    }

    pub async fn entity_by_id(
        &self,
        game: &str,
        entity_type: &str,
        id: &str,
    ) -> Result<Option<JsonValue>, StoreError> {
        let entities = self.read_entities(game, entity_type).await?;
        Ok(entities
            .into_iter()
            .find(|e| e.get("id").and_then(JsonValue::as_str) == Some(id)))
    }

    pub async fn entity_by_slug(
        &self,
        game: &str,
        entity_type: &str,
        slug: &str,
    ) -> Result<Option<JsonValue>, StoreError> {
        let entities = self.load_entities(game, entity_type).await?;
        Ok(entities
            .into_iter()
            .find(|e| e.get("slug").and_then(JsonValue::as_str) == Some(slug)))
    }

    pub async fn entity_count(&self, game: &str, entity_type: &str) -> usize {
        self.read_entities(game, entity_type)
            .await
            .map(|e| e.len())
            .unwrap_or(0)
    }

    /// Load the typed events of a game. Missing or unreadable files read
    /// as no events; pages still render the rest of the wiki.
    pub async fn load_events(&self, game: &str) -> Vec<GameEvent> {
        let values = match self.read_entities(game, EVENTS_ENTITY_TYPE).await {
            Ok(values) => values,
            Err(err) => {
                warn!(game, error = %err, "failed to load events");
                return Vec::new();
            }
        };
        let mut events = Vec::with_capacity(values.len());
        for value in values {
            match serde_json::from_value::<GameEvent>(value) {
                Ok(event) => events.push(event),
                Err(err) => warn!(game, error = %err, "skipping malformed event record"),
            }
        }
        events
    }

    pub async fn event_by_slug(&self, game: &str, slug: &str) -> Option<GameEvent> {
        self.load_events(game)
            .await
            .into_iter()
            .find(|e| e.slug == slug)
    }

    /// Replace an entity file atomically: write a temp file in the same
    /// directory, then rename over the target.
    pub async fn write_entities(
        &self,
        game: &str,
        entity_type: &str,
        entities: &[JsonValue],
    ) -> Result<(), StoreError> {
        let path = self.entity_file(game, entity_type);
        let dir = path.parent().expect("entity path always has parent");
        fs::create_dir_all(dir).await?;

        let mut content = serde_json::to_string_pretty(entities)
            .expect("json values always serialize");
        content.push('\n');

        let temp_path = dir.join(format!(".{}.tmp", Uuid::new_v4()));
        let mut file = fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp_path)
            .await?;
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;
        drop(file);

        match fs::rename(&temp_path, &path).await {
            Ok(()) => Ok(()),
            Err(err) => {
                let _ = fs::remove_file(&temp_path).await;
                Err(err.into())
            }
        }
    }

    /// Create a new entity; both its id and slug must be unused.
    pub async fn create_entity(
        &self,
        game: &str,
        entity_type: &str,
        entity: JsonValue,
    ) -> Result<(), StoreError> {
        let identity = entity_identity(&entity).ok_or(StoreError::MissingIdentity)?;
        validate_entity_payload(entity_type, &entity)?;

        let mut entities = self.read_entities(game, entity_type).await?;
        if entities.iter().any(|e| string_field(e, "id") == Some(identity.id.as_str())) {
            return Err(StoreError::DuplicateId(identity.id));
        }
        if entities
            .iter()
            .any(|e| string_field(e, "slug") == Some(identity.slug.as_str()))
        {
            return Err(StoreError::DuplicateSlug(identity.slug));
        }

        entities.push(entity);
        self.write_entities(game, entity_type, &entities).await
    }

    /// Update an existing entity in place. The path id wins over any id
    /// in the payload; a changed slug must still be unique.
    pub async fn update_entity(
        &self,
        game: &str,
        entity_type: &str,
        id: &str,
        mut entity: JsonValue,
    ) -> Result<(), StoreError> {
        entity
            .as_object_mut()
            .ok_or(StoreError::MissingIdentity)?
            .insert("id".to_string(), JsonValue::String(id.to_string()));
        let identity = entity_identity(&entity).ok_or(StoreError::MissingIdentity)?;
        validate_entity_payload(entity_type, &entity)?;

        let mut entities = self.read_entities(game, entity_type).await?;
        let index = entities
            .iter()
            .position(|e| string_field(e, "id") == Some(id))
            .ok_or_else(|| StoreError::EntityNotFound(id.to_string()))?;

        let slug_taken = entities.iter().enumerate().any(|(i, e)| {
            i != index && string_field(e, "slug") == Some(identity.slug.as_str())
        });
        if slug_taken {
            return Err(StoreError::DuplicateSlug(identity.slug));
        }

        entities[index] = entity;
        self.write_entities(game, entity_type, &entities).await
    }

    pub async fn delete_entity(
        &self,
        game: &str,
        entity_type: &str,
        id: &str,
    ) -> Result<(), StoreError> {
        let mut entities = self.read_entities(game, entity_type).await?;
        let before = entities.len();
        entities.retain(|e| string_field(e, "id") != Some(id));
        if entities.len() == before {
            return Err(StoreError::EntityNotFound(id.to_string()));
        }
        self.write_entities(game, entity_type, &entities).await
    }

    /// Case-insensitive substring search over the named fields. String
    /// fields match directly, string arrays match on any element.
    pub async fn search_entities(
        &self,
        game: &str,
        entity_type: &str,
        query: &str,
        fields: &[String],
    ) -> Result<Vec<JsonValue>, StoreError> {
        let entities = self.read_entities(game, entity_type).await?;
        if query.is_empty() {
            return Ok(entities);
        }
        let needle = query.to_lowercase();
        Ok(entities
            .into_iter()
            .filter(|entity| {
                fields.iter().any(|field| match entity.get(field) {
                    Some(JsonValue::String(s)) => s.to_lowercase().contains(&needle),
                    Some(JsonValue::Array(items)) => items.iter().any(|item| {
                        item.as_str()
                            .map(|s| s.to_lowercase().contains(&needle))
                            .unwrap_or(false)
                    }),
                    _ => false,
                })
            })
            .collect())
    }
}

fn string_field<'a>(entity: &'a JsonValue, key: &str) -> Option<&'a str> {
    entity.get(key).and_then(JsonValue::as_str)
}

fn validate_entity_payload(entity_type: &str, entity: &JsonValue) -> Result<(), StoreError> {
    if entity_type != EVENTS_ENTITY_TYPE {
        return Ok(());
    }
    let event: GameEvent = serde_json::from_value(entity.clone())
        .map_err(|err| StoreError::InvalidEvent(err.to_string()))?;
    event.validate()?;
    Ok(())
}

/// Sort a snapshot of entities by one field. Records missing the field
/// sort last regardless of direction.
pub fn sort_entities(mut entities: Vec<JsonValue>, field: &str, order: SortOrder) -> Vec<JsonValue> {
    entities.sort_by(|a, b| {
        let ordering = match (a.get(field), b.get(field)) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => return Ordering::Greater,
            (Some(_), None) => return Ordering::Less,
            (Some(av), Some(bv)) => compare_values(av, bv),
        };
        match order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
    entities
}

fn compare_values(a: &JsonValue, b: &JsonValue) -> Ordering {
    match (a, b) {
        (JsonValue::String(a), JsonValue::String(b)) => a.cmp(b),
        (JsonValue::Number(a), JsonValue::Number(b)) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        _ => a.to_string().cmp(&b.to_string()),
    }
}
