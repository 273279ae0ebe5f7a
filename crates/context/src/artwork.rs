//! Artwork metadata catalog
//!
//! Each ingested collection is named after an artwork: `"{title}, {artist}"`.
//! The catalog maps a collection back to its artwork so the prompt can lead
//! with the artwork description, museum context and artist biography.

use artalk_common::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn default_artist_name() -> String {
    "NoArtistName".to_string()
}

fn default_artist_biography() -> String {
    "NoArtistBiography".to_string()
}

fn default_museum_name() -> String {
    "NoMuseumName".to_string()
}

fn default_museum_context() -> String {
    "NoMuseumContext".to_string()
}

fn default_title() -> String {
    "NoTitle".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artist {
    #[serde(default = "new_id")]
    pub id: String,
    #[serde(default = "default_artist_name")]
    pub name: String,
    #[serde(default = "default_artist_biography")]
    pub artist_biography: String,
}

impl Default for Artist {
    fn default() -> Self {
        Self {
            id: new_id(),
            name: default_artist_name(),
            artist_biography: default_artist_biography(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Museum {
    #[serde(default = "new_id")]
    pub id: String,
    #[serde(default = "default_museum_name")]
    pub name: String,
    #[serde(default = "default_museum_context")]
    pub museum_context: String,
}

impl Default for Museum {
    fn default() -> Self {
        Self {
            id: new_id(),
            name: default_museum_name(),
            museum_context: default_museum_context(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artwork {
    #[serde(default = "new_id")]
    pub id: String,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default)]
    pub artist: Artist,
    #[serde(default)]
    pub museum: Museum,
    /// Directory holding the artwork's source PDFs
    #[serde(default, alias = "ressources_path")]
    pub resources_path: String,
    #[serde(default)]
    pub description: String,
}

impl Default for Artwork {
    fn default() -> Self {
        Self {
            id: new_id(),
            title: default_title(),
            artist: Artist::default(),
            museum: Museum::default(),
            resources_path: String::new(),
            description: String::new(),
        }
    }
}

impl Artwork {
    /// Name of the vector collection holding this artwork's documents
    pub fn collection_name(&self) -> String {
        format!("{}, {}", self.title, self.artist.name)
    }

    /// Prompt preamble describing the artwork, its museum and its artist
    pub fn global_context(&self) -> String {
        format!(
            "Voici la description de l'oeuvre: {}\n\nVoici le contexte du musée: {}\n\nVoici la biographie de l'artiste: {}",
            self.description, self.museum.museum_context, self.artist.artist_biography
        )
    }
}

/// Lookup of artwork records
#[async_trait]
pub trait ArtworkCatalog: Send + Sync {
    async fn artwork(&self, id: &str) -> Result<Artwork>;

    async fn artwork_id_for_collection(&self, collection: &str) -> Result<String>;
}

/// Catalog held in memory, optionally seeded from a JSON array of artworks
#[derive(Default)]
pub struct InMemoryCatalog {
    artworks: RwLock<HashMap<String, Artwork>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, artwork: Artwork) {
        self.artworks.write().await.insert(artwork.id.clone(), artwork);
    }

    pub async fn len(&self) -> usize {
        self.artworks.read().await.len()
    }

    pub async fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to read catalog {}: {}", path.display(), e),
            })?;
        let artworks: Vec<Artwork> = serde_json::from_str(&raw)?;

        let catalog = Self::new();
        for artwork in artworks {
            catalog.insert(artwork).await;
        }
        debug!(path = %path.display(), count = catalog.len().await, "Artwork catalog loaded");
        Ok(catalog)
    }
}

#[async_trait]
impl ArtworkCatalog for InMemoryCatalog {
    async fn artwork(&self, id: &str) -> Result<Artwork> {
        self.artworks
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::RecordNotFound {
                kind: "Artwork".to_string(),
                key: id.to_string(),
            })
    }

    async fn artwork_id_for_collection(&self, collection: &str) -> Result<String> {
        let artworks = self.artworks.read().await;
        // lowest id wins when two artworks share a collection name
        artworks
            .values()
            .filter(|a| a.collection_name() == collection)
            .map(|a| a.id.clone())
            .min()
            .ok_or_else(|| AppError::RecordNotFound {
                kind: "Artwork collection".to_string(),
                key: collection.to_string(),
            })
    }
}

/// Artwork preamble for `collection`.
///
/// A missing record does not fail the request: the lookup error text becomes
/// the context instead.
pub async fn global_context_for_collection(
    catalog: &dyn ArtworkCatalog,
    collection: &str,
) -> String {
    let lookup = async {
        let id = catalog.artwork_id_for_collection(collection).await?;
        catalog.artwork(&id).await
    };
    match lookup.await {
        Ok(artwork) => artwork.global_context(),
        Err(e) => {
            warn!(collection, error = %e, "No artwork record for collection");
            e.to_string()
        }
    }
}
