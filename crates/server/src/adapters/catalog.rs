use std::path::PathBuf;

use async_trait::async_trait;
use marmita_core::domain::catalog::{CatalogError, CatalogSource, Dish};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    dishes: Vec<Dish>,
}

/// `[[dishes]]` tables in a TOML file, re-read on every call so edits show up
/// without a restart.
pub struct TomlCatalog {
    path: PathBuf,
}

impl TomlCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CatalogSource for TomlCatalog {
    async fn dishes(&self) -> Result<Vec<Dish>, CatalogError> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|error| {
            CatalogError::Unreadable(format!("{}: {error}", self.path.display()))
        })?;
        let file: CatalogFile = toml::from_str(&raw)
            .map_err(|error| CatalogError::Malformed(format!("{}: {error}", self.path.display())))?;

        Ok(file.dishes.into_iter().filter(|dish| !dish.name.trim().is_empty()).collect())
    }
}
