use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::text::comparison_key;

const RICE_MARKER: &str = "arroz";
const SAUCE_MARKER: &str = "molho";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dish {
    pub name: String,
}

impl Dish {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn requirements(&self) -> DishRequirements {
        DishRequirements::for_name(&self.name)
    }
}

/// Which variant prompts a dish needs before its quantity can be asked.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DishRequirements {
    pub rice: bool,
    pub sauce: bool,
}

impl DishRequirements {
    pub fn for_name(name: &str) -> Self {
        let key = comparison_key(name);
        Self { rice: key.contains(RICE_MARKER), sauce: key.contains(SAUCE_MARKER) }
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog source could not be read: {0}")]
    Unreadable(String),
    #[error("catalog source is malformed: {0}")]
    Malformed(String),
}

/// Tabular dish source. Read fresh on every menu render.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn dishes(&self) -> Result<Vec<Dish>, CatalogError>;
}

/// Fixed in-memory catalog, used by tests and as a bootstrap fallback.
#[derive(Clone, Debug, Default)]
pub struct StaticCatalog {
    dishes: Vec<Dish>,
}

impl StaticCatalog {
    pub fn new(dishes: Vec<Dish>) -> Self {
        Self { dishes }
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(names.into_iter().map(Dish::new).collect())
    }
}

#[async_trait]
impl CatalogSource for StaticCatalog {
    async fn dishes(&self) -> Result<Vec<Dish>, CatalogError> {
        Ok(self.dishes.clone())
    }
}
