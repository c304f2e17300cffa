//! Catalog-backed providers for the `advert-cli` binary

pub mod catalog;

pub use catalog::{CatalogEntry, JsonCatalogProvider};
