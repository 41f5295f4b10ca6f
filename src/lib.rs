//! catalog-sync - Multilingual Taxonomy Sync
//!
//! Client-side engine that keeps hierarchical taxonomies (codelists, concept
//! schemes, category schemes) of a statistical metadata catalog complete in
//! every configured language: it flattens fetched trees, fills missing
//! translations through a persistent cache, and pushes new items and
//! translations back with the catalog's two-phase CSV import.

pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod flatten;
pub mod model;
pub mod translate;
pub mod workflow;
