//! Cartwise Storage crate - SQLite persistence for the catalog and transcripts.
//!
//! Provides a WAL-mode SQLite database with migrations, a product repository
//! that executes declarative catalog query attempts, a conversation
//! repository for sessions and messages, and a JSON catalog importer.

pub mod catalog;
pub mod conversation;
pub mod db;
pub mod import;
pub mod migrations;

pub use catalog::ProductRepository;
pub use conversation::ConversationRepository;
pub use db::Database;
pub use import::{import_catalog_file, import_catalog_json, ImportSummary};
