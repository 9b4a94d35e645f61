//! Archgraph Parser — language adapters, parser pool, and the
//! content-addressed symbol store

pub mod adapter;
pub mod languages;
pub mod pool;
pub mod store;


pub use adapter::AdapterRegistry;
pub use languages::{by_tag, registry, tag_for_path, LanguageSpec};
pub use pool::{create_parser_pool, ParserPool};
pub use store::{StoreStats, SymbolStore};
