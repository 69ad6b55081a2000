//! CLI commands implementation

pub mod ask;
pub mod crawl;
pub mod embed;
pub mod index;
pub mod ingest;
pub mod init;
pub mod query;
pub mod status;

pub use ask::*;
pub use crawl::*;
pub use embed::*;
pub use index::*;
pub use ingest::*;
pub use init::*;
pub use query::*;
pub use status::*;
