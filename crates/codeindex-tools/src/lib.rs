//! Transport-agnostic tool layer over the code index.
//!
//! Exposes `index_directory`, `search_code`, `index_stats`, `check_health`
//! and `reload_index`. Every call returns a [`tools::ToolResponse`] carrying
//! either a JSON or text payload or a descriptive error message, so a
//! protocol server can forward it verbatim.
//!
//! # Examples
//!
//! ```no_run
//! use codeindex_core::CodeIndexConfig;
//! use codeindex_tools::tools::{CodeIndexTools, SearchCodeParams};
//!
//! # async fn example() -> codeindex_core::Result<()> {
//! let dir = std::env::current_dir()?;
//! let tools = CodeIndexTools::from_config(&CodeIndexConfig::default(), &dir)?;
//! let response = tools
//!     .search_code(SearchCodeParams {
//!         query: Some("where are sessions parsed".into()),
//!         ..Default::default()
//!     })
//!     .await;
//! println!("{}", response.text);
//! # Ok(())
//! # }
//! ```

pub mod tools;
