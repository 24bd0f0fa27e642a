//! mdsite-lsp: a Language Server for wikilinked Markdown sites
//!
//! This crate provides the engine behind the `mdsite-lsp` binary: editor
//! support for Markdown sites that cross-reference posts with `[[wikilinks]]`
//! and people or other sites with `@mentions`.
//!
//! # Overview
//!
//! - **Workspace Index**: posts by slug and alias, mentions by handle and alias
//! - **Autocomplete**: wikilinks, mentions, frontmatter fields and values, admonitions
//! - **Hover**: post and mention cards, frontmatter and admonition documentation
//! - **Go to definition**: wikilinks to posts, mentions to posts or external sites
//! - **Diagnostics**: broken wikilinks, unknown mentions, frontmatter problems
//!
//! # Architecture
//!
//! - [`transport`] and [`jsonrpc`]: Content-Length framed JSON-RPC over any byte stream
//! - [`server`]: session state machine and method dispatch
//! - [`index`]: the in-memory workspace index
//! - [`context`]: what construct the cursor sits in
//! - [`lint`]: document checks against a [`lint::Resolver`]
//! - [`config`]: settings from `mdsite.*` files
//!
//! # Usage
//!
//! ```ignore
//! use mdsite_lsp::config::Settings;
//! use mdsite_lsp::index::Index;
//!
//! let settings = Settings::new(&root)?;
//! let index = Index::new();
//! index.build(&root, &settings);
//! let post = index.get_by_slug("getting-started");
//! ```

// Protocol plumbing
pub mod jsonrpc;
pub mod server;
pub mod transport;

// Workspace state
pub mod document;
pub mod index;

// LSP feature modules
pub mod completion;
pub mod diagnostics;
pub mod gotodef;
pub mod hover;

// Configuration and analysis
pub mod config;
pub mod context;
pub mod lint;
pub mod syntax;
