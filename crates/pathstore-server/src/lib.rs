//! HTTP surface for pathstore.
//!
//! Translates verbs and paths into document store calls and serves the
//! short-link endpoints:
//!
//! | route                      | operation                        |
//! |----------------------------|----------------------------------|
//! | `GET /data/*path`          | load (`?json_path=` narrows)     |
//! | `HEAD /data/*path`         | strict existence check           |
//! | `POST /data/*path`         | save                             |
//! | `PUT /data/*path`          | combine                          |
//! | `GET /data/export`         | export to the configured root    |
//! | `POST /shorten`            | create a short link              |
//! | `GET /s/:code`             | 302 to the link target           |
//! | `GET /stats/:code`         | link counters                    |

pub mod config;
pub mod error;
pub mod export;
pub mod handler;
pub mod router;
pub mod server;
pub mod state;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use export::{export_tree, ExportFailure, ExportReport};
pub use router::build_router;
pub use server::PathstoreServer;
pub use state::AppState;
