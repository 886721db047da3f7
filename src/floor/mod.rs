//! Floor monitor: Andon boards, line worker switching and production tracking.
//!
//! ## Module Map
//!
//! ```text
//! ┌──────────┐   HTTP   ┌──────────────────────────────────────────────────┐
//! │ Browser  │ ───────> │  server.rs  (axum Router, ServerConfig)          │
//! │ / sensor │ <─────── │    ├─ auth.rs  (session cookie, admin gate)      │
//! └──────────┘          │    └─ api.rs   (route handlers, AppState)        │
//!                       │         │                                        │
//!                       │         │ AndonService / SwitchService           │
//!                       │         v                                        │
//!                       │  andon_service.rs, switch_service.rs             │
//!                       │         │                                        │
//!                       │         │ &dyn *Repository, in_transaction()     │
//!                       │         v                                        │
//!                       │  repository.rs  (one trait per table)            │
//!                       │         │                                        │
//!                       │         v                                        │
//!                       │  db.rs  (FloorDb implements every trait)         │
//!                       └──────────────────────────────────────────────────┘
//! ```
//!
//! ## Supporting Modules
//!
//! | Module      | Responsibility                                          |
//! |-------------|---------------------------------------------------------|
//! | `models`    | Records and eager-loaded views (`ProcessDetail`)        |
//! | `requests`  | Request payloads and their validation rules             |
//! | `views`     | Server-rendered HTML: board, datatables, login form     |
//!
//! ## Typical Request Flow (reassign workers)
//!
//! 1. `PUT /api/processes/{id}/line-workers` → `api::update_line_workers()`
//! 2. The request is validated against the lines of the process.
//! 3. `SwitchService::update_line_worker()` opens one transaction, updates
//!    each line's worker and, while a production run is active, stops the
//!    old producer and starts the new one on every non-defective line.
//! 4. Any falsy repository result rolls the whole batch back.

pub mod andon_service;
pub mod api;
pub mod auth;
pub mod db;
pub mod models;
pub mod repository;
pub mod requests;
pub mod server;
pub mod switch_service;
pub mod views;
