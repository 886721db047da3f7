//! CLI command implementations.
//!
//! | Module   | Commands handled |
//! |----------|------------------|
//! | `serve`  | `Serve`          |
//! | `init`   | `Init`           |
//! | `user`   | `User`           |
//! | `config` | `Config`         |

pub mod config;
pub mod init;
pub mod serve;
pub mod user;

pub use config::cmd_config;
pub use init::cmd_init;
pub use serve::cmd_serve;
pub use user::cmd_user;
