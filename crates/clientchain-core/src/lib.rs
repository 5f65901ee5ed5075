//! # ClientChain Core
//!
//! Shared foundation for the ClientChain automation platform:
//! - Configuration (`~/.clientchain/config.toml`)
//! - Error taxonomy and the crate-wide `Result` alias
//! - Domain types shared across crates (subject profiles, channel kinds)
//! - The outbound notification contracts (`SmsSender` / `EmailSender`)

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::ClientChainConfig;
pub use error::{ClientChainError, Result};
pub use traits::{EmailSender, SmsSender};
pub use types::{ChannelKind, SubjectProfile};
