//! An out-of-the-box document chat client wired to a Supabase backend.
//!
//! The crate includes a CLI tool for using in the terminal. And you can also
//! use it as a library to drive the chat and claim form from your own UI.

#![deny(missing_docs)]

mod session;

pub use rcm_supabase::{SupabaseConfig, SupabaseConfigBuilder};
pub use session::{Session, SessionBuilder};

/// Re-exports of [`rcm_core`] crate.
pub mod core {
    pub use rcm_core::*;
}
