//! Douyin → Feishu Bitable metadata sync.
//!
//! The heart of the crate is [`normalization`]: a pure transformation from
//! the loosely-typed video payloads the TikHub gateway returns into the
//! strictly-typed records the Bitable table expects. Everything else is a
//! collaborator around that core: [`provider::douyin`] fetches raw payloads
//! (and owns retries, fallbacks and the takedown heuristic), [`store::feishu`]
//! reads and writes table rows, and [`cli`] wires both together for the `ds`
//! binary.

pub mod cli;
pub mod config;
pub mod logging;
pub mod normalization;
pub mod provider;
pub mod store;

pub mod util {
    pub mod env;
}
