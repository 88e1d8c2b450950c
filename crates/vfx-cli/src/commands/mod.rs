//! CLI command implementations: each maps one subcommand onto exactly one
//! `vfx_session::Session` API call, per the session-level API surface.

pub mod filter;
pub mod import;
pub mod info;
pub mod preset;
pub mod render;

fn to_anyhow(err: vfx_core::error::Error) -> anyhow::Error {
    anyhow::anyhow!(err.to_string())
}
