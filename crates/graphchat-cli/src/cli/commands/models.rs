//! Model command handlers.

use anyhow::{Context, Result};
use graphchat_core::config;
use graphchat_core::models::ModelKind;

use crate::cli::parse_model;

/// Prints every provider, marking `current`.
pub fn list(current: &str) {
    let current = ModelKind::from_id(current);
    for kind in ModelKind::all() {
        let marker = if Some(*kind) == current { "*" } else { " " };
        println!(
            "{marker} {:<10} {:<10} {}",
            kind.id(),
            kind.label(),
            kind.backend_model()
        );
    }
}

/// Persists `id` as the default model.
pub fn select(id: &str) -> Result<()> {
    let kind = parse_model(id)?;
    let config_path = config::paths::config_path();
    config::Config::save_model_to(&config_path, kind.id())
        .with_context(|| format!("save model to {}", config_path.display()))?;
    println!("Default model set to {} ({})", kind.id(), kind.backend_model());
    Ok(())
}
