use anyhow::Context;
use cfpa_core::LangFormat;

use super::{BatchContext, LineOutcome};
use crate::error::CommandError;
use crate::messages;

/// `/sort-keys <file>`: reorder a language file by key in place.
pub(super) async fn run(ctx: &mut BatchContext<'_>, file: &str) -> Result<LineOutcome, CommandError> {
    let session = ctx.session().await?;
    let path = session.resolve(file).await?;

    let is_file = tokio::fs::metadata(&path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false);
    if !is_file {
        return Ok(LineOutcome::recorded(messages::SORT_KEYS_FILE_NOT_EXISTS));
    }
    let Some(format) = LangFormat::from_path(&path) else {
        return Ok(LineOutcome::recorded(messages::SORT_KEYS_UNRECOGNIZED));
    };

    let original = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("Failed to read {}", file))?;
    let sorted = format
        .canonicalize(&original)
        .with_context(|| format!("Failed to sort {}", file))?;
    tokio::fs::write(&path, sorted)
        .await
        .with_context(|| format!("Failed to write {}", file))?;

    session.add_all().await?;
    session.commit(&format!("Reorder file for {}", file)).await?;
    Ok(LineOutcome::Applied)
}
