use anyhow::Context;
use cfpa_core::{LangFormat, LangType, McVersion};
use tracing::info;

use super::{ensure_parent, BatchContext, LineOutcome};
use crate::error::CommandError;
use crate::messages;

/// `/update-en <identifier> <version>`: replace a mod's English file with the
/// one shipped in its latest published archive.
pub(super) async fn run(
    ctx: &mut BatchContext<'_>,
    identifier: &str,
    version_str: &str,
) -> Result<LineOutcome, CommandError> {
    let version: McVersion = version_str.parse()?;
    let mod_host = ctx.mod_host;

    let addon = mod_host
        .get_addon(identifier)
        .await
        .with_context(|| format!("Failed to find addon {}", identifier))?;
    let english = mod_host.get_english_files(&addon, version).await?;
    let file = match english.files.as_slice() {
        [file] => file,
        [] => return Ok(LineOutcome::recorded(messages::UPDATE_EN_NOT_FOUND)),
        _ => return Ok(LineOutcome::recorded(messages::UPDATE_EN_MULTIPLE_FILES)),
    };
    let converted = LangFormat::for_version(version)
        .convert(&file.content)
        .with_context(|| format!("Failed to convert English file of {}", identifier))?;

    let relative = format!(
        "projects/{}/assets/{}/{}/lang/{}",
        version.as_str(),
        identifier,
        file.mod_id,
        version.lang_file(LangType::En)
    );
    let session = ctx.session().await?;
    let target = session.resolve(&relative).await?;
    ensure_parent(&target).await?;
    tokio::fs::write(&target, converted)
        .await
        .with_context(|| format!("Failed to write {}", relative))?;
    info!("Wrote {} from {}", relative, english.download_file_name);

    session.add_all().await?;
    session
        .commit(&format!("Update en_us file for {}", identifier))
        .await?;
    Ok(LineOutcome::Recorded(messages::update_en_success(
        &english.download_file_name,
    )))
}
