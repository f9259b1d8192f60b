use anyhow::Context;
use tracing::warn;

use super::{BatchContext, LineOutcome};
use crate::error::CommandError;
use crate::messages;

/// `/add-mapping <slug> <project-id>`, administrator only. Touches the mapping
/// store, never the working copy.
pub(super) async fn run(
    ctx: &mut BatchContext<'_>,
    slug: &str,
    project_id: u64,
) -> Result<LineOutcome, CommandError> {
    if ctx.user.login != ctx.settings.admin_login {
        warn!("{} tried to add a mapping for {}", ctx.user.login, slug);
        return Ok(LineOutcome::recorded(messages::ADD_MAPPING_REJECTED));
    }

    let addon = ctx
        .mod_host
        .get_addon_by_id(project_id)
        .await
        .with_context(|| format!("Failed to fetch CurseForge project {}", project_id))?;
    if addon.slug != slug {
        return Ok(LineOutcome::Recorded(messages::add_mapping_slug_mismatch(
            slug,
            project_id,
            &addon.slug,
        )));
    }

    ctx.mappings.insert(slug, project_id).await?;
    Ok(LineOutcome::Recorded(messages::add_mapping_success(
        slug, project_id,
    )))
}
