use super::{ensure_parent, BatchContext, LineOutcome};
use crate::error::CommandError;

/// `/mv <source>... <destination>` via `git mv`.
///
/// Every path is checked before anything on disk changes.
pub(super) async fn run(
    ctx: &mut BatchContext<'_>,
    raw: &str,
    paths: &[String],
) -> Result<LineOutcome, CommandError> {
    let session = ctx.session().await?;

    let mut resolved = Vec::with_capacity(paths.len());
    for path in paths {
        resolved.push(session.resolve(path).await?);
    }
    if let Some(destination) = resolved.last() {
        ensure_parent(destination).await?;
    }

    let mut args = vec!["mv".to_string(), "-f".to_string(), "--".to_string()];
    args.extend(paths.iter().cloned());
    session.run(&args).await?;
    session.add_all().await?;
    session.commit(&format!("mv {}", raw)).await?;
    Ok(LineOutcome::Applied)
}
