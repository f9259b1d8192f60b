use thiserror::Error;

/// Errors that abort a whole command batch.
///
/// Anything a handler can recover from (permission denied, missing file,
/// unrecognized format, slug mismatch, ambiguous downloads) is reported through
/// [`crate::handlers::LineOutcome`] instead and never reaches this type.
#[derive(Debug, Error)]
pub enum CommandError {
    /// A user-supplied path resolves outside the working copy.
    #[error("Security check failed: `{path}` resolves outside the repository")]
    SecurityCheck { path: String },

    /// The pull request's head is the upstream repository's protected branch.
    #[error(
        "Commands cannot be run against {owner}/{repo}:{branch}; open the pull request from another branch"
    )]
    ProtectedBranch {
        owner: String,
        repo: String,
        branch: String,
    },

    /// Any other handler failure; the message echoes the cause chain.
    #[error("{0:#}")]
    Handler(#[from] anyhow::Error),
}
