//! Reply lines posted back to the pull request.

pub const PERMISSION_DENIED: &str =
    "You do not have permission to run this command. Only collaborators and the pull request author can.";

pub const UPDATE_EN_MULTIPLE_FILES: &str =
    "The mod archive contains more than one English language file; update it manually.";

pub const UPDATE_EN_NOT_FOUND: &str = "No English language file was found in the mod archive.";

pub const ADD_MAPPING_REJECTED: &str = "Only the administrator can add mod id mappings.";

pub const SORT_KEYS_FILE_NOT_EXISTS: &str = "The file does not exist.";

pub const SORT_KEYS_UNRECOGNIZED: &str =
    "Unrecognized file format; only `.json` and `.lang` files can be sorted.";

pub fn malformed(usage: &str, reason: &str) -> String {
    format!("Could not parse command ({}). Usage: `{}`", reason, usage)
}

pub fn update_en_success(download_file_name: &str) -> String {
    format!("Updated English file from `{}`.", download_file_name)
}

pub fn add_mapping_success(slug: &str, project_id: u64) -> String {
    format!("Mapped `{}` to CurseForge project {}.", slug, project_id)
}

pub fn add_mapping_slug_mismatch(slug: &str, project_id: u64, actual_slug: &str) -> String {
    format!(
        "Project {} has slug `{}`, not `{}`; mapping not added.",
        project_id, actual_slug, slug
    )
}

pub fn general_error(error: &dyn std::fmt::Display) -> String {
    format!("An error occurred: {}", error)
}
