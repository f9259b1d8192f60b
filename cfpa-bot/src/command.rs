/// Command parsing for slash commands in pull request comments
use std::fmt;

/// A parsed slash command from one comment line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    /// Move or rename files in the working copy
    Move {
        /// Argument text as written, used for the commit message
        raw: String,
        /// Shell-split paths; the last one is the destination
        paths: Vec<String>,
    },
    /// Pull a mod's English file from CurseForge
    UpdateEnglish { identifier: String, version: String },
    /// Register a slug → project id mapping
    AddMapping { slug: String, project_id: u64 },
    /// Reorder a language file by key
    SortKeys { file: String },
}

impl BotCommand {
    /// Whether the command needs collaborator-level permission.
    pub fn requires_collaborator(&self) -> bool {
        !matches!(self, BotCommand::AddMapping { .. })
    }
}

impl fmt::Display for BotCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BotCommand::Move { raw, .. } => write!(f, "{}{}", MOVE, raw),
            BotCommand::UpdateEnglish {
                identifier,
                version,
            } => write!(f, "{}{} {}", UPDATE_EN, identifier, version),
            BotCommand::AddMapping { slug, project_id } => {
                write!(f, "{}{} {}", ADD_MAPPING, slug, project_id)
            }
            BotCommand::SortKeys { file } => write!(f, "{}{}", SORT_KEYS, file),
        }
    }
}

/// Result of parsing one comment line that starts with a known prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine {
    Command(BotCommand),
    /// The prefix matched but the arguments did not
    Malformed { usage: &'static str, reason: String },
}

const MOVE: &str = "/mv ";
const UPDATE_EN: &str = "/update-en ";
const ADD_MAPPING: &str = "/add-mapping ";
const SORT_KEYS: &str = "/sort-keys ";

pub const MOVE_USAGE: &str = "/mv <source>... <destination>";
pub const UPDATE_EN_USAGE: &str = "/update-en <curseforge-slug> <minecraft-version>";
pub const ADD_MAPPING_USAGE: &str = "/add-mapping <slug> <curseforge-project-id>";
pub const SORT_KEYS_USAGE: &str = "/sort-keys <file>";

/// Parse every command line in a comment, in document order.
///
/// A line is a command only if it starts (without leading whitespace) with
/// one of the prefixes `/mv `, `/update-en `, `/add-mapping ` or `/sort-keys `.
/// Prefixes are tried in that order and the first match wins, so a line yields
/// at most one command. All other lines are ignored.
pub fn parse_comment(body: &str) -> Vec<ParsedLine> {
    body.lines().filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<ParsedLine> {
    if let Some(rest) = line.strip_prefix(MOVE) {
        Some(parse_move(rest))
    } else if let Some(rest) = line.strip_prefix(UPDATE_EN) {
        Some(match words::<2>(rest) {
            Some([identifier, version]) => ParsedLine::Command(BotCommand::UpdateEnglish {
                identifier: identifier.to_string(),
                version: version.to_string(),
            }),
            None => malformed(UPDATE_EN_USAGE, "expected a slug and a version"),
        })
    } else if let Some(rest) = line.strip_prefix(ADD_MAPPING) {
        Some(match words::<2>(rest) {
            Some([slug, id]) => match id.parse::<u64>() {
                Ok(project_id) => ParsedLine::Command(BotCommand::AddMapping {
                    slug: slug.to_string(),
                    project_id,
                }),
                Err(_) => malformed(
                    ADD_MAPPING_USAGE,
                    &format!("`{}` is not a project id", id),
                ),
            },
            None => malformed(ADD_MAPPING_USAGE, "expected a slug and a project id"),
        })
    } else if let Some(rest) = line.strip_prefix(SORT_KEYS) {
        Some(match words::<1>(rest) {
            Some([file]) => ParsedLine::Command(BotCommand::SortKeys {
                file: file.to_string(),
            }),
            None => malformed(SORT_KEYS_USAGE, "expected a file path"),
        })
    } else {
        None
    }
}

fn parse_move(rest: &str) -> ParsedLine {
    match shell_words::split(rest) {
        Ok(paths) if paths.len() >= 2 => ParsedLine::Command(BotCommand::Move {
            raw: rest.trim().to_string(),
            paths,
        }),
        Ok(_) => malformed(MOVE_USAGE, "expected a source and a destination"),
        Err(e) => malformed(MOVE_USAGE, &e.to_string()),
    }
}

/// The first `N` whitespace-separated words; extra words are ignored.
fn words<const N: usize>(text: &str) -> Option<[&str; N]> {
    let mut iter = text.split_whitespace();
    let mut out = [""; N];
    for slot in out.iter_mut() {
        *slot = iter.next()?;
    }
    Some(out)
}

fn malformed(usage: &'static str, reason: &str) -> ParsedLine {
    ParsedLine::Malformed {
        usage,
        reason: reason.to_string(),
    }
}
