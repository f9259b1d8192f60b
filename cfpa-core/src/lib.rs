pub mod analysis;
pub mod lang;
pub mod version;

pub use analysis::{RepoAnalyzeResult, RepoFileAnalyzeResult, RepoLink};
pub use lang::{classify_file_name, LangFormat, LangType};
pub use version::{McVersion, ModLoader};
