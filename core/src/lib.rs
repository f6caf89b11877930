pub mod archive;
pub mod backup;
pub mod cache;
pub mod config;
pub mod encoding;
pub mod export;
pub mod formats;
pub mod glossary;
pub mod lang;
pub mod placeholder;
pub mod protector;
pub mod quest;
pub mod session;
pub mod translate;
pub mod tree;

pub use archive::{inspect_mod, resource_pack_mods, ArchiveError, ModArchive};
pub use cache::{CacheEntry, CacheError, TranslationCache};
pub use config::TranslatorConfig;
pub use export::{export_pack, scan_pack, ExportSummary, PackScan};
pub use formats::lang_file::KeyMap;
pub use formats::{FileFormat, FormatError};
pub use glossary::{Glossary, GlossaryError, TermHint};
pub use lang::{Lang, LangError, LangRecord, LangSource};
pub use protector::{Protector, ProtectedFragment, ProtectorError, SkipReason};
pub use quest::{open_quest, BetterQuest, FtbQuest, LegacyFtbQuest, QuestDocument, QuestKind};
pub use session::{DocumentKind, Session, SessionError};
pub use translate::{
    translate_lang, BatchProgress, BatchSummary, RowOutcome, TranslateOptions, TranslationError,
    Translator,
};
pub use tree::{QuestValue, Scalar};
