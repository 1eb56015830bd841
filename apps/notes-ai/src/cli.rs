use models::{Difficulty, SummaryStyle};

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// AI helpers for notes: summaries, flashcards, tag suggestions and live
/// notifications. Results are printed to stdout as JSON.
#[derive(Debug, Parser)]
#[command(name = "notes-ai", version, about)]
pub struct Cli {
    /// Directory holding config.json and credentials.json
    #[arg(long, global = true, value_name = "DIR")]
    pub config_dir: Option<PathBuf>,

    /// Directory for notes-ai.log
    #[arg(long, global = true, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Summarize a note
    Summarize(SummarizeArgs),

    /// Generate study flashcards from a note
    Flashcards(FlashcardsArgs),

    /// Suggest tags for a note
    Tags(TagsArgs),

    /// Print push notifications until interrupted
    Listen,
}

#[derive(Debug, Args)]
pub struct SummarizeArgs {
    /// Note file; `-` reads stdin
    pub file: PathBuf,

    #[arg(long)]
    pub max_length: Option<u32>,

    #[arg(long, value_enum, default_value_t = StyleArg::Brief)]
    pub style: StyleArg,

    /// Leave key points out of the summary
    #[arg(long)]
    pub no_key_points: bool,

    /// Language of the summary, e.g. `en`
    #[arg(long)]
    pub language: Option<String>,
}

#[derive(Debug, Args)]
pub struct FlashcardsArgs {
    /// Note file; `-` reads stdin
    pub file: PathBuf,

    #[arg(long, default_value_t = 10)]
    pub count: u32,

    #[arg(long, value_enum, default_value_t = DifficultyArg::Medium)]
    pub difficulty: DifficultyArg,
}

#[derive(Debug, Args)]
pub struct TagsArgs {
    /// Note file; `-` reads stdin
    pub file: PathBuf,

    /// Tags already on the note (repeatable)
    #[arg(long = "existing", value_name = "TAG")]
    pub existing: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StyleArg {
    Brief,
    Detailed,
    Bullets,
}

impl From<StyleArg> for SummaryStyle {
    fn from(style: StyleArg) -> Self {
        match style {
            StyleArg::Brief => SummaryStyle::Brief,
            StyleArg::Detailed => SummaryStyle::Detailed,
            StyleArg::Bullets => SummaryStyle::Bullets,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DifficultyArg {
    Easy,
    Medium,
    Hard,
}

impl From<DifficultyArg> for Difficulty {
    fn from(difficulty: DifficultyArg) -> Self {
        match difficulty {
            DifficultyArg::Easy => Difficulty::Easy,
            DifficultyArg::Medium => Difficulty::Medium,
            DifficultyArg::Hard => Difficulty::Hard,
        }
    }
}
