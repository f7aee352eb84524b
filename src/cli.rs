//! CLI argument parsing.
//!
//! Arguments are parsed here and nowhere else; `workflow` turns them into
//! fully-defaulted request values before any work starts.
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "docket",
    version,
    about = "LM-driven case document analysis and defense material generation",
    after_help = "Commands:\n  analyze --dir <case> [MODEL]          Answer the question set for every document\n  defend --case-dir <case> [MODEL]      Generate defense materials from an analysis\n  full-process --case-dir <case> [MODEL]  Analyze, defend, and write a combined report\n  batch --case-dir <case> --models a,b  Run the full process for several models\n  config --show | --reset               Inspect or reset saved settings\n\nExamples:\n  docket analyze --dir ~/cases/smith llama3:8b\n  docket defend --case-dir ~/cases/smith llama3:8b\n  docket full-process --case-dir ~/cases/smith --questions questions.md\n  docket batch --case-dir ~/cases/smith --models mistral,llama3:8b",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Flags accepted before or after any subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Model to use when a subcommand does not name one
    #[arg(long, global = true, value_name = "MODEL")]
    pub model: Option<String>,

    /// Host of the Ollama server
    #[arg(long, global = true, value_name = "HOST")]
    pub ollama_host: Option<String>,

    /// Port of the Ollama server
    #[arg(long, global = true, value_name = "PORT")]
    pub ollama_port: Option<u16>,

    /// Log progress details to stderr
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Analyze(AnalyzeArgs),
    Defend(DefendArgs),
    FullProcess(FullProcessArgs),
    Batch(BatchArgs),
    Config(ConfigArgs),
}

impl Command {
    /// Commands that persist the resolved settings afterwards.
    pub fn saves_settings(&self) -> bool {
        !matches!(self, Command::Config(_))
    }

    /// The positional model, for commands that take one.
    pub fn model(&self) -> Option<&str> {
        match self {
            Command::Analyze(args) => args.model.as_deref(),
            Command::Defend(args) => args.model.as_deref(),
            Command::FullProcess(args) => args.model.as_deref(),
            Command::Batch(_) | Command::Config(_) => None,
        }
    }
}

#[derive(Parser, Debug)]
#[command(about = "Analyze every document in a case directory")]
pub struct AnalyzeArgs {
    /// Model to analyze with (overrides --model)
    #[arg(value_name = "MODEL")]
    pub model: Option<String>,

    /// Case directory containing .pdf/.txt documents
    #[arg(long, short = 'd', value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Markdown file with numbered questions
    #[arg(long, short = 'q', value_name = "FILE")]
    pub questions: Option<PathBuf>,

    /// Write outputs here instead of <DIR>/<date>_<model>
    #[arg(long, value_name = "DIR")]
    pub run_dir: Option<PathBuf>,
}

#[derive(Parser, Debug)]
#[command(about = "Generate defense materials from an existing analysis")]
pub struct DefendArgs {
    /// Model to generate with (overrides --model)
    #[arg(value_name = "MODEL")]
    pub model: Option<String>,

    /// Case directory that was analyzed
    #[arg(long, short = 'd', value_name = "DIR")]
    pub case_dir: Option<PathBuf>,

    /// Analysis JSON to use instead of searching the run directory
    #[arg(long, short = 'a', value_name = "FILE")]
    pub analysis: Option<PathBuf>,

    /// Run directory to read from and write to
    #[arg(long, value_name = "DIR")]
    pub run_dir: Option<PathBuf>,
}

#[derive(Parser, Debug)]
#[command(about = "Analyze, generate defense materials, and combine the results")]
pub struct FullProcessArgs {
    /// Model to use for both phases (overrides --model)
    #[arg(value_name = "MODEL")]
    pub model: Option<String>,

    /// Case directory containing .pdf/.txt documents
    #[arg(long, short = 'd', value_name = "DIR")]
    pub case_dir: Option<PathBuf>,

    /// Markdown file with numbered questions
    #[arg(long, short = 'q', value_name = "FILE")]
    pub questions: Option<PathBuf>,
}

#[derive(Parser, Debug)]
#[command(about = "Run the full process once per model and compare the results")]
pub struct BatchArgs {
    /// Case directory containing .pdf/.txt documents
    #[arg(long, short = 'd', value_name = "DIR")]
    pub case_dir: Option<PathBuf>,

    /// Comma-separated models (default: every model on the server)
    #[arg(long, value_name = "LIST", value_delimiter = ',')]
    pub models: Vec<String>,

    /// Markdown file with numbered questions
    #[arg(long, short = 'q', value_name = "FILE")]
    pub questions: Option<PathBuf>,
}

#[derive(Parser, Debug)]
#[command(about = "Show or reset saved settings")]
pub struct ConfigArgs {
    /// Print the effective settings
    #[arg(long)]
    pub show: bool,

    /// Restore default settings
    #[arg(long, conflicts_with = "show")]
    pub reset: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positional_model_and_global_flags_parse() {
        let args = RootArgs::try_parse_from([
            "docket",
            "--ollama-port",
            "8080",
            "analyze",
            "--dir",
            "/cases/a",
            "llama3:8b",
            "--verbose",
        ])
        .expect("parse");
        assert_eq!(args.global.ollama_port, Some(8080));
        assert!(args.global.verbose);
        match args.command {
            Command::Analyze(analyze) => {
                assert_eq!(analyze.model.as_deref(), Some("llama3:8b"));
                assert_eq!(analyze.dir, Some(PathBuf::from("/cases/a")));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn batch_models_split_on_commas() {
        let args = RootArgs::try_parse_from(["docket", "batch", "-d", "c", "--models", "a,b:7b"])
            .expect("parse");
        match args.command {
            Command::Batch(batch) => assert_eq!(batch.models, vec!["a", "b:7b"]),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn config_show_and_reset_conflict() {
        assert!(RootArgs::try_parse_from(["docket", "config", "--show", "--reset"]).is_err());
        let args = RootArgs::try_parse_from(["docket", "config", "--show"]).expect("parse");
        assert!(!args.command.saves_settings());
    }
}
