//! Command handlers.
//!
//! Each command resolves its arguments into a request with every field
//! filled in, probes the LM server, computes one `RunDescriptor`, and hands
//! it to the phases. The `*_phase` functions take the client and extractor
//! as trait objects so they can run against fakes.
use anyhow::{anyhow, Context, Result};
use chrono::Local;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::analyzer::{AnalysisReport, CaseAnalyzer};
use crate::batch::{run_models, write_comparison};
use crate::cli::{AnalyzeArgs, BatchArgs, Command, ConfigArgs, DefendArgs, FullProcessArgs};
use crate::combine::{combine, CombineInputs, CombineReport};
use crate::config::{save_settings, Settings};
use crate::defense::{load_analysis, DefenseArtifact, DefenseMaterials, DefenseSynthesizer};
use crate::extract::{FileTextExtractor, TextExtractor};
use crate::llm::{LlmClient, LoggedClient, OllamaClient};
use crate::llm_log::{read_entries, LlmLog, LlmOutcome};
use crate::questions::{resolve_questions, QuestionSource};
use crate::run::RunDescriptor;
use crate::summary::render_analysis_summary;
use crate::types::QuestionSet;
use crate::util::{display_path, format_elapsed, write_atomic, write_json_pretty};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzeRequest {
    pub case_dir: PathBuf,
    pub model: String,
    pub questions_file: Option<PathBuf>,
    pub default_questions_file: PathBuf,
    pub run_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefendRequest {
    pub case_dir: PathBuf,
    pub model: String,
    pub analysis: Option<PathBuf>,
    pub run_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullProcessRequest {
    pub case_dir: PathBuf,
    pub model: String,
    pub questions_file: Option<PathBuf>,
    pub default_questions_file: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRequest {
    pub case_dir: PathBuf,
    /// Empty means every model the server reports.
    pub models: Vec<String>,
    pub questions_file: Option<PathBuf>,
    pub default_questions_file: PathBuf,
}

impl AnalyzeRequest {
    pub fn from_args(args: AnalyzeArgs, settings: &Settings) -> Result<Self> {
        Ok(Self {
            case_dir: resolve_case_dir(args.dir, settings, "--dir")?,
            model: resolve_model(args.model, settings),
            questions_file: args.questions,
            default_questions_file: settings.questions_file.clone(),
            run_dir: args.run_dir,
        })
    }
}

impl DefendRequest {
    pub fn from_args(args: DefendArgs, settings: &Settings) -> Result<Self> {
        Ok(Self {
            case_dir: resolve_case_dir(args.case_dir, settings, "--case-dir")?,
            model: resolve_model(args.model, settings),
            analysis: args.analysis,
            run_dir: args.run_dir,
        })
    }
}

impl FullProcessRequest {
    pub fn from_args(args: FullProcessArgs, settings: &Settings) -> Result<Self> {
        Ok(Self {
            case_dir: resolve_case_dir(args.case_dir, settings, "--case-dir")?,
            model: resolve_model(args.model, settings),
            questions_file: args.questions,
            default_questions_file: settings.questions_file.clone(),
        })
    }
}

impl BatchRequest {
    pub fn from_args(args: BatchArgs, settings: &Settings) -> Result<Self> {
        let models = args
            .models
            .iter()
            .map(|model| model.trim())
            .filter(|model| !model.is_empty())
            .map(str::to_string)
            .collect();
        Ok(Self {
            case_dir: resolve_case_dir(args.case_dir, settings, "--case-dir")?,
            models,
            questions_file: args.questions,
            default_questions_file: settings.questions_file.clone(),
        })
    }
}

fn resolve_model(positional: Option<String>, settings: &Settings) -> String {
    positional
        .map(|model| model.trim().to_string())
        .filter(|model| !model.is_empty())
        .unwrap_or_else(|| settings.model.clone())
}

fn resolve_case_dir(explicit: Option<PathBuf>, settings: &Settings, flag: &str) -> Result<PathBuf> {
    let dir = explicit
        .or_else(|| settings.last_case_dir.clone())
        .ok_or_else(|| anyhow!("no case directory given (pass {flag} <DIR>)"))?;
    if !dir.is_dir() {
        return Err(anyhow!("case directory {} does not exist", dir.display()));
    }
    Ok(dir)
}

/// Route a parsed command to its handler. Settings are saved with the
/// resolved model and case directory before the command runs.
pub fn dispatch(command: Command, settings: Settings, settings_path: &Path) -> Result<()> {
    let save = command.saves_settings();
    match command {
        Command::Analyze(args) => {
            let request = AnalyzeRequest::from_args(args, &settings)?;
            remember(settings_path, &settings, &request.model, &request.case_dir, save);
            run_analyze(&request, &settings)
        }
        Command::Defend(args) => {
            let request = DefendRequest::from_args(args, &settings)?;
            remember(settings_path, &settings, &request.model, &request.case_dir, save);
            run_defend(&request, &settings)
        }
        Command::FullProcess(args) => {
            let request = FullProcessRequest::from_args(args, &settings)?;
            remember(settings_path, &settings, &request.model, &request.case_dir, save);
            run_full_process(&request, &settings)
        }
        Command::Batch(args) => {
            let request = BatchRequest::from_args(args, &settings)?;
            remember(settings_path, &settings, &settings.model, &request.case_dir, save);
            run_batch(&request, &settings)
        }
        Command::Config(args) => run_config(&args, &settings, settings_path),
    }
}

fn remember(path: &Path, settings: &Settings, model: &str, case_dir: &Path, save: bool) {
    if !save {
        return;
    }
    let mut updated = settings.clone();
    updated.model = model.to_string();
    updated.last_case_dir = Some(case_dir.to_path_buf());
    if let Err(err) = save_settings(path, &updated) {
        tracing::warn!(path = %path.display(), error = %format!("{err:#}"), "failed to save settings");
    }
}

fn timestamp() -> String {
    Local::now().format("%Y-%m-%d at %H:%M").to_string()
}

fn connect(client: &OllamaClient, model: &str) -> Result<()> {
    let info = client.check_connection()?;
    eprintln!(
        "Connected to Ollama {} at {} ({} models available)",
        info.version,
        client.endpoint(),
        info.models.len()
    );
    let installed = info
        .models
        .iter()
        .any(|name| name == model || name.strip_suffix(":latest") == Some(model));
    if !installed {
        eprintln!("warning: model {model} is not listed by the server");
    }
    Ok(())
}

fn request_questions(explicit: Option<&Path>, default_file: &Path) -> QuestionSet {
    let (questions, source) = resolve_questions(explicit, default_file);
    match source {
        QuestionSource::File(path) => {
            eprintln!("Using {} questions from {}", questions.len(), path.display());
        }
        QuestionSource::Fallback => {
            eprintln!("Using {} built-in questions", questions.len());
        }
    }
    questions
}

/// Phase 1 plus its outputs: the analysis JSON and the markdown summary.
pub fn analyze_phase(
    run: &RunDescriptor,
    client: &dyn LlmClient,
    extractor: &dyn TextExtractor,
    questions: &QuestionSet,
) -> Result<AnalysisReport> {
    let logged = LoggedClient::new(client, LlmLog::new(run.llm_log_path()));
    let report = CaseAnalyzer::new(run, &logged, extractor)?.run(questions)?;
    write_json_pretty(&run.analysis_json_path(), &report.documents)?;
    let summary = render_analysis_summary(&report.documents, run.model_id(), &timestamp());
    write_atomic(&run.analysis_markdown_path(), summary.as_bytes())?;
    tracing::info!(
        run_dir = %run.run_dir().display(),
        documents = report.documents.len(),
        "analysis written"
    );
    Ok(report)
}

/// Phase 2 from an analysis file on disk.
pub fn defend_phase(
    run: &RunDescriptor,
    client: &dyn LlmClient,
    analysis_path: &Path,
) -> Result<DefenseMaterials> {
    let documents = load_analysis(analysis_path)?;
    eprintln!(
        "Loaded analysis for {} documents from {}",
        documents.len(),
        analysis_path.display()
    );
    let logged = LoggedClient::new(client, LlmLog::new(run.llm_log_path()));
    let synthesizer = DefenseSynthesizer::new(run, &logged);
    synthesizer.run(&documents)
}

#[derive(Debug, Clone)]
pub struct FullProcessReport {
    pub analysis: AnalysisReport,
    pub materials: DefenseMaterials,
    pub combined: Option<CombineReport>,
}

/// Both phases against one run directory, then the combined report. A
/// combiner failure is a warning.
pub fn full_process_phases(
    run: &RunDescriptor,
    client: &dyn LlmClient,
    extractor: &dyn TextExtractor,
    questions: &QuestionSet,
) -> Result<FullProcessReport> {
    let analysis =
        analyze_phase(run, client, extractor, questions).context("analysis phase failed")?;
    let analysis_path = run.locate_analysis(None)?;
    let materials =
        defend_phase(run, client, &analysis_path).context("defense generation phase failed")?;
    let combined = match combine(run, &CombineInputs::for_run(run)) {
        Ok(report) => Some(report),
        Err(err) => {
            tracing::warn!(error = %format!("{err:#}"), "combined report not written");
            eprintln!("warning: could not create combined report: {err:#}");
            None
        }
    };
    Ok(FullProcessReport {
        analysis,
        materials,
        combined,
    })
}

fn print_analysis_report(run: &RunDescriptor, report: &AnalysisReport, elapsed: Duration) {
    eprintln!("Analysis complete in {}", format_elapsed(elapsed));
    eprintln!(
        "Analyzed {} documents ({} from cache, {} without text, {} empty answers)",
        report.documents.len(),
        report.cache_hits,
        report.blank_documents,
        report.empty_answers
    );
    println!("{}", run.analysis_json_path().display());
    println!("{}", run.analysis_markdown_path().display());
}

fn print_defense_report(run: &RunDescriptor, materials: &DefenseMaterials, elapsed: Duration) {
    eprintln!("Defense generation complete in {}", format_elapsed(elapsed));
    for artifact in DefenseArtifact::ALL {
        eprintln!(
            "  {} ({} chars)",
            artifact.file_name(),
            materials.get(artifact).chars().count()
        );
        println!("{}", run.defense_dir().join(artifact.file_name()).display());
    }
}

/// Totals from the run's LM log, which spans every command run against it.
fn print_llm_usage(run: &RunDescriptor) {
    let path = run.llm_log_path();
    match read_entries(&path) {
        Ok(entries) => {
            let count = |outcome: LlmOutcome| {
                entries
                    .iter()
                    .filter(|entry| entry.outcome == outcome)
                    .count()
            };
            eprintln!(
                "LM calls logged for this run: {} ({} failed, {} empty) in {}",
                entries.len(),
                count(LlmOutcome::Failed),
                count(LlmOutcome::Empty),
                path.display()
            );
        }
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %format!("{err:#}"), "cannot read LM log");
        }
    }
}

pub fn run_analyze(request: &AnalyzeRequest, settings: &Settings) -> Result<()> {
    let client = OllamaClient::new(settings);
    connect(&client, &request.model)?;
    let run =
        RunDescriptor::for_today(&request.case_dir, &request.model, request.run_dir.as_deref())?;
    eprintln!("Run directory: {}", run.run_dir().display());
    let questions = request_questions(
        request.questions_file.as_deref(),
        &request.default_questions_file,
    );
    let start = Instant::now();
    let report = analyze_phase(&run, &client, &FileTextExtractor, &questions)?;
    print_analysis_report(&run, &report, start.elapsed());
    print_llm_usage(&run);
    Ok(())
}

pub fn run_defend(request: &DefendRequest, settings: &Settings) -> Result<()> {
    let date = Local::now().date_naive();
    let planned = RunDescriptor::derive(
        &request.case_dir,
        &request.model,
        request.run_dir.as_deref(),
        date,
    );
    let analysis_path = planned.locate_analysis(request.analysis.as_deref())?;
    let client = OllamaClient::new(settings);
    connect(&client, &request.model)?;
    let run = RunDescriptor::resolve(
        &request.case_dir,
        &request.model,
        request.run_dir.as_deref(),
        date,
    )?;
    let start = Instant::now();
    let materials = defend_phase(&run, &client, &analysis_path)?;
    print_defense_report(&run, &materials, start.elapsed());
    print_llm_usage(&run);
    Ok(())
}

pub fn run_full_process(request: &FullProcessRequest, settings: &Settings) -> Result<()> {
    let client = OllamaClient::new(settings);
    connect(&client, &request.model)?;
    let run = RunDescriptor::for_today(&request.case_dir, &request.model, None)?;
    eprintln!("Run directory: {}", run.run_dir().display());
    let questions = request_questions(
        request.questions_file.as_deref(),
        &request.default_questions_file,
    );
    let start = Instant::now();
    let report = full_process_phases(&run, &client, &FileTextExtractor, &questions)?;
    print_analysis_report(&run, &report.analysis, start.elapsed());
    print_defense_report(&run, &report.materials, start.elapsed());
    if let Some(combined) = &report.combined {
        if !combined.missing.is_empty() {
            eprintln!(
                "warning: combined report is missing {} input(s)",
                combined.missing.len()
            );
        }
        println!("{}", combined.output.display());
    }
    print_llm_usage(&run);
    eprintln!("Full processing complete in {}", format_elapsed(start.elapsed()));
    Ok(())
}

pub fn run_batch(request: &BatchRequest, settings: &Settings) -> Result<()> {
    let client = OllamaClient::new(settings);
    let info = client.check_connection()?;
    let models = if request.models.is_empty() {
        info.models
    } else {
        request.models.clone()
    };
    if models.is_empty() {
        return Err(anyhow!("no models to run (the server reports none)"));
    }
    eprintln!("Batch over {} models: {}", models.len(), models.join(", "));
    let questions = request_questions(
        request.questions_file.as_deref(),
        &request.default_questions_file,
    );
    let date = Local::now().date_naive();
    let start = Instant::now();
    let outcome = run_models(&models, |model| {
        let run = RunDescriptor::resolve(&request.case_dir, model, None, date)?;
        full_process_phases(&run, &client, &FileTextExtractor, &questions).map(|_| ())
    });
    eprintln!(
        "Batch complete in {}: {} succeeded, {} failed",
        format_elapsed(start.elapsed()),
        outcome.successful.len(),
        outcome.failed.len()
    );
    if let Some(path) = write_comparison(&request.case_dir, date, &outcome, &timestamp())? {
        println!("{}", path.display());
    }
    if outcome.all_failed() {
        return Err(anyhow!("all {} models failed", outcome.failed.len()));
    }
    Ok(())
}

pub fn run_config(args: &ConfigArgs, settings: &Settings, settings_path: &Path) -> Result<()> {
    if args.reset {
        save_settings(settings_path, &Settings::default())?;
        println!("reset {}", settings_path.display());
        return Ok(());
    }
    let text = serde_json::to_string_pretty(settings).context("serialize settings")?;
    println!("{text}");
    eprintln!(
        "settings file: {}",
        display_path(settings_path, std::env::current_dir().ok().as_deref())
    );
    Ok(())
}
