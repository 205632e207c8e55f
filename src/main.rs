//! pkgcheck-report CLI - Command-line interface for pkgcheck result reports
//!
//! CDD Principle: Application Layer - CLI coordinates user interactions with domain services
//! - Translates user commands to pipeline operations
//! - Handles external concerns like file I/O, process exit codes, and terminal output
//! - Keeps stdout for reports and stderr for logs

use anyhow::Context;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use pkgcheck_report::config::ClassRules;
use pkgcheck_report::input::{self, STDIN_PATH};
use pkgcheck_report::maintainers::{MaintainerIndex, RepoMetadata};
use pkgcheck_report::report::{format_borked, DEFAULT_DOC_URI};
use pkgcheck_report::{
    collect_excludes, Excludes, MaintainerTarget, MembershipGraph, OutputFormat, PackageFilter,
    PipelineOptions, ReportFormatter, ReportOptions, ReportPipeline, ResultFilter, Severity,
};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

/// Timestamp format accepted by `--timestamp`
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// pkgcheck-report - Classify, filter and group pkgcheck results
#[derive(Parser)]
#[command(name = "pkgcheck-report")]
#[command(version)]
#[command(about = "Classify, filter and group pkgcheck XML results")]
#[command(long_about = "pkgcheck-report turns pkgcheck XML results into severity-classified reports grouped by category, package and version, and produces borked package lists and exclude files.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Class mapping file (JSON or YAML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a grouped report of the results
    Report {
        /// Input XML files ("-" for stdin)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Documentation URI to use for help links
        #[arg(short, long, default_value = DEFAULT_DOC_URI)]
        doc_uri: String,

        /// Filter by maintainer (dev, dev@g.o or full e-mail address)
        #[arg(short, long)]
        maintainer: Option<String>,

        /// Output file ("-" for stdout)
        #[arg(short, long, default_value = STDIN_PATH)]
        output: PathBuf,

        /// Recursively match projects whose member is the maintainer
        #[arg(short, long)]
        projects: bool,

        /// Filter by package(s) (separated by `,`)
        #[arg(short = 'P', long)]
        pkg: Option<String>,

        /// Repository path to get metadata.xml from
        #[arg(short, long, default_value = "/usr/portage")]
        repo: PathBuf,

        /// Revision to display in output
        #[arg(short = 'R', long)]
        revision: Option<String>,

        /// Timestamp for results (YYYY-MM-DD HH:MM:SS, UTC)
        #[arg(short, long, value_parser = parse_timestamp)]
        timestamp: Option<DateTime<Utc>>,

        /// Include verbose results
        #[arg(short, long)]
        verbose: bool,

        /// JSON file with existing exceptions
        #[arg(short = 'x', long)]
        excludes: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "html")]
        format: OutputFormatArg,
    },

    /// List packages with error (or warning) results
    Borked {
        /// Input XML files ("-" for stdin)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Include error results (the default unless --warning is given)
        #[arg(short, long)]
        error: bool,

        /// Include warning results
        #[arg(short, long)]
        warning: bool,

        /// Output file ("-" for stdout)
        #[arg(short, long, default_value = STDIN_PATH)]
        output: PathBuf,

        /// JSON file with existing exceptions
        #[arg(short = 'x', long)]
        excludes: Option<PathBuf>,
    },

    /// Record existing results of some classes as exceptions
    Excludes {
        /// Input XML files ("-" for stdin)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Class to ignore existing results for
        #[arg(short, long = "class", required = true, action = clap::ArgAction::Append)]
        classes: Vec<String>,

        /// Output JSON file (merged into if it exists)
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Merge several result files into one document
    Combine {
        /// Input XML files ("-" for stdin)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output file ("-" for stdout)
        #[arg(short, long, default_value = STDIN_PATH)]
        output: PathBuf,
    },

    /// List the effective class mapping
    Classes {
        /// Show only classes of this severity
        #[arg(long, value_enum)]
        severity: Option<SeverityArg>,
    },
}

#[derive(Copy, Clone, ValueEnum, PartialEq)]
enum OutputFormatArg {
    Html,
    Json,
    Human,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Html => OutputFormat::Html,
            OutputFormatArg::Json => OutputFormat::Json,
            OutputFormatArg::Human => OutputFormat::Human,
        }
    }
}

#[derive(Copy, Clone, ValueEnum)]
enum SeverityArg {
    Error,
    Warning,
    Staging,
    Verbose,
    Unclassified,
}

impl From<SeverityArg> for Severity {
    fn from(arg: SeverityArg) -> Self {
        match arg {
            SeverityArg::Error => Severity::Error,
            SeverityArg::Warning => Severity::Warning,
            SeverityArg::Staging => Severity::Staging,
            SeverityArg::Verbose => Severity::Verbose,
            SeverityArg::Unclassified => Severity::Unclassified,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.debug);

    match run_command(cli) {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

fn run_command(cli: Cli) -> anyhow::Result<i32> {
    let config = cli.config.as_deref();
    match cli.command {
        Commands::Report {
            files,
            doc_uri,
            maintainer,
            output,
            projects,
            pkg,
            repo,
            revision,
            timestamp,
            verbose,
            excludes,
            format,
        } => {
            let rules = load_rules(config, excludes.as_deref())?;
            let timestamp = match timestamp {
                Some(timestamp) => timestamp,
                None => input::inputs_timestamp(&files)?.unwrap_or_else(Utc::now),
            };
            let options = PipelineOptions { verbose, doc_uri, revision, timestamp: Some(timestamp) };
            let request = ReportRequest {
                files,
                maintainer,
                projects,
                pkg,
                repo,
                format: format.into(),
                use_colors: !cli.no_color,
            };
            let rendered = run_report(ReportPipeline::new(rules, options), &request)?;
            write_output(&output, &rendered)?;
            Ok(0)
        }
        Commands::Borked { files, error, warning, output, excludes } => {
            let rules = load_rules(config, excludes.as_deref())?;
            let rendered = run_borked(ReportPipeline::new(rules, PipelineOptions::default()), &files, error, warning)?;
            write_output(&output, &rendered)?;
            Ok(0)
        }
        Commands::Excludes { files, classes, output } => {
            run_excludes(&files, &classes, &output)?;
            Ok(0)
        }
        Commands::Combine { files, output } => {
            let combined = input::combine_documents(&files)?;
            write_output(&output, &combined.to_document()?)?;
            Ok(0)
        }
        Commands::Classes { severity } => {
            let rules = load_rules(config, None)?;
            print!("{}", list_classes(&rules, severity.map(Severity::from)));
            Ok(0)
        }
    }
}

/// Inputs of the report command besides the pipeline itself
struct ReportRequest {
    files: Vec<PathBuf>,
    maintainer: Option<String>,
    projects: bool,
    pkg: Option<String>,
    repo: PathBuf,
    format: OutputFormat,
    use_colors: bool,
}

fn run_report(pipeline: ReportPipeline, request: &ReportRequest) -> anyhow::Result<String> {
    let index = MaintainerIndex::for_repo(&request.repo);

    let packages = request.pkg.as_deref().map(PackageFilter::from_list).unwrap_or_default();
    let mut filter = ResultFilter::accept_all().with_packages(packages);
    // an empty identity means no maintainer filter
    if let Some(requested) = request.maintainer.as_deref().filter(|m| !m.is_empty()) {
        let graph = if request.projects {
            let path = RepoMetadata::new(&request.repo).projects_path();
            Some(MembershipGraph::load_from_file(&path)?)
        } else {
            None
        };
        filter = filter.with_maintainer(MaintainerTarget::resolve(requested, graph.as_ref()), &index);
    }

    let results = pipeline.collect(input::read_all_results(&request.files)?, &filter);
    let digest = pipeline.digest(&results, Some(&index));

    let formatter = ReportFormatter::new(ReportOptions { use_colors: request.use_colors });
    Ok(formatter.format_report(&digest, request.format)?)
}

fn run_borked(
    pipeline: ReportPipeline,
    files: &[PathBuf],
    error: bool,
    warning: bool,
) -> anyhow::Result<String> {
    let mut severities = Vec::new();
    if error || !warning {
        severities.push(Severity::Error);
    }
    if warning {
        severities.push(Severity::Warning);
    }

    let results = pipeline.collect(input::read_all_results(files)?, &ResultFilter::accept_all());
    Ok(format_borked(&pipeline.borked(&results, &severities)))
}

fn run_excludes(files: &[PathBuf], classes: &[String], output: &Path) -> anyhow::Result<()> {
    let mut excludes = Excludes::load_or_default(output)?;
    let results = input::read_all_results(files)?;

    let added = collect_excludes(&results, classes, &mut excludes);
    tracing::debug!("Recorded {} new exceptions", added);

    excludes
        .save(output)
        .with_context(|| format!("Failed to write excludes to {}", output.display()))?;
    Ok(())
}

fn list_classes(rules: &ClassRules, severity: Option<Severity>) -> String {
    rules
        .classes()
        .into_iter()
        .filter(|(_, s)| severity.map_or(true, |wanted| *s == wanted))
        .map(|(class, s)| format!("{}\t{}\n", class, s.as_str()))
        .collect()
}

/// Effective class rules, optionally with an excludes file attached
fn load_rules(config: Option<&Path>, excludes: Option<&Path>) -> anyhow::Result<ClassRules> {
    let rules = ClassRules::discover(config)?;
    match excludes {
        Some(path) => Ok(rules.with_excludes(Excludes::load_from_file(path)?)),
        None => Ok(rules),
    }
}

fn write_output(output: &Path, content: &str) -> anyhow::Result<()> {
    if output == Path::new(STDIN_PATH) {
        let mut stdout = io::stdout().lock();
        stdout.write_all(content.as_bytes()).context("Failed to write to stdout")?;
        stdout.flush().context("Failed to write to stdout")?;
    } else {
        fs::write(output, content)
            .with_context(|| format!("Failed to write output to {}", output.display()))?;
    }
    Ok(())
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, String> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|e| format!("expected {}: {}", TIMESTAMP_FORMAT, e))
}

fn init_logging(debug: bool) {
    let level = if debug { tracing::Level::DEBUG } else { tracing::Level::WARN };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}
