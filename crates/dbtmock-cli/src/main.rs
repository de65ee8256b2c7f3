use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use dbtmock_core::{
    AssertionDirection, Config, Diagnostic, DiagnosticCode, FilterRules, Report, RowDiff, Severity,
    TestResult, TestStatus,
};
use dbtmock_dbt::{DependencyGraph, Manifest, TestSpec, TestSpecError, test_spec_paths};
use dbtmock_runner::{
    generation_diagnostic, BigQueryExecutor, MemoryExecutor, QueryExecutor, TestRunner,
};
use dbtmock_sql::{generate_test_sql, model_sql};

/// dbtmock - Unit tests for dbt models against mocked CSV data
#[derive(Parser)]
#[command(name = "dbtmock")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: dbtmock.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to dbt manifest.json (overrides config)
    #[arg(short = 'f', long, global = true)]
    manifest: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write assertion SQL for every test spec
    Generate {
        /// Test spec file or folder (overrides config)
        #[arg(short, long)]
        tests: Option<PathBuf>,

        /// Folder to write generated SQL into (overrides config)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Which assertion halves to generate (overrides config)
        #[arg(short, long, value_enum)]
        direction: Option<DirectionArg>,
    },

    /// Generate and run every test spec, then report mismatching rows
    Test {
        /// Test spec file or folder (overrides config)
        #[arg(short, long)]
        tests: Option<PathBuf>,

        /// Query engine to run the assertions on (overrides config)
        #[arg(short, long, value_enum)]
        executor: Option<ExecutorArg>,

        /// Output file for report.json
        #[arg(short, long, default_value = "report.json")]
        output: PathBuf,

        /// Also output markdown report
        #[arg(short, long)]
        markdown: Option<PathBuf>,
    },

    /// Print the mock-substituted SQL of a test's model
    Sql {
        /// Test spec file
        #[arg(short, long)]
        test: PathBuf,
    },

    /// Validate test specs against the manifest without generating SQL
    Check {
        /// Test spec file or folder (overrides config)
        #[arg(short, long)]
        tests: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum DirectionArg {
    /// Both set differences
    Both,
    /// Only rows the model produces that are not expected
    QueryMinusExpected,
}

impl From<DirectionArg> for AssertionDirection {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::Both => Self::Both,
            DirectionArg::QueryMinusExpected => Self::QueryMinusExpected,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ExecutorArg {
    /// Evaluate literal mock data in memory
    Memory,
    /// Run on Google BigQuery
    Bigquery,
}

/// A test spec file and the outcome of loading it
type LoadedSpec = (PathBuf, Result<TestSpec, TestSpecError>);

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = load_config(cli.config.as_deref(), cli.verbose)?;
    if let Some(manifest) = cli.manifest {
        config.manifest = manifest;
    }

    match cli.command {
        Commands::Generate { tests, output, direction } => {
            generate_command(&config, tests, output, direction.map(Into::into), cli.verbose)
        }
        Commands::Test { tests, executor, output, markdown } => {
            test_command(&config, tests, executor, &output, markdown.as_deref(), cli.verbose).await
        }
        Commands::Sql { test } => sql_command(&config, &test),
        Commands::Check { tests } => check_command(&config, tests, cli.verbose),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_config(path: Option<&Path>, verbose: bool) -> Result<Config> {
    let default_path = Path::new("dbtmock.toml");

    let config = if let Some(path) = path {
        Config::from_file(path).with_context(|| format!("Failed to load config {}", path.display()))?
    } else if default_path.exists() {
        Config::from_file(default_path).context("Failed to load dbtmock.toml")?
    } else {
        if verbose {
            eprintln!("{}", "No config file found, using defaults".yellow());
        }
        Config::default()
    };

    Ok(config)
}

/// Load the manifest; failure aborts the whole run
fn load_manifest(config: &Config, verbose: bool) -> Result<Manifest> {
    let path = config.resolve_path(&config.manifest);
    if !path.exists() {
        return Err(anyhow::anyhow!(
            "Manifest not found at {}. Run 'dbt compile' first.",
            path.display()
        ));
    }

    if verbose {
        eprintln!("{} {}", "Loading manifest from:".cyan(), path.display());
    }

    Manifest::from_file(&path).with_context(|| format!("Failed to load manifest {}", path.display()))
}

/// Load a single spec file or every spec in a folder
///
/// A spec that fails to load is returned as an error for that file only.
fn load_specs(config: &Config, tests: Option<&Path>) -> Result<Vec<LoadedSpec>> {
    let path = match tests {
        Some(path) => path.to_path_buf(),
        None => config.resolve_path(&config.tests),
    };

    let paths = if path.is_dir() {
        test_spec_paths(&path)?
    } else {
        vec![path]
    };

    Ok(paths
        .into_iter()
        .map(|path| {
            let spec = TestSpec::from_file(&path).map(|spec| spec.rebase(&config.project_root));
            (path, spec)
        })
        .collect())
}

fn spec_label(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn load_diagnostic(path: &Path, err: &TestSpecError) -> Diagnostic {
    Diagnostic::from_code(err.code(), err.to_string())
        .with_test(spec_label(path))
        .with_file(path.display().to_string())
}

/// Generate command - write assertion SQL files
fn generate_command(
    config: &Config,
    tests: Option<PathBuf>,
    output: Option<PathBuf>,
    direction: Option<AssertionDirection>,
    verbose: bool,
) -> Result<()> {
    let manifest = load_manifest(config, verbose)?;
    let direction = direction.unwrap_or(config.assertion.direction);
    let output = output.unwrap_or_else(|| config.resolve_path(&config.output));
    let specs = load_specs(config, tests.as_deref())?;

    let outcome = write_generated(&manifest, specs, &config.filter, direction, &output, verbose)?;

    print_diagnostics(&outcome.diagnostics);
    eprintln!();
    eprintln!(
        "Wrote {} files to {}, {} tests failed to generate",
        outcome.written.len(),
        output.display(),
        outcome.diagnostics.len()
    );

    if !outcome.diagnostics.is_empty() {
        std::process::exit(1);
    }

    Ok(())
}

/// Files written by one generation batch and the tests that failed
struct GenerateOutcome {
    written: Vec<PathBuf>,
    diagnostics: Vec<Diagnostic>,
}

/// Generate and write every loaded spec; a failing spec aborts only itself
fn write_generated(
    manifest: &Manifest,
    specs: Vec<LoadedSpec>,
    filter: &FilterRules,
    direction: AssertionDirection,
    output: &Path,
    verbose: bool,
) -> Result<GenerateOutcome> {
    std::fs::create_dir_all(output)
        .with_context(|| format!("Failed to create output folder {}", output.display()))?;

    let mut outcome = GenerateOutcome {
        written: Vec::new(),
        diagnostics: Vec::new(),
    };

    for (path, loaded) in specs {
        let spec = match loaded {
            Ok(spec) => spec,
            Err(err) => {
                outcome.diagnostics.push(load_diagnostic(&path, &err));
                continue;
            }
        };

        if filter.is_test_skipped(&spec.name) {
            eprintln!("  {} {} (skipped)", "-".dimmed(), spec.name);
            continue;
        }

        let generated = match generate_test_sql(manifest, &spec, direction) {
            Ok(generated) => generated,
            Err(err) => {
                outcome.diagnostics.push(generation_diagnostic(&spec.name, &err));
                continue;
            }
        };

        for (file_name, sql) in generated.files() {
            let target = output.join(&file_name);
            std::fs::write(&target, sql)
                .with_context(|| format!("Failed to write {}", target.display()))?;
            if verbose {
                eprintln!("    {} {}", "wrote".cyan(), target.display());
            }
            outcome.written.push(target);
        }
        eprintln!("  {} {}", "✓".green(), spec.name);
    }

    Ok(outcome)
}

/// Test command - generate, execute and report
async fn test_command(
    config: &Config,
    tests: Option<PathBuf>,
    executor: Option<ExecutorArg>,
    output: &Path,
    markdown: Option<&Path>,
    verbose: bool,
) -> Result<()> {
    let manifest = load_manifest(config, verbose)?;
    let executor = build_executor(config, executor).await?;

    if verbose {
        eprintln!("{} {}...", "Connecting to".cyan(), executor.name());
    }
    executor
        .test_connection()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to {}: {}", executor.name(), e))?;

    let runner = TestRunner::new(executor)
        .with_direction(config.assertion.direction)
        .with_filter(config.filter.clone());

    let mut report = Report::new();
    for (path, loaded) in load_specs(config, tests.as_deref())? {
        let result = match loaded {
            Ok(spec) => runner.run_test(&manifest, &spec).await,
            Err(err) => TestResult::errored(spec_label(&path), "", load_diagnostic(&path, &err)),
        };
        report.add_result(result);
    }

    print_report_summary(&report);

    report
        .save_to_file(output)
        .with_context(|| format!("Failed to write report {}", output.display()))?;
    eprintln!("{} {}", "Report written to:".green(), output.display());

    if let Some(md_path) = markdown {
        std::fs::write(md_path, generate_markdown_report(&report))
            .with_context(|| format!("Failed to write markdown report {}", md_path.display()))?;
        eprintln!("{} {}", "Markdown report written to:".green(), md_path.display());
    }

    if report.has_failures() {
        std::process::exit(1);
    }

    Ok(())
}

async fn build_executor(config: &Config, choice: Option<ExecutorArg>) -> Result<Box<dyn QueryExecutor>> {
    let executor_type = match choice {
        Some(ExecutorArg::Memory) => "memory".to_string(),
        Some(ExecutorArg::Bigquery) => "bigquery".to_string(),
        None => config
            .executor
            .as_ref()
            .map(|e| e.executor_type.to_lowercase())
            .unwrap_or_else(|| "memory".to_string()),
    };

    let settings = config.executor.as_ref().map(|e| &e.settings);
    match executor_type.as_str() {
        "memory" => Ok(Box::new(MemoryExecutor::new())),
        "bigquery" => {
            let project_id = settings
                .and_then(|s| s.get("project_id"))
                .ok_or_else(|| anyhow::anyhow!("BigQuery requires 'project_id' in [executor] settings"))?;

            let executor = match settings.and_then(|s| s.get("credentials")) {
                Some(key_file) => {
                    BigQueryExecutor::from_service_account_file(project_id, config.resolve_path(Path::new(key_file))).await?
                }
                None => BigQueryExecutor::with_adc(project_id).await?,
            };
            Ok(Box::new(executor))
        }
        other => Err(anyhow::anyhow!(
            "Unsupported executor type '{}'. Supported: memory, bigquery",
            other
        )),
    }
}

/// Sql command - print the substituted model SQL without assertions
fn sql_command(config: &Config, test: &Path) -> Result<()> {
    let manifest = load_manifest(config, false)?;
    let spec = TestSpec::from_file(test)
        .with_context(|| format!("Failed to load test spec {}", test.display()))?
        .rebase(&config.project_root);

    let sql = model_sql(&manifest, &spec).map_err(|e| anyhow::anyhow!("{}: {}", e.code(), e))?;
    println!("{}", sql);
    Ok(())
}

/// Check command - validate specs against the manifest
fn check_command(config: &Config, tests: Option<PathBuf>, verbose: bool) -> Result<()> {
    let manifest = load_manifest(config, verbose)?;
    let graph = DependencyGraph::from_manifest(&manifest);

    let mut checked = 0;
    let mut diagnostics = Vec::new();
    for (path, loaded) in load_specs(config, tests.as_deref())? {
        match loaded {
            Ok(spec) if config.filter.is_test_skipped(&spec.name) => {}
            Ok(spec) => {
                checked += 1;
                let found = check_spec(&manifest, &graph, &spec);
                if found.is_empty() {
                    eprintln!("  {} {}", "✓".green(), spec.name);
                }
                diagnostics.extend(found);
            }
            Err(err) => diagnostics.push(load_diagnostic(&path, &err)),
        }
    }

    print_diagnostics(&diagnostics);
    eprintln!();
    eprintln!("Checked {} tests, {} problems found", checked, diagnostics.len());

    if diagnostics.iter().any(|d| d.severity == Severity::Error) {
        std::process::exit(1);
    }

    Ok(())
}

/// Every problem that would stop a spec from generating, without encoding any CSV
///
/// CSV contents are not parsed, so malformed mock files only surface on `generate`.
fn check_spec(manifest: &Manifest, graph: &DependencyGraph, spec: &TestSpec) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    match manifest.kind_of(&spec.model) {
        Some(kind) if kind.is_compiled() => {}
        Some(_) => diagnostics.push(
            Diagnostic::from_code(
                DiagnosticCode::UnknownNode,
                format!("{} is a source, not a model or seed", spec.model),
            )
            .with_test(&spec.name)
            .with_node(&spec.model),
        ),
        None => diagnostics.push(
            Diagnostic::from_code(
                DiagnosticCode::UnknownNode,
                format!("Model {} not found in manifest", spec.model),
            )
            .with_test(&spec.name)
            .with_node(&spec.model),
        ),
    }
    if !diagnostics.is_empty() {
        return diagnostics;
    }

    let mocked: HashSet<String> = spec.mocks.keys().cloned().collect();
    for leaf in graph.unmocked_leaves(&spec.model, &mocked) {
        diagnostics.push(
            Diagnostic::from_code(
                DiagnosticCode::UnmockedLeaf,
                format!("{} is reachable from {} but not mocked", leaf, spec.model),
            )
            .with_test(&spec.name)
            .with_node(leaf),
        );
    }

    for node in graph.uncompiled_nodes(&spec.model, &mocked) {
        diagnostics.push(
            Diagnostic::from_code(
                DiagnosticCode::EmptyCompiledSql,
                format!("{} has no compiled SQL and is not mocked", node),
            )
            .with_test(&spec.name)
            .with_node(node),
        );
    }

    let mut mocks: Vec<(&String, &dbtmock_dbt::Mock)> = spec.mocks.iter().collect();
    mocks.sort_by(|a, b| a.0.cmp(b.0));
    let files = mocks
        .into_iter()
        .map(|(id, mock)| (Some(id.as_str()), mock))
        .chain(std::iter::once((None, &spec.output)));

    for (node, mock) in files {
        if mock.filepath.exists() {
            continue;
        }
        let mut diagnostic = Diagnostic::from_code(
            DiagnosticCode::MockFileError,
            format!("Mock file not found: {}", mock.filepath.display()),
        )
        .with_test(&spec.name)
        .with_file(mock.filepath.display().to_string());
        if let Some(node) = node {
            diagnostic = diagnostic.with_node(node);
        }
        diagnostics.push(diagnostic);
    }

    diagnostics
}

fn print_diagnostics(diagnostics: &[Diagnostic]) {
    for diag in diagnostics {
        let severity = match diag.severity {
            Severity::Error => "ERROR".red().bold(),
            Severity::Warn => "WARN".yellow().bold(),
        };

        let test = diag.test.as_deref().unwrap_or("-");
        eprintln!("  {} [{}] {}: {}", severity, diag.code, test.bold(), diag.message);
        if let Some(file) = &diag.file {
            eprintln!("    {} {}", "File:".dimmed(), file);
        }
    }
}

fn render_row(row: &RowDiff) -> String {
    row.fields
        .iter()
        .map(|(column, value)| format!("{} : {}", column, value))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Print a human-readable summary of a test run
fn print_report_summary(report: &Report) {
    println!();
    println!("{}", "=".repeat(60).bright_blue());
    println!("{}", "dbtmock Test Report".bright_blue().bold());
    println!("{}", "=".repeat(60).bright_blue());
    println!();

    for result in &report.results {
        match result.status {
            TestStatus::Passed => println!("  {} {}", "✓".green(), result.name),
            TestStatus::Skipped => println!("  {} {} {}", "-".dimmed(), result.name, "(skipped)".dimmed()),
            TestStatus::Failed => {
                println!("  {} {} ({})", "✗".red(), result.name.bold(), result.model);
                for row in result.extra_rows() {
                    println!("      {} {}", "+ unexpected".yellow(), render_row(row).yellow());
                }
                for row in result.missing_rows() {
                    println!("      {} {}", "- missing".magenta(), render_row(row).magenta());
                }
            }
            TestStatus::Errored => {
                println!("  {} {}", "!".red().bold(), result.name.bold());
                for diag in &result.diagnostics {
                    println!("      [{}] {}", diag.code, diag.message.red());
                }
            }
        }
    }

    println!();
    println!("{}", "Summary:".bold());
    println!("  Total:   {}", report.summary.total);
    println!("  Passed:  {}", report.summary.passed.to_string().green());
    println!("  Failed:  {}", report.summary.failed.to_string().red());
    println!("  Errored: {}", report.summary.errored.to_string().red());
    println!("  Skipped: {}", report.summary.skipped.to_string().dimmed());
    println!();
    println!("{}", "=".repeat(60).bright_blue());
}

/// Generate markdown report
fn generate_markdown_report(report: &Report) -> String {
    let mut md = String::new();

    md.push_str("# dbtmock Test Report\n\n");
    md.push_str(&format!("**Version:** {}\n\n", report.version));
    md.push_str(&format!("**Timestamp:** {}\n\n", report.timestamp));

    md.push_str("## Summary\n\n");
    md.push_str(&format!("- Total tests: {}\n", report.summary.total));
    md.push_str(&format!("- Passed: {}\n", report.summary.passed));
    md.push_str(&format!("- Failed: {}\n", report.summary.failed));
    md.push_str(&format!("- Errored: {}\n", report.summary.errored));
    md.push_str(&format!("- Skipped: {}\n", report.summary.skipped));
    md.push('\n');

    if !report.has_failures() {
        md.push_str("✅ **All tests passed!**\n");
        return md;
    }

    md.push_str("## Failures\n\n");
    for result in &report.results {
        match result.status {
            TestStatus::Failed => {
                md.push_str(&format!("### ❌ {} (`{}`)\n\n", result.name, result.model));
                for row in &result.diffs {
                    md.push_str(&format!("- **{}:** `{}`\n", row.direction, render_row(row)));
                }
                md.push('\n');
            }
            TestStatus::Errored => {
                md.push_str(&format!("### ⚠️ {}\n\n", result.name));
                for diag in &result.diagnostics {
                    md.push_str(&format!("{} - {}\n\n", diag.code, diag.message));
                    if let Some(node) = &diag.node {
                        md.push_str(&format!("**Node:** `{}`\n\n", node));
                    }
                }
            }
            TestStatus::Passed | TestStatus::Skipped => {}
        }
    }

    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbtmock_core::DiffDirection;
    use dbtmock_dbt::{DependsOn, ManifestNode, ManifestSource, Mock};
    use std::collections::HashMap;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    fn manifest() -> Manifest {
        let model = ManifestNode {
            unique_id: "model.shop.m".to_string(),
            name: "m".to_string(),
            alias: "m".to_string(),
            compiled_code: "SELECT 1".to_string(),
            depends_on: DependsOn {
                nodes: vec!["source.shop.a".to_string(), "source.shop.b".to_string()],
            },
            ..Default::default()
        };
        let source = |id: &str| {
            (
                id.to_string(),
                ManifestSource {
                    unique_id: id.to_string(),
                    name: id.to_string(),
                    fqn: Vec::new(),
                    relation_name: id.to_string(),
                },
            )
        };
        Manifest::from_parts(
            vec![("model.shop.m".to_string(), model)],
            vec![source("source.shop.a"), source("source.shop.b")],
        )
    }

    #[test]
    fn check_lists_every_unmocked_leaf_and_missing_file() {
        let manifest = manifest();
        let graph = DependencyGraph::from_manifest(&manifest);
        let spec = TestSpec {
            name: "t".to_string(),
            model: "model.shop.m".to_string(),
            mocks: HashMap::new(),
            output: Mock::new("/definitely/missing.csv"),
        };

        let diagnostics = check_spec(&manifest, &graph, &spec);
        let codes: Vec<DiagnosticCode> = diagnostics.iter().map(|d| d.code).collect();

        assert_eq!(
            codes,
            vec![
                DiagnosticCode::UnmockedLeaf,
                DiagnosticCode::UnmockedLeaf,
                DiagnosticCode::MockFileError,
            ]
        );
        assert_eq!(diagnostics[0].node.as_deref(), Some("source.shop.a"));
        assert_eq!(diagnostics[1].node.as_deref(), Some("source.shop.b"));
    }

    #[test]
    fn check_rejects_unknown_targets() {
        let manifest = manifest();
        let graph = DependencyGraph::from_manifest(&manifest);
        let spec = TestSpec {
            name: "t".to_string(),
            model: "source.shop.a".to_string(),
            mocks: HashMap::new(),
            output: Mock::new("/definitely/missing.csv"),
        };

        let diagnostics = check_spec(&manifest, &graph, &spec);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, DiagnosticCode::UnknownNode);
    }

    #[test]
    fn broken_specs_load_as_per_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.json"), "{").unwrap();
        std::fs::write(
            dir.path().join("b.json"),
            r#"{"name": "b", "model": "model.shop.m", "output": {"filepath": "b.csv"}}"#,
        )
        .unwrap();

        let config = Config {
            project_root: dir.path().to_path_buf(),
            ..Config::default()
        };
        let loaded = load_specs(&config, Some(dir.path())).unwrap();

        assert_eq!(loaded.len(), 2);
        assert!(loaded[0].1.is_err());
        let spec = loaded[1].1.as_ref().unwrap();
        assert_eq!(spec.output.filepath, dir.path().join("b.csv"));
    }

    fn shop() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../../fixtures/shop")
    }

    fn shop_config() -> Config {
        Config::from_file(&shop().join("dbtmock.toml")).unwrap()
    }

    #[test]
    fn check_reports_reachable_models_without_sql() {
        let config = shop_config();
        let manifest = load_manifest(&config, false).unwrap();
        let graph = DependencyGraph::from_manifest(&manifest);
        let spec = TestSpec::from_str(
            r#"{
                "name": "by_country",
                "model": "model.shop.orders_by_country",
                "mocks": {"model.shop.stg_orders": {"filepath": "mocks/orders.csv"}},
                "output": {"filepath": "mocks/orders.csv"}
            }"#,
        )
        .unwrap()
        .rebase(&config.project_root);

        let diagnostics = check_spec(&manifest, &graph, &spec);

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, DiagnosticCode::EmptyCompiledSql);
        assert_eq!(diagnostics[0].node.as_deref(), Some("seed.shop.country_codes"));
    }

    #[test]
    fn batch_generation_writes_both_halves_and_continues_past_failures() {
        let config = shop_config();
        let manifest = load_manifest(&config, false).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("generated").join("sql");

        let outcome = write_generated(
            &manifest,
            load_specs(&config, None).unwrap(),
            &config.filter,
            AssertionDirection::Both,
            &output,
            false,
        )
        .unwrap();

        assert_eq!(outcome.written.len(), 10);
        assert!(output.join("stg_orders_passthrough_QueryMinusExpected.sql").is_file());
        assert!(output.join("stg_orders_passthrough_ExpectedMinusQuery.sql").is_file());
        assert!(!output.join("customer_orders_unmocked_QueryMinusExpected.sql").exists());

        assert_eq!(outcome.diagnostics.len(), 1);
        assert_eq!(outcome.diagnostics[0].code, DiagnosticCode::UnmockedLeaf);
        assert_eq!(outcome.diagnostics[0].test.as_deref(), Some("customer_orders_unmocked"));
    }

    #[test]
    fn batch_generation_single_direction_and_skips() {
        let config = shop_config();
        let manifest = load_manifest(&config, false).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let filter = FilterRules {
            skip: vec!["customer_*".to_string()],
        };

        let outcome = write_generated(
            &manifest,
            load_specs(&config, None).unwrap(),
            &filter,
            AssertionDirection::QueryMinusExpected,
            dir.path(),
            false,
        )
        .unwrap();

        let mut names: Vec<String> = outcome
            .written
            .iter()
            .filter_map(|path| path.file_name())
            .map(|name| name.to_string_lossy().to_string())
            .collect();
        names.sort();

        assert!(outcome.diagnostics.is_empty());
        assert_eq!(
            names,
            vec![
                "stg_orders_empty.sql",
                "stg_orders_extra_row.sql",
                "stg_orders_missing_row.sql",
                "stg_orders_passthrough.sql",
            ]
        );
    }

    #[test]
    fn markdown_report_lists_mismatched_rows() {
        let diff = RowDiff {
            direction: DiffDirection::QueryMinusExpected,
            fields: vec![
                ("name".to_string(), "foo".to_string()),
                ("val".to_string(), "2".to_string()),
            ],
        };
        let report = Report::from_results(vec![
            TestResult::passed("ok", "model.shop.m"),
            TestResult::failed("bad", "model.shop.m", vec![diff]),
        ]);

        let md = generate_markdown_report(&report);
        assert!(md.contains("- Failed: 1"));
        assert!(md.contains("### ❌ bad (`model.shop.m`)"));
        assert!(md.contains("**QueryMinusExpected:** `name : foo, val : 2`"));
    }
}
