//! Fintran CLI - financial record conversion.

use anyhow::Context;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use fintran::core::error::{FintranError, PipelineError};
use fintran::core::schema::{is_required, validate_ir};
use fintran::prelude::*;
use fintran::validation::declarative::load_pipeline;
use fintran::validation::transform::DEFAULT_METADATA_KEY;
use std::path::{Path, PathBuf};

/// Validators used by `validate` when no configuration is given.
const DEFAULT_VALIDATION: &str = r#"
[[validators]]
type = "currency_consistency"

[[validators]]
type = "detect_duplicates"
params = { fields = ["date", "account", "amount", "currency"] }

[[validators]]
type = "detect_outliers"
"#;

#[derive(Parser)]
#[command(name = "fintran")]
#[command(about = "Convert and validate financial records through a canonical IR")]
#[command(version)]
struct Cli {
    /// Log level (error, warn, info, debug, trace); overrides RUST_LOG
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a file from one format to another
    Convert {
        /// Input file
        input: PathBuf,
        /// Output file
        output: PathBuf,
        #[command(flatten)]
        pipeline: PipelineArgs,
        /// Run every stage except the write
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate a file and print the report
    Validate {
        /// Input file
        input: PathBuf,
        /// Reader format (inferred from the extension when absent)
        #[arg(long)]
        reader: Option<String>,
        /// Reader option as key=value (repeatable)
        #[arg(long = "reader-option", value_parser = parse_key_value)]
        reader_options: Vec<(String, String)>,
        /// Declarative validation configuration (.toml or .json)
        #[arg(long)]
        validation: Option<PathBuf>,
        /// Report format
        #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
        format: ReportFormat,
        /// Which results to show (all, errors, warnings)
        #[arg(long, default_value = "all")]
        severity: SeverityFilter,
    },
    /// Show schema, row count, sample rows and validation history
    Inspect {
        /// Input file
        input: PathBuf,
        /// Reader format (inferred from the extension when absent)
        #[arg(long)]
        reader: Option<String>,
        /// Number of sample rows to show
        #[arg(long, default_value_t = 5)]
        sample: usize,
        /// Show validation history
        #[arg(long)]
        history: bool,
    },
    /// Convert every file matching a glob pattern
    Batch {
        /// Glob pattern, e.g. "data/*.csv"
        pattern: String,
        /// Output directory
        output_dir: PathBuf,
        #[command(flatten)]
        pipeline: PipelineArgs,
    },
    /// List registered validators
    ListValidators,
    /// List formats and transforms
    ListFormats,
    /// Check an application configuration file
    CheckConfig {
        /// Configuration file (.toml or .json)
        config: PathBuf,
    },
}

/// Options shared by `convert` and `batch`.
#[derive(Args, Clone)]
struct PipelineArgs {
    /// Reader format (inferred from the input extension when absent)
    #[arg(long)]
    reader: Option<String>,
    /// Writer format (inferred from the output extension when absent)
    #[arg(long)]
    writer: Option<String>,
    /// Transform to apply (repeatable, in order)
    #[arg(short, long = "transform")]
    transforms: Vec<String>,
    /// Application configuration file (.toml or .json)
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Declarative validation configuration (.toml or .json)
    #[arg(long)]
    validation: Option<PathBuf>,
    /// Fail when validation finds errors
    #[arg(long)]
    fail_on_error: bool,
    /// Reader option as key=value (repeatable)
    #[arg(long = "reader-option", value_parser = parse_key_value)]
    reader_options: Vec<(String, String)>,
    /// Writer option as key=value (repeatable)
    #[arg(long = "writer-option", value_parser = parse_key_value)]
    writer_options: Vec<(String, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ReportFormat {
    Text,
    Json,
}

impl Commands {
    fn config_path(&self) -> Option<&Path> {
        match self {
            Commands::Convert { pipeline, .. } | Commands::Batch { pipeline, .. } => {
                pipeline.config.as_deref()
            }
            Commands::CheckConfig { config } => Some(config),
            _ => None,
        }
    }
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", s))?;
    Ok((key.trim().to_string(), value.to_string()))
}

/// Registries the commands resolve names against.
struct Registries {
    formats: FormatRegistry,
    transforms: TransformRegistry,
    validators: ValidatorRegistry,
}

impl Registries {
    fn new() -> Self {
        Self {
            formats: FormatRegistry::with_builtins(),
            transforms: TransformRegistry::with_builtins(),
            validators: ValidatorRegistry::with_builtins(),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let config = cli
        .command
        .config_path()
        .map(AppConfig::load)
        .transpose()
        .map(Option::unwrap_or_default);
    let config_level = config.as_ref().ok().and_then(|c| c.log_level.clone());
    init_logging(cli.log_level.as_deref(), cli.verbose, config_level.as_deref());

    let verbose = cli.verbose > 0;
    let result = config
        .map_err(|e| anyhow::Error::new(FintranError::from(e)))
        .and_then(|config| run(cli.command, config, &Registries::new()));

    let code = match result {
        Ok(code) => code,
        Err(err) => {
            report_error(&err, verbose);
            exit_code(&err)
        }
    };
    std::process::exit(code);
}

fn init_logging(cli_level: Option<&str>, verbose: u8, config_level: Option<&str>) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    match (cli_level, verbose) {
        (Some(level), _) => {
            builder.parse_filters(level);
        }
        (None, 1) => {
            builder.filter_level(log::LevelFilter::Info);
        }
        (None, v) if v >= 2 => {
            builder.filter_level(log::LevelFilter::Debug);
        }
        _ => {
            if std::env::var_os("RUST_LOG").is_none() {
                if let Some(level) = config_level {
                    builder.parse_filters(level);
                }
            }
        }
    }
    builder.init();
}

fn exit_code(err: &anyhow::Error) -> i32 {
    if let Some(e) = err.downcast_ref::<FintranError>() {
        return e.exit_code();
    }
    if let Some(e) = err.downcast_ref::<PipelineError>() {
        return e.inner().exit_code();
    }
    if err.downcast_ref::<ConfigError>().is_some() {
        return 6;
    }
    1
}

fn report_error(err: &anyhow::Error, verbose: bool) {
    eprintln!("Error: {}", err);
    if verbose {
        for cause in err.chain().skip(1) {
            eprintln!("  caused by: {}", cause);
        }
    }
    let report = err
        .downcast_ref::<FintranError>()
        .and_then(FintranError::validation_report);
    if let Some(report) = report {
        eprintln!();
        eprintln!("{}", report.format(SeverityFilter::Errors));
    }
}

fn run(command: Commands, config: AppConfig, registries: &Registries) -> anyhow::Result<i32> {
    match command {
        Commands::Convert {
            input,
            output,
            pipeline,
            dry_run,
        } => convert(&input, &output, &pipeline, &config, registries, dry_run),
        Commands::Validate {
            input,
            reader,
            reader_options,
            validation,
            format,
            severity,
        } => validate(
            &input,
            reader.as_deref(),
            reader_options.into_iter().collect(),
            validation.as_deref(),
            format,
            severity,
            registries,
        ),
        Commands::Inspect {
            input,
            reader,
            sample,
            history,
        } => inspect(&input, reader.as_deref(), sample, history, registries),
        Commands::Batch {
            pattern,
            output_dir,
            pipeline,
        } => batch(&pattern, &output_dir, &pipeline, &config, registries),
        Commands::ListValidators => {
            list_validators(&registries.validators);
            Ok(0)
        }
        Commands::ListFormats => {
            list_formats(&registries.formats, &registries.transforms);
            Ok(0)
        }
        Commands::CheckConfig { config: path } => check_config(&path, &config, registries),
    }
}

// ============================================================================
// Commands
// ============================================================================

fn build_service(
    args: &PipelineArgs,
    config: &AppConfig,
    registries: &Registries,
    input: &Path,
    output: &Path,
) -> Result<TransformService, FintranError> {
    let formats = &registries.formats;
    let reader_name = formats.resolve(
        args.reader.as_deref().or(config.reader.as_deref()),
        input,
        "reader",
    )?;
    let writer_name = formats.resolve(
        args.writer.as_deref().or(config.writer.as_deref()),
        output,
        "writer",
    )?;

    let mut reader_options = config.reader_options.clone();
    reader_options.extend(args.reader_options.iter().cloned());
    let mut writer_options = config.writer_options.clone();
    writer_options.extend(args.writer_options.iter().cloned());

    let mut service = TransformService::new(
        formats.create_reader(&reader_name)?,
        formats.create_writer(&writer_name)?,
    )
    .with_reader_options(reader_options)
    .with_writer_options(writer_options);

    let transform_names = if args.transforms.is_empty() {
        &config.transforms
    } else {
        &args.transforms
    };
    for name in transform_names {
        service.add_transform(registries.transforms.create(name)?);
    }

    let validation = match args.validation {
        Some(ref path) => Some(load_pipeline(path, &registries.validators)?),
        None => config.validation_pipeline(&registries.validators)?,
    };
    if let Some(pipeline) = validation {
        service = service.with_transform(
            ValidatingTransform::new(pipeline)
                .with_fail_on_error(args.fail_on_error || config.fail_on_error),
        );
    }
    Ok(service)
}

fn convert(
    input: &Path,
    output: &Path,
    args: &PipelineArgs,
    config: &AppConfig,
    registries: &Registries,
    dry_run: bool,
) -> anyhow::Result<i32> {
    let service = build_service(args, config, registries, input, output)?;

    let summary = if dry_run {
        let summary = service.process(input).map_err(FintranError::from)?;
        println!(
            "Dry run: would write {} rows to {}",
            summary.output.len(),
            output.display()
        );
        summary
    } else {
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("cannot create output directory {}", parent.display())
            })?;
        }
        let summary = service.run(input, output).map_err(FintranError::from)?;
        println!(
            "Converted {} -> {} ({} rows in {} ms)",
            input.display(),
            output.display(),
            summary.rows_written,
            summary.total_duration.as_millis()
        );
        summary
    };

    for entry in summary.output.metadata().history(DEFAULT_METADATA_KEY) {
        println!("  {}: {}", entry.stage, entry.report.summary());
    }
    Ok(0)
}

fn read_input(
    input: &Path,
    reader: Option<&str>,
    options: &StageOptions,
    registries: &Registries,
) -> Result<IrTable, FintranError> {
    let name = registries.formats.resolve(reader, input, "reader")?;
    let reader = registries.formats.create_reader(&name)?;
    Ok(reader.read(input, options)?)
}

fn validate(
    input: &Path,
    reader: Option<&str>,
    reader_options: StageOptions,
    validation: Option<&Path>,
    format: ReportFormat,
    severity: SeverityFilter,
    registries: &Registries,
) -> anyhow::Result<i32> {
    let ir = read_input(input, reader, &reader_options, registries)?;
    validate_ir(&ir).map_err(FintranError::from)?;

    let pipeline = match validation {
        Some(path) => load_pipeline(path, &registries.validators),
        None => PipelineConfig::from_toml_str(DEFAULT_VALIDATION)
            .and_then(|config| config.build(&registries.validators)),
    }
    .map_err(FintranError::from)?;
    let report = pipeline.run(&ir).map_err(FintranError::from)?;

    match format {
        ReportFormat::Text => println!("{}", report.format(severity)),
        ReportFormat::Json => println!(
            "{}",
            report.to_json_string().map_err(FintranError::from)?
        ),
    }
    Ok(if report.is_valid() { 0 } else { 2 })
}

fn inspect(
    input: &Path,
    reader: Option<&str>,
    sample: usize,
    history: bool,
    registries: &Registries,
) -> anyhow::Result<i32> {
    let ir = read_input(input, reader, &StageOptions::new(), registries)?;

    println!("File: {}", input.display());
    println!("Rows: {}", ir.len());
    println!();
    println!("Schema:");
    for column in ir.columns() {
        let required = if is_required(&column.name) { "required" } else { "optional" };
        println!("  {}: {} ({})", column.name, column.field_type, required);
    }
    match validate_ir(&ir) {
        Ok(()) => println!("  schema check: ok"),
        Err(e) => println!("  schema check: {}", e),
    }

    if sample > 0 && !ir.is_empty() {
        println!();
        println!("Sample ({} of {} rows):", sample.min(ir.len()), ir.len());
        println!("  {}", ir.column_names().join("\t"));
        for row in ir.rows().iter().take(sample) {
            let cells: Vec<String> = row.iter().map(|v| v.render().unwrap_or_default()).collect();
            println!("  {}", cells.join("\t"));
        }
    }

    if history {
        println!();
        println!("Validation history:");
        if ir.metadata().is_empty() {
            println!("  (none)");
        }
        for (key, entries) in ir.metadata().iter() {
            println!("  [{}]", key);
            for entry in entries {
                println!(
                    "    {} {}: {}",
                    entry.timestamp.to_rfc3339(),
                    entry.stage,
                    entry.report.summary()
                );
            }
        }
    }
    Ok(0)
}

fn batch(
    pattern: &str,
    output_dir: &Path,
    args: &PipelineArgs,
    config: &AppConfig,
    registries: &Registries,
) -> anyhow::Result<i32> {
    let files: Vec<PathBuf> = glob::glob(pattern)
        .with_context(|| format!("invalid glob pattern '{}'", pattern))?
        .filter_map(Result::ok)
        .filter(|p| p.is_file())
        .collect();
    if files.is_empty() {
        anyhow::bail!("no files match '{}'", pattern);
    }
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("cannot create output directory {}", output_dir.display()))?;

    let extension = args
        .writer
        .as_deref()
        .or(config.writer.as_deref())
        .and_then(|writer| {
            registries
                .formats
                .entries()
                .find(|(name, _)| *name == writer)
                .and_then(|(_, entry)| entry.extensions.first().cloned())
        });

    let mut failures = Vec::new();
    for (i, input) in files.iter().enumerate() {
        println!("[{}/{}] {}", i + 1, files.len(), input.display());
        let file_name = input.file_name().map(PathBuf::from).unwrap_or_default();
        let output = match extension {
            Some(ref ext) => output_dir.join(file_name.with_extension(ext)),
            None => output_dir.join(file_name),
        };

        let outcome = build_service(args, config, registries, input, &output)
            .and_then(|service| service.run(input, &output).map_err(FintranError::from));
        match outcome {
            Ok(summary) => println!("  ok: {} rows -> {}", summary.rows_written, output.display()),
            Err(e) => {
                log::warn!("{}: {}", input.display(), e);
                eprintln!("  failed (exit code {}): {}", e.exit_code(), e);
                failures.push((input.clone(), e.exit_code()));
            }
        }
    }

    println!();
    println!(
        "Batch complete: {} total, {} succeeded, {} failed",
        files.len(),
        files.len() - failures.len(),
        failures.len()
    );
    for (path, code) in &failures {
        println!("  {} (exit code {})", path.display(), code);
    }
    Ok(if failures.is_empty() { 0 } else { 1 })
}

fn list_validators(registry: &ValidatorRegistry) {
    println!("Available validators ({} total):", registry.len());
    for (name, entry) in registry.entries() {
        let aliases = registry.aliases_of(name);
        if aliases.is_empty() {
            println!("  {} [{}] - {}", name, entry.category, entry.description);
        } else {
            println!(
                "  {} [{}] - {} (aliases: {})",
                name,
                entry.category,
                entry.description,
                aliases.join(", ")
            );
        }
    }
}

fn list_formats(formats: &FormatRegistry, transforms: &TransformRegistry) {
    println!("Formats:");
    for (name, entry) in formats.entries() {
        let mut modes = Vec::new();
        if entry.can_read() {
            modes.push("read");
        }
        if entry.can_write() {
            modes.push("write");
        }
        println!(
            "  {} [{}] .{} - {}",
            name,
            modes.join("/"),
            entry.extensions.join(", ."),
            entry.description
        );
    }
    println!();
    println!("Transforms:");
    for (name, description) in transforms.list() {
        println!("  {} - {}", name, description);
    }
}

fn check_config(path: &Path, config: &AppConfig, registries: &Registries) -> anyhow::Result<i32> {
    config
        .check(
            &registries.formats,
            &registries.transforms,
            &registries.validators,
        )
        .map_err(FintranError::from)?;

    println!("Configuration is valid: {}", path.display());
    if let Some(ref reader) = config.reader {
        println!("  reader: {}", reader);
    }
    if let Some(ref writer) = config.writer {
        println!("  writer: {}", writer);
    }
    if !config.transforms.is_empty() {
        println!("  transforms: {}", config.transforms.join(", "));
    }
    if let Some(ref validation) = config.validation {
        println!(
            "  validation: {} validators ({} mode)",
            validation.validators.len(),
            validation.mode
        );
    }
    Ok(0)
}
