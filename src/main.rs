use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use clap::{Args, Parser, Subcommand};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use exprmap::expression::parse_lambda;
use exprmap::query::{DataSource, LoggingInspector};
use exprmap::{
    use_as_data_source, AsyncInMemorySource, DataType, ExpressionTranslator, InMemorySource,
    MappingConfiguration, MappingDefinition, MappingService, TranslationConfig,
};

/// exprmap - run destination-typed queries over source-typed data
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Translation settings file (YAML); environment variables are used otherwise
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Maximum expression depth accepted by the translator
    #[arg(long, global = true)]
    max_depth: Option<usize>,

    /// Log every translated tree
    #[arg(long, global = true)]
    log_translations: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print a destination lambda rewritten over the source type
    Translate {
        #[command(flatten)]
        mapping: MappingArgs,

        /// Source (entity) type
        #[arg(long)]
        source: String,

        /// Destination (DTO) type the lambda is written against
        #[arg(long)]
        destination: String,

        /// Lambda over the destination type, e.g. "d => d.Name == 'x'"
        lambda: String,
    },
    /// Run a query over JSON rows and print the mapped results
    Query(QueryArgs),
}

#[derive(Args)]
struct MappingArgs {
    /// Mapping definition (YAML)
    #[arg(long)]
    mapping: PathBuf,
}

#[derive(Args)]
struct QueryArgs {
    #[command(flatten)]
    mapping: MappingArgs,

    /// Rows file: { "type": "<SourceType>", "rows": [ ... ] }
    #[arg(long)]
    data: PathBuf,

    /// Destination type to query
    #[arg(long)]
    destination: String,

    #[arg(long)]
    filter: Option<String>,

    #[arg(long)]
    order_by: Option<String>,

    /// Order descending (with --order-by)
    #[arg(long)]
    descending: bool,

    #[arg(long)]
    skip: Option<usize>,

    #[arg(long)]
    take: Option<usize>,

    /// Execute through the async path
    #[arg(long = "async")]
    run_async: bool,

    /// Log inspector observations for the execution
    #[arg(long)]
    inspect: bool,
}

#[derive(Deserialize)]
struct DataFile {
    #[serde(rename = "type")]
    element_type: String,
    rows: Vec<serde_json::Value>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logger - defaults to INFO level, can be overridden with RUST_LOG env var
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => TranslationConfig::from_yaml_file(path)?,
        None => TranslationConfig::from_env()?,
    }
    .with_overrides(cli.max_depth, cli.log_translations)?;

    match cli.command {
        Command::Translate {
            mapping,
            source,
            destination,
            lambda,
        } => translate(&config, &mapping, &source, &destination, &lambda),
        Command::Query(args) => query(config, &args).await,
    }
}

fn load_mapping(args: &MappingArgs) -> anyhow::Result<MappingConfiguration> {
    MappingDefinition::load(&args.mapping)
        .with_context(|| format!("loading mapping {}", args.mapping.display()))
}

fn translate(
    config: &TranslationConfig,
    args: &MappingArgs,
    source: &str,
    destination: &str,
    text: &str,
) -> anyhow::Result<()> {
    let mapping = load_mapping(args)?;
    if !mapping.has_type_map(source, destination) {
        return Err(anyhow!("no type map from `{}` to `{}`", source, destination));
    }

    let lambda = parse_lambda(
        text,
        &DataType::record(destination),
        mapping.catalog(),
        mapping.parameter_types(),
    )?;
    let translated = ExpressionTranslator::new(&mapping)
        .with_config(config)
        .translate_lambda(&lambda, &DataType::record(source))?;

    println!("{}", translated);
    Ok(())
}

async fn query(config: TranslationConfig, args: &QueryArgs) -> anyhow::Result<()> {
    let mapping = Arc::new(load_mapping(&args.mapping)?);

    let contents = std::fs::read_to_string(&args.data)
        .with_context(|| format!("reading {}", args.data.display()))?;
    let data: DataFile = serde_json::from_str(&contents)
        .with_context(|| format!("parsing {}", args.data.display()))?;

    let rows = InMemorySource::from_json(mapping.shared_catalog(), data.element_type, &data.rows)?;
    let source: Arc<dyn DataSource> = if args.run_async {
        Arc::new(AsyncInMemorySource::new(rows))
    } else {
        Arc::new(rows)
    };

    let mut injection = use_as_data_source(source, mapping).with_config(config);
    if args.inspect {
        injection = injection.with_inspector(Arc::new(LoggingInspector));
    }

    let mut query = injection.for_type(&args.destination)?;
    if let Some(filter) = &args.filter {
        query = query.filter(filter)?;
    }
    if let Some(key) = &args.order_by {
        query = if args.descending {
            query.order_by_descending(key)?
        } else {
            query.order_by(key)?
        };
    }
    if let Some(skip) = args.skip {
        query = query.skip(skip)?;
    }
    if let Some(take) = args.take {
        query = query.take(take)?;
    }

    let items = if args.run_async {
        query.to_list_async(&CancellationToken::new()).await?
    } else {
        query.to_list()?
    };

    let json: Vec<serde_json::Value> = items.iter().map(|item| item.to_json()).collect();
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
