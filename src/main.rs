use dashboard_interpreter::config::InterpreterConfig;
use dashboard_interpreter::entities::Vocabulary;
use dashboard_interpreter::extractor::RuleBasedExtractor;
use dashboard_interpreter::intent::RuleBasedClassifier;
use dashboard_interpreter::interpreter::{InterpretRequest, Interpreter};
use dashboard_interpreter::llm::{LlmClient, ProviderClassifier, ProviderExtractor};
use dashboard_interpreter::normalizer::Language;
use dashboard_interpreter::taxonomy::{load_catalog, TaxonomyRegistry, TaxonomySnapshot};

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use itertools::Itertools;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "dashboard-interpreter")]
#[command(about = "Turns dashboard commands in English or Bengali into typed actions")]
#[command(version)]
struct Args {
    /// JSON config file (environment variables still override it)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ProviderKind {
    /// Deterministic lexicon classifier and extractor
    Rules,
    /// Chat-completions model (needs OPENAI_API_KEY)
    Llm,
}

#[derive(Subcommand)]
enum Commands {
    /// Interpret one utterance and print the result as JSON
    Interpret {
        /// The command in natural language
        query: String,

        /// Taxonomy catalog, JSON or CSV (default: metadata/taxonomy.json)
        #[arg(short, long, default_value = "metadata/taxonomy.json")]
        taxonomy: PathBuf,

        /// Locale hint used when the text itself gives no language signal
        #[arg(long)]
        lang: Option<String>,

        /// Reference date for relative ranges, YYYY-MM-DD (default: today)
        #[arg(long)]
        as_of: Option<String>,

        #[arg(long, value_enum, default_value = "rules")]
        provider: ProviderKind,

        /// Pretty-print the JSON
        #[arg(long)]
        pretty: bool,
    },
    /// Load and validate a taxonomy catalog
    CheckTaxonomy {
        /// Catalog file, JSON or CSV
        path: PathBuf,
    },
    /// Read utterances from stdin, one per line (:reload, :quit)
    Shell {
        #[arg(short, long, default_value = "metadata/taxonomy.json")]
        taxonomy: PathBuf,

        #[arg(long)]
        lang: Option<String>,

        #[arg(long, value_enum, default_value = "rules")]
        provider: ProviderKind,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dashboard_interpreter=info".into()),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => InterpreterConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => InterpreterConfig::from_env()?,
    };

    match args.command {
        Commands::Interpret {
            query,
            taxonomy,
            lang,
            as_of,
            provider,
            pretty,
        } => {
            let interpreter = build_interpreter(&taxonomy, provider, config)?;
            let mut request = InterpretRequest::new(query);
            if let Some(language) = parse_lang(lang.as_deref())? {
                request = request.with_locale(language);
            }
            if let Some(as_of) = as_of {
                let date = NaiveDate::parse_from_str(&as_of, "%Y-%m-%d")
                    .with_context(|| format!("Invalid --as-of date '{}'", as_of))?;
                request = request.with_reference_date(date);
            }

            let result = interpreter.interpret(request).await;
            let json = if pretty { result.to_json_pretty()? } else { result.to_json()? };
            println!("{}", json);
        }
        Commands::CheckTaxonomy { path } => {
            let catalog = load_catalog(&path)?;
            let snapshot = TaxonomySnapshot::from_catalog(catalog, 1, &config)?;
            print_summary(&path, &snapshot);
        }
        Commands::Shell {
            taxonomy,
            lang,
            provider,
        } => {
            let interpreter = build_interpreter(&taxonomy, provider, config)?;
            let hint = parse_lang(lang.as_deref())?;
            run_shell(&interpreter, &taxonomy, hint).await?;
        }
    }

    Ok(())
}

fn build_interpreter(taxonomy: &Path, provider: ProviderKind, config: InterpreterConfig) -> Result<Interpreter> {
    let registry = Arc::new(
        TaxonomyRegistry::load(taxonomy, &config)
            .with_context(|| format!("Failed to load taxonomy from {}", taxonomy.display()))?,
    );

    let interpreter = match provider {
        ProviderKind::Rules => Interpreter::with_components(
            registry,
            Arc::new(RuleBasedClassifier::new()),
            Arc::new(RuleBasedExtractor::new()),
            config,
        ),
        ProviderKind::Llm => {
            let client = Arc::new(LlmClient::from_config(&config.provider)?);
            info!("🤖 Using model {}", client.model());
            Interpreter::with_components(
                registry,
                Arc::new(ProviderClassifier::new(Arc::clone(&client))),
                Arc::new(ProviderExtractor::new(client)),
                config,
            )
        }
    };
    Ok(interpreter)
}

fn parse_lang(lang: Option<&str>) -> Result<Option<Language>> {
    lang.map(|code| {
        Language::from_code(code).ok_or_else(|| anyhow!("Unsupported language '{}', expected en or bn", code))
    })
    .transpose()
}

fn print_summary(path: &Path, snapshot: &TaxonomySnapshot) {
    println!("✅ {} is valid", path.display());
    println!(
        "   {} business units: {}",
        snapshot.business_unit_count(),
        snapshot.business_unit_names().iter().join(", ")
    );
    println!(
        "   {} metrics: {}",
        snapshot.metric_count(),
        snapshot.metric_names().iter().join(", ")
    );
    println!(
        "   visualization aliases: {}",
        snapshot
            .visualization_aliases()
            .iter()
            .map(|(alias, kind)| format!("{}→{}", alias, kind.key()))
            .join(", ")
    );
}

async fn run_shell(interpreter: &Interpreter, taxonomy: &Path, hint: Option<Language>) -> Result<()> {
    println!("Dashboard interpreter shell. Type :reload to reload the taxonomy, :quit to exit.");
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("> ");
        io::stdout().flush()?;
        let Some(line) = lines.next() else { break };
        let line = line?;
        let input = line.trim();

        match input {
            "" => continue,
            ":quit" | ":q" => break,
            ":reload" => match interpreter.registry().reload_from_path(taxonomy) {
                Ok(version) => println!("Taxonomy reloaded (version {})", version),
                Err(e) => {
                    error!("Reload failed: {}", e);
                    println!("Reload failed, keeping the current taxonomy: {}", e);
                }
            },
            query => {
                let mut request = InterpretRequest::new(query);
                if let Some(language) = hint {
                    request = request.with_locale(language);
                }
                let result = interpreter.interpret(request).await;
                println!("{}", result.to_json_pretty()?);
            }
        }
    }

    Ok(())
}
