//! Form Compiler CLI
//!
//! Expands and compiles Masters stored as `<id>.json` files, fetching domain
//! metadata over HTTP.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use form_compiler::{
    CompilerConfig, FileFormStorage, FormCompiler, HttpMetadataTransport, MetadataCache,
    MetadataService,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "form-compiler")]
#[command(about = "Expand and compile form Masters into JSON Schema")]
#[command(version)]
struct Cli {
    /// Config file (defaults to form-compiler.toml lookup)
    #[arg(short, long)]
    config: Option<String>,

    /// Directory of <id>.json Masters
    #[arg(long)]
    forms_dir: Option<PathBuf>,

    /// Metadata API base URL
    #[arg(long)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve baseFormID, fieldsFormID and patch of a form
    Expand {
        /// Form id
        id: String,
    },

    /// Compile a form into JSON Schema
    Compile {
        /// Form id
        id: String,
        /// Language (defaults to the configured one)
        #[arg(short, long)]
        lang: Option<String>,
        /// Output file (JSON)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the metadata properties of a class
    Properties {
        /// Class name or property id, e.g. MY.gatherings
        class: String,
        #[arg(short, long)]
        lang: Option<String>,
    },

    /// Print the fingerprint of a compiled form
    Fingerprint {
        /// Form id
        id: String,
        #[arg(short, long)]
        lang: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config =
        CompilerConfig::load_from(cli.config.as_deref()).context("loading configuration")?;
    if let Some(dir) = cli.forms_dir {
        config.storage.forms_dir = dir;
    }
    if let Some(url) = cli.base_url {
        config.metadata.base_url = url;
    }

    let transport =
        HttpMetadataTransport::new(&config.metadata.base_url, config.metadata.timeout())?;
    let cache = MetadataCache::new();
    let metadata = Arc::new(MetadataService::new(
        Arc::new(transport),
        &cache,
        &config.metadata.default_prefix,
    ));
    let storage = Arc::new(FileFormStorage::new(&config.storage.forms_dir));
    let compiler = FormCompiler::new(storage, metadata)
        .with_overrides(config.compiler.overrides())
        .with_root_class(&config.compiler.root_class);

    let default_lang = config.compiler.default_language.clone();

    match cli.command {
        Commands::Expand { id } => {
            let expanded = compiler.expander().expand_by_id(&id, None).await?;
            println!("{}", serde_json::to_string_pretty(&expanded)?);
        }

        Commands::Compile { id, lang, output } => {
            let lang = lang.unwrap_or(default_lang);
            let schemas = compiler.compile_by_id(&id, &lang, None).await?;
            let json = serde_json::to_string_pretty(&schemas)?;

            if let Some(path) = output {
                std::fs::write(&path, &json)
                    .with_context(|| format!("writing {}", path.display()))?;
                println!("✅ Compiled {} ({}) written to {:?}", id, lang, path);
            } else {
                println!("{}", json);
            }
        }

        Commands::Properties { class, lang } => {
            let lang = lang.unwrap_or(default_lang);
            let resolved = compiler.metadata().resolve_class_name(&class);
            let properties = compiler.metadata().properties(&class, &lang).await?;

            println!("📋 {} ({} properties)", resolved, properties.len());
            for property in properties.iter() {
                println!(
                    "  {} [{}] {}..{}{}",
                    property.property,
                    property.range.join(", "),
                    property.min_occurs,
                    property.max_occurs,
                    property.label.as_deref().map(|l| format!(" - {}", l)).unwrap_or_default(),
                );
            }
        }

        Commands::Fingerprint { id, lang } => {
            let lang = lang.unwrap_or(default_lang);
            let schemas = compiler.compile_by_id(&id, &lang, None).await?;
            println!("{}", schemas.fingerprint()?);
        }
    }

    Ok(())
}
