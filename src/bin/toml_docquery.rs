use anyhow::Context;
use clap::Parser;
use docquery::app::session::{self, exit_code, report_error};
use docquery::core::ConfigProvider;
use docquery::utils::logger::{self, LogFormat};
use docquery::utils::validation::{self, Validate};
use docquery::{LocalStorage, RagEngine, RagPipeline, TomlConfig};
use tokio::io::BufReader;

#[derive(Parser)]
#[command(name = "toml-docquery")]
#[command(about = "Document Q&A with TOML configuration support")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "docquery.toml")]
    config: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Override monitoring setting from config
    #[arg(long)]
    monitor: Option<bool>,

    /// Override the document path from config
    #[arg(long)]
    file: Option<String>,

    /// Question to ask; repeat for several
    #[arg(long = "query", short = 'q')]
    queries: Vec<String>,

    /// Show what would be processed without calling any service
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // 載入 TOML 配置 (日誌等級由配置決定，所以先載入)
    let mut config = match TomlConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", args.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    // 初始化日誌；無效的等級留給下面的驗證回報
    let level = config
        .log_level()
        .filter(|level| validation::validate_log_level("monitoring.log_level", level).is_ok())
        .map(str::to_string);
    logger::init_logger(args.verbose, LogFormat::Compact, level.as_deref());

    tracing::info!("🚀 Starting TOML-based docquery");
    tracing::info!("📁 Configuration loaded from: {}", args.config);

    // 套用命令列覆蓋設定
    if let Some(file) = &args.file {
        config.document.path = Some(file.clone());
        tracing::info!("🔧 Document overridden to: {}", file);
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    tracing::info!("✅ Configuration loaded and validated successfully");
    display_config_summary(&config);

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - No actual processing will occur");
        perform_dry_run(&config, &args).await?;
        return Ok(());
    }

    let monitor_enabled = args.monitor.unwrap_or_else(|| config.monitoring_enabled());
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let document_path = config.document_path().map(str::to_string);
    let mime = config.document.mime.clone();
    let save = config.save_transcript();

    let storage = LocalStorage::new(".".to_string());
    let pipeline = RagPipeline::new(storage, config)
        .context("failed to build embedding or model client")?
        .with_mime_override(mime);
    let engine = RagEngine::new_with_monitoring(pipeline, monitor_enabled);

    if let Some(path) = &document_path {
        if let Err(e) = session::load_document(&engine, path).await {
            report_error("Document processing", &e);
            std::process::exit(exit_code(&e).max(1));
        }
    }

    if args.queries.is_empty() {
        println!("Enter a query, ':load <file>' to index a document, ':quit' to exit.");
        let stdin = BufReader::new(tokio::io::stdin());
        session::interactive(&engine, stdin, tokio::io::stdout())
            .await
            .context("interactive session failed")?;
    } else if let Err(e) = session::answer_queries(&engine, &args.queries).await {
        report_error("Query", &e);
        let code = exit_code(&e);
        if code > 0 {
            std::process::exit(code);
        }
    }

    if save {
        let path = engine
            .save_transcript()
            .await
            .context("failed to save transcript")?;
        println!("📁 Transcript saved to: {}", path);
    }

    Ok(())
}

fn display_config_summary(config: &TomlConfig) {
    let embedding = config.embedding();
    let model = config.model();

    println!("📋 Configuration Summary:");
    println!("  App: {}", config.app.name);
    println!(
        "  Document: {}",
        config.document_path().unwrap_or("(load interactively)")
    );
    println!(
        "  Chunking: {} chars, overlap {}",
        config.chunk_size(),
        config.chunk_overlap()
    );
    println!(
        "  Embedding: {:?} {} ({} dims, batch {})",
        embedding.provider, embedding.model, embedding.dimension, embedding.batch_size
    );
    println!("  Top K: {}", config.top_k());
    println!("  Model: {} @ {}", model.model_id, model.endpoint);
    println!(
        "  Auth token: {}",
        if model.auth_token.is_some() { "set" } else { "not set" }
    );
    println!("  Output: {}", config.output_path());
}

async fn perform_dry_run(config: &TomlConfig, args: &Args) -> anyhow::Result<()> {
    println!("🔍 Dry run:");

    match config.document_path() {
        Some(path) => {
            let metadata = tokio::fs::metadata(path)
                .await
                .with_context(|| format!("cannot stat document '{}'", path))?;
            let within_limit = metadata.len() <= config.max_upload_bytes();
            println!(
                "  Would index {} ({} bytes, {})",
                path,
                metadata.len(),
                if within_limit {
                    "within upload limit"
                } else {
                    "exceeds upload limit"
                }
            );
        }
        None => println!("  No document configured"),
    }

    for query in &args.queries {
        println!("  Would ask: {}", query);
    }
    if config.save_transcript() {
        println!("  Would save transcript under {}", config.output_path());
    }
    Ok(())
}
