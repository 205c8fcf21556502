use clap::Parser;
use docquery::app::session::{self, exit_code, report_error};
use docquery::core::ConfigProvider;
use docquery::utils::logger::{self, LogFormat};
use docquery::utils::validation::Validate;
use docquery::{CliConfig, LocalStorage, RagEngine, RagPipeline};
use tokio::io::BufReader;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = CliConfig::parse();

    // 初始化日誌
    let format = if config.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };
    logger::init_logger(config.verbose, format, None);

    tracing::info!("Starting docquery CLI");
    tracing::debug!(
        "chunk_size={} overlap={} top_k={} embedding={:?} model={}",
        config.chunk_size,
        config.chunk_overlap,
        config.top_k,
        config.embedding_provider,
        config.model_id
    );

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    if config.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }
    if config.auth_token.is_none() {
        tracing::warn!("No model auth token set (--auth-token / VPS_AUTH_TOKEN)");
    }

    let file = config.file.clone();
    let queries = config.queries.clone();
    let save = config.output.is_some();
    let monitor_enabled = config.monitor;
    let mime = config.mime.clone();
    tracing::debug!("Transcript directory: {}", config.output_path());

    // 建立管道與引擎
    let storage = LocalStorage::new(".".to_string());
    let pipeline = match RagPipeline::new(storage, config) {
        Ok(pipeline) => pipeline.with_mime_override(mime),
        Err(e) => {
            report_error("Pipeline setup", &e);
            std::process::exit(exit_code(&e).max(1));
        }
    };
    let engine = RagEngine::new_with_monitoring(pipeline, monitor_enabled);

    if let Some(path) = &file {
        if let Err(e) = session::load_document(&engine, path).await {
            report_error("Document processing", &e);
            std::process::exit(exit_code(&e).max(1));
        }
    }

    if queries.is_empty() {
        println!("Enter a query, ':load <file>' to index a document, ':quit' to exit.");
        let stdin = BufReader::new(tokio::io::stdin());
        let answered = session::interactive(&engine, stdin, tokio::io::stdout()).await?;
        tracing::info!("Session finished with {} answers", answered);
    } else if let Err(e) = session::answer_queries(&engine, &queries).await {
        report_error("Query", &e);
        let code = exit_code(&e);
        if code > 0 {
            std::process::exit(code);
        }
    }

    if save {
        match engine.save_transcript().await {
            Ok(path) => println!("📁 Transcript saved to: {}", path),
            Err(e) => {
                report_error("Saving transcript", &e);
                std::process::exit(exit_code(&e).max(1));
            }
        }
    }

    Ok(())
}
