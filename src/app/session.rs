use crate::core::engine::RagEngine;
use crate::core::{Answer, Pipeline};
use crate::utils::error::{ErrorSeverity, RagError};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// Process exit code for an error, by severity.
pub fn exit_code(error: &RagError) -> i32 {
    match error.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    }
}

pub fn report_error(context: &str, error: &RagError) {
    tracing::error!(
        "❌ {} failed: {} (Category: {:?}, Severity: {:?})",
        context,
        error,
        error.category(),
        error.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", error.recovery_suggestion());

    eprintln!("❌ {}", error.user_friendly_message());
    eprintln!("💡 Suggestion: {}", error.recovery_suggestion());
}

pub fn render_answer(answer: &Answer) -> String {
    format!(
        "Retrieved Context:\n{}\n\n### Response\n{}\n",
        answer.context, answer.text
    )
}

/// Ingests `path` and prints the outcome.
pub async fn load_document<P: Pipeline>(engine: &RagEngine<P>, path: &str) -> Result<(), RagError> {
    let report = engine.ingest(path).await?;
    println!(
        "✅ Document processed and indexed successfully! ({}, {} characters, {} chunks)",
        report.kind, report.characters, report.chunk_count
    );
    Ok(())
}

/// Answers each query in order. Stops at the first error with severity above Low.
pub async fn answer_queries<P: Pipeline>(
    engine: &RagEngine<P>,
    queries: &[String],
) -> Result<usize, RagError> {
    let mut answered = 0;
    for query in queries {
        match engine.ask(query).await {
            Ok(answer) => {
                println!("{}", render_answer(&answer));
                answered += 1;
            }
            Err(e) if e.severity() == ErrorSeverity::Low => report_error("Query", &e),
            Err(e) => return Err(e),
        }
    }
    Ok(answered)
}

enum Command<'a> {
    Quit,
    Load(&'a str),
    Ask(&'a str),
    Skip,
}

fn parse_command(line: &str) -> Command<'_> {
    let line = line.trim();
    if line.is_empty() {
        return Command::Skip;
    }
    match line {
        ":quit" | ":q" | ":exit" => Command::Quit,
        _ => match line.strip_prefix(":load ") {
            Some(path) => Command::Load(path.trim()),
            None => Command::Ask(line),
        },
    }
}

/// Line-oriented session: `:load <path>`, `:quit`, anything else is a query.
/// Errors are reported and the loop continues. Returns the number of answers.
pub async fn interactive<P, R, W>(
    engine: &RagEngine<P>,
    input: R,
    mut prompt_out: W,
) -> std::io::Result<usize>
where
    P: Pipeline,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    let mut answered = 0;

    loop {
        prompt_out.write_all(b"> ").await?;
        prompt_out.flush().await?;

        let line = match lines.next_line().await? {
            Some(line) => line,
            None => break,
        };

        match parse_command(&line) {
            Command::Quit => break,
            Command::Skip => continue,
            Command::Load(path) => {
                if let Err(e) = load_document(engine, path).await {
                    report_error("Document processing", &e);
                }
            }
            Command::Ask(query) => match engine.ask(query).await {
                Ok(answer) => {
                    prompt_out
                        .write_all(render_answer(&answer).as_bytes())
                        .await?;
                    answered += 1;
                }
                Err(e) => report_error("Query", &e),
            },
        }
    }

    Ok(answered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command() {
        assert!(matches!(parse_command("  :quit "), Command::Quit));
        assert!(matches!(parse_command(""), Command::Skip));
        assert!(matches!(
            parse_command(":load docs/a.pdf"),
            Command::Load("docs/a.pdf")
        ));
        assert!(matches!(
            parse_command("what is this?"),
            Command::Ask("what is this?")
        ));
    }

    #[test]
    fn test_exit_codes_follow_severity() {
        assert_eq!(exit_code(&RagError::NoDocumentIndexed), 0);
        assert_eq!(
            exit_code(&RagError::ModelError {
                status: 500,
                message: String::new()
            }),
            2
        );
        assert_eq!(exit_code(&RagError::EmptyDocument), 1);
        assert_eq!(
            exit_code(&RagError::IoError(std::io::Error::other("disk"))),
            3
        );
    }

    #[test]
    fn test_render_answer() {
        let answer = Answer {
            query: "q".to_string(),
            context: "ctx".to_string(),
            text: "ans".to_string(),
            model_id: "m".to_string(),
        };
        assert_eq!(
            render_answer(&answer),
            "Retrieved Context:\nctx\n\n### Response\nans\n"
        );
    }
}
