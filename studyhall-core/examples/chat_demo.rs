//! Chat Demo - streaming an answer into the terminal
//!
//! Asks one question and prints the answer as it streams in. The answering
//! service is taken from a config file (`STUDYHALL_CONFIG`) or a bare URL
//! (`STUDYHALL_ANSWER_URL`, default http://localhost:8000).
//!
//! Run with: cargo run --example chat_demo -- cs101 "What is a linked list?"

use anyhow::Context;
use std::io::Write;
use std::sync::Arc;
use studyhall_core::config::{self, AnsweringConfig, SessionSettings};
use studyhall_core::protocol::ExchangeStatus;
use studyhall_core::session::{ChannelObserver, ChatSession, SessionEvent};
use studyhall_core::HttpAnswerClient;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let subject = args.next().unwrap_or_else(|| "cs101".to_string());
    let question = args
        .next()
        .unwrap_or_else(|| "What is a linked list?".to_string());

    let (answering, settings) = match std::env::var("STUDYHALL_CONFIG") {
        Ok(path) => {
            let config = config::load(&path).with_context(|| format!("loading {}", path))?;
            (config.answering, config.session)
        }
        Err(_) => {
            let url = std::env::var("STUDYHALL_ANSWER_URL")
                .unwrap_or_else(|_| "http://localhost:8000".to_string());
            (AnsweringConfig::new(url), SessionSettings::default())
        }
    };

    let client = HttpAnswerClient::with_config(&answering)?;
    println!("\n📚 Studyhall chat demo ({} via {})\n", subject, client.chat_url());

    let (observer, mut events) = ChannelObserver::new();
    let session = Arc::new(
        ChatSession::builder(subject, Arc::new(client))
            .observer(Arc::new(observer))
            .settings(settings)
            .build(),
    );

    // Render events as they arrive, printing only the newly streamed suffix
    let render = tokio::spawn(async move {
        let mut printed = 0;
        while let Some(event) = events.recv().await {
            match event {
                SessionEvent::Appended(exchange) if !exchange.text.is_empty() => {
                    println!("{:?}: {}", exchange.role, exchange.text);
                }
                SessionEvent::Appended(_) => {
                    print!("Assistant: ");
                    printed = 0;
                }
                SessionEvent::Updated { text, status, .. } => {
                    if text.len() >= printed && text.is_char_boundary(printed) {
                        print!("{}", &text[printed..]);
                    } else {
                        print!("\n{}", text);
                    }
                    printed = text.len();
                    if status.is_terminal() {
                        println!();
                        if status != ExchangeStatus::Complete {
                            println!("⚠️  Answer ended as {:?}", status);
                        }
                    }
                }
            }
            let _ = std::io::stdout().flush();
        }
    });

    let outcome = session.submit_question(&question).await?;
    drop(session);
    render.await?;

    println!(
        "\n✅ Finished {} with status {:?} ({} malformed lines dropped)",
        outcome.exchange_id, outcome.status, outcome.malformed_lines
    );
    Ok(())
}
