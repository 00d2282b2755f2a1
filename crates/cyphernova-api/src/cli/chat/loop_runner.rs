//! Main chat loop orchestration.
//!
//! Coordinates one terminal conversation: session creation, welcome
//! banner, greeting, the input loop with streaming or batch replies, and
//! slash commands.

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use cyphernova_core::export::ExportFormat;
use cyphernova_core::session::{ChatSession, SessionFactory, TurnOutcome};
use cyphernova_types::error::{ChatError, ExportError};

use super::banner::print_welcome_banner;
use super::commands::{self, ChatCommand};
use super::input::{ChatInput, InputEvent};
use super::renderer::ChatRenderer;

fn thinking_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("  {spinner:.magenta} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message("CypherNova is thinking...");
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

/// Run the interactive chat loop until the user exits.
pub async fn run_chat_loop(factory: &SessionFactory, stream: bool) -> anyhow::Result<()> {
    let mut session = factory.create();
    let streaming = stream && session.gateway().supports_streaming();
    debug!(session_id = %session.id(), streaming, "Chat session started");

    print_welcome_banner(
        session.gateway().name(),
        session.model_label(),
        &session.id().to_string(),
        streaming,
    );

    let mut renderer = ChatRenderer::new(session.theme());
    print_assistant_label();
    println!("{}", renderer.render_final(session.transcript().greeting()).trim_end());
    println!();

    let mut chat_input = ChatInput::new(session.theme())
        .map_err(|e| anyhow::anyhow!("Failed to initialize input: {e}"))?;

    loop {
        let text = match chat_input.read_line().await {
            InputEvent::Eof => {
                println!("\n  {}", style("Session ended.").dim());
                break;
            }
            InputEvent::Interrupted => {
                println!("\n  {}", style("Press Ctrl+D to exit, or keep chatting.").dim());
                continue;
            }
            InputEvent::Message(text) if text.is_empty() => continue,
            InputEvent::Message(text) => text,
        };

        if let Some(cmd) = commands::parse(&text) {
            match cmd {
                ChatCommand::Help => commands::print_help(),
                ChatCommand::Clear => {
                    session.clear();
                    chat_input.clear();
                    println!("\n  {} Conversation cleared.\n", style("✓").green().bold());
                    print_assistant_label();
                    println!("{}", renderer.render_final(session.transcript().greeting()).trim_end());
                    println!();
                }
                ChatCommand::Stats => renderer.print_stats(&session.summary()),
                ChatCommand::Export { format, path } => {
                    export_session(&session, format, path).await;
                }
                ChatCommand::Theme => {
                    let theme = session.toggle_theme();
                    renderer.set_theme(theme);
                    chat_input.set_theme(theme);
                    println!("\n  {} Theme: {}\n", style("✓").green().bold(), style(theme).cyan());
                }
                ChatCommand::History => renderer.print_history(session.transcript().all()),
                ChatCommand::Exit => {
                    println!("\n  {}", style("Session ended.").dim());
                    break;
                }
                ChatCommand::Unknown(cmd_name) => {
                    println!(
                        "\n  {} Unknown command: {}. Type /help for available commands.\n",
                        style("?").yellow().bold(),
                        style(cmd_name).dim()
                    );
                }
            }
            continue;
        }

        let outcome = if streaming {
            run_streaming_turn(&mut session, &renderer, &text).await
        } else {
            run_batch_turn(&mut session, &renderer, &text).await
        };

        match outcome {
            Ok(outcome) if outcome.error => renderer.print_error_turn(&outcome.reply.content),
            Ok(outcome) => {
                renderer.print_reply_footer(
                    outcome.response_time,
                    outcome.reply.model.as_deref().unwrap_or(session.model_label()),
                );
            }
            Err(err) => {
                println!("\n  {} {err}", style("!").yellow().bold());
            }
        }
        println!();
    }

    chat_input.flush();
    Ok(())
}

fn print_assistant_label() {
    print!("\n  {} ", style("CypherNova").magenta().bold());
    let _ = std::io::stdout().flush();
}

async fn run_streaming_turn(
    session: &mut ChatSession,
    renderer: &ChatRenderer,
    text: &str,
) -> Result<TurnOutcome, ChatError> {
    let spinner = thinking_spinner();
    let mut started = false;

    let outcome = session
        .submit_streaming(text, |fragment| {
            if !started {
                spinner.finish_and_clear();
                started = true;
                print_assistant_label();
            }
            renderer.print_streaming_token(fragment);
        })
        .await;

    if !started {
        spinner.finish_and_clear();
    }
    println!();
    outcome
}

async fn run_batch_turn(
    session: &mut ChatSession,
    renderer: &ChatRenderer,
    text: &str,
) -> Result<TurnOutcome, ChatError> {
    let spinner = thinking_spinner();
    let outcome = session.submit(text).await;
    spinner.finish_and_clear();

    if let Ok(outcome) = &outcome
        && !outcome.error
    {
        print_assistant_label();
        println!("{}", renderer.render_final(&outcome.reply.content).trim_end());
    }
    outcome
}

/// Write an export next to the working directory or to `path`.
async fn export_session(session: &ChatSession, format: ExportFormat, path: Option<PathBuf>) {
    let document = match session.export(format) {
        Ok(document) => document,
        Err(ChatError::Export(ExportError::NothingToExport)) => {
            println!(
                "\n  {} Nothing to export yet. Say something first!\n",
                style("!").yellow().bold()
            );
            return;
        }
        Err(err) => {
            println!("\n  {} Export failed: {err}\n", style("!").red().bold());
            return;
        }
    };

    let target = path.unwrap_or_else(|| PathBuf::from(&document.file_name));
    match tokio::fs::write(&target, document.body.as_bytes()).await {
        Ok(()) => println!(
            "\n  {} Chat exported to {}\n",
            style("✓").green().bold(),
            style(target.display()).cyan()
        ),
        Err(err) => println!(
            "\n  {} Could not write {}: {err}\n",
            style("!").red().bold(),
            target.display()
        ),
    }
}
