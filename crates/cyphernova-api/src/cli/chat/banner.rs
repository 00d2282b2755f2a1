//! Welcome banner display for chat sessions.

use console::style;

/// Print the welcome banner at the start of a chat session.
///
/// Shows the backend, the model label and the short session id.
pub fn print_welcome_banner(backend: &str, model: &str, session_id: &str, streaming: bool) {
    println!();
    println!("  {} {}", "🌸", style("CypherNova").magenta().bold());
    println!("  {}", style("Your AI chat companion").dim());
    println!();
    println!("  {}  {}", style("Backend:").bold(), style(backend).dim());
    println!("  {}    {}", style("Model:").bold(), style(model).dim());
    println!(
        "  {}  {}",
        style("Session:").bold(),
        style(&session_id[..8.min(session_id.len())]).dim()
    );
    if !streaming {
        println!(
            "  {}   {}",
            style("Reply:").bold(),
            style("shown when complete").dim()
        );
    }
    println!();
    println!("  {}", style("Type /help for commands, Ctrl+D to exit").dim());
    println!("  {}", style("---").dim());
    println!();
}
