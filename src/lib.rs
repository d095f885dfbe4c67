pub mod cli;
pub mod completion;
pub mod ingest;
pub mod models;
pub mod session;

use cli::Args;
use completion::{CompletionClient, EndpointConfig};
use ingest::{Ingestor, TurnEvent, TurnObserver};
use log::{info, warn};
use session::{ChatSession, SessionError};
use std::error::Error;
use std::io::{self, Write};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

const QUIT_COMMAND: &str = "/quit";

/// Writes streamed text as it grows.
struct TerminalView<W: Write> {
    out: W,
    shown: String,
}

impl<W: Write> TerminalView<W> {
    fn new(out: W) -> Self {
        Self {
            out,
            shown: String::new(),
        }
    }

    fn show(&mut self, content: &str) -> io::Result<()> {
        match content.strip_prefix(self.shown.as_str()) {
            Some(tail) => write!(self.out, "{}", tail)?,
            None => write!(self.out, "\r{}", content)?,
        }
        self.out.flush()?;
        self.shown = content.to_string();
        Ok(())
    }

    fn render(&mut self, event: &TurnEvent) -> io::Result<()> {
        match event {
            TurnEvent::Started(content) | TurnEvent::Updated(content) => self.show(content),
            TurnEvent::Completed(message) => {
                self.show(message.content())?;
                writeln!(self.out)
            }
        }
    }
}

impl<W: Write> TurnObserver for TerminalView<W> {
    fn on_event(&mut self, event: &TurnEvent) {
        if let Err(e) = self.render(event) {
            warn!("Failed to write reply to terminal: {}", e);
        }
    }
}

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    let endpoint = EndpointConfig::from_args(&args);
    let client = CompletionClient::new(&endpoint)?;

    info!("--- Core Configuration ---");
    info!("Chat Endpoint: {}", client.url());
    info!("API Key Set: {}", !endpoint.api_key.is_empty());
    info!("-------------------------");

    let ingestor = Ingestor::new(Arc::new(client));
    let mut session = ChatSession::new(Some(args.greeting.as_str()));

    println!("Career Advisor Assistant");
    println!(
        "Ask me anything about courses, careers, or finding a mentor ({} to exit)",
        QUIT_COMMAND
    );
    if let Some(greeting) = session.conversation().last() {
        println!("\nAssistant: {}", greeting.content());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("\nYou: ");
        io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        if line.trim() == QUIT_COMMAND {
            break;
        }

        print!("Assistant: ");
        io::stdout().flush()?;
        let mut view = TerminalView::new(io::stdout());
        match session.submit(&line, &ingestor, &mut view).await {
            Ok(_) => {}
            Err(SessionError::EmptyInput) => println!("(type a question first)"),
            Err(e) => warn!("Turn rejected: {}", e),
        }
    }

    info!(
        "Session ended after {} messages",
        session.conversation().len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::Message;

    #[test]
    fn terminal_view_prints_only_new_text() {
        let mut view = TerminalView::new(Vec::new());
        view.on_event(&TurnEvent::Started("Study ".into()));
        view.on_event(&TurnEvent::Updated("Study CS.".into()));
        view.on_event(&TurnEvent::Completed(Message::assistant("Study CS.")));
        assert_eq!(String::from_utf8(view.out).unwrap(), "Study CS.\n");
    }

    #[test]
    fn terminal_view_rewrites_replaced_text() {
        let mut view = TerminalView::new(Vec::new());
        view.on_event(&TurnEvent::Started("The best".into()));
        view.on_event(&TurnEvent::Updated("A different answer".into()));
        assert_eq!(
            String::from_utf8(view.out).unwrap(),
            "The best\rA different answer"
        );
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn terminal_write_failure_is_reported_not_swallowed() {
        let mut view = TerminalView::new(BrokenPipe);
        let err = view
            .render(&TurnEvent::Started("Study".into()))
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert!(view.shown.is_empty());

        view.on_event(&TurnEvent::Completed(Message::assistant("Study")));
    }
}
