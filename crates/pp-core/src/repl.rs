//! Interactive chat loop and single-shot mode.
//!
//! Tokens are printed to stdout as they arrive. When a turn completes, the
//! products from the agent's final state are listed under the answer.
//! Errors and status lines go to stderr.

use std::future::Future;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};

use pp_backend::{AgentStream, HttpTransport, StreamCallbacks, Transport};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::config::Config;
use crate::display::format_product_list;
use crate::error::AppError;
use crate::session::{ChatSession, SubmitError};
use crate::style::Style;

const QUIT_COMMAND: &str = "/quit";
const DEFAULT_WIDTH: usize = 80;

pub type SharedWriter = Arc<Mutex<dyn Write + Send>>;

fn lock<V: ?Sized>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Where the transcript is written.
#[derive(Clone)]
pub struct Terminal {
    out: SharedWriter,
    err: SharedWriter,
    style: Style,
    width: usize,
}

impl Terminal {
    pub fn new(out: SharedWriter, err: SharedWriter, style: Style, width: usize) -> Self {
        Self {
            out,
            err,
            style,
            width,
        }
    }

    /// The process stdout/stderr, sized to the current terminal.
    pub fn stdio() -> Self {
        let width = crossterm::terminal::size()
            .map(|(w, _)| w as usize)
            .unwrap_or(DEFAULT_WIDTH);
        Self::new(
            Arc::new(Mutex::new(io::stdout())),
            Arc::new(Mutex::new(io::stderr())),
            Style::new(),
            width,
        )
    }

    fn write_out(&self, text: &str) {
        let mut out = lock(&self.out);
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }

    fn write_err(&self, text: &str) {
        let mut err = lock(&self.err);
        let _ = err.write_all(text.as_bytes());
        let _ = err.flush();
    }

    fn error(&self, message: &str) {
        self.write_err(&format!(
            "{}error: {message}{}\n",
            self.style.red_start(),
            self.style.reset()
        ));
    }

    fn notice(&self, message: &str) {
        self.write_err(&format!(
            "{}{message}{}\n",
            self.style.dim_start(),
            self.style.reset()
        ));
    }

    fn prompt(&self) {
        self.write_out(&format!(
            "{}>{} ",
            self.style.cyan_start(),
            self.style.reset()
        ));
    }
}

/// How a single turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed,
    Failed,
    Interrupted,
}

/// Callbacks that feed the session and print the transcript.
pub fn transcript_callbacks(session: Arc<Mutex<ChatSession>>, terminal: Terminal) -> StreamCallbacks {
    let on_token = {
        let (session, terminal) = (session.clone(), terminal.clone());
        move |delta: &str| {
            lock(&session).push_token(delta);
            terminal.write_out(delta);
        }
    };
    let on_final_state = {
        let session = session.clone();
        move |state: &serde_json::Value| lock(&session).set_final_state(state)
    };
    let on_error = {
        let terminal = terminal.clone();
        move |message: &str| terminal.error(message)
    };
    let on_complete = move || {
        let products = lock(&session)
            .complete_turn()
            .and_then(|message| message.products.clone());
        terminal.write_out("\n");
        if let Some(products) = products.filter(|p| !p.is_empty()) {
            terminal.write_out("\n");
            terminal.write_out(&format_product_list(
                &products,
                &terminal.style,
                terminal.width,
            ));
        }
    };

    StreamCallbacks::new()
        .on_token(on_token)
        .on_final_state(on_final_state)
        .on_error(on_error)
        .on_complete(on_complete)
}

/// Submit `input` and stream the answer until it completes, fails, or
/// `interrupt` resolves.
pub async fn run_turn<T, F>(
    client: &AgentStream<T>,
    session: &Mutex<ChatSession>,
    input: &str,
    region: Option<&str>,
    interrupt: F,
) -> Result<TurnOutcome, SubmitError>
where
    T: Transport,
    F: Future<Output = ()>,
{
    let history = lock(session).begin_turn(input)?;

    let interrupted = tokio::select! {
        _ = client.stream(&history, region) => false,
        _ = interrupt => {
            client.stop();
            true
        }
    };

    // The turn is still open unless on_complete closed it.
    let open = lock(session).discard_turn();
    let outcome = match (interrupted, open) {
        (true, _) => TurnOutcome::Interrupted,
        (false, true) => TurnOutcome::Failed,
        (false, false) => TurnOutcome::Completed,
    };
    tracing::debug!(?outcome, "turn finished");
    Ok(outcome)
}

async fn ctrl_c() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

fn build_client(
    config: &Config,
    callbacks: StreamCallbacks,
) -> Result<AgentStream<HttpTransport>, AppError> {
    let transport = HttpTransport::with_timeouts(
        config.agent.endpoint.clone(),
        config.agent.connect_timeout(),
        config.agent.request_timeout(),
    )?;
    Ok(AgentStream::new(transport, callbacks))
}

/// Run the interactive loop until `/quit`, end of input, or Ctrl-C at the
/// prompt.
pub async fn run_repl(config: &Config) -> Result<(), AppError> {
    let terminal = Terminal::stdio();
    let session = Arc::new(Mutex::new(ChatSession::new()));
    let client = build_client(config, transcript_callbacks(session.clone(), terminal.clone()))?;
    let region = config.agent.region.as_deref();

    terminal.notice(&format!(
        "Product Pulse ({}). Ask for a product, {QUIT_COMMAND} to exit.",
        config.agent.endpoint
    ));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        terminal.prompt();
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = ctrl_c() => None,
        };
        let Some(line) = line else {
            terminal.write_out("\n");
            break;
        };
        if line.trim() == QUIT_COMMAND {
            break;
        }

        match run_turn(&client, &session, &line, region, ctrl_c()).await {
            Ok(TurnOutcome::Interrupted) => terminal.notice("\n[interrupted]"),
            Ok(TurnOutcome::Completed | TurnOutcome::Failed) => {}
            Err(SubmitError::EmptyInput) => {}
            Err(e) => terminal.error(&e.to_string()),
        }
    }

    Ok(())
}

/// Ask a single question and print the answer. Returns the process exit
/// code.
pub async fn run_once(config: &Config, prompt: &str) -> Result<i32, AppError> {
    let terminal = Terminal::stdio();
    let session = Arc::new(Mutex::new(ChatSession::new()));
    let client = build_client(config, transcript_callbacks(session.clone(), terminal.clone()))?;

    let code = match run_turn(
        &client,
        &session,
        prompt,
        config.agent.region.as_deref(),
        ctrl_c(),
    )
    .await
    {
        Ok(TurnOutcome::Completed) => 0,
        Ok(TurnOutcome::Interrupted) => 130,
        Ok(TurnOutcome::Failed) => 1,
        Err(e) => {
            terminal.error(&e.to_string());
            2
        }
    };
    Ok(code)
}
