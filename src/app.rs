//! Capture loop: blocks in, status lines out

use crate::capture::{BlockReader, CaptureDriver, CaptureError};
use crate::config::constants::POLL_INTERVAL_MS;
use crate::config::VisualizerConfig;
use crate::stats::{EngineState, StatsEngine};
use crate::terminal::{LineRenderer, Terminal};
use crossterm::event::{KeyCode, KeyModifiers};
use std::io::{self, IsTerminal, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// Cloneable cancellation flag checked between waits in the capture loop
#[derive(Clone, Debug, Default)]
pub struct StopToken(Arc<AtomicBool>);

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// The token cancelled by SIGINT. The handler is installed on first use.
    pub fn on_interrupt() -> Self {
        let token = INTERRUPT.get_or_init(StopToken::new).clone();
        install_sigint_handler();
        token
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

static INTERRUPT: OnceLock<StopToken> = OnceLock::new();

#[cfg(unix)]
extern "C" fn handle_sigint(_signum: libc::c_int) {
    // Only an atomic store: safe inside a signal handler
    if let Some(token) = INTERRUPT.get() {
        token.cancel();
    }
}

#[cfg(unix)]
fn install_sigint_handler() {
    let handler = handle_sigint as extern "C" fn(libc::c_int);
    if unsafe { libc::signal(libc::SIGINT, handler as libc::sighandler_t) } == libc::SIG_ERR {
        log::warn!("Failed to install SIGINT handler");
    }
}

#[cfg(not(unix))]
fn install_sigint_handler() {}

/// Ctrl+C (delivered as a key in raw mode), q, and Esc end the session
pub fn is_stop_key(code: KeyCode, modifiers: KeyModifiers) -> bool {
    match code {
        KeyCode::Char('c') => modifiers.contains(KeyModifiers::CONTROL),
        KeyCode::Char('q') | KeyCode::Esc => true,
        _ => false,
    }
}

/// Why the capture loop returned
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopExit {
    /// The stop token was cancelled
    Stopped,
    /// The capture side hung up
    StreamEnded,
}

/// Feed every received block through the engine and render it until the
/// token is cancelled or the capture side hangs up.
///
/// `check_input` runs before each wait and may cancel the token. Nothing is
/// logged here: the terminal may be in raw mode.
pub fn process_blocks<W: Write>(
    reader: &BlockReader,
    engine: &mut StatsEngine,
    renderer: &mut LineRenderer<W>,
    stop: &StopToken,
    mut check_input: impl FnMut(&StopToken) -> io::Result<()>,
) -> io::Result<LoopExit> {
    let timeout = Duration::from_millis(POLL_INTERVAL_MS);

    loop {
        check_input(stop)?;
        if stop.is_cancelled() {
            return Ok(LoopExit::Stopped);
        }

        match reader.recv_timeout(timeout) {
            Ok(block) => {
                engine.process_block(&block);
                renderer.frame(&block, engine)?;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => return Ok(LoopExit::StreamEnded),
        }
    }
}

/// Run one capture session on the configured device
pub fn run(config: &VisualizerConfig) -> Result<(), CaptureError> {
    let stop = StopToken::on_interrupt();
    let driver = CaptureDriver::open(config)?;

    let interactive = io::stdin().is_terminal() && io::stdout().is_terminal();
    if !interactive {
        log::info!("Not attached to a terminal, keyboard controls disabled");
    }
    let term = Terminal::new(interactive)?;

    let mut renderer = LineRenderer::new(io::stdout(), config);
    renderer.banner(driver.sample_rate(), driver.buffer())?;

    driver.start()?;

    let mut engine = StatsEngine::new();
    let result = process_blocks(driver.reader(), &mut engine, &mut renderer, &stop, |stop| {
        if let Some((code, modifiers)) = term.check_key()? {
            if is_stop_key(code, modifiers) {
                stop.cancel();
            }
        }
        Ok(())
    });

    // Finish the status line and leave raw mode before anything is logged
    let farewell = renderer.farewell();
    drop(term);

    driver.stop();
    for err in driver.drain_errors() {
        log::error!("Audio stream error: {}", err);
    }

    match result? {
        LoopExit::Stopped => log::debug!("Stopped by user"),
        LoopExit::StreamEnded => log::warn!("Audio stream ended"),
    }
    if engine.state() == EngineState::Empty {
        log::warn!("No audio received from {}", driver.device_name());
    } else {
        log::info!(
            "Last {} blocks from {} ({} channels): {}",
            engine.history().len(),
            driver.device_name(),
            driver.channels(),
            engine.format_summary()
        );
    }

    farewell?;
    Ok(())
}
