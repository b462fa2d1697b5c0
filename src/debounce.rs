//! Debounced auto-decoding of a base64 input that changes over time.
//!
//! [`spawn_auto_decoder`] starts a task that owns the current input. Every
//! change cancels the armed timer; inputs longer than
//! [`DecodeConfig::min_auto_len`] re-arm it for [`DecodeConfig::quiet_period`].
//! When the timer fires the input is converted with [`Trigger::Auto`], so an
//! input that turns out to be blank produces no event at all.
//!
//! A manual convert runs immediately on the latest input and ignores both the
//! length threshold and the quiet period.
//!
//! ```rust,no_run
//! use base64_studio::debounce::{spawn_auto_decoder, DecodeEvent};
//! use base64_studio::DecodeConfig;
//! use tokio_stream::StreamExt;
//!
//! # async fn demo() {
//! let (handle, mut events) = spawn_auto_decoder(DecodeConfig::default());
//! handle.set_input("data:image/png;base64,iVBORw0KGgo...");
//! while let Some(event) = events.next().await {
//!     match event {
//!         DecodeEvent::Preview(p) => println!("{}", p.resource.file_name()),
//!         DecodeEvent::Failed(e) => eprintln!("{e}"),
//!         DecodeEvent::Cleared => {}
//!     }
//! }
//! # }
//! ```

use crate::config::DecodeConfig;
use crate::decode::{self, Preview, Trigger};
use crate::error::DecodeError;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::debug;

/// Output of the auto-decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeEvent {
    Preview(Preview),
    Failed(DecodeError),
    /// Input and output were reset.
    Cleared,
}

#[derive(Debug)]
enum Command {
    Input(String),
    ConvertNow,
    Clear,
}

/// Sending side of the auto-decoder. Dropping every handle stops the task
/// and ends the event stream.
#[derive(Debug, Clone)]
pub struct AutoDecoderHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl AutoDecoderHandle {
    /// Replace the current input. Returns `false` if the decoder has stopped.
    pub fn set_input(&self, input: impl Into<String>) -> bool {
        self.tx.send(Command::Input(input.into())).is_ok()
    }

    /// Convert the latest input now.
    pub fn convert_now(&self) -> bool {
        self.tx.send(Command::ConvertNow).is_ok()
    }

    pub fn clear(&self) -> bool {
        self.tx.send(Command::Clear).is_ok()
    }
}

/// Start the decoder task on the current Tokio runtime.
pub fn spawn_auto_decoder(
    config: DecodeConfig,
) -> (AutoDecoderHandle, UnboundedReceiverStream<DecodeEvent>) {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();

    tokio::spawn(run(config, cmd_rx, event_tx));

    (
        AutoDecoderHandle { tx: cmd_tx },
        UnboundedReceiverStream::new(event_rx),
    )
}

async fn run(
    config: DecodeConfig,
    mut commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<DecodeEvent>,
) {
    let mut input = String::new();
    let mut deadline: Option<Instant> = None;

    loop {
        let armed = deadline;
        let timer = async move {
            match armed {
                Some(at) => sleep_until(at).await,
                None => std::future::pending().await,
            }
        };

        let event = tokio::select! {
            cmd = commands.recv() => match cmd {
                None => break,
                Some(Command::Input(next)) => {
                    input = next;
                    deadline = (input.chars().count() > config.min_auto_len)
                        .then(|| Instant::now() + config.quiet_period);
                    None
                }
                Some(Command::ConvertNow) => {
                    deadline = None;
                    attempt(&input, Trigger::Manual, &config)
                }
                Some(Command::Clear) => {
                    input.clear();
                    deadline = None;
                    Some(DecodeEvent::Cleared)
                }
            },
            _ = timer => {
                deadline = None;
                debug!("Quiet period elapsed, auto-converting {} chars", input.len());
                attempt(&input, Trigger::Auto, &config)
            }
        };

        if let Some(event) = event {
            if events.send(event).is_err() {
                break;
            }
        }
    }
}

fn attempt(input: &str, trigger: Trigger, config: &DecodeConfig) -> Option<DecodeEvent> {
    match decode::convert(input, trigger, config.unknown_format) {
        Ok(Some(preview)) => Some(DecodeEvent::Preview(preview)),
        Ok(None) => None,
        Err(e) => Some(DecodeEvent::Failed(e)),
    }
}
