//! Recognize one audio file
//!
//! Usage: `recognize <file.wav>`
//!
//! Reads `config/speech.yaml` (or `SPEECH_CONFIG_PATH`), takes the key from
//! `SPEECH_SUBSCRIPTION_KEY`, streams the file and prints what the service
//! hears. Exits after the first turn ends.

use anyhow::{bail, Context as _, Result};
use msspeech::{
    ConnectionHandle, ConnectionState, Context, ReaderSource, SessionStatus,
    SpeechCallbacks, SpeechConfig, SpeechHypothesis, SpeechResult, TurnEnd, TurnStart,
};
use msspeech_client::bin_common::{
    init_tracing_with_level, load_config_from_env, parse_args, ConfigType, ShutdownManager,
};
use std::fs::File;
use std::io::BufReader;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Prints recognition output and starts the upload once the client is ready
struct ConsoleRecognizer {
    auth_header: String,
    audio: Option<BufReader<File>>,
    turn_done: Arc<AtomicBool>,
}

impl SpeechCallbacks for ConsoleRecognizer {
    fn authentication_header(&mut self, _c: &ConnectionHandle, max_len: usize) -> Option<String> {
        if self.auth_header.len() + 2 > max_len {
            warn!("Authentication header does not fit in {} bytes", max_len);
        }
        Some(self.auth_header.clone())
    }

    fn connection_established(&mut self, connection: &ConnectionHandle) {
        info!(
            "Connected (connection id {})",
            connection.connection_id().unwrap_or_default()
        );
    }

    fn connection_error(&mut self, _c: &ConnectionHandle, http_status: u16, message: &str) {
        error!("Connection failed (HTTP {}): {}", http_status, message);
    }

    fn connection_closed(&mut self, _c: &ConnectionHandle) {
        info!("Connection closed");
    }

    fn client_ready(&mut self, connection: &ConnectionHandle) {
        let Some(audio) = self.audio.take() else {
            return;
        };
        match connection.start_stream(ReaderSource::new(audio), None) {
            Ok(request_id) => info!("Streaming audio (request {})", request_id),
            Err(e) => error!("Failed to start streaming: {}", e),
        }
    }

    fn turn_start(&mut self, _c: &ConnectionHandle, message: &TurnStart<'_>) {
        info!("Turn started (service tag {})", message.service_tag);
    }

    fn speech_hypothesis(&mut self, _c: &ConnectionHandle, message: &SpeechHypothesis<'_>) {
        println!("... {}", message.text);
    }

    fn speech_result(&mut self, _c: &ConnectionHandle, message: &SpeechResult<'_>) {
        if message.phrases.is_empty() {
            println!("[{}]", message.status);
            return;
        }
        for phrase in &message.phrases {
            if message.is_detailed {
                println!("{} ({:.2})", phrase.display, phrase.confidence);
            } else {
                println!("{}", phrase.display);
            }
        }
    }

    fn turn_end(&mut self, _c: &ConnectionHandle, _message: &TurnEnd<'_>) {
        info!("Turn ended");
        self.turn_done.store(true, Ordering::Release);
    }
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let args = parse_args();
    let Some(audio_path) = args.first() else {
        bail!("usage: recognize <file.wav>");
    };

    let config_path = load_config_from_env(ConfigType::Speech);
    let config = SpeechConfig::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    init_tracing_with_level(&config.log_level);
    config.log();
    config.require_subscription_key()?;

    let audio = File::open(audio_path).with_context(|| format!("opening {}", audio_path))?;
    let turn_done = Arc::new(AtomicBool::new(false));
    let recognizer = ConsoleRecognizer {
        auth_header: config.authentication_header().unwrap_or_default(),
        audio: Some(BufReader::new(audio)),
        turn_done: turn_done.clone(),
    };

    let mut context = Context::new(config.context_options())?;
    let shutdown = ShutdownManager::new();
    let canceller = context.canceller();
    shutdown.spawn_signal_handler(move || canceller.cancel());

    let uri = config.endpoint_uri();
    let handle = context.connect(&uri, Box::new(recognizer))?;

    while shutdown.is_running() && handle.connection_state() != ConnectionState::Disconnected {
        context.service_step(Duration::from_millis(100));

        // telemetry goes out in the step after turn.end
        if turn_done.load(Ordering::Acquire) && handle.status() == SessionStatus::Idle {
            break;
        }
    }

    if handle.connection_state() != ConnectionState::Disconnected {
        context.disconnect(&handle)?;
    }

    let metrics = handle.metrics();
    info!(
        "Sent {} messages ({} audio), received {}, decode errors {}",
        metrics.messages_sent, metrics.audio_packets_sent, metrics.messages_received, metrics.decode_errors
    );

    // the telemetry frame may still be queued behind the socket
    context.shutdown(Duration::from_secs(2));
    Ok(())
}
