use std::sync::Arc;

use async_trait::async_trait;
use colored::*;
use tokio::io::{AsyncRead, AsyncReadExt};

use newhealth_core::{AssistantConfig, AssistantError, AssistantResult, PharmacyData};
use newhealth_voice::{
    connect_live, decode_pcm16, AudioSource, MonotonicClock, SessionState, TranscriptEntry,
    TranscriptRole, VoiceEvent, VoiceSession, CAPTURE_FRAME_SAMPLES,
};

/// Microphone stand-in: reads raw mono PCM16 at 16 kHz from a byte stream,
/// one capture frame at a time. A trailing partial frame is discarded when
/// the stream ends.
pub struct PcmFrameSource<R> {
    reader: R,
}

impl<R> PcmFrameSource<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

/// Frame source over stdin, for piping a recorder in:
/// `arecord -f S16_LE -r 16000 -c 1 -t raw | newhealth --voice`.
pub fn stdin_source() -> PcmFrameSource<tokio::io::Stdin> {
    PcmFrameSource::new(tokio::io::stdin())
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> AudioSource for PcmFrameSource<R> {
    async fn next_frame(&mut self) -> AssistantResult<Option<Vec<f32>>> {
        let mut buf = vec![0u8; CAPTURE_FRAME_SAMPLES * 2];
        match self.reader.read_exact(&mut buf).await {
            Ok(_) => {
                let mut channels = decode_pcm16(&buf, 1)?;
                Ok(Some(channels.remove(0)))
            }
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(AssistantError::Audio(format!(
                "audio input read failed: {}",
                e
            ))),
        }
    }
}

/// Runs a live voice call until Ctrl-C, the input stream ends, or the server
/// hangs up, printing the rolling transcript. Model speech is scheduled but
/// not rendered; this surface is transcript-only.
pub async fn run_voice_call(
    config: &AssistantConfig,
    pharmacy: &PharmacyData,
) -> anyhow::Result<()> {
    let (mut session, mut events) =
        VoiceSession::new(config, pharmacy, Arc::new(MonotonicClock::default()));

    let connect_config = config.clone();
    session
        .start(Box::new(stdin_source()), |setup| async move {
            connect_live(&connect_config, setup).await
        })
        .await?;

    println!(
        "{}",
        "Voice call connected. Press Ctrl-C to hang up.".dimmed()
    );

    let mut printed = 0usize;
    loop {
        let event = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };
        match event {
            VoiceEvent::TranscriptUpdated => {
                let transcript = session.transcript();
                // The last entry may still be accumulating text.
                while printed + 1 < transcript.len() {
                    print_entry(&transcript[printed]);
                    printed += 1;
                }
            }
            VoiceEvent::Interrupted { discarded } => {
                if discarded > 0 {
                    println!(
                        "{}",
                        format!("(interrupted, {} queued replies dropped)", discarded).dimmed()
                    );
                }
            }
            VoiceEvent::SessionError(message) => {
                eprintln!("{}", format!("Voice session error: {}", message).red());
            }
            VoiceEvent::StateChanged(SessionState::Idle) | VoiceEvent::Closed => break,
            VoiceEvent::StateChanged(_) | VoiceEvent::AudioChunk { .. } => {}
        }
    }

    session.stop().await;
    for entry in session.transcript().iter().skip(printed) {
        print_entry(entry);
    }
    println!("{}", "Call ended.".dimmed());
    Ok(())
}

fn print_entry(entry: &TranscriptEntry) {
    let label = match entry.role {
        TranscriptRole::You => entry.role.label().cyan().bold(),
        TranscriptRole::Assistant => entry.role.label().green().bold(),
    };
    println!("{}: {}", label, entry.text);
}

#[cfg(test)]
mod tests {
    use super::*;
    use newhealth_voice::encode_pcm16;

    #[tokio::test]
    async fn frames_are_read_whole_and_trailing_bytes_dropped() {
        let mut bytes = encode_pcm16(&vec![0.5; CAPTURE_FRAME_SAMPLES]);
        bytes.extend_from_slice(&[0u8; 10]); // partial second frame
        let mut source = PcmFrameSource::new(std::io::Cursor::new(bytes));

        let frame = source.next_frame().await.unwrap().unwrap();
        assert_eq!(frame.len(), CAPTURE_FRAME_SAMPLES);
        assert!((frame[0] - 0.5).abs() < 1.0 / 32_768.0);

        assert!(source.next_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_input_ends_immediately() {
        let mut source = PcmFrameSource::new(std::io::Cursor::new(Vec::new()));
        assert!(source.next_frame().await.unwrap().is_none());
    }
}
