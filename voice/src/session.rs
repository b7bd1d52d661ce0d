use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use newhealth_core::{
    function_tool_set, resolve_tool, AssistantConfig, AssistantError,
    AssistantResult, Blob, Content, FunctionCall, Part, PharmacyData, DEFAULT_VOICE_MODEL,
    DEFAULT_VOICE_NAME,
};

use crate::audio::{
    decode_bytes, decode_pcm16, duration_secs, encode_bytes, encode_pcm16, OUTPUT_SAMPLE_RATE_HZ,
    PCM_INPUT_MIME,
};
use crate::playback::{PlaybackScheduler, ScheduledChunk};
use crate::transport::{VoiceDuplex, VoiceSink, VoiceStream};
use crate::wire::{
    ClientMessage, Empty, LiveFunctionResponse, LiveGenerationConfig, PrebuiltVoiceConfig,
    ServerContent, ServerMessage, SessionSetup, SpeechConfig, VoiceConfig,
};

/// Depth of the outbound frame queue. When the socket cannot keep up, the
/// capture loop blocks on the full queue and stops pulling frames, so stale
/// audio is never dropped mid-stream.
const OUTBOUND_QUEUE_FRAMES: usize = 8;

/// Supplies captured microphone audio as fixed-size mono frames at 16 kHz.
/// `Ok(None)` means the device was closed. Dropping the source releases the
/// device.
#[async_trait]
pub trait AudioSource: Send {
    async fn next_frame(&mut self) -> AssistantResult<Option<Vec<f32>>>;
}

/// Clock the playback timeline is scheduled against, in seconds.
pub trait PlaybackClock: Send + Sync {
    fn now(&self) -> f64;
}

/// Monotonic wall clock starting at zero when constructed.
pub struct MonotonicClock {
    epoch: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl PlaybackClock for MonotonicClock {
    fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Active,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptRole {
    You,
    Assistant,
}

impl TranscriptRole {
    pub fn label(&self) -> &'static str {
        match self {
            TranscriptRole::You => "You",
            TranscriptRole::Assistant => "AI",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    pub role: TranscriptRole,
    pub text: String,
}

/// Notifications surfaced to whatever drives the audio hardware and UI.
#[derive(Debug)]
pub enum VoiceEvent {
    StateChanged(SessionState),
    /// Decoded model speech, ready to render at `chunk.start`.
    AudioChunk {
        chunk: ScheduledChunk,
        samples: Vec<f32>,
    },
    /// The caller spoke over the model; queued playback was discarded.
    Interrupted { discarded: usize },
    TranscriptUpdated,
    SessionError(String),
    Closed,
}

/// Duplex voice call against the live endpoint.
///
/// One task pumps microphone frames into a bounded queue, one writes the
/// queue to the socket, and one consumes server frames: scheduling model
/// speech for gapless playback, accumulating transcripts, and answering tool
/// calls inline.
pub struct VoiceSession {
    model: String,
    voice_name: String,
    system_instruction: String,
    state: Arc<Mutex<SessionState>>,
    scheduler: Arc<Mutex<PlaybackScheduler>>,
    transcript: Arc<Mutex<Vec<TranscriptEntry>>>,
    clock: Arc<dyn PlaybackClock>,
    events: mpsc::UnboundedSender<VoiceEvent>,
    shutdown: Option<watch::Sender<bool>>,
    tasks: Vec<JoinHandle<()>>,
}

impl VoiceSession {
    pub fn new(
        config: &AssistantConfig,
        pharmacy: &PharmacyData,
        clock: Arc<dyn PlaybackClock>,
    ) -> (Self, mpsc::UnboundedReceiver<VoiceEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let session = Self {
            model: config
                .voice_model
                .clone()
                .unwrap_or_else(|| DEFAULT_VOICE_MODEL.to_string()),
            voice_name: config
                .voice_name
                .clone()
                .unwrap_or_else(|| DEFAULT_VOICE_NAME.to_string()),
            system_instruction: format!(
                "You are the New-Health Clinical Specialist on a voice call. {} \
                 Be warm and concise, and speak naturally.",
                pharmacy.context_summary()
            ),
            state: Arc::new(Mutex::new(SessionState::Idle)),
            scheduler: Arc::new(Mutex::new(PlaybackScheduler::new())),
            transcript: Arc::new(Mutex::new(Vec::new())),
            clock,
            events,
            shutdown: None,
            tasks: Vec::new(),
        };
        (session, receiver)
    }

    /// The setup frame this session opens the connection with.
    pub fn setup_message(&self) -> SessionSetup {
        SessionSetup {
            model: format!("models/{}", self.model),
            generation_config: LiveGenerationConfig {
                response_modalities: vec!["AUDIO".to_string()],
                speech_config: SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: self.voice_name.clone(),
                        },
                    },
                },
            },
            system_instruction: Some(Content::system(&self.system_instruction)),
            tools: function_tool_set(),
            output_audio_transcription: Empty {},
            input_audio_transcription: Empty {},
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn transcript(&self) -> Vec<TranscriptEntry> {
        self.transcript
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn scheduled_count(&self) -> usize {
        self.scheduler
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .active_count()
    }

    pub fn playback_horizon(&self) -> f64 {
        self.scheduler
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .next_start()
    }

    /// The audio backend reports here when a scheduled chunk finishes.
    pub fn on_playback_ended(&self, chunk_id: u64) {
        self.scheduler
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .on_ended(chunk_id);
    }

    /// Connects and brings the pump tasks up. `source` is the already-open
    /// microphone; if the connection fails it is dropped here so the device
    /// is released before the error surfaces.
    pub async fn start<C, Fut>(
        &mut self,
        source: Box<dyn AudioSource>,
        connect: C,
    ) -> AssistantResult<()>
    where
        C: FnOnce(SessionSetup) -> Fut,
        Fut: Future<Output = AssistantResult<VoiceDuplex>>,
    {
        if self.state() != SessionState::Idle {
            return Err(AssistantError::Session(
                "voice session already active".to_string(),
            ));
        }
        set_state(&self.state, &self.events, SessionState::Connecting);

        let (sink, stream) = match connect(self.setup_message()).await {
            Ok(duplex) => duplex,
            Err(e) => {
                drop(source);
                set_state(&self.state, &self.events, SessionState::Error);
                let _ = self.events.send(VoiceEvent::SessionError(e.to_string()));
                set_state(&self.state, &self.events, SessionState::Idle);
                return Err(e);
            }
        };
        set_state(&self.state, &self.events, SessionState::Active);

        let (outbound_tx, outbound_rx) = mpsc::channel::<ClientMessage>(OUTBOUND_QUEUE_FRAMES);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        self.shutdown = Some(shutdown_tx);

        self.tasks.push(tokio::spawn(capture_loop(
            source,
            outbound_tx.clone(),
            shutdown_rx.clone(),
            self.events.clone(),
        )));
        self.tasks.push(tokio::spawn(inbound_loop(
            stream,
            Inbound {
                scheduler: Arc::clone(&self.scheduler),
                transcript: Arc::clone(&self.transcript),
                state: Arc::clone(&self.state),
                clock: Arc::clone(&self.clock),
                events: self.events.clone(),
                outbound: outbound_tx,
            },
            shutdown_rx.clone(),
        )));
        self.tasks.push(tokio::spawn(writer_loop(
            sink,
            outbound_rx,
            shutdown_rx,
            Arc::clone(&self.state),
            self.events.clone(),
        )));
        Ok(())
    }

    /// Tears the session down: stops capture, closes the socket, and drops
    /// the microphone handle. Safe to call in any state.
    pub async fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(true);
        }
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
        set_state(&self.state, &self.events, SessionState::Idle);
        let _ = self.events.send(VoiceEvent::Closed);
    }
}

fn set_state(
    state: &Arc<Mutex<SessionState>>,
    events: &mpsc::UnboundedSender<VoiceEvent>,
    next: SessionState,
) {
    let mut guard = state.lock().unwrap_or_else(|e| e.into_inner());
    if *guard != next {
        *guard = next;
        let _ = events.send(VoiceEvent::StateChanged(next));
    }
}

/// Pulls microphone frames, encodes them as PCM16 blobs, and queues them for
/// the writer. A full queue blocks the pull, pausing capture instead of
/// dropping frames; the shutdown signal interrupts both the pull and a
/// blocked queue push, so `stop` never waits behind a stalled socket.
async fn capture_loop(
    mut source: Box<dyn AudioSource>,
    outbound: mpsc::Sender<ClientMessage>,
    mut shutdown: watch::Receiver<bool>,
    events: mpsc::UnboundedSender<VoiceEvent>,
) {
    loop {
        // Biased so a stop wins over an always-ready source.
        let frame = tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            frame = source.next_frame() => frame,
        };
        match frame {
            Ok(Some(samples)) => {
                let message = ClientMessage::RealtimeInput {
                    media: Blob {
                        mime_type: PCM_INPUT_MIME.to_string(),
                        data: encode_bytes(&encode_pcm16(&samples)),
                    },
                };
                let queued = tokio::select! {
                    biased;
                    _ = shutdown.changed() => break,
                    queued = outbound.send(message) => queued,
                };
                if queued.is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("audio capture failed: {}", e);
                let _ = events.send(VoiceEvent::SessionError(e.to_string()));
                break;
            }
        }
    }
    // Dropping `source` here releases the capture device.
}

/// Drains the outbound queue into the socket and closes it when the queue
/// finishes. A forced shutdown abandons an in-flight write; dropping the
/// sink tears the connection down in that case.
async fn writer_loop(
    mut sink: Box<dyn VoiceSink>,
    mut outbound: mpsc::Receiver<ClientMessage>,
    mut shutdown: watch::Receiver<bool>,
    state: Arc<Mutex<SessionState>>,
    events: mpsc::UnboundedSender<VoiceEvent>,
) {
    let mut forced = false;
    loop {
        let message = tokio::select! {
            biased;
            _ = shutdown.changed() => {
                forced = true;
                break;
            }
            message = outbound.recv() => match message {
                Some(message) => message,
                None => break,
            },
        };
        let written = tokio::select! {
            biased;
            _ = shutdown.changed() => {
                forced = true;
                break;
            }
            written = sink.send(message) => written,
        };
        if let Err(e) = written {
            tracing::warn!("live socket write failed: {}", e);
            set_state(&state, &events, SessionState::Error);
            let _ = events.send(VoiceEvent::SessionError(e.to_string()));
            break;
        }
    }
    if !forced {
        if let Err(e) = sink.close().await {
            tracing::debug!("live socket close failed: {}", e);
        }
    }
}

struct Inbound {
    scheduler: Arc<Mutex<PlaybackScheduler>>,
    transcript: Arc<Mutex<Vec<TranscriptEntry>>>,
    state: Arc<Mutex<SessionState>>,
    clock: Arc<dyn PlaybackClock>,
    events: mpsc::UnboundedSender<VoiceEvent>,
    outbound: mpsc::Sender<ClientMessage>,
}

async fn inbound_loop(
    mut stream: Box<dyn VoiceStream>,
    inbound: Inbound,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let next = tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            next = stream.next_message() => next,
        };
        match next {
            Ok(Some(message)) => inbound.handle(message).await,
            Ok(None) => {
                set_state(&inbound.state, &inbound.events, SessionState::Idle);
                let _ = inbound.events.send(VoiceEvent::Closed);
                break;
            }
            Err(e) => {
                tracing::warn!("live socket read failed: {}", e);
                set_state(&inbound.state, &inbound.events, SessionState::Error);
                let _ = inbound.events.send(VoiceEvent::SessionError(e.to_string()));
                break;
            }
        }
    }
}

impl Inbound {
    async fn handle(&self, message: ServerMessage) {
        if let Some(tool_call) = message.tool_call {
            let mut responses = Vec::with_capacity(tool_call.function_calls.len());
            for call in tool_call.function_calls {
                let outcome = resolve_tool(&FunctionCall {
                    name: call.name.clone(),
                    args: call.args,
                });
                responses.push(LiveFunctionResponse {
                    id: call.id,
                    name: call.name,
                    response: json!({ "result": outcome.message }),
                });
            }
            if !responses.is_empty() {
                let _ = self
                    .outbound
                    .send(ClientMessage::ToolResponse {
                        function_responses: responses,
                    })
                    .await;
            }
        }

        if let Some(content) = message.server_content {
            self.handle_content(content);
        }
    }

    fn handle_content(&self, content: ServerContent) {
        if content.interrupted {
            let discarded = self
                .scheduler
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .interrupt();
            let _ = self.events.send(VoiceEvent::Interrupted { discarded });
        }

        if let Some(turn) = content.model_turn {
            for part in turn.parts {
                if let Part::InlineData { inline_data } = part {
                    self.schedule_audio(&inline_data.data);
                }
            }
        }

        if let Some(transcription) = content.input_transcription {
            self.append_transcript(TranscriptRole::You, &transcription.text);
        }
        if let Some(transcription) = content.output_transcription {
            self.append_transcript(TranscriptRole::Assistant, &transcription.text);
        }
    }

    fn schedule_audio(&self, data: &str) {
        let samples = match decode_bytes(data).and_then(|bytes| decode_pcm16(&bytes, 1)) {
            Ok(mut channels) => channels.remove(0),
            Err(e) => {
                tracing::error!("discarding malformed audio chunk: {}", e);
                let _ = self.events.send(VoiceEvent::SessionError(e.to_string()));
                return;
            }
        };
        let duration = duration_secs(samples.len(), OUTPUT_SAMPLE_RATE_HZ);
        let chunk = self
            .scheduler
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .schedule(duration, self.clock.now());
        let _ = self.events.send(VoiceEvent::AudioChunk { chunk, samples });
    }

    fn append_transcript(&self, role: TranscriptRole, text: &str) {
        if text.is_empty() {
            return;
        }
        let mut transcript = self.transcript.lock().unwrap_or_else(|e| e.into_inner());
        match transcript.last_mut() {
            Some(last) if last.role == role => last.text.push_str(text),
            _ => transcript.push(TranscriptEntry {
                role,
                text: text.to_string(),
            }),
        }
        let _ = self.events.send(VoiceEvent::TranscriptUpdated);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use newhealth_core::fallback_content;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    struct FixedClock(f64);

    impl PlaybackClock for FixedClock {
        fn now(&self) -> f64 {
            self.0
        }
    }

    #[derive(Clone, Default)]
    struct SinkLog {
        sent: Arc<Mutex<Vec<ClientMessage>>>,
        closed: Arc<AtomicBool>,
    }

    struct FakeSink {
        log: SinkLog,
    }

    #[async_trait]
    impl VoiceSink for FakeSink {
        async fn send(&mut self, message: ClientMessage) -> AssistantResult<()> {
            self.log.sent.lock().unwrap().push(message);
            Ok(())
        }

        async fn close(&mut self) -> AssistantResult<()> {
            self.log.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Replays scripted frames, then parks forever so the session stays up
    /// until `stop`. A trailing `Ok(None)` in the script closes instead.
    struct FakeStream {
        frames: VecDeque<AssistantResult<Option<ServerMessage>>>,
    }

    #[async_trait]
    impl VoiceStream for FakeStream {
        async fn next_message(&mut self) -> AssistantResult<Option<ServerMessage>> {
            match self.frames.pop_front() {
                Some(frame) => frame,
                None => std::future::pending().await,
            }
        }
    }

    struct FakeSource {
        frames: VecDeque<Vec<f32>>,
        hold_open: bool,
        released: Arc<AtomicBool>,
    }

    impl FakeSource {
        fn with_frames(frames: Vec<Vec<f32>>) -> Self {
            Self {
                frames: frames.into(),
                hold_open: false,
                released: Arc::new(AtomicBool::new(false)),
            }
        }

        fn silent() -> Self {
            let mut source = Self::with_frames(Vec::new());
            source.hold_open = true;
            source
        }
    }

    impl Drop for FakeSource {
        fn drop(&mut self) {
            self.released.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl AudioSource for FakeSource {
        async fn next_frame(&mut self) -> AssistantResult<Option<Vec<f32>>> {
            match self.frames.pop_front() {
                Some(frame) => Ok(Some(frame)),
                None if self.hold_open => std::future::pending().await,
                None => Ok(None),
            }
        }
    }

    fn session(clock_now: f64) -> (VoiceSession, mpsc::UnboundedReceiver<VoiceEvent>) {
        VoiceSession::new(
            &AssistantConfig::default(),
            &fallback_content(),
            Arc::new(FixedClock(clock_now)),
        )
    }

    fn server_frame(value: serde_json::Value) -> AssistantResult<Option<ServerMessage>> {
        Ok(Some(serde_json::from_value(value).unwrap()))
    }

    fn audio_frame(samples: usize) -> AssistantResult<Option<ServerMessage>> {
        let data = encode_bytes(&encode_pcm16(&vec![0.1; samples]));
        server_frame(json!({
            "serverContent": {"modelTurn": {"parts": [
                {"inlineData": {"mimeType": "audio/pcm;rate=24000", "data": data}}
            ]}}
        }))
    }

    async fn start(
        session: &mut VoiceSession,
        stream_frames: Vec<AssistantResult<Option<ServerMessage>>>,
        source: FakeSource,
    ) -> SinkLog {
        let log = SinkLog::default();
        let sink = FakeSink { log: log.clone() };
        let stream = FakeStream {
            frames: stream_frames.into(),
        };
        session
            .start(Box::new(source), |_setup| async move {
                Ok((Box::new(sink) as Box<dyn VoiceSink>, Box::new(stream) as Box<dyn VoiceStream>))
            })
            .await
            .unwrap();
        log
    }

    async fn next_event(events: &mut mpsc::UnboundedReceiver<VoiceEvent>) -> VoiceEvent {
        events.recv().await.unwrap()
    }

    /// Yields to the pump tasks until `condition` holds.
    async fn wait_until(mut condition: impl FnMut() -> bool) {
        while !condition() {
            tokio::task::yield_now().await;
        }
    }

    /// Skips StateChanged/TranscriptUpdated noise to the next payload event.
    async fn next_payload_event(events: &mut mpsc::UnboundedReceiver<VoiceEvent>) -> VoiceEvent {
        loop {
            match next_event(events).await {
                VoiceEvent::StateChanged(_) | VoiceEvent::TranscriptUpdated => continue,
                event => return event,
            }
        }
    }

    #[tokio::test]
    async fn captured_frames_reach_the_socket_as_pcm_blobs() {
        let (mut session, _events) = session(0.0);
        let source = FakeSource::with_frames(vec![vec![0.0; 4096], vec![0.5; 4096]]);
        let log = start(&mut session, Vec::new(), source).await;

        wait_until(|| log.sent.lock().unwrap().len() >= 2).await;
        session.stop().await;

        let sent = log.sent.lock().unwrap();
        let media_frames: Vec<_> = sent
            .iter()
            .filter_map(|m| match m {
                ClientMessage::RealtimeInput { media } => Some(media),
                _ => None,
            })
            .collect();
        assert_eq!(media_frames.len(), 2);
        assert_eq!(media_frames[0].mime_type, PCM_INPUT_MIME);
        assert_eq!(
            decode_bytes(&media_frames[0].data).unwrap().len(),
            4096 * 2
        );
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn natural_end_closes_the_socket() {
        // Source exhausted and server closed: the writer drains and sends
        // the close frame without waiting for an explicit stop.
        let (mut session, _events) = session(0.0);
        let source = FakeSource::with_frames(vec![vec![0.0; 4096]]);
        let log = start(&mut session, vec![Ok(None)], source).await;

        wait_until(|| log.closed.load(Ordering::SeqCst)).await;
        session.stop().await;

        assert_eq!(log.sent.lock().unwrap().len(), 1);
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn model_audio_is_scheduled_back_to_back() {
        let (mut session, mut events) = session(0.0);
        let frames = vec![audio_frame(2400), audio_frame(2400)];
        let _log = start(&mut session, frames, FakeSource::silent()).await;

        let first = match next_payload_event(&mut events).await {
            VoiceEvent::AudioChunk { chunk, samples } => {
                assert_eq!(samples.len(), 2400);
                chunk
            }
            other => panic!("unexpected event: {:?}", other),
        };
        let second = match next_payload_event(&mut events).await {
            VoiceEvent::AudioChunk { chunk, .. } => chunk,
            other => panic!("unexpected event: {:?}", other),
        };

        assert!((first.start - 0.0).abs() < f64::EPSILON);
        assert!((first.duration - 0.1).abs() < 1e-9);
        assert!((second.start - 0.1).abs() < 1e-9);
        assert_eq!(session.scheduled_count(), 2);

        session.on_playback_ended(first.id);
        assert_eq!(session.scheduled_count(), 1);

        session.stop().await;
    }

    #[tokio::test]
    async fn interruption_discards_queued_playback() {
        let (mut session, mut events) = session(0.0);
        let frames = vec![
            audio_frame(2400),
            audio_frame(2400),
            server_frame(json!({"serverContent": {"interrupted": true}})),
        ];
        let _log = start(&mut session, frames, FakeSource::silent()).await;

        next_payload_event(&mut events).await;
        next_payload_event(&mut events).await;
        match next_payload_event(&mut events).await {
            VoiceEvent::Interrupted { discarded } => assert_eq!(discarded, 2),
            other => panic!("unexpected event: {:?}", other),
        }

        assert_eq!(session.scheduled_count(), 0);
        assert!((session.playback_horizon() - 0.0).abs() < f64::EPSILON);

        session.stop().await;
    }

    #[tokio::test]
    async fn tool_calls_are_answered_with_correlated_ids() {
        let (mut session, mut events) = session(0.0);
        let frames = vec![
            server_frame(json!({
                "toolCall": {"functionCalls": [
                    {"id": "call-7", "name": "checkStock", "args": {"productName": "Paracetamol"}}
                ]}
            })),
            Ok(None),
        ];
        let log = start(&mut session, frames, FakeSource::silent()).await;

        loop {
            if let VoiceEvent::Closed = next_event(&mut events).await {
                break;
            }
        }
        wait_until(|| {
            log.sent
                .lock()
                .unwrap()
                .iter()
                .any(|m| matches!(m, ClientMessage::ToolResponse { .. }))
        })
        .await;
        session.stop().await;

        let sent = log.sent.lock().unwrap();
        let response = sent
            .iter()
            .find_map(|m| match m {
                ClientMessage::ToolResponse { function_responses } => Some(&function_responses[0]),
                _ => None,
            })
            .expect("tool response was sent");
        assert_eq!(response.id, "call-7");
        assert_eq!(response.name, "checkStock");
        assert!(response.response["result"]
            .as_str()
            .unwrap()
            .contains("Paracetamol"));
    }

    #[tokio::test]
    async fn transcripts_accumulate_per_speaker() {
        let (mut session, mut events) = session(0.0);
        let frames = vec![
            server_frame(json!({"serverContent": {"inputTranscription": {"text": "Do you "}}})),
            server_frame(json!({"serverContent": {"inputTranscription": {"text": "deliver?"}}})),
            server_frame(json!({"serverContent": {"outputTranscription": {"text": "Yes, we do."}}})),
            Ok(None),
        ];
        let _log = start(&mut session, frames, FakeSource::silent()).await;

        loop {
            if let VoiceEvent::Closed = next_event(&mut events).await {
                break;
            }
        }

        let transcript = session.transcript();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[0].role, TranscriptRole::You);
        assert_eq!(transcript[0].text, "Do you deliver?");
        assert_eq!(transcript[1].role.label(), "AI");
        assert_eq!(transcript[1].text, "Yes, we do.");

        session.stop().await;
    }

    #[tokio::test]
    async fn connect_failure_releases_the_source_and_returns_to_idle() {
        let (mut session, mut events) = session(0.0);
        let source = FakeSource::silent();
        let released = Arc::clone(&source.released);

        let result = session
            .start(Box::new(source), |_setup| async {
                Err(AssistantError::Transport("refused".to_string()))
            })
            .await;

        assert!(result.is_err());
        assert!(released.load(Ordering::SeqCst));
        assert_eq!(session.state(), SessionState::Idle);

        match next_event(&mut events).await {
            VoiceEvent::StateChanged(SessionState::Connecting) => {}
            other => panic!("unexpected event: {:?}", other),
        }
        match next_payload_event(&mut events).await {
            VoiceEvent::SessionError(message) => assert!(message.contains("refused")),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    /// Socket whose writes never complete, as when the peer stops reading.
    struct StallingSink;

    #[async_trait]
    impl VoiceSink for StallingSink {
        async fn send(&mut self, _message: ClientMessage) -> AssistantResult<()> {
            std::future::pending().await
        }

        async fn close(&mut self) -> AssistantResult<()> {
            Ok(())
        }
    }

    struct EndlessSource;

    #[async_trait]
    impl AudioSource for EndlessSource {
        async fn next_frame(&mut self) -> AssistantResult<Option<Vec<f32>>> {
            Ok(Some(vec![0.0; 64]))
        }
    }

    #[tokio::test]
    async fn stop_returns_even_when_the_socket_stalls() {
        let (mut session, _events) = session(0.0);
        let stream = FakeStream {
            frames: VecDeque::new(),
        };
        session
            .start(Box::new(EndlessSource), |_setup| async move {
                Ok((
                    Box::new(StallingSink) as Box<dyn VoiceSink>,
                    Box::new(stream) as Box<dyn VoiceStream>,
                ))
            })
            .await
            .unwrap();

        // Let capture fill the bounded queue behind the stalled write.
        for _ in 0..64 {
            tokio::task::yield_now().await;
        }

        tokio::time::timeout(Duration::from_secs(2), session.stop())
            .await
            .expect("stop must not wait on a stalled socket");
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn starting_twice_is_rejected() {
        let (mut session, _events) = session(0.0);
        let _log = start(&mut session, Vec::new(), FakeSource::silent()).await;

        let second = session
            .start(Box::new(FakeSource::silent()), |_setup| async {
                panic!("connector must not run while active")
            })
            .await;
        assert!(matches!(second, Err(AssistantError::Session(_))));

        session.stop().await;
    }

    #[tokio::test]
    async fn malformed_audio_keeps_the_session_alive() {
        let (mut session, mut events) = session(0.0);
        // Three bytes cannot be whole 16-bit mono frames.
        let bad = encode_bytes(&[1u8, 2, 3]);
        let frames = vec![
            server_frame(json!({
                "serverContent": {"modelTurn": {"parts": [
                    {"inlineData": {"mimeType": "audio/pcm;rate=24000", "data": bad}}
                ]}}
            })),
            server_frame(json!({"serverContent": {"outputTranscription": {"text": "Still here."}}})),
        ];
        let _log = start(&mut session, frames, FakeSource::silent()).await;

        match next_payload_event(&mut events).await {
            VoiceEvent::SessionError(_) => {}
            other => panic!("unexpected event: {:?}", other),
        }
        loop {
            if let VoiceEvent::TranscriptUpdated = next_event(&mut events).await {
                break;
            }
        }
        assert_eq!(session.state(), SessionState::Active);
        assert_eq!(session.transcript()[0].text, "Still here.");

        session.stop().await;
    }

    #[tokio::test]
    async fn setup_message_names_model_voice_and_tools() {
        let (session, _events) = session(0.0);
        let setup = session.setup_message();

        assert_eq!(setup.model, format!("models/{}", DEFAULT_VOICE_MODEL));
        assert_eq!(
            setup
                .generation_config
                .speech_config
                .voice_config
                .prebuilt_voice_config
                .voice_name,
            DEFAULT_VOICE_NAME
        );
        assert_eq!(setup.tools.len(), 1);
        assert!(setup.system_instruction.is_some());
    }
}
