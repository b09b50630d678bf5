pub mod http;
pub mod playback;

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::Rc;

use serde::Serialize;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpeechKind {
    Pronunciation,
    Feedback,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpeechRequest {
    Say {
        text: String,
        rate: i32,
        kind: SpeechKind,
    },
    Correct {
        misspelling: String,
        correct: String,
        rate: i32,
    },
}

impl SpeechRequest {
    pub fn say(text: impl Into<String>, rate: i32, kind: SpeechKind) -> Self {
        Self::Say {
            text: text.into(),
            rate,
            kind,
        }
    }

    pub fn kind(&self) -> SpeechKind {
        match self {
            Self::Say { kind, .. } => *kind,
            Self::Correct { .. } => SpeechKind::Feedback,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CorrectionBody<'a> {
    pub misspelling: &'a str,
    pub correct: &'a str,
    pub rate: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpeechOutcome {
    Played,
    Failed,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SpeechError {
    #[error("speech service request failed: {0}")]
    Network(String),
    #[error("audio playback failed: {0}")]
    Playback(String),
}

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("a speech request is already in flight")]
pub struct GatewayBusy;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AudioClip {
    pub bytes: Vec<u8>,
    pub mime: Option<String>,
}

#[allow(async_fn_in_trait)]
pub trait SpeechTransport: Clone + 'static {
    async fn probe(&self) -> Result<(), SpeechError>;
    async fn fetch(&self, request: &SpeechRequest) -> Result<AudioClip, SpeechError>;
}

#[allow(async_fn_in_trait)]
pub trait AudioOutput: Clone + 'static {
    async fn play(&self, clip: AudioClip) -> Result<(), SpeechError>;
}

#[derive(Clone, Debug, Default)]
pub struct SpeechGuard {
    busy: Rc<Cell<bool>>,
}

impl SpeechGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self) -> Option<SpeechPermit> {
        if self.busy.replace(true) {
            return None;
        }
        Some(SpeechPermit {
            busy: Rc::clone(&self.busy),
        })
    }

    pub fn is_held(&self) -> bool {
        self.busy.get()
    }
}

#[derive(Debug)]
pub struct SpeechPermit {
    busy: Rc<Cell<bool>>,
}

impl Drop for SpeechPermit {
    fn drop(&mut self) {
        self.busy.set(false);
    }
}

pub struct SpeechGateway<T, P> {
    transport: T,
    output: RefCell<P>,
    guard: SpeechGuard,
}

impl<T: SpeechTransport, P: AudioOutput> SpeechGateway<T, P> {
    pub fn new(transport: T, output: P) -> Self {
        Self {
            transport,
            output: RefCell::new(output),
            guard: SpeechGuard::new(),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.guard.is_held()
    }

    pub fn install_output(&self, output: P) {
        *self.output.borrow_mut() = output;
    }

    pub fn speak(
        &self,
        text: &str,
        rate: i32,
    ) -> Result<impl Future<Output = SpeechOutcome> + use<T, P>, GatewayBusy> {
        self.submit(SpeechRequest::say(text, rate, SpeechKind::Pronunciation))
    }

    pub fn speak_feedback(
        &self,
        misspelling: &str,
        correct: &str,
        rate: i32,
    ) -> Result<impl Future<Output = SpeechOutcome> + use<T, P>, GatewayBusy> {
        self.submit(SpeechRequest::Correct {
            misspelling: misspelling.to_string(),
            correct: correct.to_string(),
            rate,
        })
    }

    // The permit is claimed before the future is first polled.
    pub fn submit(
        &self,
        request: SpeechRequest,
    ) -> Result<impl Future<Output = SpeechOutcome> + use<T, P>, GatewayBusy> {
        let permit = self.guard.try_acquire().ok_or(GatewayBusy)?;
        let transport = self.transport.clone();
        let output = self.output.borrow().clone();

        Ok(async move {
            let _permit = permit;
            match deliver(&transport, &output, &request).await {
                Ok(()) => SpeechOutcome::Played,
                Err(err) => {
                    log::warn!("{:?} speech failed: {}", request.kind(), err);
                    SpeechOutcome::Failed
                }
            }
        })
    }

    pub fn warm_up(&self) -> impl Future<Output = bool> + use<T, P> {
        let transport = self.transport.clone();
        async move {
            match transport.probe().await {
                Ok(()) => true,
                Err(err) => {
                    log::warn!("warm-up probe failed: {}", err);
                    false
                }
            }
        }
    }

    // The dwell only starts once the probe has settled, so the first real
    // request never races the wake-up call.
    pub fn warm_up_then<D>(&self, dwell: D) -> impl Future<Output = bool> + use<T, P, D>
    where
        D: Future<Output = ()> + 'static,
    {
        let probe = self.warm_up();
        async move {
            let awake = probe.await;
            dwell.await;
            awake
        }
    }
}

async fn deliver<T: SpeechTransport, P: AudioOutput>(
    transport: &T,
    output: &P,
    request: &SpeechRequest,
) -> Result<(), SpeechError> {
    let clip = transport.fetch(request).await?;
    output.play(clip).await
}
