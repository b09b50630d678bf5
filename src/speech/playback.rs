use std::future::Future;

use js_sys::{Array, ArrayBuffer, Function, Promise, Uint8Array};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    AudioBuffer, AudioContext, AudioContextState, Blob, BlobPropertyBag, HtmlAudioElement, Url,
};

use super::{AudioClip, AudioOutput, SpeechError};
use crate::js_value_to_string;

// Playing this inside a gesture unlocks audio on strict platforms.
const SILENT_WAV: &str =
    "data:audio/wav;base64,UklGRigAAABXQVZFZm10IBIAAAABAAEARKwAAIhYAQACABAAAABkYXRhAgAAAAEA";

const DEFAULT_MIME: &str = "audio/mpeg";

#[derive(Clone, Debug, Default)]
pub struct ElementPlayer;

impl ElementPlayer {
    async fn play_clip(&self, clip: AudioClip) -> Result<(), SpeechError> {
        let url = object_url(&clip)?;
        let result = play_element(&url).await;
        let _ = Url::revoke_object_url(&url);
        result
    }
}

async fn play_element(url: &str) -> Result<(), SpeechError> {
    let audio = HtmlAudioElement::new_with_src(url).map_err(playback)?;
    // Armed before play() so a very short clip cannot finish unobserved.
    let finished = settle_on(|resolve, reject| {
        audio.set_onended(Some(resolve));
        audio.set_onerror(Some(reject));
    });

    let started = match audio.play() {
        Ok(promise) => JsFuture::from(promise).await.map(|_| ()),
        Err(err) => Err(err),
    };
    let result = match started {
        Ok(()) => JsFuture::from(finished).await.map(|_| ()),
        Err(err) => Err(err),
    };

    audio.set_onended(None);
    audio.set_onerror(None);
    result.map_err(playback)
}

#[derive(Clone, Debug)]
pub struct ContextPlayer {
    context: AudioContext,
}

impl ContextPlayer {
    pub fn new(context: AudioContext) -> Self {
        Self { context }
    }

    async fn play_clip(&self, clip: AudioClip) -> Result<(), SpeechError> {
        // Decoding works on a suspended context; resume only once there is something to play.
        let bytes = Uint8Array::from(clip.bytes.as_slice());
        let data: ArrayBuffer = bytes.buffer();
        let decoded = JsFuture::from(self.context.decode_audio_data(&data).map_err(playback)?)
            .await
            .map_err(playback)?;
        let buffer: AudioBuffer = decoded.dyn_into().map_err(playback)?;

        if self.context.state() == AudioContextState::Suspended {
            if let Ok(promise) = self.context.resume() {
                let _ = JsFuture::from(promise).await;
            }
        }

        let source = self.context.create_buffer_source().map_err(playback)?;
        source.set_buffer(Some(&buffer));
        source
            .connect_with_audio_node(&self.context.destination())
            .map_err(playback)?;

        let finished = settle_on(|resolve, _reject| {
            source.set_onended(Some(resolve));
        });
        source.start().map_err(playback)?;

        let result = JsFuture::from(finished).await.map(|_| ());
        source.set_onended(None);
        let _ = source.disconnect();
        result.map_err(playback)
    }
}

#[derive(Clone, Debug)]
pub enum Player {
    Element(ElementPlayer),
    Context(ContextPlayer),
}

impl Default for Player {
    fn default() -> Self {
        Player::Element(ElementPlayer)
    }
}

impl AudioOutput for Player {
    async fn play(&self, clip: AudioClip) -> Result<(), SpeechError> {
        match self {
            Player::Element(player) => player.play_clip(clip).await,
            Player::Context(player) => player.play_clip(clip).await,
        }
    }
}

// Call from inside the gesture handler: everything gesture-bound happens before this returns.
pub fn unlock_audio() -> impl Future<Output = Result<AudioContext, SpeechError>> {
    let context = AudioContext::new().map_err(playback);
    let resumed = context.as_ref().ok().and_then(|ctx| ctx.resume().ok());
    let silent = HtmlAudioElement::new_with_src(SILENT_WAV)
        .and_then(|audio| audio.play())
        .map_err(playback);

    async move {
        let context = context?;
        JsFuture::from(silent?).await.map_err(playback)?;
        if let Some(promise) = resumed {
            JsFuture::from(promise).await.map_err(playback)?;
        }
        Ok(context)
    }
}

// A promise settles once, so late or repeated events cannot complete a call twice.
fn settle_on(install: impl FnOnce(&Function, &Function)) -> Promise {
    let mut install = Some(install);
    Promise::new(&mut |resolve, reject| {
        if let Some(install) = install.take() {
            install(&resolve, &reject);
        }
    })
}

fn object_url(clip: &AudioClip) -> Result<String, SpeechError> {
    let parts = Array::new();
    parts.push(&Uint8Array::from(clip.bytes.as_slice()));

    let options = BlobPropertyBag::new();
    options.set_type(clip.mime.as_deref().unwrap_or(DEFAULT_MIME));
    let blob = Blob::new_with_u8_array_sequence_and_options(&parts, &options).map_err(playback)?;
    Url::create_object_url_with_blob(&blob).map_err(playback)
}

fn playback(err: JsValue) -> SpeechError {
    SpeechError::Playback(js_value_to_string(&err))
}
