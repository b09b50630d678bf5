use std::rc::Rc;

use js_sys::{ArrayBuffer, Uint8Array};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{AbortController, Request, RequestInit, Response, Window};

use super::{AudioClip, CorrectionBody, SpeechError, SpeechRequest, SpeechTransport};
use crate::js_value_to_string;

#[derive(Clone, Debug)]
pub struct HttpTransport {
    base: Rc<str>,
    timeout_ms: i32,
}

impl HttpTransport {
    pub fn new(base: &str, timeout_ms: u32) -> Self {
        Self {
            base: Rc::from(base.trim_end_matches('/')),
            timeout_ms: timeout_ms.min(i32::MAX as u32) as i32,
        }
    }

    pub fn health_url(&self) -> String {
        format!("{}/health", self.base)
    }

    pub fn tts_url(&self, text: &str, rate: i32) -> String {
        let text: String = js_sys::encode_uri_component(text).into();
        format!("{}/api/tts?text={}&rate={}", self.base, text, rate)
    }

    pub fn speller_voice_url(&self) -> String {
        format!("{}/api/speller-voice", self.base)
    }

    fn build_request(&self, request: &SpeechRequest) -> Result<Request, SpeechError> {
        match request {
            SpeechRequest::Say { text, rate, .. } => {
                let init = RequestInit::new();
                init.set_method("GET");
                Request::new_with_str_and_init(&self.tts_url(text, *rate), &init).map_err(net)
            }
            SpeechRequest::Correct {
                misspelling,
                correct,
                rate,
            } => {
                let body = serde_json::to_string(&CorrectionBody {
                    misspelling,
                    correct,
                    rate: *rate,
                })
                .map_err(|err| SpeechError::Network(err.to_string()))?;

                let init = RequestInit::new();
                init.set_method("POST");
                init.set_body(&body.into());
                let req = Request::new_with_str_and_init(&self.speller_voice_url(), &init)
                    .map_err(net)?;
                req.headers()
                    .set("Content-Type", "application/json")
                    .map_err(net)?;
                Ok(req)
            }
        }
    }

    // One abort timer covers both the request and the body read.
    async fn send(&self, request: Request, read_body: bool) -> Result<AudioClip, SpeechError> {
        let win = window()?;
        let controller = AbortController::new().map_err(net)?;
        let signal = controller.signal();

        let request = {
            let init = RequestInit::new();
            init.set_signal(Some(&signal));
            Request::new_with_request_and_init(&request, &init).map_err(net)?
        };

        let on_timeout = Closure::once(move || controller.abort());
        let timer = win
            .set_timeout_with_callback_and_timeout_and_arguments_0(
                on_timeout.as_ref().unchecked_ref(),
                self.timeout_ms,
            )
            .ok();

        let result = fetch_clip(&win, &request, read_body).await;

        if let Some(id) = timer {
            win.clear_timeout_with_handle(id);
        }
        drop(on_timeout);

        if signal.aborted() {
            return Err(SpeechError::Network(format!(
                "timed out after {} ms",
                self.timeout_ms
            )));
        }
        result
    }
}

impl SpeechTransport for HttpTransport {
    async fn probe(&self) -> Result<(), SpeechError> {
        let request = Request::new_with_str(&self.health_url()).map_err(net)?;
        self.send(request, false).await.map(|_| ())
    }

    async fn fetch(&self, request: &SpeechRequest) -> Result<AudioClip, SpeechError> {
        let req = self.build_request(request)?;
        self.send(req, true).await
    }
}

async fn fetch_clip(
    win: &Window,
    request: &Request,
    read_body: bool,
) -> Result<AudioClip, SpeechError> {
    let resp_value = JsFuture::from(win.fetch_with_request(request))
        .await
        .map_err(net)?;
    let resp: Response = resp_value.dyn_into().map_err(net)?;

    if !resp.ok() {
        let detail = match resp.text() {
            Ok(promise) => JsFuture::from(promise)
                .await
                .ok()
                .and_then(|v| v.as_string())
                .unwrap_or_default(),
            Err(_) => String::new(),
        };
        log::warn!("{} returned HTTP {}: {}", request.url(), resp.status(), detail);
        return Err(SpeechError::Network(format!("HTTP {}", resp.status())));
    }

    if !read_body {
        return Ok(AudioClip::default());
    }

    let mime = resp.headers().get("content-type").ok().flatten();
    let buf_value = JsFuture::from(resp.array_buffer().map_err(net)?)
        .await
        .map_err(net)?;
    let buffer: ArrayBuffer = buf_value.dyn_into().map_err(net)?;
    let bytes = Uint8Array::new(&buffer).to_vec();
    if bytes.is_empty() {
        return Err(SpeechError::Network("empty audio payload".to_string()));
    }

    Ok(AudioClip { bytes, mime })
}

fn window() -> Result<Window, SpeechError> {
    web_sys::window().ok_or_else(|| SpeechError::Network("missing window".to_string()))
}

fn net(err: JsValue) -> SpeechError {
    SpeechError::Network(js_value_to_string(&err))
}
