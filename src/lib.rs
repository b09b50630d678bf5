pub mod config;
pub mod progress;
pub mod session;
pub mod speech;
pub mod unlock;
pub mod words;

use std::cell::RefCell;
use std::rc::Rc;

use js_sys::Promise;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{JsFuture, spawn_local};
use web_sys::{
    Document, Event, HtmlButtonElement, HtmlElement, HtmlFormElement, HtmlInputElement, Window,
};

use config::Config;
use progress::LocalStore;
use session::{Command, Scene, Session};
use speech::http::HttpTransport;
use speech::playback::{ContextPlayer, Player, unlock_audio};
use speech::{SpeechGateway, SpeechOutcome};
use unlock::{Platform, UnlockState};
use words::WordBank;

type Gateway = SpeechGateway<HttpTransport, Player>;

struct Ui {
    unlock_screen: HtmlElement,
    unlock_button: HtmlButtonElement,
    splash_screen: HtmlElement,
    game_screen: HtmlElement,
    level_value: HtmlElement,
    correct_value: HtmlElement,
    attempts_value: HtmlElement,
    say_again_button: HtmlButtonElement,
    skip_button: HtmlButtonElement,
    answer_form: HtmlFormElement,
    answer_input: HtmlInputElement,
    submit_button: HtmlButtonElement,
    feedback: HtmlElement,
    diagnostics_text: Option<HtmlElement>,
}

struct AppState {
    session: Session<LocalStore>,
    ui: Ui,
    document: Document,
    user_agent: String,
    last_event: String,
}

// The gateway stays outside the RefCell so no borrow is held across an await.
#[derive(Clone)]
struct Shell {
    state: Rc<RefCell<AppState>>,
    gateway: Rc<Gateway>,
}

pub(crate) fn js_value_to_string(value: &JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{:?}", value))
}

fn window() -> Result<Window, JsValue> {
    web_sys::window().ok_or_else(|| JsValue::from_str("Missing window"))
}

fn element<T: JsCast>(document: &Document, id: &str) -> Result<T, JsValue> {
    document
        .get_element_by_id(id)
        .ok_or_else(|| JsValue::from_str(&format!("Missing #{}", id)))?
        .dyn_into::<T>()
        .map_err(|_| JsValue::from_str(&format!("#{} has the wrong element type", id)))
}

fn scene_name(scene: Scene) -> &'static str {
    match scene {
        Scene::AudioLocked => "audio_locked",
        Scene::Splash => "splash",
        Scene::Playing => "playing",
    }
}

fn unlock_name(unlock: UnlockState) -> &'static str {
    match unlock {
        UnlockState::Locked => "locked",
        UnlockState::Unlocking => "unlocking",
        UnlockState::Unlocked => "unlocked",
    }
}

fn set_status(document: &Document, status: &str) {
    if let Some(el) = document.document_element() {
        let _ = el.set_attribute("data-game-status", status);
    }
}

fn set_root_flag(document: &Document, name: &str, on: bool) {
    if let Some(el) = document.document_element() {
        let _ = el.set_attribute(name, if on { "1" } else { "0" });
    }
}

async fn sleep_ms(ms: u32) {
    let promise = Promise::new(&mut |resolve, _reject| {
        let armed = window().and_then(|win| {
            win.set_timeout_with_callback_and_timeout_and_arguments_0(
                &resolve,
                ms.min(i32::MAX as u32) as i32,
            )
        });
        if armed.is_err() {
            let _ = resolve.call0(&JsValue::NULL);
        }
    });
    let _ = JsFuture::from(promise).await;
}

fn random_seed() -> u64 {
    let noise = (js_sys::Math::random() * u32::MAX as f64) as u64;
    let now = js_sys::Date::now() as u64;
    (noise << 32) ^ now
}

impl Shell {
    fn render(&self) {
        let state = self.state.borrow();
        render(&state, self.gateway.is_busy());
    }

    fn note(&self, event: &str) {
        self.state.borrow_mut().last_event = event.to_string();
    }

    fn run(&self, commands: Vec<Command>) {
        self.render();
        for command in commands {
            self.execute(command);
        }
    }

    fn execute(&self, command: Command) {
        match command {
            Command::Speak(request) => match self.gateway.submit(request) {
                Ok(pending) => {
                    let shell = self.clone();
                    spawn_local(async move {
                        let outcome = pending.await;
                        let next = shell.state.borrow_mut().session.speech_finished(outcome);
                        shell.run(next);
                    });
                }
                Err(busy) => {
                    log::warn!("{}", busy);
                    let next = self
                        .state
                        .borrow_mut()
                        .session
                        .speech_finished(SpeechOutcome::Failed);
                    self.run(next);
                }
            },
            Command::UnlockAudio => {
                // Runs its gesture-bound part right here, still inside the handler.
                let pending = unlock_audio();
                let shell = self.clone();
                spawn_local(async move {
                    let unlocked = match pending.await {
                        Ok(context) => {
                            shell
                                .gateway
                                .install_output(Player::Context(ContextPlayer::new(context)));
                            true
                        }
                        Err(err) => {
                            log::warn!("{}", err);
                            false
                        }
                    };
                    let next = shell.state.borrow_mut().session.unlock_finished(unlocked);
                    shell.run(next);
                });
            }
            Command::WarmUp { dwell_ms } => {
                let warm_up = self.gateway.warm_up_then(sleep_ms(dwell_ms));
                let shell = self.clone();
                spawn_local(async move {
                    if warm_up.await {
                        log::debug!("speech service is awake");
                    }
                    let next = shell.state.borrow_mut().session.splash_finished();
                    shell.run(next);
                });
            }
            Command::ScheduleNextWord { after_ms } => {
                let shell = self.clone();
                spawn_local(async move {
                    sleep_ms(after_ms).await;
                    let next = shell.state.borrow_mut().session.next_word_due();
                    shell.run(next);
                });
            }
        }
    }
}

fn render(state: &AppState, gateway_busy: bool) {
    let session = &state.session;
    let ui = &state.ui;
    let scene = session.scene();
    let game = session.game();

    ui.unlock_screen.set_hidden(scene != Scene::AudioLocked);
    ui.splash_screen.set_hidden(scene != Scene::Splash);
    ui.game_screen.set_hidden(scene != Scene::Playing);
    ui.unlock_button.set_disabled(session.unlock_state() != UnlockState::Locked);

    ui.level_value.set_text_content(Some(&game.level.to_string()));
    ui.correct_value.set_text_content(Some(&game.correct_count.to_string()));
    ui.attempts_value.set_text_content(Some(&game.attempt_count.to_string()));

    let controls = if gateway_busy {
        Default::default()
    } else {
        session.controls()
    };
    ui.say_again_button.set_disabled(!controls.replay);
    ui.skip_button.set_disabled(!controls.skip);
    ui.answer_input.set_disabled(!controls.input);
    ui.submit_button.set_disabled(!controls.submit);

    // A fresh word clears the pending answer; mirror that into the field.
    if ui.answer_input.value() != game.pending_answer {
        ui.answer_input.set_value(&game.pending_answer);
    }

    ui.feedback
        .set_text_content(Some(session.feedback_message().unwrap_or("")));
    let _ = ui
        .feedback
        .set_attribute("data-result", &format!("{:?}", game.last_result).to_lowercase());

    if let Some(el) = state.document.document_element() {
        let _ = el.set_attribute("data-scene", scene_name(scene));
    }
    set_root_flag(&state.document, "data-busy", session.busy() || gateway_busy);
    set_root_flag(&state.document, "data-celebrating", session.celebrating());

    update_diagnostics(state, gateway_busy);
}

fn update_diagnostics(state: &AppState, gateway_busy: bool) {
    let Some(text) = &state.ui.diagnostics_text else {
        return;
    };
    let session = &state.session;
    let status = state
        .document
        .document_element()
        .and_then(|el| el.get_attribute("data-game-status"))
        .unwrap_or_else(|| "unknown".to_string());

    let lines = [
        format!("status: {}", status),
        format!("event: {}", state.last_event),
        format!("scene: {}", scene_name(session.scene())),
        format!("unlock: {}", unlock_name(session.unlock_state())),
        format!("level: {}", session.game().level),
        format!("session_busy: {}", session.busy()),
        format!("speech_busy: {}", gateway_busy),
        format!("ua: {}", state.user_agent),
    ];
    text.set_text_content(Some(&lines.join("\n")));
}

fn on_event(
    target: &web_sys::EventTarget,
    kind: &str,
    handler: impl FnMut(Event) + 'static,
) -> Result<(), JsValue> {
    let closure = Closure::wrap(Box::new(handler) as Box<dyn FnMut(Event)>);
    target.add_event_listener_with_callback(kind, closure.as_ref().unchecked_ref())?;
    closure.forget();
    Ok(())
}

fn read_config() -> Config {
    let search = web_sys::window()
        .and_then(|win| win.location().search().ok())
        .unwrap_or_default();
    Config::default().with_query(&search)
}

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();

    let config = read_config();
    let _ = console_log::init_with_level(config.log_level);

    if let Err(err) = start_impl(config) {
        let message = format!("fatal: {}", js_value_to_string(&err));

        if let Some(doc) = web_sys::window().and_then(|win| win.document()) {
            set_status(&doc, "error");
            if let Some(diag) = doc.get_element_by_id("diagnostics-text") {
                diag.set_text_content(Some(&message));
            }
        }

        log::error!("{}", message);
        web_sys::console::error_1(&err);
    }
}

fn start_impl(config: Config) -> Result<(), JsValue> {
    let win = window()?;
    let document = win
        .document()
        .ok_or_else(|| JsValue::from_str("Missing document"))?;

    let ui = Ui {
        unlock_screen: element(&document, "unlock-screen")?,
        unlock_button: element(&document, "unlock-button")?,
        splash_screen: element(&document, "splash-screen")?,
        game_screen: element(&document, "game-screen")?,
        level_value: element(&document, "level-value")?,
        correct_value: element(&document, "correct-value")?,
        attempts_value: element(&document, "attempts-value")?,
        say_again_button: element(&document, "say-again-button")?,
        skip_button: element(&document, "skip-button")?,
        answer_form: element(&document, "answer-form")?,
        answer_input: element(&document, "answer-input")?,
        submit_button: element(&document, "submit-button")?,
        feedback: element(&document, "feedback")?,
        diagnostics_text: element(&document, "diagnostics-text").ok(),
    };

    let user_agent = win.navigator().user_agent().unwrap_or_default();
    let platform = Platform::from_user_agent(&user_agent);
    log::info!(
        "api {} (gesture required: {})",
        config.api_base,
        platform.requires_gesture
    );

    let gateway = Rc::new(SpeechGateway::new(
        HttpTransport::new(&config.api_base, config.request_timeout_ms),
        Player::default(),
    ));
    let session = Session::new(
        config,
        WordBank::builtin(),
        LocalStore::open(),
        platform,
        random_seed(),
    );

    let shell = Shell {
        state: Rc::new(RefCell::new(AppState {
            session,
            ui,
            document: document.clone(),
            user_agent,
            last_event: "start".to_string(),
        })),
        gateway,
    };

    // Listener targets are cloned out so no borrow is held while wiring.
    let (unlock_button, say_again_button, skip_button, answer_form, answer_input) = {
        let state = shell.state.borrow();
        (
            state.ui.unlock_button.clone(),
            state.ui.say_again_button.clone(),
            state.ui.skip_button.clone(),
            state.ui.answer_form.clone(),
            state.ui.answer_input.clone(),
        )
    };

    // Touch devices fire both; the session ignores the second while unlocking.
    for kind in ["click", "touchstart"] {
        let shell = shell.clone();
        on_event(&unlock_button, kind, move |_event: Event| {
            shell.note(kind);
            let commands = shell.state.borrow_mut().session.unlock_requested();
            shell.run(commands);
        })?;
    }

    {
        let shell = shell.clone();
        on_event(&say_again_button, "click", move |_event: Event| {
            shell.note("say_again");
            let commands = shell.state.borrow_mut().session.replay();
            shell.run(commands);
        })?;
    }

    {
        let shell = shell.clone();
        on_event(&skip_button, "click", move |_event: Event| {
            shell.note("skip");
            let commands = shell.state.borrow_mut().session.skip();
            shell.run(commands);
        })?;
    }

    {
        let shell = shell.clone();
        let input = answer_input.clone();
        on_event(&answer_form, "submit", move |event: Event| {
            event.prevent_default();
            shell.note("submit");
            if shell.gateway.is_busy() {
                return;
            }
            let commands = shell
                .state
                .borrow_mut()
                .session
                .submit_answer(&input.value());
            shell.run(commands);
        })?;
    }

    {
        let shell = shell.clone();
        let input = answer_input.clone();
        on_event(&answer_input, "input", move |_event: Event| {
            shell
                .state
                .borrow_mut()
                .session
                .set_pending_answer(&input.value());
            shell.render();
        })?;
    }

    set_status(&document, "ready");
    let commands = shell.state.borrow_mut().session.start();
    shell.run(commands);

    Ok(())
}
