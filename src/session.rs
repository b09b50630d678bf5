use crate::config::Config;
use crate::progress::{KeyValueStore, ProgressStore};
use crate::speech::{SpeechKind, SpeechOutcome, SpeechRequest};
use crate::unlock::{Platform, UnlockState, initial_unlock_state};
use crate::words::{Rng, WordBank};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scene {
    AudioLocked,
    Splash,
    Playing,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AnswerResult {
    #[default]
    Unknown,
    Correct,
    Incorrect,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GameState {
    pub level: u32,
    pub correct_count: u32,
    pub attempt_count: u32,
    pub current_word: String,
    pub pending_answer: String,
    pub last_result: AnswerResult,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Speak(SpeechRequest),
    UnlockAudio,
    WarmUp { dwell_ms: u32 },
    ScheduleNextWord { after_ms: u32 },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Controls {
    pub replay: bool,
    pub skip: bool,
    pub input: bool,
    pub submit: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Then {
    Idle,
    AnnounceLevel(u32),
    NextWord,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Step {
    Idle,
    Speaking(Then),
    WaitingForNextWord,
}

pub struct Session<S> {
    config: Config,
    words: WordBank,
    progress: ProgressStore<S>,
    rng: Rng,
    scene: Scene,
    unlock: UnlockState,
    game: GameState,
    step: Step,
    celebrating: bool,
}

impl<S: KeyValueStore> Session<S> {
    pub fn new(config: Config, words: WordBank, store: S, platform: Platform, seed: u64) -> Self {
        let progress = ProgressStore::new(store);
        let saved = progress.load(&words);
        let unlock = initial_unlock_state(platform, progress.unlock_remembered());
        let scene = match unlock {
            UnlockState::Locked => Scene::AudioLocked,
            _ => Scene::Splash,
        };
        log::info!(
            "session: level {} correct {} unlock {:?}",
            saved.level,
            saved.correct_count,
            unlock
        );

        Self {
            config,
            words,
            progress,
            rng: Rng::new(seed),
            scene,
            unlock,
            game: GameState {
                level: saved.level,
                correct_count: saved.correct_count,
                attempt_count: 0,
                current_word: String::new(),
                pending_answer: String::new(),
                last_result: AnswerResult::Unknown,
            },
            step: Step::Idle,
            celebrating: false,
        }
    }

    pub fn scene(&self) -> Scene {
        self.scene
    }

    pub fn unlock_state(&self) -> UnlockState {
        self.unlock
    }

    pub fn game(&self) -> &GameState {
        &self.game
    }

    pub fn celebrating(&self) -> bool {
        self.celebrating
    }

    pub fn busy(&self) -> bool {
        self.step != Step::Idle
    }

    pub fn store(&self) -> &S {
        self.progress.inner()
    }

    pub fn controls(&self) -> Controls {
        if self.scene != Scene::Playing || self.busy() {
            return Controls::default();
        }
        Controls {
            replay: !self.game.current_word.is_empty(),
            skip: true,
            input: true,
            submit: !self.game.pending_answer.trim().is_empty(),
        }
    }

    pub fn feedback_message(&self) -> Option<&'static str> {
        match self.game.last_result {
            AnswerResult::Unknown => None,
            AnswerResult::Correct => Some("Amazing! That's correct!"),
            AnswerResult::Incorrect => Some("Not quite! Try again!"),
        }
    }

    pub fn start(&mut self) -> Vec<Command> {
        match self.scene {
            Scene::Splash => vec![self.warm_up()],
            Scene::AudioLocked | Scene::Playing => Vec::new(),
        }
    }

    pub fn unlock_requested(&mut self) -> Vec<Command> {
        if self.scene != Scene::AudioLocked || self.unlock != UnlockState::Locked {
            return Vec::new();
        }
        self.unlock = UnlockState::Unlocking;
        log::info!("audio unlock requested");
        vec![Command::UnlockAudio]
    }

    pub fn unlock_finished(&mut self, succeeded: bool) -> Vec<Command> {
        if self.unlock != UnlockState::Unlocking {
            return Vec::new();
        }

        if !succeeded {
            log::warn!("audio unlock failed; waiting for another gesture");
            self.unlock = UnlockState::Locked;
            return Vec::new();
        }

        self.unlock = UnlockState::Unlocked;
        self.progress.remember_unlock();
        self.scene = Scene::Splash;
        log::info!("scene: splash");
        vec![self.warm_up()]
    }

    pub fn splash_finished(&mut self) -> Vec<Command> {
        if self.scene != Scene::Splash {
            return Vec::new();
        }
        self.scene = Scene::Playing;
        log::info!("scene: playing");
        self.pick_word(None)
    }

    pub fn set_pending_answer(&mut self, text: &str) {
        self.game.pending_answer = text.to_string();
    }

    pub fn pick_word(&mut self, level_override: Option<u32>) -> Vec<Command> {
        if self.scene != Scene::Playing || matches!(self.step, Step::Speaking(_)) {
            return Vec::new();
        }

        let level = level_override
            .filter(|level| self.words.contains_level(*level))
            .unwrap_or(self.game.level);
        let Some(word) = self.words.pick(level, &mut self.rng) else {
            return Vec::new();
        };
        log::debug!("picked {:?} from level {}", word, level);

        self.game.current_word = word.to_string();
        self.game.pending_answer.clear();
        self.game.last_result = AnswerResult::Unknown;
        self.celebrating = false;

        let text = format!("Level {}. Please spell the word... {}", level, word);
        self.speak(text, SpeechKind::Pronunciation, Then::Idle)
    }

    pub fn skip(&mut self) -> Vec<Command> {
        if self.busy() {
            return Vec::new();
        }
        self.pick_word(None)
    }

    pub fn replay(&mut self) -> Vec<Command> {
        if self.scene != Scene::Playing || self.busy() || self.game.current_word.is_empty() {
            return Vec::new();
        }
        let word = self.game.current_word.clone();
        self.speak(word, SpeechKind::Pronunciation, Then::Idle)
    }

    pub fn submit_answer(&mut self, text: &str) -> Vec<Command> {
        let answer = text.trim().to_lowercase();
        if answer.is_empty()
            || self.scene != Scene::Playing
            || self.busy()
            || self.game.current_word.is_empty()
        {
            return Vec::new();
        }

        self.game.attempt_count = self.game.attempt_count.saturating_add(1);
        log::debug!("checking {:?} against {:?}", answer, self.game.current_word);

        if answer != self.game.current_word.to_lowercase() {
            self.game.last_result = AnswerResult::Incorrect;
            let request = SpeechRequest::Correct {
                misspelling: answer,
                correct: self.game.current_word.clone(),
                rate: self.config.speech_rate,
            };
            return self.issue(request, Then::Idle);
        }

        let before = self.game.correct_count;
        self.game.correct_count = before.saturating_add(1);
        self.game.last_result = AnswerResult::Correct;
        self.celebrating = true;
        self.progress.save_correct_count(self.game.correct_count);
        self.progress.save_level(self.game.level);

        // A pinned counter is not a new boundary.
        let leveled = if self.game.correct_count > before {
            self.level_up()
        } else {
            None
        };
        let then = match leveled {
            Some(level) => Then::AnnounceLevel(level),
            None => Then::NextWord,
        };
        self.speak(
            "Great job! You spelled the word correctly.".to_string(),
            SpeechKind::Feedback,
            then,
        )
    }

    pub fn speech_finished(&mut self, outcome: SpeechOutcome) -> Vec<Command> {
        let Step::Speaking(then) = self.step else {
            log::debug!("ignoring stray speech completion ({:?})", outcome);
            return Vec::new();
        };
        if outcome == SpeechOutcome::Failed {
            log::debug!("utterance failed; continuing without audio");
        }

        match then {
            Then::Idle => {
                self.step = Step::Idle;
                Vec::new()
            }
            Then::AnnounceLevel(level) => self.speak(
                format!("Excellent! Moving on to level {}.", level),
                SpeechKind::Feedback,
                Then::NextWord,
            ),
            Then::NextWord => {
                self.step = Step::WaitingForNextWord;
                vec![Command::ScheduleNextWord {
                    after_ms: self.config.next_word_delay_ms,
                }]
            }
        }
    }

    pub fn next_word_due(&mut self) -> Vec<Command> {
        if self.step != Step::WaitingForNextWord {
            return Vec::new();
        }
        self.step = Step::Idle;
        self.pick_word(None)
    }

    // Only reached on the increment edge, never on hydrated state.
    fn level_up(&mut self) -> Option<u32> {
        let every = self.config.level_up_every.max(1);
        let count = self.game.correct_count;
        let next = self.game.level + 1;
        if count == 0 || count % every != 0 || !self.words.contains_level(next) {
            return None;
        }

        self.game.level = next;
        self.progress.save_level(next);
        log::info!("level up: {}", next);
        Some(next)
    }

    fn warm_up(&self) -> Command {
        Command::WarmUp {
            dwell_ms: self.config.splash_dwell_ms,
        }
    }

    fn speak(&mut self, text: String, kind: SpeechKind, then: Then) -> Vec<Command> {
        let request = SpeechRequest::say(text, self.config.speech_rate, kind);
        self.issue(request, then)
    }

    fn issue(&mut self, request: SpeechRequest, then: Then) -> Vec<Command> {
        self.step = Step::Speaking(then);
        vec![Command::Speak(request)]
    }
}
