pub const DEFAULT_API_BASE: &str =
    "https://gratitude-web-app4-gsfxc4cpfugcggbt.westus-01.azurewebsites.net";

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub api_base: String,
    pub speech_rate: i32,
    pub splash_dwell_ms: u32,
    pub next_word_delay_ms: u32,
    pub level_up_every: u32,
    pub request_timeout_ms: u32,
    pub log_level: log::Level,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            speech_rate: -15,
            splash_dwell_ms: 3000,
            next_word_delay_ms: 2000,
            level_up_every: 5,
            request_timeout_ms: 20_000,
            log_level: log::Level::Info,
        }
    }
}

impl Config {
    pub fn with_query(mut self, search: &str) -> Self {
        let query = search.strip_prefix('?').unwrap_or(search);

        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            match key {
                "api" if !value.is_empty() => {
                    self.api_base = value.trim_end_matches('/').to_string();
                }
                "rate" => {
                    if let Ok(rate) = value.parse() {
                        self.speech_rate = rate;
                    }
                }
                "splash" => {
                    if let Ok(ms) = value.parse() {
                        self.splash_dwell_ms = ms;
                    }
                }
                "next" => {
                    if let Ok(ms) = value.parse() {
                        self.next_word_delay_ms = ms;
                    }
                }
                "every" => {
                    // Zero would make every answer a level boundary.
                    if let Ok(every) = value.parse::<u32>() {
                        if every > 0 {
                            self.level_up_every = every;
                        }
                    }
                }
                "timeout" => {
                    if let Ok(ms) = value.parse() {
                        self.request_timeout_ms = ms;
                    }
                }
                "log" => {
                    if let Ok(level) = value.parse() {
                        self.log_level = level;
                    }
                }
                _ => {}
            }
        }

        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_keeps_defaults() {
        assert_eq!(Config::default().with_query(""), Config::default());
        assert_eq!(Config::default().with_query("?"), Config::default());
    }

    #[test]
    fn overrides_are_applied() {
        let config = Config::default()
            .with_query("?api=http://localhost:8000/&rate=0&splash=10&next=5&every=3&log=debug");

        assert_eq!(config.api_base, "http://localhost:8000");
        assert_eq!(config.speech_rate, 0);
        assert_eq!(config.splash_dwell_ms, 10);
        assert_eq!(config.next_word_delay_ms, 5);
        assert_eq!(config.level_up_every, 3);
        assert_eq!(config.log_level, log::Level::Debug);
    }

    #[test]
    fn invalid_values_are_ignored() {
        let config = Config::default().with_query("rate=fast&every=0&timeout=-1&nosw=1&api=");
        assert_eq!(config, Config::default());
    }
}
