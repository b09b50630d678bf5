#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnlockState {
    Locked,
    Unlocking,
    Unlocked,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Platform {
    pub requires_gesture: bool,
}

impl Platform {
    pub fn from_user_agent(user_agent: &str) -> Self {
        let ios = ["iPad", "iPhone", "iPod"]
            .iter()
            .any(|device| user_agent.contains(device));

        Self {
            requires_gesture: ios || is_safari(user_agent),
        }
    }
}

fn is_safari(user_agent: &str) -> bool {
    let ua = user_agent.to_ascii_lowercase();
    let Some(at) = ua.find("safari") else {
        return false;
    };
    // Chrome and Android browsers append "Safari" to their UA after their own token.
    let prefix = &ua[..at];
    !prefix.contains("chrome") && !prefix.contains("android")
}

pub fn initial_unlock_state(platform: Platform, remembered: bool) -> UnlockState {
    if platform.requires_gesture && !remembered {
        UnlockState::Locked
    } else {
        UnlockState::Unlocked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Mobile/15E148 Safari/604.1";
    const MAC_SAFARI: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_4) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15";
    const CHROME: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";
    const ANDROID: &str = "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 (KHTML, like Gecko) Version/4.0 Mobile Safari/537.36";
    const FIREFOX: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0";

    #[test]
    fn detects_strict_platforms() {
        assert!(Platform::from_user_agent(IPHONE).requires_gesture);
        assert!(Platform::from_user_agent(MAC_SAFARI).requires_gesture);
        assert!(!Platform::from_user_agent(CHROME).requires_gesture);
        assert!(!Platform::from_user_agent(ANDROID).requires_gesture);
        assert!(!Platform::from_user_agent(FIREFOX).requires_gesture);
        assert!(!Platform::from_user_agent("").requires_gesture);
    }

    #[test]
    fn only_strict_and_unremembered_is_locked() {
        let strict = Platform {
            requires_gesture: true,
        };
        let lenient = Platform::default();

        assert_eq!(initial_unlock_state(strict, false), UnlockState::Locked);
        assert_eq!(initial_unlock_state(strict, true), UnlockState::Unlocked);
        assert_eq!(initial_unlock_state(lenient, false), UnlockState::Unlocked);
        assert_eq!(initial_unlock_state(lenient, true), UnlockState::Unlocked);
    }
}
