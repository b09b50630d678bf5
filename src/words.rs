use thiserror::Error;

const BUILTIN_LEVELS: [&[&str]; 3] = [
    &["cat", "dog", "sun", "hat"],
    &["apple", "green", "chair", "cloud"],
    &["simple", "castle", "wonder", "puzzle"],
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WordBankError {
    #[error("word bank has no levels")]
    Empty,
    #[error("level {0} has no words")]
    EmptyLevel(u32),
}

#[derive(Clone, Debug)]
pub struct WordBank {
    levels: Vec<Vec<String>>,
}

impl WordBank {
    pub fn new(levels: Vec<Vec<String>>) -> Result<Self, WordBankError> {
        if levels.is_empty() {
            return Err(WordBankError::Empty);
        }
        if let Some(idx) = levels.iter().position(|words| words.is_empty()) {
            return Err(WordBankError::EmptyLevel(idx as u32 + 1));
        }

        Ok(Self { levels })
    }

    pub fn builtin() -> Self {
        Self {
            levels: BUILTIN_LEVELS
                .iter()
                .map(|words| words.iter().map(|w| w.to_string()).collect())
                .collect(),
        }
    }

    pub fn max_level(&self) -> u32 {
        self.levels.len() as u32
    }

    pub fn contains_level(&self, level: u32) -> bool {
        level >= 1 && level <= self.max_level()
    }

    pub fn clamp_level(&self, level: u32) -> u32 {
        level.clamp(1, self.max_level())
    }

    pub fn words(&self, level: u32) -> Option<&[String]> {
        if !self.contains_level(level) {
            return None;
        }
        self.levels.get(level as usize - 1).map(Vec::as_slice)
    }

    pub fn pick(&self, level: u32, rng: &mut Rng) -> Option<&str> {
        let words = self.words(level)?;
        let idx = rng.next_index(words.len());
        words.get(idx).map(String::as_str)
    }
}

#[derive(Debug, Clone)]
pub struct Rng {
    state: u64,
}

impl Rng {
    pub fn new(seed: u64) -> Self {
        Rng {
            state: if seed == 0 { 1 } else { seed },
        }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    // Rejection sampling keeps every index equally likely.
    pub fn next_index(&mut self, len: usize) -> usize {
        if len <= 1 {
            return 0;
        }
        let len = len as u64;
        let zone = u64::MAX - (u64::MAX % len);
        loop {
            let v = self.next_u64();
            if v < zone {
                return (v % len) as usize;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn bank(levels: &[&[&str]]) -> WordBank {
        WordBank::new(
            levels
                .iter()
                .map(|l| l.iter().map(|w| w.to_string()).collect())
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn rejects_empty_bank_and_empty_levels() {
        assert_eq!(WordBank::new(vec![]).unwrap_err(), WordBankError::Empty);
        assert_eq!(
            WordBank::new(vec![vec!["cat".into()], vec![]]).unwrap_err(),
            WordBankError::EmptyLevel(2)
        );
    }

    #[test]
    fn builtin_has_three_levels() {
        let words = WordBank::builtin();
        assert_eq!(words.max_level(), 3);
        assert_eq!(words.words(1).unwrap(), ["cat", "dog", "sun", "hat"]);
        assert!(words.words(0).is_none());
        assert!(words.words(4).is_none());
    }

    #[test]
    fn clamp_keeps_level_valid() {
        let words = WordBank::builtin();
        assert_eq!(words.clamp_level(0), 1);
        assert_eq!(words.clamp_level(2), 2);
        assert_eq!(words.clamp_level(99), 3);
    }

    #[test]
    fn picks_cover_every_word_and_nothing_else() {
        let words = WordBank::builtin();
        let mut rng = Rng::new(0x5eed);

        for level in 1..=words.max_level() {
            let list = words.words(level).unwrap();
            let mut seen: HashMap<String, u32> = HashMap::new();
            for _ in 0..4000 {
                let word = words.pick(level, &mut rng).unwrap();
                assert!(list.iter().any(|w| w == word));
                *seen.entry(word.to_string()).or_default() += 1;
            }

            assert_eq!(seen.len(), list.len());
            // 1000 expected per word; a fair generator stays well inside this band.
            for count in seen.values() {
                assert!((800..1200).contains(count), "skewed pick count {}", count);
            }
        }
    }

    #[test]
    fn single_word_level_degenerates() {
        let words = bank(&[&["cat"]]);
        let mut rng = Rng::new(7);
        for _ in 0..10 {
            assert_eq!(words.pick(1, &mut rng), Some("cat"));
        }
    }

    #[test]
    fn rng_deterministic() {
        let mut rng1 = Rng::new(42);
        let mut rng2 = Rng::new(42);
        for _ in 0..10 {
            assert_eq!(rng1.next_index(1000), rng2.next_index(1000));
        }
    }

    #[test]
    fn rng_zero_seed_handled() {
        let mut rng = Rng::new(0);
        assert!(rng.next_index(100) < 100);
    }
}
