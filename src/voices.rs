use std::collections::HashMap;

/// Native speakers of the default custom-voice model.
const NATIVE_SPEAKERS: &[&str] = &[
    "Vivian", "Serena", "Uncle_Fu", "Dylan", "Eric", "Ryan", "Aiden", "Ono_Anna", "Sohee",
];

/// Descriptive labels accepted from clients, mapped to native speakers.
const LABEL_ALIASES: &[(&str, &str)] = &[
    ("日本語女性", "Ono_Anna"),
    ("日本語男性", "Uncle_Fu"),
    ("英語女性", "Serena"),
    ("英語男性", "Ryan"),
    ("中国語女性", "Vivian"),
    ("中国語男性", "Uncle_Fu"),
    ("粤語女性", "Vivian"),
    ("韓国語女性", "Sohee"),
];

/// Lookup table from client-facing voice labels to engine speaker ids.
///
/// Labels match case-insensitively. Unknown labels never fail a request;
/// they resolve to the caller-supplied default instead.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceTable {
    entries: HashMap<String, String>,
}

impl Default for VoiceTable {
    fn default() -> Self {
        let mut table = Self::empty();
        for speaker in NATIVE_SPEAKERS {
            table.insert(*speaker, *speaker);
        }
        for (label, speaker) in LABEL_ALIASES {
            table.insert(*label, *speaker);
        }
        table
    }
}

impl VoiceTable {
    /// A table with no entries; every label resolves to the default.
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut table = Self::empty();
        for (label, native) in pairs {
            table.insert(label, native);
        }
        table
    }

    pub fn insert(&mut self, label: impl Into<String>, native: impl Into<String>) {
        self.entries.insert(normalize(&label.into()), native.into());
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.entries.get(&normalize(label)).map(String::as_str)
    }

    /// Map a requested label to a native speaker id, falling back to `default`.
    pub fn resolve<'a>(&'a self, label: Option<&str>, default: &'a str) -> &'a str {
        let Some(label) = label.map(str::trim).filter(|l| !l.is_empty()) else {
            return default;
        };
        match self.get(label) {
            Some(native) => native,
            None => {
                log::debug!("Unknown voice '{label}', using default speaker '{default}'");
                default
            }
        }
    }

    /// All accepted labels in sorted order.
    pub fn labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = self.entries.keys().map(|s| s.as_str()).collect();
        labels.sort_unstable();
        labels
    }
}

fn normalize(label: &str) -> String {
    label.trim().to_lowercase()
}
