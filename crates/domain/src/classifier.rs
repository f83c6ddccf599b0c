//! Command classifier: pure, deterministic analysis of instruction text.
//!
//! Decides whether an instruction targets one device, every device of a
//! kind, a group or a scene; detects instructions that address several
//! device types at once and splits them into per-type sub-commands.
//!
//! Chinese keywords match as substrings. English keywords match as whole
//! words, ignoring case.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Separators that may join operations on different devices.
const CROSS_DEVICE_SEPARATORS: [&str; 5] = [",", "，", "、", "和", "与"];

/// Separators between sub-commands when splitting by device type.
const SEGMENT_SEPARATORS: [char; 6] = [',', '，', '、', '。', ';', '；'];

/// Keywords that reveal the device type mentioned in an instruction.
const DETECTION_KEYWORDS: &[(&str, &[&str])] = &[
    ("light", &["灯", "照明", "light", "lamp"]),
    ("thermostat", &["空调", "温度", "制热", "制冷", "thermostat", "temperature"]),
    ("rice_cooker", &["电饭煲", "煮饭", "饭", "rice cooker"]),
    ("curtain", &["窗帘", "curtain"]),
    ("socket", &["插座", "socket", "plug"]),
    ("vacuum", &["扫地机", "vacuum"]),
];

/// Broader keyword groups used to score each segment of a split instruction.
const SPLIT_KEYWORDS: &[(&str, &[&str])] = &[
    ("light", &["灯", "照明", "亮", "灯光", "亮度", "light", "lamp", "brightness"]),
    (
        "thermostat",
        &["空调", "温度", "制热", "制冷", "暖气", "冷气", "风速", "风量", "thermostat", "temperature"],
    ),
    ("rice_cooker", &["电饭煲", "饭", "煮饭", "煲饭", "煮粥", "煲汤", "rice", "cook"]),
    ("curtain", &["窗帘", "窗户", "curtain", "blind"]),
    ("vacuum", &["扫地机", "吸尘器", "打扫", "vacuum", "clean"]),
    ("socket", &["插座", "插头", "电源", "socket", "plug", "outlet"]),
];

const ALL_DEVICES_KEYWORDS: [&str; 4] = ["所有", "全部", "每个", "每一个"];
const GROUP_KEYWORDS: [&str; 4] = ["群组", "分组", "设备组", "房间"];
const SCENE_KEYWORDS: [&str; 3] = ["场景", "模式", "情景"];

static ALL_DEVICES_WORDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(all|every)\b").expect("valid regex"));

static PAIRED_TARGETS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\w和\w)|(\b\w+\s+and\s+\w+\b)").expect("valid regex")
});

static GROUP_WORDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(group|room)s?\b").expect("valid regex"));

static SCENE_WORDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(scene|mode|scenario)s?\b").expect("valid regex"));

static AND_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\band\b").expect("valid regex"));

/// How an instruction addresses devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    SingleDevice,
    MultiDeviceSameType,
    Group,
    Scene,
}

/// Devices named by an instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSelection {
    /// An all-devices keyword was present.
    All,
    /// Known device names contained in the text, in `known_names` order.
    Named(Vec<String>),
}

/// One per-type slice of a cross-device instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubCommand {
    pub device_type: String,
    pub text: String,
}

/// Keyword-table driven classifier.
#[derive(Debug, Clone)]
pub struct Classifier {
    detection: Vec<(String, Vec<String>)>,
    split: Vec<(String, Vec<String>)>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self {
            detection: owned_table(DETECTION_KEYWORDS),
            split: owned_table(SPLIT_KEYWORDS),
        }
    }
}

impl Classifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register extra keywords for a device type, used both for detection
    /// and for splitting.
    #[must_use]
    pub fn with_keywords(mut self, device_type: &str, keywords: &[&str]) -> Self {
        for table in [&mut self.detection, &mut self.split] {
            let index = table
                .iter()
                .position(|(t, _)| t == device_type)
                .unwrap_or_else(|| {
                    table.push((device_type.to_string(), Vec::new()));
                    table.len() - 1
                });
            table[index]
                .1
                .extend(keywords.iter().map(ToString::to_string));
        }
        self
    }

    /// Whether the text joins operations on at least two device types.
    #[must_use]
    pub fn detects_cross_device_operations(&self, text: &str) -> bool {
        let has_separator = CROSS_DEVICE_SEPARATORS.iter().any(|sep| text.contains(sep))
            || AND_WORD.is_match(text);
        if !has_separator {
            return false;
        }
        let mentioned = self
            .detection
            .iter()
            .filter(|(_, keywords)| keywords.iter().any(|k| contains_keyword(text, k)))
            .count();
        mentioned > 1
    }

    /// Classify how the text addresses devices.
    ///
    /// Multi-device keywords take precedence over group keywords, which take
    /// precedence over scene keywords.
    #[must_use]
    pub fn classify(&self, text: &str) -> CommandKind {
        if mentions_all_devices(text) || PAIRED_TARGETS.is_match(text) {
            CommandKind::MultiDeviceSameType
        } else if GROUP_KEYWORDS.iter().any(|k| text.contains(k)) || GROUP_WORDS.is_match(text) {
            CommandKind::Group
        } else if SCENE_KEYWORDS.iter().any(|k| text.contains(k)) || SCENE_WORDS.is_match(text) {
            CommandKind::Scene
        } else {
            CommandKind::SingleDevice
        }
    }

    /// Resolve which known devices the text names.
    #[must_use]
    pub fn extract_target_device_names<S: AsRef<str>>(
        &self,
        text: &str,
        known_names: &[S],
    ) -> TargetSelection {
        if mentions_all_devices(text) {
            return TargetSelection::All;
        }
        let lowered = text.to_lowercase();
        TargetSelection::Named(
            known_names
                .iter()
                .map(AsRef::as_ref)
                .filter(|name| !name.is_empty() && lowered.contains(&name.to_lowercase()))
                .map(ToString::to_string)
                .collect(),
        )
    }

    /// Split a cross-device instruction into one sub-command per device type.
    ///
    /// Each segment goes to the known type with the most keyword hits (the
    /// type name itself counts as a keyword); ties keep the type listed first
    /// and segments without any hit are dropped. Segments of the same type
    /// are joined with `，`, and types appear in order of first mention.
    #[must_use]
    pub fn split_by_device_type<S: AsRef<str>>(
        &self,
        text: &str,
        known_types: &[S],
    ) -> Vec<SubCommand> {
        let mut grouped: Vec<(String, Vec<&str>)> = Vec::new();
        for segment in text.split(SEGMENT_SEPARATORS).map(str::trim) {
            if segment.is_empty() {
                continue;
            }
            let Some(device_type) = self.best_type(segment, known_types) else {
                continue;
            };
            match grouped.iter_mut().find(|(t, _)| t == device_type) {
                Some((_, segments)) => segments.push(segment),
                None => grouped.push((device_type.to_string(), vec![segment])),
            }
        }
        grouped
            .into_iter()
            .map(|(device_type, segments)| SubCommand {
                device_type,
                text: segments.join("，"),
            })
            .collect()
    }

    fn best_type<'a, S: AsRef<str>>(&self, segment: &str, known_types: &'a [S]) -> Option<&'a str> {
        let mut best: Option<(&str, usize)> = None;
        for device_type in known_types.iter().map(AsRef::as_ref) {
            let score = self.score(segment, device_type);
            if score > best.map_or(0, |(_, s)| s) {
                best = Some((device_type, score));
            }
        }
        best.map(|(device_type, _)| device_type)
    }

    fn score(&self, segment: &str, device_type: &str) -> usize {
        let keyword_hits = self
            .split
            .iter()
            .find(|(t, _)| t == device_type)
            .map_or(0, |(_, keywords)| {
                keywords.iter().filter(|k| contains_keyword(segment, k)).count()
            });
        let name_hit = usize::from(contains_keyword(segment, device_type));
        keyword_hits + name_hit
    }
}

fn owned_table(table: &[(&str, &[&str])]) -> Vec<(String, Vec<String>)> {
    table
        .iter()
        .map(|(device_type, keywords)| {
            (
                (*device_type).to_string(),
                keywords.iter().map(ToString::to_string).collect(),
            )
        })
        .collect()
}

fn mentions_all_devices(text: &str) -> bool {
    ALL_DEVICES_KEYWORDS.iter().any(|k| text.contains(k)) || ALL_DEVICES_WORDS.is_match(text)
}

/// ASCII keywords match whole words ignoring case; others match as substrings.
fn contains_keyword(text: &str, keyword: &str) -> bool {
    if keyword.is_empty() {
        return false;
    }
    if !keyword.is_ascii() {
        return text.contains(keyword);
    }
    let haystack = text.to_ascii_lowercase();
    let needle = keyword.to_ascii_lowercase();
    haystack.match_indices(&needle).any(|(start, _)| {
        let end = start + needle.len();
        let before = haystack[..start].chars().next_back();
        let after = haystack[end..].chars().next();
        !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char)
    })
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
