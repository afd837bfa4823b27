use std::sync::OnceLock;

use indexmap::IndexMap;

/// Glyph shown for actions the catalog does not know about.
pub const FALLBACK_GLYPH: &str = "🎯";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionSpec {
    pub name: String,
    pub label: String,
    pub glyph: String,
}

impl ActionSpec {
    pub fn matches(&self, query: &str) -> bool {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        self.name.to_lowercase().contains(&needle) || self.label.to_lowercase().contains(&needle)
    }
}

/// Read-only lookup table from action identifier to display metadata.
#[derive(Debug, Clone)]
pub struct ActionCatalog {
    actions: IndexMap<String, ActionSpec>,
}

impl ActionCatalog {
    pub fn new(actions: Option<IndexMap<String, ActionSpec>>) -> Self {
        Self {
            actions: actions.unwrap_or_else(default_actions),
        }
    }

    /// Process-wide catalog, built on first use and never mutated afterwards.
    pub fn global() -> &'static ActionCatalog {
        static CATALOG: OnceLock<ActionCatalog> = OnceLock::new();
        CATALOG.get_or_init(|| ActionCatalog::new(None))
    }

    pub fn get(&self, name: &str) -> Option<&ActionSpec> {
        self.actions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    pub fn list(&self) -> impl Iterator<Item = &ActionSpec> {
        self.actions.values()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn search(&self, query: &str) -> Vec<ActionSpec> {
        self.actions
            .values()
            .filter(|action| action.matches(query))
            .cloned()
            .collect()
    }

    pub fn glyph_for(&self, name: &str) -> &str {
        self.get(name)
            .map(|action| action.glyph.as_str())
            .unwrap_or(FALLBACK_GLYPH)
    }

    pub fn label_for(&self, name: &str) -> String {
        self.get(name)
            .map(|action| action.label.clone())
            .unwrap_or_else(|| humanize_action(name))
    }
}

/// Splits a CamelCase identifier into words: `HorseRiding` -> `Horse Riding`.
pub fn humanize_action(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for ch in name.trim().chars() {
        if ch.is_uppercase() && !out.is_empty() && !out.ends_with(' ') {
            out.push(' ');
        }
        out.push(ch);
    }
    out
}

fn default_actions() -> IndexMap<String, ActionSpec> {
    let mut map = IndexMap::new();

    let mut insert = |name: &str, glyph: &str| {
        map.insert(
            name.to_string(),
            ActionSpec {
                name: name.to_string(),
                label: humanize_action(name),
                glyph: glyph.to_string(),
            },
        );
    };

    insert("ApplyEyeMakeup", "💄");
    insert("ApplyLipstick", "💋");
    insert("Archery", "🏹");
    insert("BabyCrawling", "👶");
    insert("BalanceBeam", "🤸‍♀️");
    insert("BandMarching", "🎺");
    insert("BaseballPitch", "⚾");
    insert("Basketball", "🏀");
    insert("BasketballDunk", "🏀");
    insert("BenchPress", "🏋️");
    insert("Biking", "🚴");
    insert("Billiards", "🎱");
    insert("BlowDryHair", "💇");
    insert("BlowingCandles", "🎂");
    insert("Bowling", "🎳");
    insert("BoxingPunchingBag", "🥊");
    insert("BoxingSpeedBag", "🥊");
    insert("BreastStroke", "🏊");
    insert("BrushingTeeth", "🪥");
    insert("CleanAndJerk", "🏋️‍♂️");
    insert("CliffDiving", "🤿");
    insert("CricketBowling", "🏏");
    insert("CricketShot", "🏏");
    insert("Diving", "🏊‍♂️");
    insert("Drumming", "🥁");
    insert("Fencing", "🤺");
    insert("FloorGymnastics", "🤸");
    insert("FrisbeeCatch", "🥏");
    insert("GolfSwing", "⛳");
    insert("Haircut", "✂️");
    insert("Hammering", "🔨");
    insert("HandstandPushups", "🤸‍♂️");
    insert("HighJump", "🦘");
    insert("HorseRiding", "🐎");
    insert("HulaHoop", "⭕");
    insert("IceDancing", "⛸️");
    insert("JavelinThrow", "🎯");
    insert("JugglingBalls", "🤹");
    insert("JumpingJack", "🏃");
    insert("Kayaking", "🚣");
    insert("Knitting", "🧶");
    insert("LongJump", "🏃‍♂️");
    insert("Lunges", "🦵");
    insert("MoppingFloor", "🧹");
    insert("ParallelBars", "🤸‍♀️");
    insert("PlayingGuitar", "🎸");
    insert("PlayingPiano", "🎹");
    insert("PlayingViolin", "🎻");
    insert("PushUps", "💪");
    insert("Skiing", "⛷️");

    map
}
