//! Grammar-driven extraction of structured item attributes from raw
//! identify text.
//!
//! The source game emits a fixed multi-line template; this parser does
//! best-effort extraction against that template. The contract is total:
//! [`parse_item_text`] never panics and never errors — fields the text does
//! not yield are simply absent from the returned [`ItemDraft`].
//!
//! Line positions matter for some fields (name/category come from the first
//! non-empty line, level from the third, slot from the fourth) while others
//! are scanned across the whole text. The "when worn" modifier block is the
//! one place where the *original* lines are consulted, because the block is
//! delimited by indentation.

use regex::Regex;
use std::sync::LazyLock;

use crate::model::{DamageType, ItemSlug, StatMods};

static LEVEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)is of (\d+)(?:st|nd|rd|th)? level").expect("valid regex"));

static WEAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)wear it (?:about|on|around) your (\w+)").expect("valid regex")
});

static USE_AS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)you can use it as a (\w+)").expect("valid regex"));

static ATTACK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)its attacks take the form of a ([^.]+)\.").expect("valid regex")
});

static AVG_DAMAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)it deals \d+d\d+ damage \(averaging at (\d+)\)\.").expect("valid regex")
});

static AC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)armor class bonus: (-?\d+) vs pierce, (-?\d+) vs bash, (-?\d+) vs slash, and (-?\d+) vs magic\.",
    )
    .expect("valid regex")
});

static WORN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*when worn, it").expect("valid regex"));

static MOD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)modifies ([a-z ]+?) by ([+-]?\d+)").expect("valid regex"));

static LABELLED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+labelled \S+\s*$").expect("valid regex"));

/// Keyword table mapping attack-phrase fragments to damage categories.
/// Scanned in order against the captured phrase; first match wins.
/// Compound fragments sit before the single words they contain.
const DAMAGE_KEYWORDS: [(&str, DamageType); 44] = [
    ("flaming bite", DamageType::Fire),
    ("freezing bite", DamageType::Cold),
    ("shocking bite", DamageType::Lightning),
    ("life drain", DamageType::Negative),
    ("divine power", DamageType::Holy),
    ("slash", DamageType::Slash),
    ("slice", DamageType::Slash),
    ("claw", DamageType::Slash),
    ("whip", DamageType::Slash),
    ("cleave", DamageType::Slash),
    ("pierce", DamageType::Pierce),
    ("stab", DamageType::Pierce),
    ("bite", DamageType::Pierce),
    ("sting", DamageType::Pierce),
    ("thrust", DamageType::Pierce),
    ("peck", DamageType::Pierce),
    ("bash", DamageType::Bash),
    ("pound", DamageType::Bash),
    ("crush", DamageType::Bash),
    ("punch", DamageType::Bash),
    ("smash", DamageType::Bash),
    ("blast", DamageType::Bash),
    ("slap", DamageType::Bash),
    ("acid", DamageType::Acid),
    ("slime", DamageType::Acid),
    ("energy", DamageType::Energy),
    ("magic", DamageType::Energy),
    ("wrath", DamageType::Energy),
    ("holy", DamageType::Holy),
    ("poison", DamageType::Poison),
    ("venom", DamageType::Poison),
    ("fire", DamageType::Fire),
    ("flame", DamageType::Fire),
    ("cold", DamageType::Cold),
    ("frost", DamageType::Cold),
    ("lightning", DamageType::Lightning),
    ("shock", DamageType::Lightning),
    ("negative", DamageType::Negative),
    ("mental", DamageType::Mental),
    ("disease", DamageType::Disease),
    ("drowning", DamageType::Drowning),
    ("sound", DamageType::Sound),
    ("air", DamageType::Air),
    ("earth", DamageType::Earth),
];

/// Best-effort structured draft extracted from one submission's text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemDraft {
    pub name: Option<String>,
    pub category: Option<String>,
    /// Defaults to 1 when the level line is absent or unparsable.
    pub level: i64,
    pub slot: Option<String>,
    pub damage_type: Option<DamageType>,
    pub avg_damage: Option<i64>,
    pub ac_apply: Option<i64>,
    pub ac_bonus: Option<i64>,
    pub damroll_bonus: Option<i64>,
    pub stat_mods: StatMods,
    pub search_text: String,
}

impl ItemDraft {
    /// The canonical identifier this draft resolves to, when a name was
    /// extracted.
    #[must_use]
    pub fn slug(&self) -> Option<ItemSlug> {
        self.name.as_deref().and_then(ItemSlug::derive)
    }
}

/// Parse raw identify text into a draft record.
#[must_use]
pub fn parse_item_text(raw: &str) -> ItemDraft {
    let lines: Vec<&str> = raw.lines().map(str::trim).filter(|l| !l.is_empty()).collect();

    let mut draft = ItemDraft {
        level: 1,
        ..ItemDraft::default()
    };

    if let Some(first) = lines.first() {
        let (name, category) = parse_first_line(first);
        draft.name = name;
        draft.category = category;
    }

    draft.level = lines.get(2).and_then(|l| parse_level(l)).unwrap_or(1);
    draft.slot = lines.get(3).and_then(|l| parse_slot(l));

    draft.damage_type = lines.iter().find_map(|l| parse_damage_category(l));
    draft.avg_damage = lines.iter().find_map(|l| parse_avg_damage(l));
    draft.ac_apply = lines.iter().find_map(|l| parse_ac_average(l));

    let worn = parse_worn_block(raw);
    draft.stat_mods = worn.stat_mods;
    draft.ac_bonus = worn.ac_bonus;
    draft.damroll_bonus = worn.damroll_bonus;

    draft.search_text = render_search_text(&draft);
    draft
}

/// Extract name and category from the first line's comma template:
/// `<prefix>, <name>, <category>,<suffix>`.
///
/// The name spans the first comma to the second-to-last; the category spans
/// the second-to-last to the last. A leading article is dropped from the
/// name, and a leading `is` + article is dropped from the category, so
/// `.., a rusty dagger, is a dagger,` yields `rusty dagger` / `dagger`.
fn parse_first_line(line: &str) -> (Option<String>, Option<String>) {
    let commas: Vec<usize> = line.match_indices(',').map(|(i, _)| i).collect();
    if commas.len() < 3 {
        return (None, None);
    }

    let second_last = commas[commas.len() - 2];
    let last = commas[commas.len() - 1];

    let name_raw = &line[commas[0] + 1..second_last];
    let name_raw = LABELLED_RE.replace(name_raw, "");
    let name = strip_article(name_raw.trim());

    let category_raw = line[second_last + 1..last].trim();
    let category = normalize_category(category_raw);

    (
        (!name.is_empty()).then(|| name.to_string()),
        (!category.is_empty()).then_some(category),
    )
}

/// Drop a leading `a` / `an` / `the` article.
///
/// Prefix checks go through `str::get` so a fragment opening with a
/// multibyte character cannot split a char boundary.
fn strip_article(s: &str) -> &str {
    for prefix in ["a ", "an ", "the "] {
        let matches = s.len() > prefix.len()
            && s.get(..prefix.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(prefix));
        if matches {
            return s[prefix.len()..].trim_start();
        }
    }
    s
}

/// Lower-case the category fragment, dropping a leading `is` + article.
fn normalize_category(raw: &str) -> String {
    let mut rest = raw.trim();
    let has_is = rest.len() > 3
        && rest
            .get(..3)
            .is_some_and(|head| head.eq_ignore_ascii_case("is "));
    if has_is {
        rest = rest[3..].trim_start();
    }
    strip_article(rest).to_lowercase()
}

fn parse_level(line: &str) -> Option<i64> {
    LEVEL_RE
        .captures(line)
        .and_then(|c| c[1].parse().ok())
}

fn parse_slot(line: &str) -> Option<String> {
    WEAR_RE
        .captures(line)
        .or_else(|| USE_AS_RE.captures(line))
        .map(|c| c[1].to_lowercase())
}

fn parse_damage_category(line: &str) -> Option<DamageType> {
    let captures = ATTACK_RE.captures(line)?;
    let phrase = captures[1].to_lowercase();
    DAMAGE_KEYWORDS
        .iter()
        .find(|(keyword, _)| phrase.contains(keyword))
        .map(|&(_, category)| category)
}

fn parse_avg_damage(line: &str) -> Option<i64> {
    AVG_DAMAGE_RE
        .captures(line)
        .and_then(|c| c[1].parse().ok())
}

/// The four-resistance sentence collapses to `round(mean)` of its values.
fn parse_ac_average(line: &str) -> Option<i64> {
    let captures = AC_RE.captures(line)?;
    let mut sum = 0i64;
    for i in 1..=4 {
        sum += captures[i].parse::<i64>().ok()?;
    }
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    Some((sum as f64 / 4.0).round() as i64)
}

#[derive(Debug, Default)]
struct WornBlock {
    stat_mods: StatMods,
    ac_bonus: Option<i64>,
    damroll_bonus: Option<i64>,
}

/// Scan the indentation-delimited "when worn" block.
///
/// Operates on the original (non-trimmed) lines: everything after the
/// `when worn, it` line that begins with leading whitespace belongs to the
/// block; the first non-indented line terminates it.
fn parse_worn_block(raw: &str) -> WornBlock {
    let mut block = WornBlock::default();
    let mut in_block = false;

    for line in raw.lines() {
        if !in_block {
            if WORN_RE.is_match(line) {
                in_block = true;
                // Modifiers can start on the marker line itself.
                scan_modifiers(line, &mut block);
            }
            continue;
        }

        if !line.starts_with(|c: char| c.is_whitespace()) {
            break;
        }
        scan_modifiers(line, &mut block);
    }

    block
}

fn scan_modifiers(line: &str, block: &mut WornBlock) {
    for captures in MOD_RE.captures_iter(line) {
        let stat = captures[1]
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        let Ok(value) = captures[2].parse::<i64>() else {
            continue;
        };

        match stat.as_str() {
            "strength" => block.stat_mods.strength = Some(value),
            "dexterity" => block.stat_mods.dexterity = Some(value),
            "constitution" => block.stat_mods.constitution = Some(value),
            "mana" => block.stat_mods.mana = Some(value),
            "health" => block.stat_mods.health = Some(value),
            "hit roll" => block.stat_mods.hit_roll = Some(value),
            "armor class" => block.ac_bonus = Some(value),
            "damage roll" => block.damroll_bonus = Some(value),
            // Unrecognized stat names are ignored.
            _ => {}
        }
    }
}

/// Free-text search string: the name plus a rendering of every when-worn
/// modifier (`strength +2`, `armor class -5`, ...).
fn render_search_text(draft: &ItemDraft) -> String {
    let mut parts: Vec<String> = Vec::new();
    if let Some(name) = &draft.name {
        parts.push(name.clone());
    }
    for (label, value) in draft.stat_mods.entries() {
        parts.push(format!("{label} {value:+}"));
    }
    if let Some(ac) = draft.ac_bonus {
        parts.push(format!("armor class {ac:+}"));
    }
    if let Some(damroll) = draft.damroll_bonus {
        parts.push(format!("damage roll {damroll:+}"));
    }
    parts.join(" ")
}
