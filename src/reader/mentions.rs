//! Chemical-mention extraction from cleaned text blocks.
//!
//! [`MentionExtractor`] is the seam where a real chemistry text-mining model
//! can be plugged in. The default [`ChemicalRecognizer`] is a lexical
//! recognizer: it finds names the enrichment database is likely to know and
//! leaves precision to the lookup, since a false positive costs one database
//! miss while a false negative loses an entity.
//!
//! Recognised shapes, longest match first:
//!
//! | shape | example |
//! |-------|---------|
//! | lexicon entry | `water`, `ethyl acetate`, `dimethyl sulfoxide` |
//! | salt | `sodium chloride`, `copper(II) sulfate` |
//! | acid | `acetic acid`, `2-hydroxybenzoic acid` |
//! | systematic name | `2,4-dinitrophenol`, `tetrahydrofuran` |
//! | formula | `H2SO4`, `NaCl`, `KOH` |
//!
//! A name directly followed by a parenthesised abbreviation or formula,
//! `sodium chloride (NaCl)`, becomes one record carrying both names.

use crate::chem::formula_symbols;
use crate::reader::document::{Record, TextBlock};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Turns text blocks into records with compound mentions.
pub trait MentionExtractor: Send + Sync {
    /// `blocks` are in document order; returned records must be too.
    fn extract(&self, blocks: &[TextBlock]) -> Vec<Record>;
}

/// Default lexical recognizer.
#[derive(Debug, Clone, Default)]
pub struct ChemicalRecognizer;

const LEXICON: &[&str] = &[
    "water", "ethanol", "methanol", "propanol", "isopropanol", "butanol", "acetone", "benzene",
    "toluene", "xylene", "styrene", "phenol", "aniline", "pyridine", "hexane", "heptane",
    "cyclohexane", "pentane", "methane", "ethane", "propane", "butane", "ethylene", "propylene",
    "acetylene", "chloroform", "dichloromethane", "tetrahydrofuran", "dimethylformamide",
    "dimethyl sulfoxide", "acetonitrile", "ethyl acetate", "diethyl ether", "formaldehyde",
    "acetaldehyde", "glycerol", "ethylene glycol", "urea", "ammonia", "glucose", "fructose",
    "sucrose", "lactose", "cellulose", "lignin", "chitosan", "starch", "caffeine", "aspirin",
    "ibuprofen", "paracetamol", "morphine", "nicotine", "cholesterol", "graphene", "graphite",
    "silica", "alumina", "titania", "zeolite", "ozone", "carbon dioxide", "carbon monoxide",
    "hydrogen peroxide", "nitric oxide", "oxygen", "nitrogen", "hydrogen", "helium", "argon",
    "lithium", "sodium", "potassium", "magnesium", "calcium", "iron", "copper", "zinc", "silver",
    "gold", "platinum", "palladium", "nickel", "cobalt", "titanium", "polyethylene",
    "polypropylene", "polystyrene", "furfural", "levulinic acid", "lactic acid", "citric acid",
];

/// Words that look systematic but are ordinary English.
const STOPWORDS: &[&str] = &[
    "decline", "declined", "pentagonal", "hexagonal", "octagonal", "formal", "formulate",
    "formulated", "cyclone", "examine", "examined", "determine", "determined", "methodology",
    "therefore", "hydrophobicity", "nonetheless", "combine", "combined", "routine",
];

const STEMS: &[&str] = &[
    "meth", "eth", "prop", "but", "pent", "hex", "hept", "oct", "non", "dec", "benz", "phen",
    "tolu", "xyl", "naphth", "pyr", "fur", "thio", "chlor", "brom", "fluor", "iod", "hydr",
    "carb", "amin", "amid", "nitr", "sulf", "phosph", "acet", "form", "cycl", "anil", "indol",
    "imidaz", "oxaz", "glyc", "sil", "oxid", "oxy", "ket", "ald",
];

const SUFFIXES: &[&str] = &[
    "ane", "ene", "yne", "anol", "enol", "ol", "anal", "one", "amine", "amide", "ide", "ate",
    "ite", "ine", "ile", "oic", "ole", "ium",
];

static RE_LEXICON: Lazy<Regex> = Lazy::new(|| {
    let mut words: Vec<&str> = LEXICON.to_vec();
    words.sort_by_key(|w| std::cmp::Reverse(w.len()));
    let alternation = words
        .iter()
        .map(|w| regex::escape(w).replace(' ', r"\s+"))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{alternation})\b")).unwrap()
});

static RE_SALT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:lithium|sodium|potassium|magnesium|calcium|barium|strontium|cesium|caesium|rubidium|zinc|copper|iron|silver|ammonium|aluminium|aluminum|nickel|cobalt|manganese|lead|tin|mercury|chromium|titanium|palladium|platinum|gold|hydrogen)(?:\s*\((?:I|II|III|IV|V|VI)\))?\s+[a-z]*(?:ide|ate|ite)\b",
    )
    .unwrap()
});

static RE_ACID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b[a-z0-9][a-z0-9,'\-]*(?:ic|ous)\s+acid\b").unwrap()
});

static RE_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z0-9][A-Za-z0-9,'\-\(\)\[\]]*[A-Za-z0-9]").unwrap()
});

static RE_ABBREVIATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\(([A-Za-z0-9+\-]{1,12})\)").unwrap());

#[derive(Debug, Clone)]
struct Span {
    start: usize,
    end: usize,
}

impl ChemicalRecognizer {
    pub fn new() -> Self {
        Self
    }

    /// Mentions in one block, each a list of names for the same compound.
    pub fn recognize(&self, text: &str) -> Vec<Vec<String>> {
        let mut spans: Vec<Span> = Vec::new();
        for re in [&*RE_LEXICON, &*RE_SALT, &*RE_ACID] {
            spans.extend(re.find_iter(text).map(|m| Span {
                start: m.start(),
                end: m.end(),
            }));
        }
        for m in RE_TOKEN.find_iter(text) {
            let token = trim_token(m.as_str());
            if is_formula(token) || is_systematic(token) {
                let start = m.start() + (m.as_str().len() - m.as_str().trim_start_matches(['(', '[']).len());
                spans.push(Span {
                    start,
                    end: start + token.len(),
                });
            }
        }

        // Longest match first at each position, then drop overlaps.
        spans.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));
        let mut kept: Vec<Span> = Vec::new();
        for s in spans {
            if kept.last().is_none_or(|k| s.start >= k.end) {
                kept.push(s);
            }
        }

        let mut mentions = Vec::new();
        let mut consumed_until = 0;
        for span in &kept {
            if span.start < consumed_until {
                continue;
            }
            let name = normalize_spaces(&text[span.start..span.end]);
            let mut names = vec![name];
            consumed_until = span.end;

            if let Some(caps) = RE_ABBREVIATION.captures(&text[span.end..]) {
                let abbr = &caps[1];
                if is_formula(abbr) || is_acronym(abbr) {
                    names.push(abbr.to_string());
                    consumed_until = span.end + caps[0].len();
                }
            }
            mentions.push(names);
        }
        mentions
    }
}

impl MentionExtractor for ChemicalRecognizer {
    fn extract(&self, blocks: &[TextBlock]) -> Vec<Record> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut records = Vec::new();

        for block in blocks {
            for names in self.recognize(&block.text) {
                let fresh: Vec<String> = names
                    .into_iter()
                    .filter(|n| seen.insert(n.to_lowercase()))
                    .collect();
                if !fresh.is_empty() {
                    records.push(Record::compound(block.kind, fresh));
                }
            }
        }
        records
    }
}

fn trim_token(token: &str) -> &str {
    token
        .trim_start_matches(['(', '['])
        .trim_end_matches([')', ']', ',', '\'', '-'])
}

fn normalize_spaces(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Element-validated formula: `H2SO4`, `NaCl`, `KOH`; not `In`, `NO`, `COSY`.
fn is_formula(token: &str) -> bool {
    if token.len() > 24 || !token.starts_with(|c: char| c.is_ascii_uppercase()) {
        return false;
    }
    let Some(symbols) = formula_symbols(token) else {
        return false;
    };
    let has_digit = token.chars().any(|c| c.is_ascii_digit());
    let has_lower = token.chars().any(|c| c.is_ascii_lowercase());

    if has_digit {
        return true;
    }
    if has_lower {
        return symbols.len() >= 2;
    }
    // All-caps without counts: only light-element combinations such as KOH.
    const LIGHT: &[&str] = &["C", "H", "O", "N", "S", "P", "K", "F", "I", "B"];
    symbols.len() >= 3 && symbols.iter().all(|s| LIGHT.contains(s))
}

fn is_acronym(token: &str) -> bool {
    (2..=8).contains(&token.len())
        && token.chars().filter(|c| c.is_ascii_uppercase()).count() >= 2
        && token.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

fn is_systematic(token: &str) -> bool {
    if token.len() < 6 {
        return false;
    }
    let lower = token.to_lowercase();
    if STOPWORDS.contains(&lower.as_str()) {
        return false;
    }
    // Locants and multiplying prefixes such as `2,4-` or `N,N-` are not part
    // of the stem test.
    let core = lower.rsplit('-').next().unwrap_or(&lower);
    if !core.chars().all(|c| c.is_ascii_lowercase() || c == '(' || c == ')' || c == '[' || c == ']') {
        return false;
    }
    STEMS.iter().any(|s| core.contains(s)) && SUFFIXES.iter().any(|s| core.ends_with(s))
}
