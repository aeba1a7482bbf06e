//! String inflection used to guess table names and relation targets.
//!
//! `ProductProperty` maps to the `product_properties` table and a `towns`
//! relation targets the `Town` entity. The English rules cover regular
//! plurals plus a small table of irregular and uncountable words.

use convert_case::{Case, Casing};
use once_cell::sync::Lazy;
use regex::Regex;

const UNCOUNTABLE: &[&str] = &[
    "equipment",
    "fish",
    "information",
    "money",
    "news",
    "rice",
    "series",
    "sheep",
    "species",
    "data",
];

const IRREGULAR: &[(&str, &str)] = &[
    ("child", "children"),
    ("foot", "feet"),
    ("goose", "geese"),
    ("man", "men"),
    ("mouse", "mice"),
    ("ox", "oxen"),
    ("person", "people"),
    ("tooth", "teeth"),
    ("woman", "women"),
];

/// Ordered rules, most specific first
static PLURAL_RULES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    compile(&[
        (r"(?i)(quiz)$", "${1}zes"),
        (r"(?i)(matr|vert|ind)(?:ix|ex)$", "${1}ices"),
        (r"(?i)([^aeiouy]|qu)y$", "${1}ies"),
        (r"(?i)(?:([^f])fe|([lr])f)$", "${1}${2}ves"),
        (r"(?i)(x|ch|ss|sh|z)$", "${1}es"),
        (r"(?i)(bus|alias|status)$", "${1}es"),
        (r"(?i)(octop|vir)us$", "${1}i"),
        (r"(?i)s$", "s"),
        (r"$", "s"),
    ])
});

static SINGULAR_RULES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    compile(&[
        (r"(?i)(quiz)zes$", "${1}"),
        (r"(?i)(matr)ices$", "${1}ix"),
        (r"(?i)(vert|ind)ices$", "${1}ex"),
        (r"(?i)(octop|vir)i$", "${1}us"),
        (r"(?i)(bus|alias|status)es$", "${1}"),
        (r"(?i)([^aeiouy]|qu)ies$", "${1}y"),
        (r"(?i)([lr])ves$", "${1}f"),
        (r"(?i)([^f])ves$", "${1}fe"),
        (r"(?i)(x|ch|ss|sh|z)es$", "${1}"),
        (r"(?i)ss$", "ss"),
        (r"(?i)s$", ""),
    ])
});

fn compile(rules: &[(&str, &'static str)]) -> Vec<(Regex, &'static str)> {
    rules
        .iter()
        .filter_map(|(pattern, replacement)| {
            Regex::new(pattern).ok().map(|regex| (regex, *replacement))
        })
        .collect()
}

/// Capitalise the first character
pub fn ucfirst(input: &str) -> String {
    let mut chars = input.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `snake_case` to `camelCase`
pub fn camel(input: &str) -> String {
    input.to_case(Case::Camel)
}

/// `PascalCase` / `camelCase` to `snake_case`
pub fn snake(input: &str) -> String {
    input.to_case(Case::Snake)
}

/// Pluralise the last word of `input`, keeping the rest untouched
pub fn plural(input: &str) -> String {
    inflect(input, &PLURAL_RULES, |(one, many)| (one, many))
}

/// Singularise the last word of `input`
pub fn singular(input: &str) -> String {
    inflect(input, &SINGULAR_RULES, |(one, many)| (many, one))
}

fn inflect(
    input: &str,
    rules: &[(Regex, &'static str)],
    direction: impl Fn((&'static str, &'static str)) -> (&'static str, &'static str),
) -> String {
    let (head, word) = split_last_word(input);
    let lower = word.to_lowercase();
    if word.is_empty() || UNCOUNTABLE.contains(&lower.as_str()) {
        return input.to_string();
    }
    for pair in IRREGULAR {
        let (from, to) = direction(*pair);
        if lower == from {
            return format!("{head}{}", restore_case(word, to));
        }
    }
    for (regex, replacement) in rules {
        if regex.is_match(word) {
            return format!("{head}{}", regex.replace(word, *replacement));
        }
    }
    input.to_string()
}

/// Split `ProductProperty` into (`Product`, `Property`) and `town_ids` into (`town_`, `ids`)
fn split_last_word(input: &str) -> (&str, &str) {
    let boundary = input
        .char_indices()
        .rev()
        .find(|&(i, c)| i > 0 && (c.is_uppercase() || c == '_'))
        .map(|(i, c)| if c == '_' { i + 1 } else { i })
        .unwrap_or(0);
    input.split_at(boundary)
}

fn restore_case(original: &str, word: &str) -> String {
    if original.chars().next().is_some_and(char::is_uppercase) {
        ucfirst(word)
    } else {
        word.to_string()
    }
}

/// Guess the table of an entity: `ProductProperty` -> `product_properties`
pub fn table_name(entity: &str) -> String {
    snake(&plural(entity))
}

/// Guess the entity a relation points at: `towns` -> `Town`
pub fn entity_name(relation: &str) -> String {
    singular(relation).to_case(Case::Pascal)
}
