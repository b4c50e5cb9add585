//! Table and relation naming conventions.
//!
//! The ORM being imitated names tables in the plural snake_case form of the
//! model name (`UserAccount` → `user_accounts`) and stores loaded relations
//! under the model name (`Subject`). These helpers bridge the forms so that a
//! clause written against `Subjects`, `subject` or `subjects` finds the same
//! relation.

/// Irregular plurals consulted before the suffix rules.
const IRREGULAR_NOUNS: &[(&str, &str)] = &[
    ("man", "men"),
    ("woman", "women"),
    ("child", "children"),
    ("tooth", "teeth"),
    ("foot", "feet"),
    ("person", "people"),
    ("mouse", "mice"),
    ("goose", "geese"),
];

/// Reduces a table or relation name to its canonical key.
///
/// Lower-cases the input, strips everything outside `[a-z0-9]` and removes a
/// single plural suffix: `ies` → `y`, else `es` → ``, else `s` → ``.
///
/// ```
/// use standout_imitator::naming::canonical_name;
///
/// assert_eq!(canonical_name("Tasks"), "task");
/// assert_eq!(canonical_name("data_set"), "dataset");
/// assert_eq!(canonical_name("Categories"), "category");
/// ```
pub fn canonical_name(name: &str) -> String {
    let mut s: String = name
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect();

    if let Some(stem) = s.strip_suffix("ies") {
        s = format!("{stem}y");
    } else if let Some(stem) = s.strip_suffix("es") {
        s = stem.to_string();
    } else if let Some(stem) = s.strip_suffix('s') {
        s = stem.to_string();
    }
    s
}

/// Returns the plural form used for table names in rendered SQL.
pub fn pluralize(word: &str) -> String {
    if let Some((_, plural)) = IRREGULAR_NOUNS.iter().find(|(single, _)| *single == word) {
        return plural.to_string();
    }

    if ["s", "x", "z", "ch", "sh"].iter().any(|end| word.ends_with(end)) {
        return format!("{word}es");
    }

    if let Some(stem) = word.strip_suffix('y') {
        let consonant_before = stem
            .chars()
            .last()
            .map(|c| !"aeiou".contains(c))
            .unwrap_or(false);
        if consonant_before {
            return format!("{stem}ies");
        }
    }

    if let Some(stem) = word.strip_suffix('f') {
        return format!("{stem}ves");
    }
    if let Some(stem) = word.strip_suffix("fe") {
        return format!("{stem}ves");
    }

    format!("{word}s")
}

/// Converts a name to snake_case by prefixing every internal uppercase
/// letter with `_`. Acronyms are not special-cased (`userID` → `user_i_d`).
pub fn snake_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 4);
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i != 0 {
                result.push('_');
            }
            result.extend(c.to_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}

/// Table name as rendered in SQL and diagnostics: snake_case, then plural.
pub fn table_name(model: &str) -> String {
    pluralize(&snake_case(model))
}

/// Splits `table/column` once on the first `/`.
pub fn split_slash(reference: &str) -> (Option<&str>, &str) {
    split_once(reference, '/')
}

/// Splits `table.column` once on the first `.`.
pub fn split_dot(reference: &str) -> (Option<&str>, &str) {
    split_once(reference, '.')
}

fn split_once(reference: &str, delimiter: char) -> (Option<&str>, &str) {
    match reference.split_once(delimiter) {
        Some((table, column)) => (Some(table), column),
        None => (None, reference),
    }
}
