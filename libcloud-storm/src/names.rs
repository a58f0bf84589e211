use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;
use tracing::info;

const MAX_NAME_LEN: usize = 63;

lazy_static! {
    static ref NAME_BANNED: Regex = Regex::new(r"[^a-z0-9.\-]").expect("static regex");
    static ref BRUTE_BANNED: Regex = Regex::new(r"[^a-z0-9_\-]").expect("static regex");
}

/// Lowercase and drop everything that cannot appear in a cloud name.
pub fn clean_text(text: &str) -> String {
    NAME_BANNED
        .replace_all(&text.to_lowercase(), "")
        .into_owned()
}

/// Keywords and their mutations joined every way the providers allow.
pub fn build_names(keywords: &[String], mutations: &[String]) -> Vec<String> {
    let mut names = Vec::new();
    let mut push = |name: String| {
        if name.len() <= MAX_NAME_LEN {
            names.push(name);
        }
    };

    for keyword in keywords {
        let base = clean_text(keyword);
        push(base.clone());
        for mutation in mutations {
            let m = clean_text(mutation);
            push(format!("{base}{m}"));
            push(format!("{base}.{m}"));
            push(format!("{base}-{m}"));
            push(format!("{m}{base}"));
            push(format!("{m}.{base}"));
            push(format!("{m}-{base}"));
        }
    }

    info!("Mutated results: {} items", names.len());
    names
}

/// Trimmed, non-empty lines.
pub fn read_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Wordlist entries usable as container or function names, de-duplicated
/// in first-seen order.
pub fn clean_wordlist(data: &str, min: usize, max: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    data.lines()
        .map(|line| {
            BRUTE_BANNED
                .replace_all(&line.trim().to_lowercase(), "")
                .into_owned()
        })
        .filter(|name| !name.is_empty() && (min..=max).contains(&name.len()))
        .filter(|name| seen.insert(name.clone()))
        .collect()
}
