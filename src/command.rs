//! `command[NAME]` parsing and `$WORD$` placeholder substitution.

use std::collections::HashMap;

/// An immutable, pre-split command line, created once at config load time
/// and shared by every invocation until the config is reloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    argv: Vec<String>,
}

impl CommandTemplate {
    /// Word-split `cmdline` using POSIX shell rules (quoting honored, no
    /// variable or command substitution performed).
    pub fn parse(cmdline: &str) -> Option<Self> {
        shlex::split(cmdline).map(|argv| CommandTemplate { argv })
    }

    /// Resolve every `$WORD$` placeholder in the template's argv against
    /// `args`, word-wise and in place. An unknown name substitutes to the
    /// empty string.
    pub fn resolve(&self, args: &HashMap<String, String>) -> Vec<String> {
        self.argv.iter().map(|word| substitute(word, args)).collect()
    }
}

/// Replace every `$NAME$` occurrence in `word` (where `NAME` matches
/// `[A-Za-z0-9_]+`) with `args[NAME]`, or the empty string if `NAME` is
/// absent from `args`. Substitution happens within the owned string, not
/// by replacing the whole argv element.
fn substitute(word: &str, args: &HashMap<String, String>) -> String {
    let bytes = word.as_bytes();
    let mut out = String::with_capacity(word.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' {
            if let Some(end) = find_placeholder_end(word, i + 1) {
                let name = &word[i + 1..end];
                if !name.is_empty() {
                    out.push_str(args.get(name).map(String::as_str).unwrap_or(""));
                    i = end + 1;
                    continue;
                }
            }
        }
        // Not a valid placeholder: copy the byte verbatim. Safe because we
        // only ever advance within ASCII boundaries ('$') or whole chars.
        let ch_len = word[i..].chars().next().map(char::len_utf8).unwrap_or(1);
        out.push_str(&word[i..i + ch_len]);
        i += ch_len;
    }
    out
}

/// Given the index just past an opening `$`, find the index of the
/// matching closing `$`, provided everything between is `[A-Za-z0-9_]+`.
fn find_placeholder_end(word: &str, start: usize) -> Option<usize> {
    let bytes = word.as_bytes();
    let mut j = start;
    while j < bytes.len() && is_word_byte(bytes[j]) {
        j += 1;
    }
    if j > start && j < bytes.len() && bytes[j] == b'$' {
        Some(j)
    } else {
        None
    }
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn parses_quoted_argv() {
        let t = CommandTemplate::parse("/bin/echo \"hello world\"").unwrap();
        assert_eq!(t.resolve(&args(&[])), vec!["/bin/echo", "hello world"]);
    }

    #[test]
    fn substitutes_known_placeholder() {
        let t = CommandTemplate::parse("/bin/echo $ARG1$").unwrap();
        assert_eq!(t.resolve(&args(&[("ARG1", "world")])), vec!["/bin/echo", "world"]);
    }

    #[test]
    fn unknown_placeholder_becomes_empty() {
        let t = CommandTemplate::parse("/bin/echo $ARG1$").unwrap();
        assert_eq!(t.resolve(&args(&[])), vec!["/bin/echo", ""]);
    }

    #[test]
    fn substitution_is_word_wise_in_place() {
        let t = CommandTemplate::parse("/bin/echo prefix-$ARG1$-suffix").unwrap();
        assert_eq!(
            t.resolve(&args(&[("ARG1", "mid")])),
            vec!["/bin/echo", "prefix-mid-suffix"]
        );
    }

    #[test]
    fn dollar_without_matching_close_is_literal() {
        let t = CommandTemplate::parse("/bin/echo cost:$5").unwrap();
        assert_eq!(t.resolve(&args(&[])), vec!["/bin/echo", "cost:$5"]);
    }
}
