//! The bespoke INI-with-includes dialect used by both `nrpe-ng.cfg` and
//! `check_nrpe_ng.cfg`.
//!
//! There is no single implicit-section INI crate in the dependency tree
//! that speaks this exact dialect (continuation lines, `rem` comments,
//! `command[NAME]` directives, `include`/`include_dir`), so the parser is
//! hand-rolled, grounded directly on the original `NrpeConfigParser._read`
//! behavior.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use super::ConfigError;

/// The flattened result of reading a config file and all of its includes.
#[derive(Debug, Default, Clone)]
pub struct IniDocument {
    /// Last assignment wins per key, matching plain INI semantics.
    pub values: HashMap<String, String>,
    /// `command[NAME] = CMDLINE` directives, keyed by NAME.
    pub commands: HashMap<String, String>,
}

/// Parse `path` and every file it (transitively) includes into one
/// flattened [`IniDocument`].
pub fn load(path: &Path) -> Result<IniDocument, ConfigError> {
    let mut doc = IniDocument::default();
    let mut visited = HashSet::new();
    read_into(path, &mut doc, &mut visited)?;
    Ok(doc)
}

fn read_into(
    path: &Path,
    doc: &mut IniDocument,
    visited: &mut HashSet<PathBuf>,
) -> Result<(), ConfigError> {
    let canonical = fs::canonicalize(path).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    if !visited.insert(canonical.clone()) {
        return Err(ConfigError::IncludeCycle(path.to_path_buf()));
    }

    let raw = fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    for logical_line in join_continuations(&raw) {
        process_line(&logical_line, &dir, doc, visited)?;
    }

    Ok(())
}

/// Join continuation lines (those starting with whitespace) onto the
/// preceding logical line with a newline separator.
fn join_continuations(raw: &str) -> Vec<String> {
    let mut lines = Vec::new();
    for line in raw.lines() {
        if (line.starts_with(' ') || line.starts_with('\t')) && !lines.is_empty() {
            let last: &mut String = lines.last_mut().unwrap();
            last.push('\n');
            last.push_str(line.trim_start());
        } else {
            lines.push(line.to_string());
        }
    }
    lines
}

fn process_line(
    line: &str,
    base_dir: &Path,
    doc: &mut IniDocument,
    visited: &mut HashSet<PathBuf>,
) -> Result<(), ConfigError> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
        return Ok(());
    }
    if let Some(first_token) = trimmed.split_whitespace().next() {
        if first_token.eq_ignore_ascii_case("rem") {
            return Ok(());
        }
    }

    if let Some(rest) = trimmed.strip_prefix("command[") {
        let Some(close) = rest.find(']') else {
            return Ok(());
        };
        let name = rest[..close].to_string();
        let remainder = rest[close + 1..].trim_start();
        if let Some(eq_idx) = remainder.find(['=', ':']) {
            let value = normalize_value(strip_semicolon_comment(&remainder[eq_idx + 1..]));
            doc.commands.insert(name, value);
        }
        return Ok(());
    }

    let Some(eq_idx) = trimmed.find(['=', ':']) else {
        return Ok(());
    };
    let key = trimmed[..eq_idx].trim().to_string();
    let value = normalize_value(strip_semicolon_comment(&trimmed[eq_idx + 1..]));

    if key.eq_ignore_ascii_case("include") {
        let include_path = resolve_relative(base_dir, &value);
        read_into(&include_path, doc, visited)?;
    } else if key.eq_ignore_ascii_case("include_dir") {
        let include_dir = resolve_relative(base_dir, &value);
        for file in collect_cfg_files(&include_dir)? {
            read_into(&file, doc, visited)?;
        }
    } else {
        doc.values.insert(key, value);
    }

    Ok(())
}

fn resolve_relative(base_dir: &Path, value: &str) -> PathBuf {
    let p = Path::new(value);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base_dir.join(p)
    }
}

/// Recursively collect every `*.cfg` file under `dir`, depth-first and
/// sorted for deterministic load order.
fn collect_cfg_files(dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let mut out = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(d) = stack.pop() {
        let entries = fs::read_dir(&d).map_err(|e| ConfigError::Io {
            path: d.clone(),
            source: e,
        })?;
        for entry in entries {
            let entry = entry.map_err(|e| ConfigError::Io {
                path: d.clone(),
                source: e,
            })?;
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.extension().and_then(|e| e.to_str()) == Some("cfg") {
                out.push(path);
            }
        }
    }
    out.sort();
    Ok(out)
}

/// Strip a `;`-comment, but only when the `;` is preceded by whitespace.
fn strip_semicolon_comment(s: &str) -> &str {
    let mut prev: Option<char> = None;
    for (i, c) in s.char_indices() {
        if c == ';' && prev.is_some_and(char::is_whitespace) {
            return &s[..i];
        }
        prev = Some(c);
    }
    s
}

fn normalize_value(s: &str) -> String {
    let trimmed = s.trim();
    if trimmed == "\"\"" {
        String::new()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn parses_simple_assignments() {
        let dir = tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "main.cfg",
            "server_port = 5666\nnrpe_user: nagios\n",
        );
        let doc = load(&path).unwrap();
        assert_eq!(doc.values.get("server_port").unwrap(), "5666");
        assert_eq!(doc.values.get("nrpe_user").unwrap(), "nagios");
    }

    #[test]
    fn joins_continuation_lines() {
        let dir = tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "main.cfg",
            "allowed_hosts = 10.0.0.1,\n  10.0.0.2\n",
        );
        let doc = load(&path).unwrap();
        assert_eq!(doc.values.get("allowed_hosts").unwrap(), "10.0.0.1,\n10.0.0.2");
    }

    #[test]
    fn ignores_comments_and_rem() {
        let dir = tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "main.cfg",
            "# a comment\n; also a comment\nrem ignore me\nkey = value\n",
        );
        let doc = load(&path).unwrap();
        assert_eq!(doc.values.len(), 1);
        assert_eq!(doc.values.get("key").unwrap(), "value");
    }

    #[test]
    fn strips_semicolon_comment_only_after_whitespace() {
        let dir = tempdir().unwrap();
        let path = write_file(dir.path(), "main.cfg", "key = value ; a comment\n");
        let doc = load(&path).unwrap();
        assert_eq!(doc.values.get("key").unwrap(), "value");

        let path2 = write_file(dir.path(), "two.cfg", "url = http://x;y\n");
        let doc2 = load(&path2).unwrap();
        assert_eq!(doc2.values.get("url").unwrap(), "http://x;y");
    }

    #[test]
    fn empty_string_literal_normalizes() {
        let dir = tempdir().unwrap();
        let path = write_file(dir.path(), "main.cfg", "command_prefix = \"\"\n");
        let doc = load(&path).unwrap();
        assert_eq!(doc.values.get("command_prefix").unwrap(), "");
    }

    #[test]
    fn command_directive_name_may_contain_bracket() {
        let dir = tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "main.cfg",
            "command[check[foo]] = /bin/echo hi\n",
        );
        let doc = load(&path).unwrap();
        assert_eq!(doc.commands.get("check[foo").unwrap(), "/bin/echo hi");
    }

    #[test]
    fn include_resolves_relative_to_including_file() {
        let dir = tempdir().unwrap();
        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();
        write_file(&sub, "inner.cfg", "inner_key = yes\n");
        let main = write_file(dir.path(), "main.cfg", "include = sub/inner.cfg\n");
        let doc = load(&main).unwrap();
        assert_eq!(doc.values.get("inner_key").unwrap(), "yes");
    }

    #[test]
    fn include_cycle_is_refused() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.cfg");
        let b = dir.path().join("b.cfg");
        fs::write(&a, "include = b.cfg\n").unwrap();
        fs::write(&b, "include = a.cfg\n").unwrap();
        let err = load(&a).unwrap_err();
        assert!(matches!(err, ConfigError::IncludeCycle(_)));
    }

    #[test]
    fn include_dir_reads_cfg_files_recursively() {
        let dir = tempdir().unwrap();
        let confd = dir.path().join("conf.d");
        fs::create_dir(&confd).unwrap();
        write_file(&confd, "10-first.cfg", "a = 1\n");
        let nested = confd.join("nested");
        fs::create_dir(&nested).unwrap();
        write_file(&nested, "20-second.cfg", "b = 2\n");
        write_file(&confd, "ignored.txt", "c = 3\n");

        let main = write_file(dir.path(), "main.cfg", "include_dir = conf.d\n");
        let doc = load(&main).unwrap();
        assert_eq!(doc.values.get("a").unwrap(), "1");
        assert_eq!(doc.values.get("b").unwrap(), "2");
        assert!(!doc.values.contains_key("c"));
    }
}
