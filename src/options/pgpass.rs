use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

/// Look up a password in the `.pgpass` file.
///
/// Each line is `hostname:port:database:username:password`; the first four
/// fields match literally or as the `*` wildcard, with `\` escaping `:` and
/// `\` themselves. Comment lines start with `#`.
///
/// <https://www.postgresql.org/docs/current/libpq-pgpass.html>
pub(super) fn load_password(
    passfile: Option<&Path>,
    host: &str,
    port: u16,
    username: &str,
    database: Option<&str>,
) -> Option<String> {
    let path = match passfile {
        Some(path) => path.to_path_buf(),
        None => default_path()?,
    };

    let contents = fs::read_to_string(&path).ok()?;

    load_password_from(&contents, host, port, username, database)
}

fn default_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".pgpass"))
}

fn load_password_from(
    contents: &str,
    host: &str,
    port: u16,
    username: &str,
    database: Option<&str>,
) -> Option<String> {
    let port = port.to_string();

    for line in contents.lines() {
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(password) = match_line(line, host, &port, username, database) {
            return Some(password);
        }
    }

    None
}

fn match_line(
    line: &str,
    host: &str,
    port: &str,
    username: &str,
    database: Option<&str>,
) -> Option<String> {
    let mut fields = split_fields(line);

    let entry_host = fields.next()?;
    let entry_port = fields.next()?;
    let entry_database = fields.next()?;
    let entry_username = fields.next()?;
    let password = fields.next()?;

    if !matches_field(&entry_host, host)
        || !matches_field(&entry_port, port)
        || !matches_field(&entry_database, database.unwrap_or(username))
        || !matches_field(&entry_username, username)
    {
        return None;
    }

    Some(password.into_owned())
}

fn matches_field(entry: &str, actual: &str) -> bool {
    entry == "*" || entry == actual
}

/// Split on unescaped `:`, resolving `\:` and `\\`.
fn split_fields(line: &str) -> impl Iterator<Item = Cow<'_, str>> {
    let mut rest = Some(line);

    std::iter::from_fn(move || {
        let line = rest?;

        let mut field = String::new();
        let mut plain_end = 0;
        let mut chars = line.char_indices();

        loop {
            match chars.next() {
                Some((i, '\\')) => {
                    field.push_str(&line[plain_end..i]);

                    if let Some((_, escaped)) = chars.next() {
                        field.push(escaped);
                        plain_end = i + 1 + escaped.len_utf8();
                    } else {
                        plain_end = line.len();
                    }
                }

                Some((i, ':')) => {
                    rest = Some(&line[i + 1..]);

                    return Some(if field.is_empty() {
                        Cow::Borrowed(&line[plain_end..i])
                    } else {
                        field.push_str(&line[plain_end..i]);
                        Cow::Owned(field)
                    });
                }

                Some(_) => {}

                None => {
                    rest = None;

                    return Some(if field.is_empty() {
                        Cow::Borrowed(&line[plain_end..])
                    } else {
                        field.push_str(&line[plain_end..]);
                        Cow::Owned(field)
                    });
                }
            }
        }
    })
}
