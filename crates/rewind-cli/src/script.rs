//! Line-oriented script language for the ledger demo
//!
//! One statement per line; `#` starts a comment. A trailing `&` submits a
//! command without waiting for it, so later statements can observe the
//! queue.

use crate::error::{CliError, CliResult};

/// A parsed script statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// `set <scope> <account> <value>`
    Set {
        scope: String,
        account: String,
        value: i64,
    },
    /// `add <scope> <account> <delta>`
    Add {
        scope: String,
        account: String,
        delta: i64,
    },
    /// `get <scope> <account>`
    Get { scope: String, account: String },
    /// `undo [scopes]`
    Undo { scope: Option<String> },
    /// `redo [scopes]`
    Redo { scope: Option<String> },
    /// `jump <index|none>`
    Jump { index: Option<usize> },
    /// `stack [id]`
    Stack { id: Option<String> },
    /// `limit <n>`
    Limit { limit: usize },
    /// `history`
    History,
    /// `queued [scopes]`
    Queued { scope: Option<String> },
    /// `wait`: block until every background submission finished
    Wait,
    /// `balances`
    Balances,
    /// `clear`
    Clear,
    /// `scopes`
    Scopes,
}

/// A statement plus how it was submitted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptLine {
    /// 1-based line number
    pub line: usize,
    pub statement: Statement,
    /// Submitted with a trailing `&`
    pub background: bool,
}

/// Parse a whole script, skipping blank and comment lines
pub fn parse_script(source: &str) -> CliResult<Vec<ScriptLine>> {
    let mut lines = Vec::new();
    for (index, raw) in source.lines().enumerate() {
        if let Some(line) = parse_line(index + 1, raw)? {
            lines.push(line);
        }
    }
    Ok(lines)
}

/// Parse one line; `None` for blank and comment lines
pub fn parse_line(line: usize, raw: &str) -> CliResult<Option<ScriptLine>> {
    let text = raw.split('#').next().unwrap_or("").trim();
    if text.is_empty() {
        return Ok(None);
    }

    let (text, background) = match text.strip_suffix('&') {
        Some(rest) => (rest.trim_end(), true),
        None => (text, false),
    };

    let mut words = text.split_whitespace();
    let keyword = words.next().unwrap_or("").to_lowercase();
    let args: Vec<&str> = words.collect();

    let statement = match keyword.as_str() {
        "set" => {
            let [scope, account, value] = exact::<3>(line, &keyword, &args)?;
            Statement::Set {
                scope: scope.to_string(),
                account: account.to_string(),
                value: number(line, value)?,
            }
        }
        "add" => {
            let [scope, account, delta] = exact::<3>(line, &keyword, &args)?;
            Statement::Add {
                scope: scope.to_string(),
                account: account.to_string(),
                delta: number(line, delta)?,
            }
        }
        "get" => {
            let [scope, account] = exact::<2>(line, &keyword, &args)?;
            Statement::Get {
                scope: scope.to_string(),
                account: account.to_string(),
            }
        }
        "undo" => Statement::Undo {
            scope: rest(&args),
        },
        "redo" => Statement::Redo {
            scope: rest(&args),
        },
        "jump" => {
            let [index] = exact::<1>(line, &keyword, &args)?;
            let index = if index.eq_ignore_ascii_case("none") {
                None
            } else {
                Some(
                    index
                        .parse()
                        .map_err(|_| CliError::script(line, format!("invalid index '{}'", index)))?,
                )
            };
            Statement::Jump { index }
        }
        "stack" => Statement::Stack {
            id: args.first().map(|id| id.to_string()),
        },
        "limit" => {
            let [limit] = exact::<1>(line, &keyword, &args)?;
            let limit = limit
                .parse()
                .map_err(|_| CliError::script(line, format!("invalid limit '{}'", limit)))?;
            Statement::Limit { limit }
        }
        "history" => Statement::History,
        "queued" => Statement::Queued {
            scope: rest(&args),
        },
        "wait" => Statement::Wait,
        "balances" => Statement::Balances,
        "clear" => Statement::Clear,
        "scopes" => Statement::Scopes,
        other => return Err(CliError::script(line, format!("unknown command '{}'", other))),
    };

    Ok(Some(ScriptLine {
        line,
        statement,
        background,
    }))
}

fn exact<'a, const N: usize>(line: usize, keyword: &str, args: &[&'a str]) -> CliResult<[&'a str; N]> {
    <[&str; N]>::try_from(args).map_err(|_| {
        CliError::script(
            line,
            format!("'{}' takes {} argument(s), got {}", keyword, N, args.len()),
        )
    })
}

fn number(line: usize, text: &str) -> CliResult<i64> {
    text.parse()
        .map_err(|_| CliError::script(line, format!("invalid number '{}'", text)))
}

fn rest(args: &[&str]) -> Option<String> {
    if args.is_empty() {
        None
    } else {
        Some(args.join(" "))
    }
}
