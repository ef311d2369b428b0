//! Lightweight statement splitting for multi-statement batches.
//!
//! The server answers a batch with one completion per statement, but a
//! row-returning statement that matched nothing looks the same on the wire as
//! a DML statement. Classifying the statement text tells the two apart so
//! every query still gets its (possibly empty) record set.

/// Leading keywords of statements that produce a result set.
const ROW_RETURNING: &[&str] = &[
    "select", "show", "desc", "describe", "explain", "with", "table", "values", "trace",
];

/// Split `sql` on top-level `;`, dropping comments and empty statements.
///
/// Quoted strings and identifiers (`'..'`, `".."`, `` `..` ``) are kept
/// intact, including any `;` inside them.
pub fn split_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' | '`' => {
                current.push(c);
                while let Some(inner) = chars.next() {
                    current.push(inner);
                    if inner == '\\' && c != '`' {
                        if let Some(escaped) = chars.next() {
                            current.push(escaped);
                        }
                    } else if inner == c {
                        break;
                    }
                }
            }
            '-' if chars.peek() == Some(&'-') => skip_line(&mut chars),
            '#' => skip_line(&mut chars),
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for inner in chars.by_ref() {
                    if prev == '*' && inner == '/' {
                        break;
                    }
                    prev = inner;
                }
                current.push(' ');
            }
            ';' => push_statement(&mut statements, &mut current),
            _ => current.push(c),
        }
    }
    push_statement(&mut statements, &mut current);
    statements
}

/// Whether `statement` produces a result set, judged by its first keyword.
pub fn returns_rows(statement: &str) -> bool {
    let keyword: String = statement
        .trim_start_matches(|c: char| c.is_whitespace() || c == '(')
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_lowercase();
    ROW_RETURNING.contains(&keyword.as_str())
}

fn skip_line(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) {
    for inner in chars.by_ref() {
        if inner == '\n' {
            break;
        }
    }
}

fn push_statement(statements: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        statements.push(trimmed.to_string());
    }
    current.clear();
}
