pub const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");
pub const SCHEMA_VERSION: &str = "1";

/// Splits a script on `;` outside quoted identifiers and literals, dropping
/// `--` comment lines.
pub fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut in_single = false;
    let mut in_double = false;

    for line in sql.lines() {
        if !in_single && !in_double && line.trim_start().starts_with("--") {
            continue;
        }
        for ch in line.chars() {
            match ch {
                '\'' if !in_double => in_single = !in_single,
                '"' if !in_single => in_double = !in_double,
                ';' if !in_single && !in_double => {
                    push_statement(&mut statements, &current);
                    current.clear();
                    continue;
                }
                _ => {}
            }
            current.push(ch);
        }
        current.push('\n');
    }
    push_statement(&mut statements, &current);

    statements
}

fn push_statement(statements: &mut Vec<String>, raw: &str) {
    let stmt = raw.trim();
    if !stmt.is_empty() {
        statements.push(stmt.to_string());
    }
}
