//! Table DDL and insert statements
//!
//! Every record column is stored as TEXT. An extra `file_path` column holds
//! the destination the row was written for, matching the CSV file name.

/// Column holding the destination name
pub const DESTINATION_COLUMN: &str = "file_path";

/// Column indexed for lookups by product
pub const ID_COLUMN: &str = "product_id";

/// Table names are interpolated into SQL, so only identifiers pass
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier)
}

/// `CREATE TABLE IF NOT EXISTS` plus a non-unique index on the id column
pub fn create_table_sql(table: &str, columns: &[&str]) -> String {
    let mut definitions = vec!["id INTEGER PRIMARY KEY AUTOINCREMENT".to_string()];
    definitions.extend(columns.iter().map(|c| format!("{} TEXT", quote(c))));
    definitions.push(format!("{} TEXT", quote(DESTINATION_COLUMN)));

    let mut sql = format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n);\n",
        quote(table),
        definitions.join(",\n    ")
    );
    if columns.contains(&ID_COLUMN) {
        sql.push_str(&format!(
            "CREATE INDEX IF NOT EXISTS {} ON {}({});\n",
            quote(&format!("idx_{}_{}", table, ID_COLUMN)),
            quote(table),
            quote(ID_COLUMN)
        ));
    }
    sql
}

/// Parameterized insert of one row, destination last
pub fn insert_sql(table: &str, columns: &[&str]) -> String {
    let names: Vec<String> = columns
        .iter()
        .chain(std::iter::once(&DESTINATION_COLUMN))
        .map(|c| quote(c))
        .collect();
    let placeholders: Vec<String> = (1..=names.len()).map(|i| format!("?{}", i)).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote(table),
        names.join(", "),
        placeholders.join(", ")
    )
}
