/// Picks the most plausible join key from a column set.
///
/// Priority, first match wins, compared case-insensitively: exactly `id`,
/// then the first column ending in `_id`, then the first column containing
/// `key`, then the first column. Returns the original spelling; `None` only
/// for an empty set.
#[must_use]
pub fn infer_key(columns: &[String]) -> Option<&str> {
    let lowered = columns
        .iter()
        .map(|column| column.to_lowercase())
        .collect::<Vec<_>>();
    let pick = |predicate: fn(&str) -> bool| {
        lowered
            .iter()
            .position(|column| predicate(column.as_str()))
            .map(|index| columns[index].as_str())
    };

    pick(|column| column == "id")
        .or_else(|| pick(|column| column.ends_with("_id")))
        .or_else(|| pick(|column| column.contains("key")))
        .or_else(|| columns.first().map(String::as_str))
}
