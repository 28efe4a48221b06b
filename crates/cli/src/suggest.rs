// Column-name guesses for choosing date and store columns

/// Order date columns, most specific first.
pub const ORDER_DATE: &[&str] = &[
    "date commande",
    "date_commande",
    "date cmd",
    "créé le",
    "date creation",
    "date",
];

pub const DELIVERY_DATE: &[&str] = &["date livraison", "date livr", "livraison", "deliv"];

pub const STORE: &[&str] = &["magasin", "nommagasin", "nommag", "store", "site", "ncde"];

/// First column whose lower-cased name contains a pattern. Patterns are
/// tried in order, so an earlier pattern beats an earlier column.
pub fn guess_column<'a>(columns: &'a [String], patterns: &[&str]) -> Option<&'a str> {
    let lowered: Vec<String> = columns.iter().map(|c| c.to_lowercase()).collect();
    patterns.iter().find_map(|pattern| {
        let pattern = pattern.to_lowercase();
        lowered
            .iter()
            .position(|name| name.contains(&pattern))
            .map(|i| columns[i].as_str())
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct Suggestions {
    pub order_date: Option<String>,
    pub delivery_date: Option<String>,
    pub store: Option<String>,
}

pub fn suggest(columns: &[String]) -> Suggestions {
    Suggestions {
        order_date: guess_column(columns, ORDER_DATE).map(str::to_string),
        delivery_date: guess_column(columns, DELIVERY_DATE).map(str::to_string),
        store: guess_column(columns, STORE).map(str::to_string),
    }
}
