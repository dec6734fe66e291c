//! Query builder for the data API's URL filter syntax.

#[derive(Debug, Clone, PartialEq)]
enum Filter {
    Eq(String, String),
    Gte(String, String),
    In(String, Vec<String>),
}

/// A filtered read or the row selection of an update/delete.
///
/// ```ignore
/// Query::table("events")
///     .select("*, inscriptions(id, user_id)")
///     .gte("date", today)
///     .eq("annule", false)
///     .order("date", true);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    table: String,
    columns: Option<String>,
    filters: Vec<Filter>,
    order: Vec<(String, bool)>,
    limit: Option<usize>,
}

impl Query {
    pub fn table(name: &str) -> Self {
        Self {
            table: name.to_string(),
            columns: None,
            filters: Vec::new(),
            order: Vec::new(),
            limit: None,
        }
    }

    /// Columns to return, including embedded relations such as
    /// `"id, inscriptions(id, users(prenom, nom))"`. Whitespace is dropped.
    pub fn select(mut self, columns: &str) -> Self {
        self.columns = Some(columns.split_whitespace().collect());
        self
    }

    pub fn eq(mut self, column: &str, value: impl ToString) -> Self {
        self.filters
            .push(Filter::Eq(column.to_string(), value.to_string()));
        self
    }

    pub fn gte(mut self, column: &str, value: impl ToString) -> Self {
        self.filters
            .push(Filter::Gte(column.to_string(), value.to_string()));
        self
    }

    pub fn in_list<I, V>(mut self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: ToString,
    {
        let values = values.into_iter().map(|v| v.to_string()).collect();
        self.filters.push(Filter::In(column.to_string(), values));
        self
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        self.order.push((column.to_string(), ascending));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub fn has_filters(&self) -> bool {
        !self.filters.is_empty()
    }

    /// Query-string pairs for a read.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();

        if let Some(columns) = &self.columns {
            pairs.push(("select".to_string(), columns.clone()));
        }

        pairs.extend(self.filter_pairs());

        if !self.order.is_empty() {
            let order = self
                .order
                .iter()
                .map(|(column, ascending)| {
                    format!("{}.{}", column, if *ascending { "asc" } else { "desc" })
                })
                .collect::<Vec<_>>()
                .join(",");
            pairs.push(("order".to_string(), order));
        }

        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }

        pairs
    }

    /// Query-string pairs selecting rows for an update or delete.
    pub fn filter_pairs(&self) -> Vec<(String, String)> {
        self.filters
            .iter()
            .map(|filter| match filter {
                Filter::Eq(column, value) => (column.clone(), format!("eq.{}", value)),
                Filter::Gte(column, value) => (column.clone(), format!("gte.{}", value)),
                Filter::In(column, values) => {
                    let list = values
                        .iter()
                        .map(|v| quote_list_value(v))
                        .collect::<Vec<_>>()
                        .join(",");
                    (column.clone(), format!("in.({})", list))
                }
            })
            .collect()
    }
}

/// Values containing list delimiters must be double-quoted inside `in.(...)`.
fn quote_list_value(value: &str) -> String {
    if value.contains([',', '(', ')', '"', '\\', ' ']) {
        let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
        format!("\"{}\"", escaped)
    } else {
        value.to_string()
    }
}

/// Total row count from a `Content-Range` header such as `0-24/3573` or `*/0`.
pub fn parse_content_range(value: &str) -> Option<u64> {
    let (_, total) = value.trim().rsplit_once('/')?;
    total.parse().ok()
}
