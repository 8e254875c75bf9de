//! In-memory stand-in for an Atomics query service.
//!
//! Serves `GET /jAtomics/select/?version=1&q=<sql>` over a set of in-memory
//! tables and answers with the `results`/`record`/`field` XML document the
//! real service produces. Only the query shapes the client emits are
//! understood: `SELECT cols FROM table [WHERE a=x AND b='y'] [ORDER BY cols]
//! [LIMIT n] [OFFSET n]`.

use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, info};

pub const SELECT_PATH: &str = "/jAtomics/select/";

/// One row: field name/value pairs in column order.
pub type Row = Vec<(String, String)>;

pub type Db = Arc<RwLock<HashMap<String, Vec<Row>>>>;

/// Wrap `tables` for sharing with the router.
pub fn db(tables: HashMap<String, Vec<Row>>) -> Db {
    Arc::new(RwLock::new(tables))
}

/// Build a row from `(name, value)` pairs.
pub fn row<const N: usize>(fields: [(&str, &str); N]) -> Row {
    fields
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// A small `employee_display` table for running the binary by hand.
pub fn sample_db() -> Db {
    let employees = vec![
        row([("id", "7923113"), ("first_name", "Ada"), ("last_name", "Lovelace"), ("title", "Analyst"), ("team_id", "1")]),
        row([("id", "7923114"), ("first_name", "Charles"), ("last_name", "Babbage"), ("title", "Engineer"), ("team_id", "1")]),
        row([("id", "7923115"), ("first_name", "Grace"), ("last_name", "Hopper"), ("title", "Admiral"), ("team_id", "2")]),
    ];
    db(HashMap::from([("employee_display".to_string(), employees)]))
}

pub fn app(db: Db) -> Router {
    Router::new()
        .route(SELECT_PATH, get(select))
        .with_state(db)
}

pub async fn run(listener: TcpListener, db: Db) -> Result<(), std::io::Error> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "mock atomics service listening");
    }
    axum::serve(listener, app(db)).await
}

#[derive(Deserialize)]
struct SelectParams {
    q: Option<String>,
}

async fn select(State(db): State<Db>, Query(params): Query<SelectParams>) -> Response {
    let Some(sql) = params.q else {
        return (StatusCode::BAD_REQUEST, "missing q parameter").into_response();
    };
    debug!(%sql, "select");
    let query = match SelectQuery::parse(&sql) {
        Ok(query) => query,
        Err(msg) => return (StatusCode::BAD_REQUEST, msg).into_response(),
    };

    let tables = db.read().await;
    let Some(rows) = tables.get(&query.table) else {
        return (StatusCode::NOT_FOUND, format!("no such table: {}", query.table)).into_response();
    };
    let rows = query.apply(rows);
    ([(header::CONTENT_TYPE, "application/xml")], render_results(&rows)).into_response()
}

/// The subset of the query language the mock understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectQuery {
    /// `None` for `*`.
    pub columns: Option<Vec<String>>,
    pub table: String,
    pub filters: Vec<(String, String)>,
    pub order: Vec<String>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl SelectQuery {
    pub fn parse(sql: &str) -> Result<Self, String> {
        let rest = sql.strip_prefix("SELECT ").ok_or("expected SELECT")?;
        let (select, rest) = rest.split_once(" FROM ").ok_or("expected FROM")?;

        let (rest, offset) = split_clause(rest, " OFFSET ");
        let (rest, limit) = split_clause(rest, " LIMIT ");
        let (rest, order) = split_clause(rest, " ORDER BY ");
        let (table, filter) = split_clause(rest, " WHERE ");

        let columns = match select.trim() {
            "*" => None,
            cols => Some(split_list(cols)),
        };
        let filters = match filter {
            Some(filter) => filter
                .split(" AND ")
                .map(parse_equality)
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        Ok(Self {
            columns,
            table: table.trim().to_string(),
            filters,
            order: order.map(split_list).unwrap_or_default(),
            limit: limit.map(parse_count).transpose()?,
            offset: offset.map(parse_count).transpose()?.unwrap_or(0),
        })
    }

    /// Filter, sort, page and project `rows`.
    pub fn apply(&self, rows: &[Row]) -> Vec<Row> {
        let mut matched: Vec<&Row> = rows
            .iter()
            .filter(|row| {
                self.filters
                    .iter()
                    .all(|(col, want)| field(row, col) == Some(want.as_str()))
            })
            .collect();

        if !self.order.is_empty() {
            matched.sort_by(|a, b| {
                let key = |r: &Row| -> Vec<String> {
                    self.order
                        .iter()
                        .map(|c| field(r, c).unwrap_or_default().to_string())
                        .collect()
                };
                key(*a).cmp(&key(*b))
            });
        }

        matched
            .into_iter()
            .skip(self.offset)
            .take(self.limit.unwrap_or(usize::MAX))
            .map(|row| match &self.columns {
                None => row.clone(),
                Some(cols) => cols
                    .iter()
                    .filter_map(|c| field(row, c).map(|v| (c.clone(), v.to_string())))
                    .collect(),
            })
            .collect()
    }
}

fn field<'a>(row: &'a Row, name: &str) -> Option<&'a str> {
    row.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
}

fn split_clause<'a>(sql: &'a str, keyword: &str) -> (&'a str, Option<&'a str>) {
    match sql.rfind(keyword) {
        Some(at) => (&sql[..at], Some(&sql[at + keyword.len()..])),
        None => (sql, None),
    }
}

fn split_list(cols: &str) -> Vec<String> {
    cols.split(',').map(|c| c.trim().to_string()).collect()
}

fn parse_count(n: &str) -> Result<usize, String> {
    n.trim().parse().map_err(|_| format!("bad count: {n}"))
}

fn parse_equality(cond: &str) -> Result<(String, String), String> {
    let (col, value) = cond
        .split_once('=')
        .ok_or_else(|| format!("unsupported condition: {cond}"))?;
    let value = value.trim();
    let value = value
        .strip_prefix('\'')
        .and_then(|v| v.strip_suffix('\''))
        .unwrap_or(value);
    Ok((col.trim().to_string(), value.to_string()))
}

/// Render rows as the service's XML document.
pub fn render_results(rows: &[Row]) -> String {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<results>\n");
    for row in rows {
        xml.push_str("  <record>\n");
        for (name, value) in row {
            xml.push_str(&format!(
                "    <field><name>{}</name><value>{}</value></field>\n",
                escape_xml(name),
                escape_xml(value)
            ));
        }
        xml.push_str("  </record>\n");
    }
    xml.push_str("</results>\n");
    xml
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
