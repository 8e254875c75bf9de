//! Record-class descriptors and the find family.
//!
//! # Design
//! `ResourceDescriptor` is the static description of one record class:
//! which service answers for it, its backing table, its primary key and its
//! declared columns. It is built once and shared behind an `Arc`.
//!
//! `ResourceClient` pairs a descriptor with the endpoint configuration and,
//! like the rest of the crate, splits every lookup into `build_*` (produces
//! an `HttpRequest`) and `parse_records` (consumes an `HttpResponse`). The
//! blocking lookups glue the two together through a `Transport`, one round
//! trip per call.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::Endpoints;
use crate::error::AtomicsError;
use crate::http::{HttpRequest, HttpResponse, Transport};
use crate::record::Record;
use crate::response::{decode_body, parse_attributes};
use crate::sql::{construct_sql, Columns, Conditions, QueryOptions};
use crate::url::construct_url_for_sql;

/// Static description of a record class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    name: String,
    service: String,
    table: String,
    primary_key: String,
    columns: Vec<String>,
}

impl ResourceDescriptor {
    pub fn builder(name: impl Into<String>) -> ResourceDescriptorBuilder {
        ResourceDescriptorBuilder {
            descriptor: ResourceDescriptor {
                name: name.into(),
                service: String::new(),
                table: String::new(),
                primary_key: "id".to_string(),
                columns: Vec::new(),
            },
        }
    }

    /// Class name, used when inspecting records.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// `*` when no columns are declared, otherwise the primary key followed
    /// by the declared columns with duplicates dropped.
    pub fn columns_or_default(&self) -> Columns {
        if self.columns.is_empty() {
            return Columns::wildcard();
        }
        let mut cols: Vec<String> = Vec::with_capacity(self.columns.len() + 1);
        for col in std::iter::once(&self.primary_key).chain(&self.columns) {
            if !cols.contains(col) {
                cols.push(col.clone());
            }
        }
        Columns::List(cols)
    }
}

#[derive(Debug, Clone)]
pub struct ResourceDescriptorBuilder {
    descriptor: ResourceDescriptor,
}

impl ResourceDescriptorBuilder {
    /// Service name looked up in `Endpoints`.
    pub fn service(mut self, service: impl Into<String>) -> Self {
        self.descriptor.service = service.into();
        self
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.descriptor.table = table.into();
        self
    }

    /// Defaults to `id`.
    pub fn primary_key(mut self, primary_key: impl Into<String>) -> Self {
        self.descriptor.primary_key = primary_key.into();
        self
    }

    /// Declare one more column; declaration order is `SELECT` order.
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.descriptor.columns.push(column.into());
        self
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.descriptor.columns.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn build(self) -> ResourceDescriptor {
        self.descriptor
    }
}

/// What a `find` call should return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    All,
    First,
    Last,
    /// Single record by primary key; caller options are ignored.
    Id(String),
}

/// Result of `find`, shaped by its `Scope`.
#[derive(Debug, Clone)]
pub enum Found {
    Many(Vec<Record>),
    One(Option<Record>),
}

/// Lookups for one record class.
#[derive(Debug, Clone)]
pub struct ResourceClient {
    descriptor: Arc<ResourceDescriptor>,
    endpoints: Arc<Endpoints>,
}

impl ResourceClient {
    pub fn new(descriptor: impl Into<Arc<ResourceDescriptor>>, endpoints: Arc<Endpoints>) -> Self {
        Self {
            descriptor: descriptor.into(),
            endpoints,
        }
    }

    pub fn descriptor(&self) -> &Arc<ResourceDescriptor> {
        &self.descriptor
    }

    fn defaults(&self) -> QueryOptions {
        QueryOptions::new()
            .select(self.descriptor.columns_or_default())
            .from(self.descriptor.table())
    }

    /// Query for `options` merged over the class defaults.
    pub fn construct_sql_for_find(&self, options: QueryOptions) -> Result<String, AtomicsError> {
        construct_sql(&options.or(self.defaults()))
    }

    /// Query for the record whose primary key is `id`.
    pub fn construct_sql_for_id(&self, id: &str) -> Result<String, AtomicsError> {
        let options = self
            .defaults()
            .conditions(Conditions::pairs([(self.descriptor.primary_key(), id)]));
        construct_sql(&options)
    }

    pub fn construct_url_for_sql(&self, sql: &str) -> Result<String, AtomicsError> {
        construct_url_for_sql(&self.endpoints, self.descriptor.service(), sql)
    }

    pub fn build_find_by_sql(&self, sql: &str) -> Result<HttpRequest, AtomicsError> {
        let url = self.construct_url_for_sql(sql)?;
        debug!(resource = %self.descriptor.name(), %sql, %url, "built query");
        Ok(HttpRequest::get(url))
    }

    pub fn build_all(&self, options: QueryOptions) -> Result<HttpRequest, AtomicsError> {
        let sql = self.construct_sql_for_find(options)?;
        self.build_find_by_sql(&sql)
    }

    pub fn build_find_by_id(&self, id: &str) -> Result<HttpRequest, AtomicsError> {
        let sql = self.construct_sql_for_id(id)?;
        self.build_find_by_sql(&sql)
    }

    /// Map a response body to records, in the order the service sent them.
    pub fn parse_records(&self, response: HttpResponse) -> Result<Vec<Record>, AtomicsError> {
        check_status(&response)?;
        let body = decode_body(&response.body)?;
        let records: Vec<Record> = parse_attributes(&body)?
            .into_iter()
            .map(|attributes| Record::new(Arc::clone(&self.descriptor), attributes))
            .collect();
        debug!(resource = %self.descriptor.name(), count = records.len(), "mapped records");
        Ok(records)
    }

    /// Run a raw query string.
    pub fn find_by_sql<T: Transport>(&self, transport: &T, sql: &str) -> Result<Vec<Record>, AtomicsError> {
        let request = self.build_find_by_sql(sql)?;
        self.parse_records(transport.execute(&request)?)
    }

    pub fn all<T: Transport>(&self, transport: &T, options: QueryOptions) -> Result<Vec<Record>, AtomicsError> {
        let request = self.build_all(options)?;
        self.parse_records(transport.execute(&request)?)
    }

    pub fn first<T: Transport>(&self, transport: &T, options: QueryOptions) -> Result<Option<Record>, AtomicsError> {
        Ok(self.all(transport, options)?.into_iter().next())
    }

    pub fn last<T: Transport>(&self, transport: &T, options: QueryOptions) -> Result<Option<Record>, AtomicsError> {
        Ok(self.all(transport, options)?.pop())
    }

    pub fn find_by_id<T: Transport>(&self, transport: &T, id: impl ToString) -> Result<Option<Record>, AtomicsError> {
        let request = self.build_find_by_id(&id.to_string())?;
        Ok(self.parse_records(transport.execute(&request)?)?.into_iter().next())
    }

    pub fn find<T: Transport>(&self, transport: &T, scope: Scope, options: QueryOptions) -> Result<Found, AtomicsError> {
        Ok(match scope {
            Scope::All => Found::Many(self.all(transport, options)?),
            Scope::First => Found::One(self.first(transport, options)?),
            Scope::Last => Found::One(self.last(transport, options)?),
            Scope::Id(id) => Found::One(self.find_by_id(transport, id)?),
        })
    }
}

/// Anything outside 2xx is an `Http` error carrying the raw status and body.
fn check_status(response: &HttpResponse) -> Result<(), AtomicsError> {
    if (200..300).contains(&response.status) {
        return Ok(());
    }
    warn!(status = response.status, "query service returned an error status");
    Err(AtomicsError::Http {
        status: response.status,
        body: String::from_utf8_lossy(&response.body).into_owned(),
    })
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::config::Endpoint;
    use crate::http::HttpMethod;

    const BODY: &str = "<results>\
        <record><field><name>id</name><value>1</value></field><field><name>last_name</name><value>Adams</value></field></record>\
        <record><field><name>id</name><value>2</value></field><field><name>last_name</name><value>Baker</value></field></record>\
        </results>";

    /// Answers every request with a fixed response and remembers the URLs.
    struct Canned {
        response: HttpResponse,
        seen: RefCell<Vec<String>>,
    }

    impl Canned {
        fn new(response: HttpResponse) -> Self {
            Self {
                response,
                seen: RefCell::new(Vec::new()),
            }
        }
    }

    impl Transport for Canned {
        fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, AtomicsError> {
            self.seen.borrow_mut().push(request.url.clone());
            Ok(self.response.clone())
        }
    }

    fn employee() -> ResourceDescriptor {
        ResourceDescriptor::builder("Employee")
            .service("hr")
            .table("employee_display")
            .primary_key("id")
            .column("first_name")
            .column("last_name")
            .column("id")
            .column("team_id")
            .build()
    }

    fn client(descriptor: ResourceDescriptor) -> ResourceClient {
        let endpoints = Endpoints::new().insert(
            "hr",
            Endpoint::new("hr-atomics.example.com", "8080", "/jAtomics/select/?version=1"),
        );
        ResourceClient::new(descriptor, Arc::new(endpoints))
    }

    #[test]
    fn descriptor_settings() {
        let d = employee();
        assert_eq!(d.service(), "hr");
        assert_eq!(d.table(), "employee_display");
        assert_eq!(d.primary_key(), "id");
        assert_eq!(d.columns().len(), 4);
    }

    #[test]
    fn default_select_prepends_primary_key_without_duplicates() {
        assert_eq!(
            employee().columns_or_default(),
            Columns::from(["id", "first_name", "last_name", "team_id"])
        );
        let bare = ResourceDescriptor::builder("Bare").table("t").build();
        assert_eq!(bare.columns_or_default(), Columns::wildcard());
    }

    #[test]
    fn find_sql_merges_caller_options_over_defaults() {
        let c = client(employee());
        let sql = c
            .construct_sql_for_find(
                QueryOptions::new()
                    .conditions(Conditions::pairs([("team_id", 1)]))
                    .order(["last_name", "first_name"]),
            )
            .unwrap();
        assert_eq!(
            sql,
            "SELECT id,first_name,last_name,team_id FROM employee_display WHERE team_id=1 ORDER BY last_name,first_name"
        );

        let sql = c.construct_sql_for_find(QueryOptions::new().select("*").from("other")).unwrap();
        assert_eq!(sql, "SELECT * FROM other");
    }

    #[test]
    fn id_sql_uses_primary_key_condition() {
        let c = client(employee());
        assert_eq!(
            c.construct_sql_for_id("7923113").unwrap(),
            "SELECT id,first_name,last_name,team_id FROM employee_display WHERE id=7923113"
        );
        assert!(c.construct_sql_for_id("x'y").unwrap().ends_with("WHERE id='x'y'"));
    }

    #[test]
    fn build_all_produces_get_request() {
        let c = client(ResourceDescriptor::builder("T").service("hr").table("t").build());
        let req = c.build_all(QueryOptions::new().limit(1)).unwrap();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(
            req.url,
            "http://hr-atomics.example.com:8080/jAtomics/select/?version=1&q=SELECT%20*%20FROM%20t%20LIMIT%201"
        );
        assert!(req.headers.is_empty());
    }

    #[test]
    fn unknown_service_fails_before_any_request() {
        let c = client(ResourceDescriptor::builder("T").service("payroll").table("t").build());
        let transport = Canned::new(HttpResponse::ok(BODY));
        let err = c.all(&transport, QueryOptions::new()).unwrap_err();
        assert!(matches!(err, AtomicsError::UnknownService(_)));
        assert!(transport.seen.borrow().is_empty());
    }

    #[test]
    fn placeholder_mismatch_fails_before_any_request() {
        let c = client(employee());
        let transport = Canned::new(HttpResponse::ok(BODY));
        let options = QueryOptions::new().conditions(Conditions::positional("a = ? AND b = ?", ["x"]));
        let err = c.all(&transport, options).unwrap_err();
        assert!(matches!(err, AtomicsError::PlaceholderMismatch { .. }));
        assert!(transport.seen.borrow().is_empty());
    }

    #[test]
    fn all_first_last_follow_result_order() {
        let c = client(employee());
        let transport = Canned::new(HttpResponse::ok(BODY));

        let all = c.all(&transport, QueryOptions::new()).unwrap();
        assert_eq!(all.iter().map(Record::id).collect::<Vec<_>>(), [1, 2]);

        let first = c.first(&transport, QueryOptions::new()).unwrap().unwrap();
        assert_eq!(first.get("last_name"), Some("Adams"));

        let last = c.last(&transport, QueryOptions::new()).unwrap().unwrap();
        assert_eq!(last.get("last_name"), Some("Baker"));
        assert_eq!(transport.seen.borrow().len(), 3);
    }

    #[test]
    fn empty_results() {
        let c = client(employee());
        let transport = Canned::new(HttpResponse::ok("<results/>"));
        assert!(c.all(&transport, QueryOptions::new()).unwrap().is_empty());
        assert!(c.first(&transport, QueryOptions::new()).unwrap().is_none());
        assert!(c.last(&transport, QueryOptions::new()).unwrap().is_none());
        assert!(c.find_by_id(&transport, 5).unwrap().is_none());
    }

    #[test]
    fn find_by_id_returns_first_match() {
        let c = client(employee());
        let transport = Canned::new(HttpResponse::ok(BODY));
        let record = c.find_by_id(&transport, 1).unwrap().unwrap();
        assert_eq!(record.id(), 1);
        assert!(transport.seen.borrow()[0].ends_with("WHERE%20id=1"));
    }

    #[test]
    fn find_dispatches_on_scope() {
        let c = client(employee());
        let transport = Canned::new(HttpResponse::ok(BODY));
        match c.find(&transport, Scope::All, QueryOptions::new()).unwrap() {
            Found::Many(records) => assert_eq!(records.len(), 2),
            other => panic!("expected many, got {other:?}"),
        }
        match c.find(&transport, Scope::Last, QueryOptions::new()).unwrap() {
            Found::One(Some(record)) => assert_eq!(record.id(), 2),
            other => panic!("expected one, got {other:?}"),
        }
        // Caller options do not reach a lookup by id.
        c.find(&transport, Scope::Id("9".into()), QueryOptions::new().limit(3))
            .unwrap();
        let url = transport.seen.borrow().last().cloned().unwrap();
        assert!(url.ends_with("WHERE%20id=9"), "{url}");
    }

    #[test]
    fn non_success_status_is_an_http_error() {
        let c = client(employee());
        let transport = Canned::new(HttpResponse {
            status: 500,
            headers: Vec::new(),
            body: b"boom".to_vec(),
        });
        let err = c.all(&transport, QueryOptions::new()).unwrap_err();
        assert!(matches!(err, AtomicsError::Http { status: 500, ref body } if body == "boom"));
    }

    #[test]
    fn any_2xx_status_is_success() {
        let c = client(employee());
        let created = HttpResponse {
            status: 203,
            headers: Vec::new(),
            body: BODY.as_bytes().to_vec(),
        };
        assert_eq!(c.parse_records(created).unwrap().len(), 2);

        for status in [199, 304, 404] {
            let response = HttpResponse {
                status,
                headers: Vec::new(),
                body: Vec::new(),
            };
            let err = c.parse_records(response).unwrap_err();
            assert!(matches!(err, AtomicsError::Http { status: s, .. } if s == status));
        }
    }

    #[test]
    fn body_is_decoded_before_mapping() {
        let c = client(employee());
        let body = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\
            <results><record><field><name>id</name><value>7</value></field>\
            <field><name>city</name><value>Z\xFCrich</value></field></record></results>";
        let records = c.parse_records(HttpResponse::ok(&body[..])).unwrap();
        assert_eq!(records[0].get("city"), Some("Z\u{fc}rich"));

        let err = c.parse_records(HttpResponse::ok(&b"<results>\xFF</results>"[..])).unwrap_err();
        assert!(matches!(err, AtomicsError::Xml(_)));
    }

    #[test]
    fn malformed_body_returns_no_partial_results() {
        let c = client(employee());
        let body = "<results><record><field><name>id</name><value>1</value></field></record>\
            <record><field><name>id</name></field></record></results>";
        let err = c.parse_records(HttpResponse::ok(body)).unwrap_err();
        assert!(matches!(err, AtomicsError::MalformedResponse(_)));
    }
}
