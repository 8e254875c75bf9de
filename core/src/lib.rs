//! Minimal record mapper for Atomics-style tabular query services.
//!
//! # Overview
//! A record class is described once (`ResourceDescriptor`): service name,
//! table, primary key, columns. Lookups turn `QueryOptions` into a SQL-like
//! query string, send it with one blocking HTTP GET to the service named in
//! `Endpoints`, and map the XML `results` document to `Record`s.
//!
//! # Design
//! - Query building, URL composition and response mapping are pure and
//!   deterministic; only `Transport::execute` touches the network.
//! - `ResourceClient` exposes the host-does-IO split (`build_*` produces an
//!   `HttpRequest`, `parse_records` consumes an `HttpResponse`) alongside
//!   blocking conveniences (`all`, `first`, `last`, `find_by_id`, `find`).
//! - Descriptors and endpoints are immutable and shared via `Arc`, so one
//!   client can serve many threads.
//!
//! ```no_run
//! use std::sync::Arc;
//! use atomics_core::{Conditions, Endpoint, Endpoints, QueryOptions, ResourceClient, ResourceDescriptor, UreqTransport};
//!
//! # fn main() -> Result<(), atomics_core::AtomicsError> {
//! let endpoints = Endpoints::new().insert("hr", Endpoint::new("hr-atomics.newco.com", 8080, "/jAtomics/select/?version=1"));
//! let employees = ResourceDescriptor::builder("Employee")
//!     .service("hr")
//!     .table("employee_display")
//!     .primary_key("id")
//!     .columns(["first_name", "last_name", "title", "team_id"])
//!     .build();
//! let client = ResourceClient::new(employees, Arc::new(endpoints));
//!
//! let options = QueryOptions::new()
//!     .conditions(Conditions::pairs([("team_id", 1)]))
//!     .order(["last_name", "first_name"]);
//! for e in client.all(&UreqTransport::new(), options)? {
//!     println!("{},{}: {}", e.attribute("last_name")?, e.attribute("first_name")?, e.attribute("title")?);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod record;
pub mod resource;
pub mod response;
pub mod sql;
pub mod url;

pub use config::{Endpoint, Endpoints};
pub use error::AtomicsError;
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport, UreqTransport};
pub use record::{Accessor, Attributes, Record};
pub use resource::{Found, ResourceClient, ResourceDescriptor, ResourceDescriptorBuilder, Scope};
pub use sql::{construct_sql, construct_sql_for_conditions, quote_value, Columns, Conditions, QueryOptions};
pub use url::construct_url_for_sql;
