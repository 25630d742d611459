//! ArangoDB backend over the HTTP API.
//!
//! [`ArangoClient`] speaks to ArangoDB's REST interface with `reqwest`:
//!
//! | Operation | Request |
//! |-----------|---------|
//! | database exists | `GET /_db/{db}/_api/database/current` |
//! | create database | `POST /_api/database` |
//! | collection exists | `GET /_db/{db}/_api/collection/{name}` |
//! | create collection | `POST /_db/{db}/_api/collection` |
//! | ensure index | `POST /_db/{db}/_api/index?collection={name}` |
//! | truncate | `PUT /_db/{db}/_api/collection/{name}/truncate` |
//! | insert | `POST /_db/{db}/_api/document/{name}` |
//! | query | `POST /_db/{db}/_api/cursor`, then `PUT /_db/{db}/_api/cursor/{id}` |
//! | transactions | `POST .../_api/transaction/begin`, `PUT` / `DELETE .../_api/transaction/{id}` |
//!
//! Requests rotate over the configured endpoints. Requests that belong to a
//! streaming transaction carry the `x-arango-trx-id` header and, like
//! cursor continuations, stay on the endpoint that created them.

mod client;
mod cursor;

pub use client::ArangoClient;
