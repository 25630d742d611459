//! Document store implementations.
//!
//! Each backend implements [`DocumentClient`](crate::core::DocumentClient).
//!
//! | Backend | Feature | Description |
//! |---------|---------|-------------|
//! | ArangoDB | `arangodb` | HTTP client for ArangoDB single servers and clusters |
//! | Memory | always | In-process store for tests and embedded use |

#[cfg(feature = "arangodb")]
pub mod arangodb;

pub mod memory;
