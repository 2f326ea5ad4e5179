//! Datasource adapter
//!
//! | Type | Role |
//! |------|------|
//! | [`DatasourceFactory`] | Builds the connection from the `database` section |
//! | [`DatasourceConnection`] | Shared client handle, liveness via `SELECT 1` |
//! | [`DatasourceTemplate`] | Recovery-wrapped access |

pub mod postgres;
pub mod template;

pub use self::postgres::{DatasourceConnection, DatasourceFactory};
pub use template::DatasourceTemplate;
