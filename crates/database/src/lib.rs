mod criteria;
mod error;
mod memory;
mod store;
mod value;

#[cfg(feature = "postgres")]
mod postgres;

pub mod schema;

pub use criteria::{FilterCondition, OrderDirection, QueryCriteria};
pub use error::StoreError;
pub use memory::MemoryStore;
pub use store::DestinationStore;
pub use value::{PgEnum, Row, SqlValue};

#[cfg(feature = "postgres")]
pub use postgres::{DatabaseInfo, PgStore};
