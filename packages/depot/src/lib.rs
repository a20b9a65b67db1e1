pub mod criteria;
pub mod database;
pub mod depot;
pub mod entity;
pub mod error;
pub mod object;

pub use criteria::{Criterion, FieldValue, Operator};
pub use database::{DatabaseConfig, init_db};
pub use depot::{Depot, Search};
pub use error::{DepotError, Result};
pub use object::{Field, Stored};
