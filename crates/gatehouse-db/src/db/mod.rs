pub mod enums;
pub mod memory;
pub mod store;
pub mod transaction;

pub use memory::{MemoryStore, Seed};
pub use store::{CredentialStore, PermissionStore, TransactionRunner};
pub use transaction::WriteOp;
