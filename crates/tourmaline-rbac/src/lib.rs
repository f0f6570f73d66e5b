//! # tourmaline-rbac: Column-level access control
//!
//! Decides whether a user may read the tables and columns a query
//! references. The decision is a declarative table over
//! `(role, explicit grants/denies, public flag)`, decoupled from SQL
//! parsing and execution so it can be tested exhaustively on its own.
//!
//! ## Decision table
//!
//! Evaluated per `(table, column)` pair of the reference set, in order:
//!
//! | # | Condition                                            | Outcome  |
//! |---|------------------------------------------------------|----------|
//! | 1 | role is Admin                                        | pass     |
//! | 2 | explicit column-level deny                           | **deny** |
//! | 3 | explicit column-level grant                          | pass     |
//! | 4 | explicit table-wide deny                             | **deny** |
//! | 5 | explicit table-wide grant                            | pass     |
//! | 6 | role is Viewer and column is public in the catalog   | pass     |
//! | 7 | otherwise (default-deny)                             | **deny** |
//!
//! The most specific explicit rule wins; at equal specificity an explicit
//! deny beats a grant. A statement is allowed only if every pair passes;
//! the first failing pair is the reported reason.
//!
//! ## Example
//!
//! ```
//! use tourmaline_rbac::{evaluate, MemoryPermissionStore, Permission, PermissionStore, Role, Verdict};
//! use tourmaline_types::{CatalogBuilder, ColumnInfo, ColumnName, DataType, TableName, UserId};
//!
//! let catalog = CatalogBuilder::new()
//!     .table("employees", vec![ColumnInfo::new("name", DataType::Text)])
//!     .build();
//!
//! let store = MemoryPermissionStore::new();
//! let user = UserId::new(7);
//! store.grant(Permission::grant(user, "employees", Some("name")));
//!
//! let table = TableName::from("employees");
//! let column = ColumnName::from("name");
//! let verdict = evaluate(
//!     Role::Analyst,
//!     &store.permissions_for(user),
//!     [(&table, &column)],
//!     &catalog,
//! );
//! assert_eq!(verdict, Verdict::Allow);
//! ```

mod evaluator;
mod permissions;
mod roles;

pub use evaluator::{Verdict, evaluate};
pub use permissions::{AccessLevel, MemoryPermissionStore, Permission, PermissionStore};
pub use roles::Role;
