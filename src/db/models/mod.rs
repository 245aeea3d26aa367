//! Database models split into separate files.
//! This module re-exports individual model modules so imports like
//! `use crate::db::models::*;` keep working.

pub mod invitation;
pub mod membership;
pub mod page_permission;
pub mod site;
pub mod user;

pub use self::invitation::*;
pub use self::membership::*;
pub use self::page_permission::*;
pub use self::site::*;
pub use self::user::*;
