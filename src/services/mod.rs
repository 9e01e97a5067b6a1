pub mod user_admin;

pub use user_admin::{NewUser, UserAdminError, UserAdminService, UserUpdate};
