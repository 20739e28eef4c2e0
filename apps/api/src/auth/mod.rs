//! Authentication and role-based authorization.
//!
//! Tokens are HS256 JWTs carrying the user id and role. Guards ignore the
//! token's role and use the one currently stored for the account, so a role
//! change or account deletion takes effect on the next request.

pub mod directory;
pub mod handlers;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod roles;

pub use jwt::JwtKeys;
pub use middleware::AuthUser;
pub use roles::Role;
