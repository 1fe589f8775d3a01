/// Router Module Index
///
/// Splits the routing table by access level so that authentication is applied
/// per module in `create_router`, never per handler by accident.

/// Routes open to anonymous clients: login, bootstrap and read-only listings.
pub mod public;

/// Routes behind the `AuthUser` layer: any role may create, edit and delete
/// exhibits and articles.
pub mod authenticated;

/// Routes behind the `AuthUser` layer that additionally require the admin role
/// (checked in the handlers).
pub mod admin;
