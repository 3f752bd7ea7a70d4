/// Router Module Index
///
/// Routes are split by access level so the authentication layer is applied to a whole
/// module at once rather than handler by handler.

/// Routes open to anonymous clients: registration, login and read-only news access.
pub mod public;

/// Routes behind the bearer-token layer: every news mutation and token refresh.
pub mod authenticated;
