/// Router Module Index
///
/// Routes are split by the gate in front of them. `create_router` attaches the
/// gate to each group, so a handler's module decides its access level.

/// No gate.
pub mod public;

/// Gate with no required role.
pub mod authenticated;

/// Gate requiring `Role::Admin`. Nested under `/admin`.
pub mod admin;
