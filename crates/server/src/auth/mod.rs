//! Authentication and authorization building blocks.

pub mod login;
pub mod password;
pub mod permissions;
pub mod policy;
pub mod reset;
pub mod throttle;

pub use login::Authenticator;
pub use password::PasswordHasher;
pub use permissions::{Capabilities, PermissionResolver};
pub use policy::{Decision, DenyReason, Operation, PolicyEngine, Resource};
pub use reset::PasswordResets;
pub use throttle::LoginThrottle;
