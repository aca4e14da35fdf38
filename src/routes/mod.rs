//! HTTP route handlers outside the auth domain. Auth handlers live in
//! `crate::auth::routes` next to the components they expose.

pub mod health;
