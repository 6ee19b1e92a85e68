//! Data models for the admin console.
//!
//! - `AdminIdentity`, `LoginCredentials`: who is signed in and how they sign in
//! - `DashboardStats`, `Page`, `PaginationParams`, `Resource`: shapes of the
//!   admin REST resources

pub mod admin;
pub mod identity;

pub use admin::{DashboardStats, Page, PaginationParams, Resource, SortOrder};
pub use identity::{AdminIdentity, LoginCredentials};
