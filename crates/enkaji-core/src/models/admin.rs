//! Admin REST resources as the console sees them.
//!
//! Record bodies stay as `serde_json::Value`; the console only needs the
//! pagination envelope and the dashboard counters.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Products,
    Orders,
    Users,
    Reviews,
}

impl Resource {
    pub const ALL: [Resource; 4] = [
        Resource::Products,
        Resource::Orders,
        Resource::Users,
        Resource::Reviews,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "products" | "product" => Some(Resource::Products),
            "orders" | "order" => Some(Resource::Orders),
            "users" | "user" => Some(Resource::Users),
            "reviews" | "review" => Some(Resource::Reviews),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Resource::Products => "products",
            Resource::Orders => "orders",
            Resource::Users => "users",
            Resource::Reviews => "reviews",
        }
    }

    /// REST collection path
    pub fn api_path(&self) -> String {
        format!("/admin/{}", self.name())
    }

    /// In-app view path, guarded by the route guard
    pub fn view_path(&self) -> String {
        format!("/{}", self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PaginationParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<SortOrder>,
}

impl PaginationParams {
    /// Query pairs in the backend's camelCase names; unset fields are omitted
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();
        if let Some(page) = self.page {
            query.push(("page".to_string(), page.to_string()));
        }
        if let Some(limit) = self.limit {
            query.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(ref search) = self.search {
            if !search.is_empty() {
                query.push(("search".to_string(), search.clone()));
            }
        }
        if let Some(ref sort_by) = self.sort_by {
            query.push(("sortBy".to_string(), sort_by.clone()));
        }
        if let Some(order) = self.sort_order {
            query.push(("sortOrder".to_string(), order.as_str().to_string()));
        }
        query
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub total_pages: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DashboardStats {
    pub total_users: u64,
    pub total_products: u64,
    pub total_orders: u64,
    pub total_revenue: f64,
    pub pending_orders: u64,
    pub completed_orders: u64,
    pub cancelled_orders: u64,
    pub out_of_stock_products: u64,
}
