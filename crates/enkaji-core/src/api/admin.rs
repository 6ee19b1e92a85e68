//! Admin resource calls. Everything here goes through the session-aware
//! transport, so views never see a transient 401.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use super::error::ApiError;
use super::transport::{ApiRequest, SessionTransport};
use crate::models::{DashboardStats, Page, PaginationParams, Resource};

const DASHBOARD_STATS_ENDPOINT: &str = "/admin/dashboard/stats";
const SALES_ENDPOINT: &str = "/admin/analytics/sales";
const TOP_PRODUCTS_ENDPOINT: &str = "/admin/analytics/top-products";

#[derive(Serialize)]
struct StatusUpdate<'a> {
    status: &'a str,
}

/// Clone is cheap - the transport is shared.
#[derive(Clone)]
pub struct AdminApi {
    transport: Arc<SessionTransport>,
}

impl AdminApi {
    pub fn new(transport: Arc<SessionTransport>) -> Self {
        Self { transport }
    }

    pub async fn dashboard_stats(&self) -> Result<DashboardStats, ApiError> {
        self.transport.get(DASHBOARD_STATS_ENDPOINT).await
    }

    pub async fn list(
        &self,
        resource: Resource,
        params: &PaginationParams,
    ) -> Result<Page<Value>, ApiError> {
        let request = ApiRequest::get(resource.api_path()).with_query(params.to_query());
        self.transport.send(request).await
    }

    pub async fn get(&self, resource: Resource, id: &str) -> Result<Value, ApiError> {
        self.transport
            .get(&format!("{}/{}", resource.api_path(), id))
            .await
    }

    /// Create a record from a partial body; returns the stored record
    pub async fn create(&self, resource: Resource, record: &Value) -> Result<Value, ApiError> {
        self.transport.post(&resource.api_path(), record).await
    }

    /// Apply a partial update; returns the updated record
    pub async fn update(
        &self,
        resource: Resource,
        id: &str,
        changes: &Value,
    ) -> Result<Value, ApiError> {
        self.transport
            .put(&format!("{}/{}", resource.api_path(), id), changes)
            .await
    }

    /// Sales series for a period such as `week`, `month` or `year`
    pub async fn sales_data(&self, period: &str) -> Result<Value, ApiError> {
        let request = ApiRequest::get(SALES_ENDPOINT)
            .with_query(vec![("period".to_string(), period.to_string())]);
        self.transport.send(request).await
    }

    pub async fn top_products(&self, limit: u32) -> Result<Value, ApiError> {
        let request = ApiRequest::get(TOP_PRODUCTS_ENDPOINT)
            .with_query(vec![("limit".to_string(), limit.to_string())]);
        self.transport.send(request).await
    }

    pub async fn delete(&self, resource: Resource, id: &str) -> Result<(), ApiError> {
        self.transport
            .delete(&format!("{}/{}", resource.api_path(), id))
            .await
    }

    pub async fn update_order_status(&self, id: &str, status: &str) -> Result<Value, ApiError> {
        let path = format!("{}/{}/status", Resource::Orders.api_path(), id);
        self.transport.put(&path, &StatusUpdate { status }).await
    }
}
