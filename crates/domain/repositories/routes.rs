use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::entities::stops::StopEntity;

/// Fare between two named stops of a route. Distance math lives behind this seam.
#[async_trait]
#[automock]
pub trait FareCalculator {
    async fn calculate_fare(&self, route_id: i64, from_stop: String, to_stop: String)
    -> Result<f64>;
}

#[async_trait]
#[automock]
pub trait RouteStopRepository {
    async fn find_stop(&self, route_id: i64, name: String) -> Result<Option<StopEntity>>;
}
