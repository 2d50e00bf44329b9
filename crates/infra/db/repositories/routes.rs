use anyhow::{Result, anyhow};
use async_trait::async_trait;
use diesel::{
    prelude::*,
    sql_types::{BigInt, Double, Text},
};
use std::sync::Arc;

use crate::{
    domain::{
        entities::stops::StopEntity,
        repositories::routes::{FareCalculator, RouteStopRepository},
    },
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::stops},
};

// Length of the route line between the two stops, 2.5 per km with a floor of 10.
const FARE_SQL: &str = r#"
    SELECT GREATEST(10, (ST_Length(
        ST_LineSubstring(
            r.geom,
            LEAST(ST_LineLocatePoint(r.geom, s1.geom), ST_LineLocatePoint(r.geom, s2.geom)),
            GREATEST(ST_LineLocatePoint(r.geom, s1.geom), ST_LineLocatePoint(r.geom, s2.geom))
        )::geography
    ) / 1000) * 2.5) AS fare
    FROM routes r
    JOIN stops s1 ON r.id = s1.route_id
    JOIN stops s2 ON r.id = s2.route_id
    WHERE r.id = $1 AND s1.name = $2 AND s2.name = $3
"#;

#[derive(QueryableByName)]
struct FareRow {
    #[diesel(sql_type = Double)]
    fare: f64,
}

pub struct RoutePostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl RoutePostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl FareCalculator for RoutePostgres {
    async fn calculate_fare(
        &self,
        route_id: i64,
        from_stop: String,
        to_stop: String,
    ) -> Result<f64> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = diesel::sql_query(FARE_SQL)
            .bind::<BigInt, _>(route_id)
            .bind::<Text, _>(&from_stop)
            .bind::<Text, _>(&to_stop)
            .get_result::<FareRow>(&mut conn)
            .optional()?
            .ok_or_else(|| {
                anyhow!("no fare for route {route_id} between {from_stop} and {to_stop}")
            })?;

        Ok(row.fare)
    }
}

#[async_trait]
impl RouteStopRepository for RoutePostgres {
    async fn find_stop(&self, route_id: i64, name: String) -> Result<Option<StopEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let stop = stops::table
            .filter(stops::route_id.eq(route_id))
            .filter(stops::name.eq(name))
            .select(StopEntity::as_select())
            .first::<StopEntity>(&mut conn)
            .optional()?;

        Ok(stop)
    }
}
