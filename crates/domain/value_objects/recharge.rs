use serde::{Deserialize, Serialize};

pub const ALLOWED_RECHARGE_AMOUNTS: [i64; 6] = [50, 100, 200, 300, 400, 500];

/// Pending recharge kept under `recharge:<tranId>` until the gateway confirms it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RechargeSession {
    pub user_id: i64,
    pub amount: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InitRechargeRequest {
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RechargeInitDto {
    pub payment_url: String,
    pub tran_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RechargeCompletedDto {
    pub user_id: i64,
    pub amount: f64,
    pub balance: f64,
}
