use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::value_objects::{
    check_in::{CheckInSnapshot, SnapshotClaim, SnapshotRevoke},
    recharge::RechargeSession,
    tracking_sessions::TrackingSession,
};

pub const TRACKING_SESSION_TTL_SECS: u64 = 60 * 60;
pub const CHECK_IN_SNAPSHOT_TTL_SECS: u64 = 4 * 60 * 60;
pub const RECHARGE_SESSION_TTL_SECS: u64 = 60 * 60;

#[async_trait]
#[automock]
pub trait StatusCache {
    async fn put_tracking_session(&self, tracking_id: String, session: TrackingSession)
    -> Result<()>;
    async fn get_tracking_session(&self, tracking_id: String) -> Result<Option<TrackingSession>>;

    async fn put_check_in_snapshot(&self, qr_code: String, snapshot: CheckInSnapshot)
    -> Result<()>;
    async fn get_check_in_snapshot(&self, qr_code: String) -> Result<Option<CheckInSnapshot>>;
    /// Atomically flips `checked` from false to true, keeping the TTL.
    async fn claim_check_in_snapshot(&self, qr_code: String) -> Result<SnapshotClaim>;
    /// Atomically deletes the snapshot unless it is already checked.
    async fn revoke_check_in_snapshot(&self, qr_code: String) -> Result<SnapshotRevoke>;
    /// Flips a claimed snapshot back to unchecked; a missing key stays missing.
    async fn release_check_in_snapshot(&self, qr_code: String) -> Result<()>;

    async fn put_recharge_session(&self, tran_id: String, session: RechargeSession) -> Result<()>;
    /// Reads and removes the session in one step; only one caller ever gets it.
    async fn take_recharge_session(&self, tran_id: String) -> Result<Option<RechargeSession>>;
    async fn delete_recharge_session(&self, tran_id: String) -> Result<()>;
}
