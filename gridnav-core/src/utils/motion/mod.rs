//! Motion primitives for driving on a line grid.
//!
//! - `follower`: proportional line following until a segment ends
//! - `turn`: gyro-then-sensor turns onto a new line
//! - `intersection`: centering on an intersection and reporting exits
//! - `calibration`: the one-time startup calibration sequence
//!
//! Every primitive is a blocking loop over [`wait_until`]; none of them time out.

pub mod calibration;
pub mod follower;
pub mod intersection;
pub mod turn;

pub use calibration::CalibrationSequencer;
pub use follower::{FollowState, SegmentEnd, SegmentFollower};
pub use intersection::{IntersectionProber, IntersectionReport};
pub use turn::{TurnDirection, TurnExecutor, TurnPhase};

use crate::utils::controllers::driver::NavError;

/// Run `cycle` until it reports completion, sampling once per call.
///
/// Each call does one control cycle's worth of work and returns `Ok(true)` when
/// the wait is over. Errors end the wait immediately.
pub fn wait_until<F>(mut cycle: F) -> Result<(), NavError>
where
    F: FnMut() -> Result<bool, NavError>,
{
    while !cycle()? {}
    Ok(())
}
