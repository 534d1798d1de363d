/*
Fleet status aggregation and polling.

One aggregation cycle walks the discovery chain (device -> group -> robot
list) and then queries every robot's status under a short deadline,
folding unresponsive robots into a synthetic offline state. The poller
repeats that cycle on a fixed cadence and publishes each result as an
immutable snapshot.
*/

mod aggregate;
mod poll;
mod snapshot;

pub use aggregate::Aggregator;
pub use poll::{FleetPoller, PollState, RefreshOpts};
pub use snapshot::FleetSnapshot;
