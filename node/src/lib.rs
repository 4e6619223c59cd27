//! Node state machine: stage transitions, leader election,
//! pending-block voting, chain sync and the serial message dispatcher
//! that owns all of it.

pub mod dispatch;
pub mod leader;
pub mod round;
pub mod state;

pub use dispatch::run;
pub use leader::is_leader;
pub use round::{spawn_discovery_reactor, spawn_round_timer};
pub use state::{Node, NodeConfig, Role, Stage};
