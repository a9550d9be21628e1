//! Persistent ELO leaderboard for singles or fixed-pair doubles leagues.

pub mod competitor;
pub mod constants;
pub mod elo;
pub mod error;
pub mod ledger;
pub mod menu;
pub mod storage;
