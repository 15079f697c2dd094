// Library root: the squad decision layer. Player model, resale accounting,
// lineup and squad solvers, transfer search and chip heuristics. No I/O.

pub mod chips;
pub mod error;
pub mod finance;
pub mod fixtures;
pub mod lineup;
pub mod player;
pub mod selection;
pub mod squad;
pub mod squad_builder;
pub mod transfers;

pub use error::{OptimizerError, Result};
pub use player::{PlayerPool, PlayerRecord, Position};
pub use squad::Squad;
