/*!
Data structures shared by the loaders, the computations and the sinks.
*/
mod network;
mod origin;
mod results;
mod snapshot;

pub use network::*;
pub use origin::*;
pub use results::*;
pub use snapshot::*;
