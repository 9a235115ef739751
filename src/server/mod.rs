pub mod guards;
pub mod router;
pub mod routes;

pub use router::{RequestId, SubcastState, subcast_router};
