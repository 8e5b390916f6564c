pub mod audit;
pub mod diagnosis;
pub mod disease;
pub mod enums;
pub mod filters;
pub mod recommendation;
pub mod report;
pub mod task;
pub mod user;

pub use audit::*;
pub use diagnosis::*;
pub use disease::*;
pub use filters::*;
pub use recommendation::*;
pub use report::*;
pub use task::*;
pub use user::*;
