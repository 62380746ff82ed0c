// Re-export all model types
pub use self::cart::*;
pub use self::dish::*;
pub use self::enums::*;
pub use self::errors::*;
pub use self::ids::*;
pub use self::order::*;
pub use self::pagination::*;
pub use self::restaurant::*;
pub use self::user::*;
pub use self::validation::*;

mod cart;
mod dish;
mod enums;
mod errors;
mod ids;
mod order;
mod pagination;
mod restaurant;
mod user;
mod validation;
