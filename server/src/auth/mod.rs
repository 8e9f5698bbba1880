pub mod extractor;
pub mod password;
pub mod token;

pub use extractor::{AdminUser, AuthUser};
pub use password::{hash_password, verify_password};
pub use token::{Claims, TokenConfig, TokenIssuer};
