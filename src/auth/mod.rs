pub mod handlers;
pub mod session;
pub mod users;

pub use users::{insert_user, login_user, Registration};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
}
