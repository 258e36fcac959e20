use crate::state::StateError;
use crate::theme::ThemeError;
use thiserror::Error;

pub type AppResult<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Theme(#[from] ThemeError),
    #[error("failed to encode output")]
    Output(#[from] serde_json::Error),
}
