use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error(transparent)]
    Driver(#[from] stm32f4_drivers::Error),
    #[error("bad address {0:?}")]
    Address(String),
    #[error("nothing to receive")]
    EmptyReceive,
}

pub type Result<T> = std::result::Result<T, ToolError>;
