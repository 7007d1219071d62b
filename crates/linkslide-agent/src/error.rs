use linkslide_core::errors::GatewayError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("max turns exceeded: {0}")]
    MaxTurnsExceeded(u32),
}
