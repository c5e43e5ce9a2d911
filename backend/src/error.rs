use thiserror::Error;

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("failed to build GPX document: {0}")]
    Gpx(#[from] gpx::errors::GpxError),
    #[error("route has no coordinates to export")]
    EmptyRoute,
}
