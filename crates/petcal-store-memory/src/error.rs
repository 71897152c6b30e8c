//! Error type for `petcal-store-memory`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] petcal_core::Error),

  /// Only surfaced by history reads; audit writes never fail a mutation.
  #[error("audit log error: {0}")]
  Audit(#[from] crate::audit::AuditError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
