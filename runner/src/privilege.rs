//! Privilege removal before launching a test.

use tracing::instrument;

use crate::error::PrivilegeError;
use crate::platform::{Native, ProcessControl};

/// Remove the named privilege from the current process token.
///
/// Windows: an unknown name is [`PrivilegeError::NotFound`]; a held privilege
/// is removed best-effort (a denied adjustment is logged, not returned); an
/// absent one is a no-op. Other platforms have no token privileges and always
/// succeed.
#[instrument]
pub fn drop_privilege(name: &str) -> Result<(), PrivilegeError> {
    Native::drop_privilege(name)
}
