// ==========================================
// 客户账单监控系统 - 角色门禁
// ==========================================
// 职责: 基于已校验身份的角色判断（身份校验本身不在本系统）
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::user::Principal;
use tracing::warn;

/// 要求管理角色（superadmin / admin）
pub fn require_privileged(principal: &Principal, operation: &str) -> ApiResult<()> {
    if principal.role.is_privileged() {
        return Ok(());
    }
    warn!(
        user_id = principal.user_id,
        role = principal.role.as_str(),
        operation,
        "越权操作被拒绝"
    );
    Err(ApiError::forbidden())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::Role;

    #[test]
    fn test_require_privileged() {
        assert!(require_privileged(&Principal::new(1, Role::Superadmin), "import").is_ok());
        assert!(require_privileged(&Principal::new(2, Role::Admin), "import").is_ok());
        assert!(matches!(
            require_privileged(&Principal::new(3, Role::Am), "import"),
            Err(ApiError::Forbidden(_))
        ));
    }
}
