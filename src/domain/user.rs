// ==========================================
// 客户账单监控系统 - 用户与调用主体
// ==========================================
// 说明: 用户管理不在本系统范围，此处仅作外键查询对象
// ==========================================

use crate::domain::types::Role;
use serde::{Deserialize, Serialize};

/// 用户（客户经理 / 管理员）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub name: String,
    pub role: Role,
    pub active: bool,
}

/// 已通过身份校验的调用主体
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: i64,
    pub role: Role,
}

impl Principal {
    pub fn new(user_id: i64, role: Role) -> Self {
        Self { user_id, role }
    }

    /// 查询归属过滤条件
    ///
    /// # 返回
    /// - am: 强制只看自己（忽略传入的过滤条件）
    /// - 管理角色: 使用传入的过滤条件（None 表示全部）
    pub fn owner_scope(&self, requested: Option<i64>) -> Option<i64> {
        if self.role.is_privileged() {
            requested
        } else {
            Some(self.user_id)
        }
    }
}

impl From<&User> for Principal {
    fn from(user: &User) -> Self {
        Principal::new(user.id, user.role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_scope() {
        let am = Principal::new(7, Role::Am);
        assert_eq!(am.owner_scope(None), Some(7));
        assert_eq!(am.owner_scope(Some(3)), Some(7));

        let admin = Principal::new(1, Role::Admin);
        assert_eq!(admin.owner_scope(None), None);
        assert_eq!(admin.owner_scope(Some(3)), Some(3));
    }
}
