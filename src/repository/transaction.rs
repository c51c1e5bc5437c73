// ==========================================
// 客户账单监控系统 - 批次事务句柄
// ==========================================
// 职责: 批量提交的原子边界
// 约束: commit / rollback 是仅有的两个终结操作；
//       句柄在未提交时被丢弃（含 ? 提前返回）即自动回滚
// ==========================================

use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::record_store::{BatchWriter, StageFn};
use chrono::{Local, NaiveDateTime};
use rusqlite::{Connection, Transaction};
use std::ops::Deref;
use tracing::{debug, warn};

pub struct BatchTransaction<'c> {
    tx: Transaction<'c>,
    staged: usize,
}

impl<'c> BatchTransaction<'c> {
    /// 在给定连接上开启事务
    pub fn begin(conn: &'c Connection) -> RepositoryResult<Self> {
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(Self { tx, staged: 0 })
    }

    /// 记录一条已写入（未提交）的行
    pub fn mark_staged(&mut self) {
        self.staged += 1;
    }

    /// 提交事务
    ///
    /// # 返回
    /// - Ok(usize): 本次提交的行数
    pub fn commit(self) -> RepositoryResult<usize> {
        let staged = self.staged;
        self.tx
            .commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        debug!(rows = staged, "批次事务已提交");
        Ok(staged)
    }

    /// 显式回滚
    pub fn rollback(self) -> RepositoryResult<()> {
        let staged = self.staged;
        self.tx
            .rollback()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        debug!(rows = staged, "批次事务已回滚");
        Ok(())
    }
}

impl Deref for BatchTransaction<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.tx
    }
}

/// 单行写入函数（由各 Repository 提供）
pub type InsertFn<R> = fn(&Connection, &R, NaiveDateTime) -> RepositoryResult<i64>;

// 事务内的暂存器：同一批次共用一个 created_at
struct TxWriter<'t, 'c, R> {
    tx: &'t mut BatchTransaction<'c>,
    insert: InsertFn<R>,
    now: NaiveDateTime,
}

impl<R> BatchWriter<R> for TxWriter<'_, '_, R> {
    fn stage(&mut self, record: &R) -> RepositoryResult<()> {
        (self.insert)(&**self.tx, record, self.now)?;
        self.tx.mark_staged();
        Ok(())
    }
}

/// 在新事务内执行暂存回调
///
/// 回调成功则提交；回调返回 Err 时显式回滚并原样返回该错误
pub fn run_batch<R>(
    conn: &Connection,
    insert: InsertFn<R>,
    stage: &mut StageFn<'_, R>,
) -> RepositoryResult<usize> {
    let mut tx = BatchTransaction::begin(conn)?;
    let outcome = {
        let mut writer = TxWriter {
            tx: &mut tx,
            insert,
            now: Local::now().naive_local(),
        };
        stage(&mut writer)
    };

    match outcome {
        Ok(()) => tx.commit(),
        Err(e) => {
            if let Err(rollback_err) = tx.rollback() {
                warn!(error = %rollback_err, "批次回滚失败");
            }
            Err(e)
        }
    }
}
