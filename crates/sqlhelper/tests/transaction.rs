mod common;

use common::{RecordingDriver, RecordingLogger};
use sqlhelper::{
    Driver, Select, SqlError, SqlHelper, SqlResult, TransactionEvent, Update, UpdateOrInsert,
    WhereSpec,
};
use serde_json::json;
use tracing::Level;

fn helper() -> (SqlHelper<RecordingDriver>, RecordingLogger) {
    let logger = RecordingLogger::default();
    let helper = SqlHelper::new(RecordingDriver::new()).with_logger(logger.clone());
    (helper, logger)
}

#[tokio::test]
async fn commit_is_idempotent() {
    let (helper, logger) = helper();
    let tx = helper.begin().await.unwrap();

    helper.commit(&tx).await.unwrap();
    helper.commit(&tx).await.unwrap();
    helper.rollback(&tx).await;

    assert!(tx.is_finished());
    assert_eq!(helper.driver().commits(), vec![tx.id().clone()]);
    assert!(helper.driver().rollbacks().is_empty());
    assert_eq!(
        logger.events(),
        vec![TransactionEvent::Begin, TransactionEvent::Commit]
    );
}

#[tokio::test]
async fn rollback_is_idempotent() {
    let (helper, logger) = helper();
    let tx = helper.begin().await.unwrap();

    helper.rollback(&tx).await;
    helper.rollback(&tx).await;
    helper.commit(&tx).await.unwrap();

    assert_eq!(helper.driver().rollbacks().len(), 1);
    assert!(helper.driver().commits().is_empty());
    assert_eq!(
        logger.events(),
        vec![TransactionEvent::Begin, TransactionEvent::Rollback]
    );
}

#[tokio::test]
async fn failed_commit_leaves_handle_open() {
    let (helper, _) = helper();
    let tx = helper.begin().await.unwrap();
    helper.driver().fail_commit();

    let err = helper.commit(&tx).await.unwrap_err();
    assert!(matches!(err, SqlError::Driver(_)));
    assert!(!tx.is_finished());

    helper.rollback(&tx).await;
    assert!(tx.is_finished());
    assert_eq!(helper.driver().rollbacks(), vec![tx.id().clone()]);
}

#[tokio::test]
async fn rollback_failure_is_swallowed() {
    let (helper, logger) = helper();
    helper.driver().fail_rollback();
    let tx = helper.begin().await.unwrap();

    helper.rollback(&tx).await;
    assert!(tx.is_finished());
    assert_eq!(helper.driver().rollbacks().len(), 1);
    assert_eq!(logger.events(), vec![TransactionEvent::Begin]);
    assert_eq!(
        logger.failures(),
        vec![("rollback".to_string(), Some(tx.id().clone()), Level::WARN)]
    );
}

#[tokio::test]
async fn dropped_open_handle_is_released() {
    let (helper, logger) = helper();
    let id = {
        let tx = helper.begin().await.unwrap();
        tx.id().clone()
    };

    assert_eq!(helper.driver().released(), vec![id.clone()]);
    assert_eq!(
        logger.events(),
        vec![TransactionEvent::Begin, TransactionEvent::Abandon]
    );
    assert_eq!(logger.event_ids(), vec![id.clone(), id]);
    assert!(helper.driver().commits().is_empty());
}

#[tokio::test]
async fn early_return_releases_the_transaction() {
    async fn debit(helper: &SqlHelper<RecordingDriver>) -> SqlResult<()> {
        let tx = helper.begin().await?;
        helper
            .update(
                Update::table("accounts")
                    .set("balance = 0")
                    .filter(WhereSpec::new().and("id", 1))
                    .transaction(&tx),
            )
            .await?;
        helper.commit(&tx).await
    }

    let (helper, _) = helper();
    helper
        .driver()
        .push_error(SqlError::driver("lock wait timeout exceeded"));

    assert!(debit(&helper).await.is_err());
    assert_eq!(helper.driver().begun(), 1);
    assert_eq!(helper.driver().released().len(), 1);
}

#[tokio::test]
async fn finished_handles_are_not_released() {
    let (helper, logger) = helper();
    let committed = helper.begin().await.unwrap();
    helper.commit(&committed).await.unwrap();
    let rolled_back = helper.begin().await.unwrap();
    helper.rollback(&rolled_back).await;
    drop(committed);
    drop(rolled_back);

    assert!(helper.driver().released().is_empty());
    assert!(!logger.events().contains(&TransactionEvent::Abandon));
}

#[tokio::test]
async fn release_waits_for_the_last_clone() {
    let (helper, _) = helper();
    let tx = helper.begin().await.unwrap();
    let copy = tx.clone();

    drop(tx);
    assert!(helper.driver().released().is_empty());
    assert!(!copy.is_finished());

    drop(copy);
    assert_eq!(helper.driver().released().len(), 1);
}

#[tokio::test]
async fn run_in_transaction_does_not_release_finished_handle() {
    let (helper, _) = helper();
    helper
        .run_in_transaction(|_tx| async { Err::<(), _>(SqlError::param("params error")) })
        .await
        .unwrap_err();
    helper
        .run_in_transaction(|_tx| async { Ok::<_, SqlError>(()) })
        .await
        .unwrap();

    assert!(helper.driver().released().is_empty());
}

#[tokio::test]
async fn begin_failure_is_returned() {
    let (helper, _) = helper();
    helper.driver().fail_begin();
    let err = helper.begin().await.unwrap_err();
    assert!(err.is_connection());

    let err = helper
        .run_in_transaction(|_tx| async { Ok::<_, SqlError>(()) })
        .await
        .unwrap_err();
    assert!(err.is_connection());
    assert!(helper.driver().commits().is_empty());
}

#[tokio::test]
async fn statements_carry_the_transaction_id() {
    let (helper, logger) = helper();
    let tx = helper.begin().await.unwrap();

    helper
        .select(Select::table("accounts").transaction(&tx))
        .await
        .unwrap();
    helper
        .update(
            Update::table("accounts")
                .set("balance = balance - 1")
                .filter(WhereSpec::new().and("id", 1))
                .transaction(&tx),
        )
        .await
        .unwrap();
    helper.commit(&tx).await.unwrap();

    for call in helper.driver().calls() {
        assert_eq!(call.transaction.as_ref(), Some(tx.id()));
    }
    for (_, id, _) in logger.statements() {
        assert_eq!(id.as_ref(), Some(tx.id()));
    }
}

#[tokio::test]
async fn run_in_transaction_commits_on_success() {
    let (helper, _) = helper();
    let value = helper
        .run_in_transaction(|tx| {
            let helper = &helper;
            async move {
                helper
                    .select(Select::table("accounts").transaction(&tx))
                    .await?;
                Ok::<_, SqlError>(42)
            }
        })
        .await
        .unwrap();

    assert_eq!(value, 42);
    assert_eq!(helper.driver().commits().len(), 1);
    assert!(helper.driver().rollbacks().is_empty());
}

#[tokio::test]
async fn run_in_transaction_rolls_back_on_error() {
    let (helper, _) = helper();
    let err = helper
        .run_in_transaction(|_tx| async { Err::<(), _>(SqlError::param("params error")) })
        .await
        .unwrap_err();

    assert!(err.is_param());
    assert!(helper.driver().commits().is_empty());
    assert_eq!(helper.driver().rollbacks().len(), 1);
}

#[tokio::test]
async fn run_in_transaction_rolls_back_when_commit_fails() {
    let (helper, _) = helper();
    helper.driver().fail_commit();

    let err = helper
        .run_in_transaction(|_tx| async { Ok::<_, SqlError>(()) })
        .await
        .unwrap_err();

    assert!(matches!(err, SqlError::Driver(_)));
    assert_eq!(helper.driver().rollbacks().len(), 1);
}

async fn transfer(helper: &SqlHelper<RecordingDriver>, fail: bool) -> SqlResult<u64> {
    sqlhelper::transaction!(helper, tx, {
        let moved = helper
            .update(
                Update::table("accounts")
                    .set("balance = balance - 100")
                    .filter(WhereSpec::new().and("id", 1))
                    .transaction(&tx),
            )
            .await?;
        if fail {
            return Err(SqlError::param("insufficient funds"));
        }
        Ok::<_, SqlError>(moved)
    })
}

#[tokio::test]
async fn transaction_macro_commits_and_rolls_back() {
    let (helper, _) = helper();
    assert_eq!(transfer(&helper, false).await.unwrap(), 0);
    assert_eq!(helper.driver().commits().len(), 1);

    assert!(transfer(&helper, true).await.unwrap_err().is_param());
    assert_eq!(helper.driver().commits().len(), 1);
    assert_eq!(helper.driver().rollbacks().len(), 1);
}

#[tokio::test]
async fn update_or_insert_updates_existing_row() {
    let (helper, _) = helper();
    helper.driver().push_rows(vec![json!({"id": 11})]);

    let id = helper
        .update_or_insert(
            UpdateOrInsert::table("balances")
                .values(common::row(json!({"amount": 5})))
                .filter(WhereSpec::new().and("user_id", 7)),
        )
        .await
        .unwrap();

    assert_eq!(id, Some(11));
    assert_eq!(
        helper.driver().sqls(),
        vec![
            "select id from balances where user_id = '7' limit 0, 1",
            "update balances set amount = '5' where user_id = '7'",
        ]
    );
    assert_eq!(helper.driver().begun(), 1);
    assert_eq!(helper.driver().commits().len(), 1);
    let calls = helper.driver().calls();
    assert!(calls.iter().all(|c| c.transaction.is_some()));
}

#[tokio::test]
async fn update_or_insert_inserts_missing_row() {
    let (helper, _) = helper();
    helper
        .driver()
        .push_rows(vec![])
        .push_output(sqlhelper::QueryOutput::Inserted(sqlhelper::InsertResult {
            insert_id: Some(31),
            affected_rows: 1,
        }));

    let id = helper
        .update_or_insert(
            UpdateOrInsert::table("balances")
                .values(common::row(json!({"amount": 5})))
                .filter(WhereSpec::new().and("user_id", 7)),
        )
        .await
        .unwrap();

    assert_eq!(id, Some(31));
    assert_eq!(
        helper.driver().sqls()[1],
        "insert into balances (amount,user_id) values ('5','7')"
    );
    assert_eq!(helper.driver().commits().len(), 1);
}

#[tokio::test]
async fn update_or_insert_rolls_back_own_transaction_on_error() {
    let (helper, _) = helper();
    helper
        .driver()
        .push_rows(vec![json!({"id": 1})])
        .push_error(SqlError::driver("lock wait timeout exceeded"));

    let err = helper
        .update_or_insert(
            UpdateOrInsert::table("balances")
                .values(common::row(json!({"amount": 5})))
                .filter(WhereSpec::new().and("user_id", 7)),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, SqlError::Driver(_)));
    assert!(helper.driver().commits().is_empty());
    assert_eq!(helper.driver().rollbacks().len(), 1);
}

#[tokio::test]
async fn update_or_insert_leaves_caller_transaction_open() {
    let (helper, _) = helper();
    let tx = helper.begin().await.unwrap();
    helper.driver().push_rows(vec![json!({"id": 4})]);

    let id = helper
        .update_or_insert(
            UpdateOrInsert::table("balances")
                .values(common::row(json!({"amount": 5})))
                .filter(WhereSpec::new().and("user_id", 7))
                .transaction(&tx),
        )
        .await
        .unwrap();

    assert_eq!(id, Some(4));
    assert_eq!(helper.driver().begun(), 1);
    assert!(helper.driver().commits().is_empty());
    assert!(!tx.is_finished());
    for call in helper.driver().calls() {
        assert_eq!(call.transaction.as_ref(), Some(tx.id()));
    }
}

#[tokio::test]
async fn update_or_insert_validates_before_beginning() {
    let (helper, _) = helper();
    let err = helper
        .update_or_insert(UpdateOrInsert::table("balances"))
        .await
        .unwrap_err();
    assert!(err.is_param());
    assert_eq!(helper.driver().begun(), 0);
}

#[tokio::test]
async fn driver_can_be_used_directly() {
    let driver = RecordingDriver::new();
    let id = driver.begin_transaction().await.unwrap();
    driver.commit(&id).await.unwrap();
    assert_eq!(driver.commits(), vec![id]);
}
