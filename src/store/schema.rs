use sqlx::PgPool;

use crate::domain::order::{OrderStoreError, StoreOperation};

// ============================================================================
// Table Bootstrap
// ============================================================================
//
// Creates the `order` and `order_item` tables when they are missing. The
// store itself assumes the schema is present.
//
// ============================================================================

pub const ORDER_ID_UNIQUE: &str = "order_order_id_key";
pub const ORDER_ITEM_ORDER_FK: &str = "order_item_order_id_fkey";
pub const ORDER_ITEM_COUNT_POSITIVE: &str = "order_item_count_positive";

const STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS "order" (
        id            BIGSERIAL PRIMARY KEY,
        order_id      TEXT      NOT NULL,
        order_version BIGINT    NOT NULL DEFAULT 0,
        user_id       BIGINT    NOT NULL,
        order_data    TEXT      NOT NULL,
        status        SMALLINT  NOT NULL DEFAULT 0,
        CONSTRAINT order_order_id_key UNIQUE (order_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS order_item (
        id          BIGSERIAL   PRIMARY KEY,
        order_id    TEXT        NOT NULL,
        user_id     BIGINT      NOT NULL,
        sku_id      BIGINT      NOT NULL,
        count       INTEGER     NOT NULL,
        "timestamp" TIMESTAMPTZ NOT NULL,
        CONSTRAINT order_item_order_id_fkey FOREIGN KEY (order_id)
            REFERENCES "order" (order_id) ON UPDATE CASCADE ON DELETE CASCADE,
        CONSTRAINT order_item_count_positive CHECK (count > 0)
    )
    "#,
    r#"CREATE INDEX IF NOT EXISTS order_item_order_id_idx ON order_item (order_id)"#,
];

/// Create both tables if they do not exist yet. Safe to run repeatedly.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), OrderStoreError> {
    for statement in STATEMENTS {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| OrderStoreError::store(StoreOperation::Bootstrap, e))?;
    }

    tracing::info!("Order schema ensured");
    Ok(())
}
