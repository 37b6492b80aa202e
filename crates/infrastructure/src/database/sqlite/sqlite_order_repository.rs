use async_trait::async_trait;
use chrono::Utc;
use scaler_core::{ScalingError, ScalingResult};
use scaler_domain::entities::{
    NewOrder, Order, OrderDevice, OrderDeviceStatus, OrderStatusUpdate,
};
use scaler_domain::repositories::OrderRepository;
use sqlx::SqlitePool;
use tracing::instrument;

use crate::database::mapping::{
    DetailColumns, OrderDeviceRow, OrderRow, ORDER_DEVICE_COLUMNS, ORDER_SELECT,
};
use crate::error_handling::{RepositoryErrorHelpers, RepositoryOperation};
use crate::op_context;

pub struct SqliteOrderRepository {
    pool: SqlitePool,
}

impl SqliteOrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn insert_order(&self, order: &NewOrder) -> Result<(i64, chrono::DateTime<Utc>), sqlx::Error> {
        let now = Utc::now();
        let detail = DetailColumns::from(&order.detail);
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO orders (order_number, name, description, order_type, status, created_by, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&order.order_number)
        .bind(&order.name)
        .bind(&order.description)
        .bind(order.detail.order_type().as_str())
        .bind(order.status.as_str())
        .bind(&order.created_by)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        let order_id = inserted.last_insert_rowid();

        sqlx::query(
            r#"
            INSERT INTO elastic_scaling_order_details (
                order_id, cluster_id, strategy_id, action_type, resource_type, device_count,
                triggered_value, threshold_value, maintenance_start, maintenance_end,
                external_ticket_id, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(order_id)
        .bind(detail.cluster_id)
        .bind(detail.strategy_id)
        .bind(detail.action_type)
        .bind(detail.resource_type)
        .bind(detail.device_count)
        .bind(detail.triggered_value)
        .bind(detail.threshold_value)
        .bind(detail.maintenance_start)
        .bind(detail.maintenance_end)
        .bind(detail.external_ticket_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for device_id in &order.device_ids {
            sqlx::query(
                "INSERT INTO order_devices (order_id, device_id, status, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(order_id)
            .bind(device_id)
            .bind(OrderDeviceStatus::Pending.as_str())
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok((order_id, now))
    }
}

#[async_trait]
impl OrderRepository for SqliteOrderRepository {
    #[instrument(skip(self, order), fields(
        order.number = %order.order_number,
        order_type = %order.detail.order_type(),
        device_count = order.device_ids.len(),
    ))]
    async fn create(&self, order: &NewOrder) -> ScalingResult<Order> {
        let context = op_context!(RepositoryOperation::Create, "订单")
            .with_additional_info(order.order_number.clone());

        let (id, now) = self.insert_order(order).await.map_err(|e| {
            ScalingError::OrderCreation(
                RepositoryErrorHelpers::database_error(&context, e).to_string(),
            )
        })?;
        RepositoryErrorHelpers::log_operation_success(
            &context.with_id(id),
            Some(&format!("关联设备 {} 台", order.device_ids.len())),
        );

        Ok(Order {
            id,
            order_number: order.order_number.clone(),
            name: order.name.clone(),
            description: order.description.clone(),
            status: order.status,
            executor: None,
            execution_time: None,
            completion_time: None,
            failure_reason: None,
            created_by: order.created_by.clone(),
            created_at: now,
            updated_at: now,
            detail: order.detail.clone(),
        })
    }

    async fn find_by_id(&self, id: i64) -> ScalingResult<Option<Order>> {
        let context = op_context!(RepositoryOperation::Read, "订单", id = id);
        let row = sqlx::query_as::<_, OrderRow>(&format!("{ORDER_SELECT} WHERE o.id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        row.map(Order::try_from).transpose()
    }

    async fn find_by_ticket(&self, ticket_id: &str) -> ScalingResult<Vec<Order>> {
        let context = op_context!(RepositoryOperation::Query, "订单")
            .with_additional_info(format!("外部工单 {ticket_id}"));
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "{ORDER_SELECT} WHERE d.external_ticket_id = ? ORDER BY o.created_at DESC, o.id DESC"
        ))
        .bind(ticket_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        rows.into_iter().map(Order::try_from).collect()
    }

    #[instrument(skip(self, update), fields(order.id = id, status = %update.status))]
    async fn update_status(&self, id: i64, update: &OrderStatusUpdate) -> ScalingResult<Order> {
        let context = op_context!(RepositoryOperation::Update, "订单", id = id);
        let updated = sqlx::query(
            r#"
            UPDATE orders SET
                status = ?,
                executor = COALESCE(?, executor),
                execution_time = COALESCE(?, execution_time),
                completion_time = COALESCE(?, completion_time),
                failure_reason = COALESCE(?, failure_reason),
                updated_at = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(update.status.as_str())
        .bind(&update.executor)
        .bind(update.execution_time)
        .bind(update.completion_time)
        .bind(&update.failure_reason)
        .bind(Utc::now())
        .bind(id)
        .bind(update.expected_status.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?
        .rows_affected();

        if updated == 0 {
            let current = self
                .find_by_id(id)
                .await?
                .ok_or(ScalingError::OrderNotFound { id })?;
            return Err(ScalingError::InvalidStatusTransition {
                from: current.status.to_string(),
                to: update.status.to_string(),
            });
        }
        self.find_by_id(id)
            .await?
            .ok_or(ScalingError::OrderNotFound { id })
    }

    async fn find_devices(&self, order_id: i64) -> ScalingResult<Vec<OrderDevice>> {
        let context = op_context!(RepositoryOperation::Query, "订单设备", id = order_id);
        let rows = sqlx::query_as::<_, OrderDeviceRow>(&format!(
            "SELECT {ORDER_DEVICE_COLUMNS} FROM order_devices WHERE order_id = ? ORDER BY id"
        ))
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        rows.into_iter().map(OrderDevice::try_from).collect()
    }

    async fn update_device_status(
        &self,
        order_id: i64,
        device_id: i64,
        status: OrderDeviceStatus,
    ) -> ScalingResult<OrderDevice> {
        let context = op_context!(RepositoryOperation::Update, "订单设备", id = order_id)
            .with_additional_info(format!("设备 {device_id}"));
        let updated = sqlx::query(
            "UPDATE order_devices SET status = ?, updated_at = ? WHERE order_id = ? AND device_id = ?",
        )
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(order_id)
        .bind(device_id)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?
        .rows_affected();

        if updated == 0 {
            return Err(ScalingError::DeviceNotFound { id: device_id });
        }

        let row = sqlx::query_as::<_, OrderDeviceRow>(&format!(
            "SELECT {ORDER_DEVICE_COLUMNS} FROM order_devices WHERE order_id = ? AND device_id = ?"
        ))
        .bind(order_id)
        .bind(device_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;
        OrderDevice::try_from(row)
    }
}
