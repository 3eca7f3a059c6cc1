use crate::{
    db::DbPool,
    entities::category::{self, Entity as CategoryEntity},
    entities::order_item::{self, Entity as OrderItemEntity},
    entities::product::{self, Entity as ProductEntity},
    errors::ServiceError,
    services::image_store::{spawn_cleanup, ImageStore},
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, IntoActiveModel, PaginatorTrait,
    QueryFilter, QueryOrder, Set, SqlErr, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Smallest accepted product price.
pub const MIN_PRODUCT_PRICE: i64 = 1000;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateProductRequest {
    #[validate(length(min = 3, max = 30, message = "Product name must be 3-30 characters"))]
    pub name: String,
    #[validate(range(min = 1000, message = "Price must be at least 1000"))]
    pub price: i64,
    pub category_id: Uuid,
    #[validate(url(message = "Image URL must be a valid URL"))]
    pub image_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateProductRequest {
    #[validate(length(min = 3, max = 30, message = "Product name must be 3-30 characters"))]
    pub name: String,
    #[validate(range(min = 1000, message = "Price must be at least 1000"))]
    pub price: i64,
    pub category_id: Uuid,
    /// Replaces the current image only when present.
    #[validate(url(message = "Image URL must be a valid URL"))]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CategorySummary {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductResponse {
    pub id: Uuid,
    pub name: String,
    pub price: i64,
    pub category_id: Uuid,
    pub image_url: Option<String>,
    pub category: Option<CategorySummary>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductResponse {
    fn from_parts(model: product::Model, category: Option<category::Model>) -> Self {
        Self {
            id: model.id,
            name: model.name,
            price: model.price,
            category_id: model.category_id,
            image_url: model.image_url,
            category: category.map(|c| CategorySummary {
                id: c.id,
                name: c.name,
            }),
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Product listing filter: `all` or a single category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CategoryFilter {
    #[default]
    All,
    Category(Uuid),
}

impl CategoryFilter {
    pub fn parse(raw: Option<&str>) -> Result<Self, ServiceError> {
        match raw.map(str::trim) {
            None | Some("") => Ok(CategoryFilter::All),
            Some(value) if value.eq_ignore_ascii_case("all") => Ok(CategoryFilter::All),
            Some(value) => Uuid::parse_str(value)
                .map(CategoryFilter::Category)
                .map_err(|_| ServiceError::BadRequest(format!("Invalid category id: {}", value))),
        }
    }
}

#[derive(Clone)]
pub struct ProductService {
    db_pool: Arc<DbPool>,
    image_store: Arc<dyn ImageStore>,
}

impl ProductService {
    pub fn new(db_pool: Arc<DbPool>, image_store: Arc<dyn ImageStore>) -> Self {
        Self {
            db_pool,
            image_store,
        }
    }

    async fn ensure_category(&self, category_id: Uuid) -> Result<category::Model, ServiceError> {
        CategoryEntity::find_by_id(category_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Category {} not found", category_id)))
    }

    async fn find(&self, id: Uuid) -> Result<product::Model, ServiceError> {
        ProductEntity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", id)))
    }

    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        filter: CategoryFilter,
    ) -> Result<Vec<ProductResponse>, ServiceError> {
        let mut query = ProductEntity::find().order_by_asc(product::Column::Name);
        if let CategoryFilter::Category(category_id) = filter {
            query = query.filter(product::Column::CategoryId.eq(category_id));
        }

        let rows = query
            .find_also_related(CategoryEntity)
            .all(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to list products");
                ServiceError::DatabaseError(e)
            })?;

        Ok(rows
            .into_iter()
            .map(|(p, c)| ProductResponse::from_parts(p, c))
            .collect())
    }

    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn get_product(&self, id: Uuid) -> Result<ProductResponse, ServiceError> {
        let (product, category) = ProductEntity::find_by_id(id)
            .find_also_related(CategoryEntity)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", id)))?;
        Ok(ProductResponse::from_parts(product, category))
    }

    #[instrument(skip(self, request), fields(category_id = %request.category_id))]
    pub async fn create_product(
        &self,
        mut request: CreateProductRequest,
    ) -> Result<ProductResponse, ServiceError> {
        request.name = request.name.trim().to_string();
        request.validate()?;
        let category = self.ensure_category(request.category_id).await?;

        let model = product::ActiveModel {
            name: Set(request.name),
            price: Set(request.price),
            category_id: Set(request.category_id),
            image_url: Set(Some(request.image_url)),
            ..Default::default()
        }
        .insert(&*self.db_pool)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to create product");
            ServiceError::DatabaseError(e)
        })?;

        info!(product_id = %model.id, "Product created");
        Ok(ProductResponse::from_parts(model, Some(category)))
    }

    /// Updates a product. A replaced image is removed as non-critical cleanup.
    #[instrument(skip(self, request), fields(product_id = %id))]
    pub async fn update_product(
        &self,
        id: Uuid,
        mut request: UpdateProductRequest,
    ) -> Result<ProductResponse, ServiceError> {
        request.name = request.name.trim().to_string();
        request.validate()?;

        let existing = self.find(id).await?;
        let category = self.ensure_category(request.category_id).await?;
        let old_image = existing.image_url.clone();

        let mut active = existing.into_active_model();
        active.name = Set(request.name);
        active.price = Set(request.price);
        active.category_id = Set(request.category_id);
        if let Some(url) = &request.image_url {
            active.image_url = Set(Some(url.clone()));
        }
        let model = active.update(&*self.db_pool).await.map_err(|e| {
            error!(error = %e, "Failed to update product");
            ServiceError::DatabaseError(e)
        })?;

        if let (Some(new_url), Some(old_url)) = (request.image_url.as_ref(), old_image) {
            if *new_url != old_url {
                spawn_cleanup(self.image_store.clone(), old_url);
            }
        }

        Ok(ProductResponse::from_parts(model, Some(category)))
    }

    /// Deletes a product that no order references, then removes its image.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn delete_product(&self, id: Uuid) -> Result<(), ServiceError> {
        let product = self.find(id).await?;

        let txn = self.db_pool.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for product deletion");
            ServiceError::DatabaseError(e)
        })?;

        let references = OrderItemEntity::find()
            .filter(order_item::Column::ProductId.eq(id))
            .count(&txn)
            .await?;
        if references > 0 {
            return Err(referenced_by_orders());
        }

        delete_product_row(&txn, id).await?;
        txn.commit().await?;
        info!("Product deleted");

        if let Some(url) = product.image_url {
            spawn_cleanup(self.image_store.clone(), url);
        }
        Ok(())
    }
}

fn referenced_by_orders() -> ServiceError {
    ServiceError::Conflict("Cannot delete product that is part of existing orders".to_string())
}

/// An order item written after the reference check still trips the foreign
/// key; that is reported as the same conflict.
async fn delete_product_row<C>(db: &C, id: Uuid) -> Result<(), ServiceError>
where
    C: ConnectionTrait,
{
    ProductEntity::delete_by_id(id).exec(db).await.map_err(|e| {
        if matches!(e.sql_err(), Some(SqlErr::ForeignKeyConstraintViolation(_))) {
            return referenced_by_orders();
        }
        error!(error = %e, "Failed to delete product");
        ServiceError::DatabaseError(e)
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn category_filter_accepts_all_and_uuid() {
        assert_eq!(CategoryFilter::parse(None).unwrap(), CategoryFilter::All);
        assert_eq!(CategoryFilter::parse(Some("all")).unwrap(), CategoryFilter::All);

        let id = Uuid::new_v4();
        assert_eq!(
            CategoryFilter::parse(Some(&id.to_string())).unwrap(),
            CategoryFilter::Category(id)
        );
        assert_matches!(
            CategoryFilter::parse(Some("drinks")),
            Err(ServiceError::BadRequest(_))
        );
    }

    #[test]
    fn product_request_validation() {
        let valid = CreateProductRequest {
            name: "Es Teh".into(),
            price: MIN_PRODUCT_PRICE,
            category_id: Uuid::new_v4(),
            image_url: "https://cdn.example.com/products/es-teh.jpg".into(),
        };
        assert!(valid.validate().is_ok());

        let cheap = CreateProductRequest {
            price: 999,
            ..valid.clone()
        };
        assert!(cheap.validate().is_err());

        let short = CreateProductRequest {
            name: "Es".into(),
            ..valid.clone()
        };
        assert!(short.validate().is_err());

        let bad_url = CreateProductRequest {
            image_url: "not a url".into(),
            ..valid
        };
        assert!(bad_url.validate().is_err());
    }

    #[tokio::test]
    async fn foreign_key_violation_on_delete_is_a_conflict() {
        use crate::db::{establish_connection_with_config, run_migrations, DbConfig};
        use crate::entities::order::{self, OrderStatus};

        let db = establish_connection_with_config(&DbConfig::in_memory_sqlite())
            .await
            .expect("connect");
        run_migrations(&db).await.expect("migrate");

        let category = category::ActiveModel {
            name: Set("Drinks".into()),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap();
        let product = product::ActiveModel {
            name: Set("Coffee".into()),
            price: Set(5000),
            category_id: Set(category.id),
            image_url: Set(None),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap();
        let order = order::ActiveModel {
            id: Set(Uuid::new_v4()),
            subtotal: Set(5000),
            tax: Set(500),
            grandtotal: Set(5500),
            status: Set(OrderStatus::AwaitingPayment),
            external_transaction_id: Set(None),
            payment_method_id: Set(None),
            paid_at: Set(None),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap();
        order_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(product.id),
            price: Set(5000),
            quantity: Set(1),
        }
        .insert(&db)
        .await
        .unwrap();

        // Skips the reference check, as a concurrent order would
        let err = delete_product_row(&db, product.id).await.unwrap_err();
        assert_matches!(err, ServiceError::Conflict(msg) if msg.contains("existing orders"));
        assert!(ProductEntity::find_by_id(product.id)
            .one(&db)
            .await
            .unwrap()
            .is_some());
    }
}
