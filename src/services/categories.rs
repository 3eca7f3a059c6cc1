use crate::{
    db::DbPool,
    entities::category::{self, Entity as CategoryEntity},
    entities::product::{self, Entity as ProductEntity},
    errors::ServiceError,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CategoryInput {
    #[validate(length(min = 1, max = 50, message = "Category name must be 1-50 characters"))]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CategoryResponse {
    pub id: Uuid,
    pub name: String,
    pub product_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CategoryResponse {
    fn from_model(model: category::Model, product_count: i64) -> Self {
        Self {
            id: model.id,
            name: model.name,
            product_count,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Clone)]
pub struct CategoryService {
    db_pool: Arc<DbPool>,
}

impl CategoryService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    fn normalize(input: CategoryInput) -> Result<String, ServiceError> {
        let normalized = CategoryInput {
            name: input.name.trim().to_string(),
        };
        normalized.validate()?;
        Ok(normalized.name)
    }

    async fn find(&self, id: Uuid) -> Result<category::Model, ServiceError> {
        CategoryEntity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Category {} not found", id)))
    }

    async fn product_count(&self, id: Uuid) -> Result<i64, ServiceError> {
        let count = ProductEntity::find()
            .filter(product::Column::CategoryId.eq(id))
            .count(&*self.db_pool)
            .await?;
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }

    /// Every category with the number of products filed under it.
    #[instrument(skip(self))]
    pub async fn list_categories(&self) -> Result<Vec<CategoryResponse>, ServiceError> {
        let db = &*self.db_pool;
        let categories = CategoryEntity::find()
            .order_by_asc(category::Column::Name)
            .all(db)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to list categories");
                ServiceError::DatabaseError(e)
            })?;

        let counts: HashMap<Uuid, i64> = ProductEntity::find()
            .select_only()
            .column(product::Column::CategoryId)
            .column_as(Expr::col(product::Column::Id).count(), "product_count")
            .group_by(product::Column::CategoryId)
            .into_tuple::<(Uuid, i64)>()
            .all(db)
            .await?
            .into_iter()
            .collect();

        Ok(categories
            .into_iter()
            .map(|c| {
                let count = counts.get(&c.id).copied().unwrap_or(0);
                CategoryResponse::from_model(c, count)
            })
            .collect())
    }

    #[instrument(skip(self, input))]
    pub async fn create_category(
        &self,
        input: CategoryInput,
    ) -> Result<CategoryResponse, ServiceError> {
        let name = Self::normalize(input)?;
        let model = category::ActiveModel {
            name: Set(name),
            ..Default::default()
        }
        .insert(&*self.db_pool)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to create category");
            ServiceError::DatabaseError(e)
        })?;

        info!(category_id = %model.id, "Category created");
        Ok(CategoryResponse::from_model(model, 0))
    }

    #[instrument(skip(self, input), fields(category_id = %id))]
    pub async fn update_category(
        &self,
        id: Uuid,
        input: CategoryInput,
    ) -> Result<CategoryResponse, ServiceError> {
        let name = Self::normalize(input)?;
        let mut active = self.find(id).await?.into_active_model();
        active.name = Set(name);
        let model = active.update(&*self.db_pool).await?;

        let count = self.product_count(id).await?;
        Ok(CategoryResponse::from_model(model, count))
    }

    /// Deletes an empty category; categories that still hold products are kept.
    #[instrument(skip(self), fields(category_id = %id))]
    pub async fn delete_category(&self, id: Uuid) -> Result<(), ServiceError> {
        let model = self.find(id).await?;
        let count = self.product_count(id).await?;
        if count > 0 {
            return Err(ServiceError::Conflict(format!(
                "Cannot delete category with {} product(s)",
                count
            )));
        }

        CategoryEntity::delete_by_id(model.id)
            .exec(&*self.db_pool)
            .await?;
        info!("Category deleted");
        Ok(())
    }
}
