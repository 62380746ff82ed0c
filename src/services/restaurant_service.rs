use std::sync::Arc;
use tracing::instrument;

use crate::config::PaginationConfig;
use crate::models::{
    normalize_search, CreateRestaurantRequest, Page, PageQuery, RepositoryError, Restaurant,
    ServiceError, ServiceResult, UpdateRestaurantRequest, Validate,
};
use crate::observability::{BusinessTracingMiddleware, Metrics};
use crate::repositories::{OrderRepository, RestaurantRepository};

/// Pickup locations
pub struct RestaurantService {
    repository: Arc<dyn RestaurantRepository>,
    order_repository: Arc<dyn OrderRepository>,
    page_size: u32,
    tracer: BusinessTracingMiddleware,
}

impl RestaurantService {
    pub fn new(
        repository: Arc<dyn RestaurantRepository>,
        order_repository: Arc<dyn OrderRepository>,
        pagination: &PaginationConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            repository,
            order_repository,
            page_size: pagination.restaurants_page_size,
            tracer: BusinessTracingMiddleware::new(metrics),
        }
    }

    /// One page of restaurants ordered by address
    #[instrument(skip(self))]
    pub async fn list_restaurants(&self, query: PageQuery) -> ServiceResult<Page<Restaurant>> {
        let restaurants = self
            .repository
            .find_all(normalize_search(query.search))
            .await?;

        let page = Page::paginate(restaurants, query.page.unwrap_or(1), self.page_size)?;
        crate::info_with_trace!("Listed {} of {} restaurants", page.items.len(), page.total_count);
        Ok(page)
    }

    #[instrument(skip(self))]
    pub async fn search_restaurants(&self, search: Option<String>) -> ServiceResult<Vec<Restaurant>> {
        Ok(self.repository.find_all(normalize_search(search)).await?)
    }

    #[instrument(skip(self), fields(restaurant_id = %id))]
    pub async fn get_restaurant(&self, id: &str) -> ServiceResult<Restaurant> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::RestaurantNotFound { id: id.to_string() })
    }

    #[instrument(skip(self, request))]
    pub async fn create_restaurant(
        &self,
        request: CreateRestaurantRequest,
    ) -> ServiceResult<Restaurant> {
        self.tracer
            .trace_catalog_operation("restaurant", "create", async {
                request.validate()?;

                let restaurant = self.repository.create(Restaurant::new(request)).await?;
                crate::info_with_trace!(restaurant_id = %restaurant.id, "Restaurant created");
                Ok::<_, ServiceError>(restaurant)
            })
            .await
    }

    #[instrument(skip(self, request), fields(restaurant_id = %id))]
    pub async fn update_restaurant(
        &self,
        id: &str,
        request: UpdateRestaurantRequest,
    ) -> ServiceResult<Restaurant> {
        self.tracer
            .trace_catalog_operation("restaurant", "update", async {
                request.validate()?;

                let mut restaurant = self.get_restaurant(id).await?;
                restaurant.update(request);

                let restaurant = self
                    .repository
                    .update(restaurant)
                    .await
                    .map_err(|e| match e {
                        RepositoryError::NotFound => {
                            ServiceError::RestaurantNotFound { id: id.to_string() }
                        }
                        other => other.into(),
                    })?;
                Ok::<_, ServiceError>(restaurant)
            })
            .await
    }

    /// Delete a restaurant; orders placed there keep existing without a restaurant
    #[instrument(skip(self), fields(restaurant_id = %id))]
    pub async fn delete_restaurant(&self, id: &str) -> ServiceResult<()> {
        self.tracer
            .trace_catalog_operation("restaurant", "delete", async {
                self.get_restaurant(id).await?;

                let detached = self.order_repository.detach_restaurant(id).await?;
                self.repository.delete(id).await?;

                crate::info_with_trace!(detached_orders = detached, "Restaurant deleted");
                Ok::<_, ServiceError>(())
            })
            .await
    }

    pub async fn count(&self) -> ServiceResult<usize> {
        Ok(self.repository.count().await?)
    }
}
